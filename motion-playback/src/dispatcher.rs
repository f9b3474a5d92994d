//! Decoding of motion messages and ordered delivery to the orchestrator.

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{PlaybackError, Result};
use crate::orchestrator::Orchestrator;
use crate::service::PlaybackService;

/// Payload published by the motion sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct MotionEvent {
    #[serde(default)]
    pub motion_detected: bool,
}

impl MotionEvent {
    /// Decode a raw MQTT payload. Unknown fields are ignored and a missing
    /// `motion_detected` reads as `false`.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

enum Command {
    Start(CancellationToken),
    Stop,
}

/// Front door for motion events.
///
/// Events are queued in arrival order and applied one at a time by a worker
/// task that owns the [`Orchestrator`]. A Stop cancels the fade-in of any
/// queued or running Start; a fade-out always runs to the end.
pub struct EventDispatcher {
    commands: mpsc::UnboundedSender<Command>,
    fade_in: Mutex<Option<CancellationToken>>,
}

impl EventDispatcher {
    /// Move `orchestrator` into a new worker task.
    ///
    /// The worker exits once the dispatcher is dropped and the queue is
    /// drained.
    pub fn spawn<S: PlaybackService>(orchestrator: Orchestrator<S>) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(orchestrator, receiver));
        let dispatcher = Self {
            commands,
            fade_in: Mutex::new(None),
        };
        (dispatcher, worker)
    }

    /// Handle one raw message. Undecodable payloads are logged and dropped.
    pub fn on_message(&self, raw: &[u8]) {
        let event = match MotionEvent::decode(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(
                    payload = %String::from_utf8_lossy(raw),
                    "Failed to decode motion event: {}",
                    e
                );
                return;
            }
        };

        tracing::debug!(motion_detected = event.motion_detected, "Motion event received");
        if let Err(e) = self.dispatch(event) {
            tracing::error!("Failed to dispatch motion event: {}", e);
        }
    }

    /// Queue the operation for `event`.
    pub fn dispatch(&self, event: MotionEvent) -> Result<()> {
        let command = if event.motion_detected {
            let mut fade_in = self.fade_in.lock();
            let token = match fade_in.as_ref() {
                Some(token) if !token.is_cancelled() => token.clone(),
                _ => {
                    let token = CancellationToken::new();
                    *fade_in = Some(token.clone());
                    token
                }
            };
            Command::Start(token)
        } else {
            if let Some(token) = self.fade_in.lock().take() {
                token.cancel();
            }
            Command::Stop
        };

        self.commands
            .send(command)
            .map_err(|_| PlaybackError::WorkerStopped)
    }
}

async fn run_worker<S: PlaybackService>(
    mut orchestrator: Orchestrator<S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    tracing::debug!("Playback worker started");
    while let Some(command) = commands.recv().await {
        let result = match command {
            Command::Start(cancel) => orchestrator.start(&cancel).await,
            Command::Stop => orchestrator.stop().await,
        };
        match result {
            Ok(transition) => tracing::info!(
                state = %orchestrator.state(),
                volume = orchestrator.volume(),
                "{:?}",
                transition
            ),
            Err(e) => tracing::error!(state = %orchestrator.state(), "{}", e),
        }
    }
    tracing::debug!("Playback worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockPlaybackService};
    use crate::orchestrator::PlaybackSettings;
    use rstest::rstest;
    use std::sync::Arc;

    fn spawn(service: &MockPlaybackService) -> (EventDispatcher, JoinHandle<()>) {
        EventDispatcher::spawn(Orchestrator::new(
            Arc::new(service.clone()),
            PlaybackSettings::default(),
        ))
    }

    #[rstest]
    #[case(br#"{"motion_detected": true}"#.as_slice(), true)]
    #[case(br#"{"motion_detected": false}"#.as_slice(), false)]
    #[case(br#"{}"#.as_slice(), false)]
    #[case(br#"{"motion_detected": true, "battery": 87}"#.as_slice(), true)]
    fn test_decode(#[case] raw: &[u8], #[case] expected: bool) {
        assert_eq!(MotionEvent::decode(raw).unwrap().motion_detected, expected);
    }

    #[rstest]
    #[case(br#"{"motion_detected": "yes"}"#.as_slice())]
    #[case(b"motion".as_slice())]
    #[case(b"".as_slice())]
    fn test_decode_rejects(#[case] raw: &[u8]) {
        assert!(matches!(
            MotionEvent::decode(raw),
            Err(PlaybackError::PayloadDecode(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_payload_reaches_nobody() {
        let service = MockPlaybackService::single_device();
        let (dispatcher, worker) = spawn(&service);

        dispatcher.on_message(br#"{"motion_detected": 1}"#);
        drop(dispatcher);
        worker.await.unwrap();

        assert!(service.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_fades_in() {
        let service = MockPlaybackService::single_device();
        let (dispatcher, worker) = spawn(&service);

        dispatcher.on_message(br#"{"motion_detected": true}"#);
        drop(dispatcher);
        worker.await.unwrap();

        assert_eq!(service.play_count(), 1);
        assert_eq!(service.volumes(), (20..=75).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_motion_plays_once() {
        let service = MockPlaybackService::single_device();
        let (dispatcher, worker) = spawn(&service);

        for _ in 0..3 {
            dispatcher.on_message(br#"{"motion_detected": true}"#);
        }
        drop(dispatcher);
        worker.await.unwrap();

        assert_eq!(service.play_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_queued_fade_in() {
        let service = MockPlaybackService::single_device();
        let (dispatcher, worker) = spawn(&service);

        dispatcher
            .dispatch(MotionEvent {
                motion_detected: true,
            })
            .unwrap();
        dispatcher
            .dispatch(MotionEvent {
                motion_detected: false,
            })
            .unwrap();
        drop(dispatcher);
        worker.await.unwrap();

        let mut expected = vec![20];
        expected.extend((0..=20).rev());
        assert_eq!(service.volumes(), expected);
        assert_eq!(
            service.calls().last(),
            Some(&Call::Pause {
                device_id: Some("kitchen".to_string())
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_running_fade_in() {
        let service = MockPlaybackService::single_device();
        let (dispatcher, worker) = spawn(&service);

        dispatcher.on_message(br#"{"motion_detected": true}"#);
        // Let the fade-in run for a while before motion ends.
        tokio::time::sleep(std::time::Duration::from_millis(205)).await;
        dispatcher.on_message(br#"{"motion_detected": false}"#);
        drop(dispatcher);
        worker.await.unwrap();

        let volumes = service.volumes();
        let peak = volumes.iter().copied().max().unwrap();
        assert!(peak > 20 && peak < 75, "peak was {peak}");
        assert_eq!(volumes.last(), Some(&0));
        let descent = &volumes[volumes.iter().rposition(|v| *v == peak).unwrap()..];
        assert_eq!(descent, (0..=peak).rev().collect::<Vec<_>>().as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_during_fade_out_restarts_afterwards() {
        let service = MockPlaybackService::single_device();
        let (dispatcher, worker) = spawn(&service);

        dispatcher.on_message(br#"{"motion_detected": true}"#);
        dispatcher.on_message(br#"{"motion_detected": false}"#);
        dispatcher.on_message(br#"{"motion_detected": true}"#);
        drop(dispatcher);
        worker.await.unwrap();

        assert_eq!(service.play_count(), 2);
        assert_eq!(service.volumes().last(), Some(&75));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_do_not_stop_the_worker() {
        let service = MockPlaybackService::with_devices(Vec::new());
        let (dispatcher, worker) = spawn(&service);

        dispatcher.on_message(br#"{"motion_detected": true}"#);
        dispatcher.on_message(br#"{"motion_detected": true}"#);
        drop(dispatcher);
        worker.await.unwrap();

        assert_eq!(
            service.calls(),
            vec![Call::Devices, Call::Devices],
            "both events were attempted"
        );
    }

    #[tokio::test]
    async fn test_dispatch_after_worker_exit() {
        let service = MockPlaybackService::single_device();
        let (dispatcher, worker) = spawn(&service);
        worker.abort();
        let _ = worker.await;

        let result = dispatcher.dispatch(MotionEvent {
            motion_detected: false,
        });
        assert!(matches!(result, Err(PlaybackError::WorkerStopped)));
    }
}
