//! Start/stop state machine for motion-triggered playback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::device::{DeviceResolver, PlaybackTarget};
use crate::error::{Operation, PlaybackError, Result};
use crate::ramp::{RampEngine, RampOutcome, MAX_VOLUME};
use crate::service::PlaybackService;

/// Whether music is currently meant to be audible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => f.write_str("idle"),
            PlaybackState::Playing => f.write_str("playing"),
        }
    }
}

/// Volume range and pacing of fades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// Context played on Start; `None` resumes whatever was loaded
    pub context_uri: Option<String>,
    /// First level of a fade-in
    pub floor: u8,
    /// Last level of a fade-in
    pub ceiling: u8,
    /// Last level of a fade-out
    pub silence: u8,
    /// Wait between consecutive volume levels
    pub step_delay: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            context_uri: None,
            floor: 20,
            ceiling: 75,
            silence: 0,
            step_delay: Duration::from_millis(20),
        }
    }
}

impl PlaybackSettings {
    pub fn with_context(mut self, context_uri: impl Into<String>) -> Self {
        self.context_uri = Some(context_uri.into());
        self
    }
}

/// What a start or stop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Playback started and faded in completely
    Started { volume: u8 },
    /// Playback started but the fade-in was cancelled at `volume`
    FadeInInterrupted { volume: u8 },
    /// Playback faded out and paused
    Stopped,
    /// Nothing to do in the current state
    Unchanged(PlaybackState),
}

/// Owns the playback state and runs every transition.
///
/// Only one task may drive an orchestrator; [`crate::EventDispatcher`] moves
/// it into its worker.
pub struct Orchestrator<S: PlaybackService> {
    service: Arc<S>,
    settings: PlaybackSettings,
    ramp: RampEngine,
    state: PlaybackState,
    target: Option<PlaybackTarget>,
    volume: u8,
}

impl<S: PlaybackService> Orchestrator<S> {
    pub fn new(service: Arc<S>, settings: PlaybackSettings) -> Self {
        let ramp = RampEngine::new(settings.step_delay);
        Self {
            service,
            settings,
            ramp,
            state: PlaybackState::Idle,
            target: None,
            volume: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Last volume level applied by this orchestrator.
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Device of the active session, if any.
    pub fn target(&self) -> Option<&PlaybackTarget> {
        self.target.as_ref()
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Start playback and fade in from the floor to the ceiling.
    ///
    /// A no-op while already playing. Cancelling `cancel` stops the fade-in
    /// where it is; playback is still considered started.
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<Transition> {
        if self.state == PlaybackState::Playing {
            tracing::debug!("Start ignored, already playing");
            return Ok(Transition::Unchanged(self.state));
        }

        let target = DeviceResolver::resolve(self.service.as_ref()).await?;

        tracing::info!("Starting playback on '{}'", target.name);
        self.service
            .play(&target.id, self.settings.context_uri.as_deref())
            .await
            .map_err(PlaybackError::during(Operation::Play))?;

        let outcome = self
            .run_ramp(&target.id, self.settings.floor, self.settings.ceiling, cancel)
            .await?;

        self.state = PlaybackState::Playing;
        self.target = Some(target);
        Ok(match outcome {
            RampOutcome::Completed { reached } => Transition::Started { volume: reached },
            RampOutcome::Cancelled { reached } => Transition::FadeInInterrupted { volume: reached },
        })
    }

    /// Fade out from the current level and pause.
    ///
    /// A no-op while idle. Fade-outs are not cancellable.
    pub async fn stop(&mut self) -> Result<Transition> {
        let Some(device_id) = self.active_device() else {
            tracing::debug!("Stop ignored, nothing is playing");
            return Ok(Transition::Unchanged(self.state));
        };

        tracing::info!("Stopping playback");
        self.run_ramp(
            &device_id,
            self.volume,
            self.settings.silence,
            &CancellationToken::new(),
        )
        .await?;

        self.service
            .pause(Some(&device_id))
            .await
            .map_err(PlaybackError::during(Operation::Pause))?;

        self.state = PlaybackState::Idle;
        self.target = None;
        Ok(Transition::Stopped)
    }

    /// Load the configured context on the first device without making a
    /// sound: silence, play, pause.
    pub async fn prime(&mut self) -> Result<PlaybackTarget> {
        let target = DeviceResolver::resolve(self.service.as_ref()).await?;
        let silence = self.settings.silence.min(MAX_VOLUME);

        self.service
            .set_volume(silence, Some(&target.id))
            .await
            .map_err(PlaybackError::during(Operation::SetVolume(silence)))?;
        self.volume = silence;

        self.service
            .play(&target.id, self.settings.context_uri.as_deref())
            .await
            .map_err(PlaybackError::during(Operation::Play))?;
        self.service
            .pause(Some(&target.id))
            .await
            .map_err(PlaybackError::during(Operation::Pause))?;

        tracing::info!("Primed playback on '{}'", target.name);
        Ok(target)
    }

    fn active_device(&self) -> Option<String> {
        match (self.state, &self.target) {
            (PlaybackState::Playing, Some(target)) => Some(target.id.clone()),
            _ => None,
        }
    }

    async fn run_ramp(
        &mut self,
        device_id: &str,
        from: u8,
        to: u8,
        cancel: &CancellationToken,
    ) -> Result<RampOutcome> {
        match self
            .ramp
            .ramp(self.service.as_ref(), Some(device_id), from, to, cancel)
            .await
        {
            Ok(outcome) => {
                self.volume = outcome.reached();
                Ok(outcome)
            }
            Err(e) => {
                if let Some(level) = last_applied(from, to, &e) {
                    self.volume = level;
                }
                Err(e)
            }
        }
    }
}

/// Level left on the device by a ramp that failed with `error`.
fn last_applied(from: u8, to: u8, error: &PlaybackError) -> Option<u8> {
    let PlaybackError::Service {
        operation: Operation::SetVolume(failed),
        ..
    } = error
    else {
        return None;
    };
    let (from, to) = (from.min(MAX_VOLUME), to.min(MAX_VOLUME));
    match to.cmp(&from) {
        _ if *failed == from => None,
        std::cmp::Ordering::Greater => Some(failed - 1),
        std::cmp::Ordering::Less => Some(failed + 1),
        std::cmp::Ordering::Equal => None,
    }
}
