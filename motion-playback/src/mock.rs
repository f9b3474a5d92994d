//! Recording fake of [`PlaybackService`] for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use spotify_api::{ApiError, Device};
use tokio_util::sync::CancellationToken;

use crate::service::PlaybackService;

/// A call observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Devices,
    Play {
        device_id: String,
        context_uri: Option<String>,
    },
    Volume {
        percent: u8,
        device_id: Option<String>,
    },
    Pause {
        device_id: Option<String>,
    },
}

#[derive(Default)]
struct Behaviour {
    devices: Vec<Device>,
    fail_devices: bool,
    fail_play: bool,
    fail_volume_at: Option<u8>,
    fail_pause: bool,
    cancel_at: Option<(u8, CancellationToken)>,
}

/// Fake playback service that records every call.
#[derive(Clone, Default)]
pub struct MockPlaybackService {
    calls: Arc<Mutex<Vec<Call>>>,
    behaviour: Arc<Mutex<Behaviour>>,
}

pub fn device(id: Option<&str>, name: &str) -> Device {
    Device {
        id: id.map(str::to_string),
        name: name.to_string(),
        is_active: false,
        is_restricted: id.is_none(),
        device_type: "Speaker".to_string(),
        volume_percent: None,
    }
}

fn unavailable() -> ApiError {
    ApiError::Status {
        status: 502,
        message: "Bad Gateway".to_string(),
    }
}

impl MockPlaybackService {
    pub fn with_devices(devices: Vec<Device>) -> Self {
        let mock = Self::default();
        mock.behaviour.lock().devices = devices;
        mock
    }

    /// A service with a single addressable speaker called "kitchen".
    pub fn single_device() -> Self {
        Self::with_devices(vec![device(Some("kitchen"), "Kitchen")])
    }

    pub fn fail_devices(&self) {
        self.behaviour.lock().fail_devices = true;
    }

    pub fn fail_play(&self) {
        self.behaviour.lock().fail_play = true;
    }

    pub fn fail_volume_at(&self, level: u8) {
        self.behaviour.lock().fail_volume_at = Some(level);
    }

    pub fn fail_pause(&self) {
        self.behaviour.lock().fail_pause = true;
    }

    /// Cancel `token` right after the volume reaches `level`.
    pub fn cancel_at(&self, level: u8, token: CancellationToken) {
        self.behaviour.lock().cancel_at = Some((level, token));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn volumes(&self) -> Vec<u8> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Volume { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    pub fn play_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Play { .. }))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl PlaybackService for MockPlaybackService {
    async fn devices(&self) -> Result<Vec<Device>, ApiError> {
        self.calls.lock().push(Call::Devices);
        let behaviour = self.behaviour.lock();
        if behaviour.fail_devices {
            return Err(unavailable());
        }
        Ok(behaviour.devices.clone())
    }

    async fn play(&self, device_id: &str, context_uri: Option<&str>) -> Result<(), ApiError> {
        self.calls.lock().push(Call::Play {
            device_id: device_id.to_string(),
            context_uri: context_uri.map(str::to_string),
        });
        if self.behaviour.lock().fail_play {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> Result<(), ApiError> {
        self.calls.lock().push(Call::Volume {
            percent,
            device_id: device_id.map(str::to_string),
        });
        let behaviour = self.behaviour.lock();
        if behaviour.fail_volume_at == Some(percent) {
            return Err(unavailable());
        }
        if let Some((level, token)) = &behaviour.cancel_at {
            if *level == percent {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn pause(&self, device_id: Option<&str>) -> Result<(), ApiError> {
        self.calls.lock().push(Call::Pause {
            device_id: device_id.map(str::to_string),
        });
        if self.behaviour.lock().fail_pause {
            return Err(unavailable());
        }
        Ok(())
    }
}
