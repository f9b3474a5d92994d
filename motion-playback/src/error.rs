use std::fmt;

use spotify_api::ApiError;
use thiserror::Error;

/// Playback-service call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListDevices,
    Play,
    SetVolume(u8),
    Pause,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ListDevices => f.write_str("list devices"),
            Operation::Play => f.write_str("play"),
            Operation::SetVolume(level) => write!(f, "set volume to {level}"),
            Operation::Pause => f.write_str("pause"),
        }
    }
}

/// Errors raised while handling motion events.
///
/// All of these are scoped to a single event: they abort the current
/// operation and are logged, they never stop the dispatcher.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The device list was empty
    #[error("No devices found")]
    NoDevicesFound,

    /// A call to the playback service failed
    #[error("Failed to {operation}: {source}")]
    Service {
        operation: Operation,
        #[source]
        source: ApiError,
    },

    /// An inbound message was not a motion event
    #[error("Failed to parse message payload: {0}")]
    PayloadDecode(#[from] serde_json::Error),

    /// The orchestration worker is no longer running
    #[error("Playback worker has stopped")]
    WorkerStopped,
}

impl PlaybackError {
    /// Adapter for `map_err` that records which call failed.
    pub fn during(operation: Operation) -> impl FnOnce(ApiError) -> Self {
        move |source| PlaybackError::Service { operation, source }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_carries_operation() {
        let error = PlaybackError::during(Operation::SetVolume(42))(ApiError::Status {
            status: 502,
            message: "Bad Gateway".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Failed to set volume to 42: Spotify returned 502: Bad Gateway"
        );
        assert!(std::error::Error::source(&error).is_some());
    }
}
