//! Stepped volume transitions.
//!
//! A ramp walks the volume one unit at a time from a start level to an end
//! level, waiting a fixed delay between consecutive levels. Ramps are not
//! atomic: the first failed volume call aborts the ramp and leaves the last
//! applied level in place.

use std::iter::FusedIterator;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Operation, PlaybackError, Result};
use crate::service::PlaybackService;

/// Highest volume the playback service accepts.
pub const MAX_VOLUME: u8 = 100;

/// Lazy sequence of volume levels from `from` to `to`, both inclusive.
///
/// Ascends when `to > from`, descends when `to < from`, and yields `from`
/// once when they are equal. Once exhausted it stays exhausted.
#[derive(Debug, Clone)]
pub struct VolumeSteps {
    next: Option<u8>,
    end: u8,
}

impl VolumeSteps {
    pub fn new(from: u8, to: u8) -> Self {
        Self {
            next: Some(from),
            end: to,
        }
    }
}

impl Iterator for VolumeSteps {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let current = self.next?;
        self.next = match current.cmp(&self.end) {
            std::cmp::Ordering::Less => Some(current + 1),
            std::cmp::Ordering::Greater => Some(current - 1),
            std::cmp::Ordering::Equal => None,
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .next
            .map_or(0, |next| usize::from(next.abs_diff(self.end)) + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for VolumeSteps {}

impl FusedIterator for VolumeSteps {}

/// How a ramp ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampOutcome {
    /// Every level was applied
    Completed { reached: u8 },
    /// The ramp was cancelled between two steps
    Cancelled { reached: u8 },
}

impl RampOutcome {
    /// Last level applied to the device.
    pub fn reached(&self) -> u8 {
        match self {
            RampOutcome::Completed { reached } | RampOutcome::Cancelled { reached } => *reached,
        }
    }
}

/// Applies [`VolumeSteps`] to a playback service.
#[derive(Debug, Clone, Copy)]
pub struct RampEngine {
    step_delay: Duration,
}

impl RampEngine {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Total time a ramp between `from` and `to` spends waiting.
    pub fn duration(&self, from: u8, to: u8) -> Duration {
        self.step_delay * u32::from(from.abs_diff(to))
    }

    /// Walk the volume from `from` to `to`.
    ///
    /// The first level is applied immediately. Each wait between levels
    /// races `cancel`; a cancelled ramp reports the last applied level.
    /// Levels above [`MAX_VOLUME`] are clamped.
    pub async fn ramp<S: PlaybackService + ?Sized>(
        &self,
        service: &S,
        device_id: Option<&str>,
        from: u8,
        to: u8,
        cancel: &CancellationToken,
    ) -> Result<RampOutcome> {
        let (from, to) = (from.min(MAX_VOLUME), to.min(MAX_VOLUME));
        tracing::debug!(from, to, step_delay = ?self.step_delay, "Starting volume ramp");

        let mut steps = VolumeSteps::new(from, to);
        let mut reached = from;
        if let Some(first) = steps.next() {
            Self::apply(service, device_id, first).await?;
            reached = first;
        }

        for level in steps {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(reached, "Volume ramp cancelled");
                    return Ok(RampOutcome::Cancelled { reached });
                }
                _ = tokio::time::sleep(self.step_delay) => {}
            }
            Self::apply(service, device_id, level).await?;
            reached = level;
        }

        Ok(RampOutcome::Completed { reached })
    }

    async fn apply<S: PlaybackService + ?Sized>(
        service: &S,
        device_id: Option<&str>,
        level: u8,
    ) -> Result<()> {
        service
            .set_volume(level, device_id)
            .await
            .map_err(PlaybackError::during(Operation::SetVolume(level)))
    }
}
