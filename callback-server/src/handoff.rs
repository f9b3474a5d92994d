//! Single-value handoff between the callback handler and the waiting consumer.
//!
//! A handoff is a write-once slot: the producer half can publish one result
//! and is consumed doing so, the consumer half can wait once and is consumed
//! doing so. Both properties are enforced by ownership rather than at runtime.

use tokio::sync::oneshot;

use crate::error::AuthorizationError;

/// Create a connected producer/consumer pair.
pub fn handoff<T>() -> (HandoffSender<T>, PendingHandoff<T>) {
    let (tx, rx) = oneshot::channel();
    (HandoffSender { tx }, PendingHandoff { rx })
}

/// Producer half of a handoff.
#[derive(Debug)]
pub struct HandoffSender<T> {
    tx: oneshot::Sender<Result<T, AuthorizationError>>,
}

impl<T> HandoffSender<T> {
    /// Publish the session. Returns `false` if the consumer is gone.
    pub fn publish(self, value: T) -> bool {
        self.tx.send(Ok(value)).is_ok()
    }

    /// Publish a terminal failure instead of a session.
    pub fn fail(self, error: AuthorizationError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

/// Consumer half of a handoff.
#[derive(Debug)]
pub struct PendingHandoff<T> {
    rx: oneshot::Receiver<Result<T, AuthorizationError>>,
}

impl<T> PendingHandoff<T> {
    /// Wait for the single published result.
    ///
    /// Blocks the calling task until the producer publishes. If the producer
    /// is dropped without publishing, [`AuthorizationError::Abandoned`] is
    /// returned.
    pub async fn wait(self) -> Result<T, AuthorizationError> {
        self.rx.await.map_err(|_| AuthorizationError::Abandoned)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_publish_delivers_same_instance() {
        let (sender, pending) = handoff::<Arc<String>>();
        let session = Arc::new("session".to_string());

        assert!(sender.publish(Arc::clone(&session)));

        let received = pending.wait().await.unwrap();
        assert!(Arc::ptr_eq(&session, &received));
    }

    #[tokio::test]
    async fn test_fail_delivers_error() {
        let (sender, pending) = handoff::<()>();
        sender.fail(AuthorizationError::MissingCode);

        let result = pending.wait().await;
        assert!(matches!(result, Err(AuthorizationError::MissingCode)));
    }

    #[tokio::test]
    async fn test_dropped_sender_is_abandoned() {
        let (sender, pending) = handoff::<()>();
        drop(sender);

        let result = pending.wait().await;
        assert!(matches!(result, Err(AuthorizationError::Abandoned)));
    }

    #[tokio::test]
    async fn test_wait_blocks_until_published() {
        let (_sender, pending) = handoff::<u32>();

        let waited = timeout(Duration::from_millis(100), pending.wait()).await;
        assert!(waited.is_err(), "wait should not complete without a publish");
    }

    #[tokio::test]
    async fn test_publish_without_consumer() {
        let (sender, pending) = handoff::<u32>();
        drop(pending);
        assert!(!sender.publish(7));
    }
}
