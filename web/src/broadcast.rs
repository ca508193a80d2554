//! Best-effort publish/subscribe hub.
//!
//! A thin wrapper over `tokio::sync::broadcast` with fire-and-forget
//! semantics: publishing never fails the caller, whether or not anyone is
//! listening. Slow subscribers lose the oldest messages (they observe
//! `RecvError::Lagged`) instead of applying back-pressure to publishers.

use tokio::sync::broadcast;

/// Default channel capacity when none is configured.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out hub for real-time messages.
#[derive(Debug, Clone)]
pub struct Broadcaster<T> {
    sender: broadcast::Sender<T>,
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + 'static,
{
    /// Create a hub buffering at most `capacity` undelivered messages per subscriber.
    ///
    /// A zero capacity is bumped to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a message to every current subscriber.
    ///
    /// Returns the number of subscribers that will see the message; zero
    /// when nobody is connected.
    pub fn publish(&self, message: T) -> usize {
        match self.sender.send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("Broadcast dropped: no subscribers");
                0
            }
        }
    }

    /// Subscribe to messages published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T> Default for Broadcaster<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let hub: Broadcaster<u32> = Broadcaster::new(4);
        assert_eq!(hub.publish(7), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let hub: Broadcaster<&'static str> = Broadcaster::new(4);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert_eq!(hub.publish("space_update"), 2);

        assert_eq!(a.recv().await.unwrap(), "space_update");
        assert_eq!(b.recv().await.unwrap(), "space_update");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_oldest() {
        let hub: Broadcaster<u32> = Broadcaster::new(2);
        let mut rx = hub.subscribe();

        for n in 0..5 {
            hub.publish(n);
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(rx.recv().await.unwrap(), 3);
        assert_eq!(rx.recv().await.unwrap(), 4);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let hub: Broadcaster<u8> = Broadcaster::new(0);
        let _rx = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.publish(1), 1);
    }
}
