//! view invalidation signals
//!
//! the [`ViewNotifier`] tells downstream caches (ui renderers, list views)
//! that a path they serve is stale. the callback handler fires one signal
//! after each successful machine write.

use tokio::sync::broadcast;

/// path of the machine list view
pub const MACHINES_VIEW: &str = "/machines";

/// event sent when a cached view must be re-rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewInvalidated {
    /// the invalidated view path, e.g. `/machines`
    pub path: String,
}

/// broadcaster for view invalidation events
///
/// uses `tokio::sync::broadcast` for one-to-many notifications.
/// all clones share the same channel.
#[derive(Debug, Clone)]
pub struct ViewNotifier {
    sender: broadcast::Sender<ViewInvalidated>,
}

impl ViewNotifier {
    /// create a new notifier
    ///
    /// the channel has a capacity of 16 messages. a subscriber that falls
    /// behind gets `RecvError::Lagged` and should treat every view as stale
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    /// subscribe to invalidation events
    pub fn subscribe(&self) -> broadcast::Receiver<ViewInvalidated> {
        self.sender.subscribe()
    }

    /// mark `path` stale, returning how many subscribers were told
    pub fn invalidate(&self, path: &str) -> usize {
        // no receivers is fine
        self.sender
            .send(ViewInvalidated {
                path: path.to_string(),
            })
            .unwrap_or(0)
    }
}

impl Default for ViewNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn subscribe_receives_invalidation() {
        let notifier = ViewNotifier::new();
        let mut rx = notifier.subscribe();

        assert_eq!(notifier.invalidate(MACHINES_VIEW), 1);

        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("subscriber should receive invalidation")
            .unwrap();
        assert_eq!(event.path, "/machines");
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let notifier = ViewNotifier::new();
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();

        assert_eq!(notifier.invalidate(MACHINES_VIEW), 2);

        let r1 = timeout(Duration::from_millis(100), rx1.recv()).await;
        let r2 = timeout(Duration::from_millis(100), rx2.recv()).await;
        assert!(r1.is_ok(), "first subscriber should receive");
        assert!(r2.is_ok(), "second subscriber should receive");
    }

    #[test]
    fn no_subscribers_is_not_an_error() {
        let notifier = ViewNotifier::new();
        assert_eq!(notifier.invalidate(MACHINES_VIEW), 0);
    }

    #[tokio::test]
    async fn clone_shares_channel() {
        let notifier = ViewNotifier::new();
        let clone = notifier.clone();
        let mut rx = notifier.subscribe();

        clone.invalidate("/machines/m1");

        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("clone should notify on shared channel")
            .unwrap();
        assert_eq!(event.path, "/machines/m1");
    }
}
