//! Broadcast of committed annotation changes.
//!
//! SETMETADATA collects one change record per annotation that was actually
//! created, rewritten with different content, or deleted, and publishes the
//! batch after the transaction committed. Other sessions subscribe to learn
//! that a key changed; values are re-read from the store, they are not
//! carried in the change.

use log::debug;
use tokio::sync::broadcast;

use crate::command::Mailbox;

/// One changed annotation key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnnotationChange {
    /// The owning mailbox; the account-scope mailbox for global annotations.
    pub mailbox: Mailbox,
    pub key: String,
}

/// Fan-out of change batches to any number of subscribers.
///
/// Lagging subscribers lose old batches rather than blocking the writer,
/// which matches the advisory nature of the notification: a receiver that
/// missed batches re-reads the keys it cares about.
#[derive(Clone, Debug)]
pub struct ChangeBroadcaster {
    sender: broadcast::Sender<Vec<AnnotationChange>>,
}

impl ChangeBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<AnnotationChange>> {
        self.sender.subscribe()
    }

    /// Publish one committed batch. Empty batches are dropped: a SETMETADATA
    /// that rewrote every value with identical content changed nothing.
    pub(crate) fn publish(&self, changes: Vec<AnnotationChange>) {
        if changes.is_empty() {
            return;
        }

        debug!("broadcasting {} annotation change(s)", changes.len());

        // Err means there is currently no subscriber. That is fine.
        let _ = self.sender.send(changes);
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_receive_batches() {
        let broadcaster = ChangeBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(vec![AnnotationChange {
            mailbox: Mailbox::account(),
            key: "/private/comment".to_owned(),
        }]);

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].key, "/private/comment");
    }

    #[test]
    fn test_empty_batches_are_not_published() {
        let broadcaster = ChangeBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(Vec::new());

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let broadcaster = ChangeBroadcaster::default();

        broadcaster.publish(vec![AnnotationChange {
            mailbox: Mailbox::from("INBOX"),
            key: "/private/comment".to_owned(),
        }]);
    }
}
