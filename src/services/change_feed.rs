use tokio::sync::broadcast;
use tracing::debug;

use crate::models::AttendanceRow;

/// Row-level mutation on `attendance_logs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceChange {
    Inserted(AttendanceRow),
    Updated(AttendanceRow),
    Deleted { id: i64 },
}

impl AttendanceChange {
    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceChange::Inserted(_) => "INSERT",
            AttendanceChange::Updated(_) => "UPDATE",
            AttendanceChange::Deleted { .. } => "DELETE",
        }
    }
}

/// Publish/subscribe channel for attendance table mutations.
///
/// Cloning shares the same channel. Publishing with no subscribers is not an error.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<AttendanceChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, change: AttendanceChange) {
        let kind = change.kind();
        match self.sender.send(change) {
            Ok(receivers) => debug!(kind, receivers, "attendance change published"),
            Err(_) => debug!(kind, "attendance change dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttendanceChange> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64) -> AttendanceRow {
        AttendanceRow {
            id,
            created_at: "2026-02-21T09:00:00.000Z".to_string(),
            full_name: "Ama".to_string(),
            phone_number: "055".to_string(),
            status: "Member".to_string(),
            branch: "Accra".to_string(),
            invited_by: None,
            location: None,
            email: None,
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_change() {
        let feed = ChangeFeed::new(8);
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 2);

        feed.publish(AttendanceChange::Inserted(row(1)));
        feed.publish(AttendanceChange::Deleted { id: 1 });

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap(), AttendanceChange::Inserted(row(1)));
            assert_eq!(rx.recv().await.unwrap(), AttendanceChange::Deleted { id: 1 });
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let feed = ChangeFeed::default();
        feed.publish(AttendanceChange::Updated(row(2)));
        assert_eq!(feed.subscriber_count(), 0);
    }
}
