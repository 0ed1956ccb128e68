use crate::entities::LessonStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

/// Pushed to connected clients whenever a lesson's status commits, whether
/// from a user action or the background sweep.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusChangeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub lesson_id: Uuid,
    pub status: LessonStatus,
    pub tutor_id: i64,
}

/// Status-change fan-out over a broadcast channel. Delivery is best-effort:
/// the status change has already committed by the time this is called, so
/// send failures are logged and swallowed.
#[derive(Clone)]
pub struct StatusNotifier {
    sender: broadcast::Sender<StatusChangeEvent>,
}

impl StatusNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn notify_status_change(&self, lesson_id: Uuid, status: LessonStatus, tutor_id: i64) {
        let event = StatusChangeEvent {
            event_type: "lesson_status_updated".to_string(),
            lesson_id,
            status,
            tutor_id,
        };
        // 没有订阅者时 send 返回 Err，属正常情况
        if let Err(e) = self.sender.send(event) {
            log::debug!("No subscribers for status change of lesson {}: {e}", lesson_id);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChangeEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let notifier = StatusNotifier::new(16);
        let mut rx = notifier.subscribe();

        let lesson_id = Uuid::new_v4();
        notifier.notify_status_change(lesson_id, LessonStatus::Completed, 7);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.lesson_id, lesson_id);
        assert_eq!(event.status, LessonStatus::Completed);
        assert_eq!(event.tutor_id, 7);
        assert_eq!(event.event_type, "lesson_status_updated");
    }

    #[test]
    fn test_notify_without_subscribers_does_not_panic() {
        let notifier = StatusNotifier::new(16);
        notifier.notify_status_change(Uuid::new_v4(), LessonStatus::Cancelled, 1);
    }
}
