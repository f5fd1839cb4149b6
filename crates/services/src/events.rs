//! Typed event channel for cross-cutting notifications.
//!
//! The sync engine publishes; UI layers subscribe. Publishing never blocks
//! and never fails: with no subscribers the event is simply dropped.

use lesson_core::model::{LessonId, PageId};
use tokio::sync::broadcast;

/// What kind of data a `DataSent` event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSentKind {
    /// A page answer was recorded or submitted.
    Process,
    /// A retake was finished.
    Finish,
    /// A retake was launched.
    Launch,
}

/// Notifications published by the lesson services.
#[derive(Debug, Clone, PartialEq)]
pub enum LessonEvent {
    /// Lesson data was recorded locally or sent to the server.
    DataSent {
        lesson_id: LessonId,
        kind: DataSentKind,
        page_id: Option<PageId>,
    },
    /// A background sync updated server state for a lesson.
    AutoSynced {
        lesson_id: LessonId,
        warnings: Vec<String>,
    },
}

/// Broadcast channel wrapper with a bounded buffer.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LessonEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: LessonEvent) {
        // Dropped when nobody is listening.
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LessonEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
