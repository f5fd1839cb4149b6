//! Advisory operation blocks.
//!
//! While a lesson is being played the player holds a block so background
//! sync keeps its hands off. The check happens at sync entry only; nothing
//! is preempted.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use lesson_core::model::LessonId;

/// Registry of (component, lesson) advisory blocks.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    inner: Mutex<HashSet<(String, LessonId)>>,
}

impl BlockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, component: &str, lesson_id: LessonId) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((component.to_string(), lesson_id));
    }

    pub fn unblock(&self, component: &str, lesson_id: LessonId) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(component.to_string(), lesson_id));
    }

    #[must_use]
    pub fn is_blocked(&self, component: &str, lesson_id: LessonId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(component.to_string(), lesson_id))
    }
}
