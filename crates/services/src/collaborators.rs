//! External collaborators the sync engine depends on but does not own:
//! the connectivity oracle, the password prompt, the offline analytics
//! queue, and the module refresher. Each is a small seam with a no-op or
//! trivial implementation for tests and headless use.

use async_trait::async_trait;

use lesson_core::model::{CourseId, LessonId};

use crate::error::RemoteError;

/// Boolean "is online" check consulted before any phase needing network.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// A connectivity oracle that always reports online.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Interactive collaborator that obtains a lesson password from the user.
///
/// Returns `None` when the user cancels.
#[async_trait]
pub trait PasswordPrompt: Send + Sync {
    async fn request_password(&self, lesson_id: LessonId) -> Option<String>;
}

/// Flushes queued offline analytics/log entries for a lesson.
///
/// The synchronizer invokes this best-effort: failures are ignored.
#[async_trait]
pub trait ActivityLogSync: Send + Sync {
    async fn sync_activity_logs(&self, lesson_id: LessonId) -> Result<(), RemoteError>;
}

/// Refreshes cached module data after a sync changed server state.
///
/// Implementations decide whether a full re-download is warranted; when
/// only file listings changed a cheap cache refresh is enough.
#[async_trait]
pub trait ModuleRefresher: Send + Sync {
    async fn refresh_module(
        &self,
        lesson_id: LessonId,
        course_id: CourseId,
    ) -> Result<(), RemoteError>;
}

/// No-op implementations for headless and test setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCollaborator;

#[async_trait]
impl ActivityLogSync for NoopCollaborator {
    async fn sync_activity_logs(&self, _lesson_id: LessonId) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[async_trait]
impl ModuleRefresher for NoopCollaborator {
    async fn refresh_module(
        &self,
        _lesson_id: LessonId,
        _course_id: CourseId,
    ) -> Result<(), RemoteError> {
        Ok(())
    }
}
