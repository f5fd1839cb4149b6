//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::LessonId;
use storage::repository::StorageError;

/// Errors from the remote lesson web services.
///
/// This is the transport/business split the synchronizer's abort policy is
/// built on: a `Transport` failure means the server never judged the
/// request, a `Business` rejection is the server explicitly refusing it.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("network request failed: {0}")]
    Transport(String),

    #[error("{message}")]
    Business { code: String, message: String },
}

impl RemoteError {
    #[must_use]
    pub fn is_business(&self) -> bool {
        matches!(self, RemoteError::Business { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}

/// Errors emitted by `RetakeSyncService`.
///
/// Business rejections never surface here: the synchronizer resolves them
/// in place (delete the local row, record a warning) and carries on.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The lesson is being played; sync refuses to run.
    #[error("sync blocked for lesson {0}")]
    Blocked(LessonId),

    /// Offline data exists but there is no connectivity to send it.
    #[error("cannot sync without a network connection")]
    Offline,

    #[error("network request failed: {0}")]
    Transport(String),

    /// Access to the lesson is prevented for a non-password reason, or the
    /// password could not be obtained.
    #[error("lesson access prevented: {0}")]
    Access(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `PasswordGateService`.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum PasswordGateError {
    /// The server refuses access for a reason a password cannot fix.
    #[error("lesson access prevented: {0}")]
    AccessPrevented(String),

    /// A password is required and prompting was not allowed or was
    /// cancelled.
    #[error("lesson access prevented: {0}")]
    PasswordRequired(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the offline player.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlayerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] storage::sqlite::SqliteInitError),
}

impl From<PasswordGateError> for SyncError {
    fn from(e: PasswordGateError) -> Self {
        match e {
            PasswordGateError::AccessPrevented(msg)
            | PasswordGateError::PasswordRequired(msg) => SyncError::Access(msg),
            PasswordGateError::Remote(RemoteError::Transport(msg)) => SyncError::Transport(msg),
            PasswordGateError::Remote(RemoteError::Business { message, .. }) => {
                SyncError::Access(message)
            }
            PasswordGateError::Storage(e) => SyncError::Storage(e),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Transport(msg) => SyncError::Transport(msg),
            RemoteError::Business { message, .. } => SyncError::Access(message),
        }
    }
}
