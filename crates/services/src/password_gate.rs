//! Lesson access gate: resolves access info and, when the lesson is
//! password protected, produces a validated password before anything else
//! runs.

use std::sync::Arc;

use lesson_core::Clock;
use lesson_core::model::{AccessInfo, Lesson, LessonId};
use storage::repository::{PasswordStore, StorageError};

use crate::collaborators::PasswordPrompt;
use crate::error::{PasswordGateError, RemoteError};
use crate::remote::LessonRemote;

/// Everything gathered while clearing the access gate.
#[derive(Debug, Clone)]
pub struct PasswordData {
    pub access_info: AccessInfo,
    /// Lesson fetched during password validation, when one was needed.
    pub lesson: Option<Lesson>,
    pub password: Option<String>,
}

/// Resolves lesson access, trying the cached password first and prompting
/// only when the caller allows it.
#[derive(Clone)]
pub struct PasswordGateService {
    clock: Clock,
    remote: Arc<dyn LessonRemote>,
    passwords: Arc<dyn PasswordStore>,
    prompt: Option<Arc<dyn PasswordPrompt>>,
}

impl PasswordGateService {
    #[must_use]
    pub fn new(
        clock: Clock,
        remote: Arc<dyn LessonRemote>,
        passwords: Arc<dyn PasswordStore>,
        prompt: Option<Arc<dyn PasswordPrompt>>,
    ) -> Self {
        Self {
            clock,
            remote,
            passwords,
            prompt,
        }
    }

    /// Clear the access gate for a lesson.
    ///
    /// No prevent-access reasons: done. A single password-protection
    /// reason: validate the cached password, then (if `ask_password`)
    /// prompt the user. Anything else is a hard prevention carrying the
    /// server's message.
    ///
    /// # Errors
    ///
    /// Returns `PasswordGateError` when access is prevented, the prompt is
    /// unavailable or cancelled, or validation fails.
    pub async fn gather(
        &self,
        lesson_id: LessonId,
        ask_password: bool,
    ) -> Result<PasswordData, PasswordGateError> {
        let access_info = self.remote.get_access_information(lesson_id).await?;

        if access_info.prevent_access_reasons.is_empty() {
            return Ok(PasswordData {
                access_info,
                lesson: None,
                password: None,
            });
        }

        let first_message = access_info.prevent_access_reasons[0].message.clone();

        if !access_info.password_is_only_barrier() {
            return Err(PasswordGateError::AccessPrevented(first_message));
        }

        // A cached password may still be valid from a previous session.
        match self.passwords.get_password(lesson_id).await {
            Ok(stored) => match self.validate(lesson_id, &stored.password).await {
                Ok(lesson) => {
                    return Ok(PasswordData {
                        access_info,
                        lesson: Some(lesson),
                        password: Some(stored.password),
                    });
                }
                Err(PasswordGateError::Remote(RemoteError::Business { .. })) => {
                    // Stale password; evict so it is never retried silently.
                    self.passwords.remove_password(lesson_id).await?;
                }
                Err(e) => return Err(e),
            },
            Err(StorageError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let prompt = match (ask_password, self.prompt.as_ref()) {
            (true, Some(prompt)) => prompt,
            _ => return Err(PasswordGateError::PasswordRequired(first_message)),
        };

        let Some(password) = prompt.request_password(lesson_id).await else {
            return Err(PasswordGateError::PasswordRequired(first_message));
        };

        let lesson = self.validate(lesson_id, &password).await?;
        Ok(PasswordData {
            access_info,
            lesson: Some(lesson),
            password: Some(password),
        })
    }

    /// Validate a password against the server, caching it on success.
    async fn validate(
        &self,
        lesson_id: LessonId,
        password: &str,
    ) -> Result<Lesson, PasswordGateError> {
        let lesson = self
            .remote
            .get_lesson_with_password(lesson_id, Some(password))
            .await?;

        self.passwords
            .store_password(lesson_id, password, self.clock.timestamp())
            .await?;

        Ok(lesson)
    }
}
