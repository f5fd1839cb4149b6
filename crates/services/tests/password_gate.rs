use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use lesson_core::model::{
    AccessInfo, AttemptData, CourseId, Lesson, LessonId, LessonPage, PageId, PossibleJumps,
    PreventReason, QuestionAttempt, REASON_PASSWORD_PROTECTED,
};
use lesson_core::time::fixed_clock;
use services::{
    FinishRetakeOutcome, LessonRemote, PasswordGateError, PasswordGateService, PasswordPrompt,
    ProcessPageOutcome, RemoteError, RetakesOverview, UserRetake, UserTimer,
};
use storage::repository::{PasswordStore, Storage, StorageError};

const LESSON: u64 = 9;

struct GateRemote {
    /// Reasons the server reports; empty means open access.
    reasons: Vec<PreventReason>,
    /// The password the server accepts.
    accepted_password: Option<String>,
    validations: Mutex<Vec<String>>,
}

impl GateRemote {
    fn password_protected(accepted: &str) -> Self {
        Self {
            reasons: vec![PreventReason {
                reason: REASON_PASSWORD_PROTECTED.into(),
                message: "This lesson is protected by a password".into(),
            }],
            accepted_password: Some(accepted.into()),
            validations: Mutex::new(Vec::new()),
        }
    }

    fn open() -> Self {
        Self {
            reasons: Vec::new(),
            accepted_password: None,
            validations: Mutex::new(Vec::new()),
        }
    }

    fn closed(message: &str) -> Self {
        Self {
            reasons: vec![PreventReason {
                reason: "lessonclosed".into(),
                message: message.into(),
            }],
            accepted_password: None,
            validations: Mutex::new(Vec::new()),
        }
    }

    fn lesson(&self) -> Lesson {
        Lesson {
            id: LessonId::new(LESSON),
            course_id: CourseId::new(1),
            name: "Gated".into(),
            custom_scoring: false,
            max_attempts: 0,
            min_questions: 0,
            retake_allowed: true,
            feedback: false,
            review_allowed: false,
            grade: None,
            time_limit: 0,
            allow_offline_attempts: true,
        }
    }
}

#[async_trait]
impl LessonRemote for GateRemote {
    async fn get_lesson_by_id(
        &self,
        _course_id: CourseId,
        _lesson_id: LessonId,
    ) -> Result<Lesson, RemoteError> {
        Ok(self.lesson())
    }

    async fn get_lesson_with_password(
        &self,
        _lesson_id: LessonId,
        password: Option<&str>,
    ) -> Result<Lesson, RemoteError> {
        let given = password.unwrap_or_default().to_string();
        self.validations.lock().unwrap().push(given.clone());

        match &self.accepted_password {
            Some(accepted) if *accepted == given => Ok(self.lesson()),
            _ => Err(RemoteError::Business {
                code: "loginfail".into(),
                message: "Wrong password".into(),
            }),
        }
    }

    async fn get_access_information(
        &self,
        _lesson_id: LessonId,
    ) -> Result<AccessInfo, RemoteError> {
        Ok(AccessInfo {
            attempts_count: 0,
            can_manage: false,
            can_view_reports: false,
            first_page_id: PageId::new(1),
            left_during_timed: false,
            prevent_access_reasons: self.reasons.clone(),
        })
    }

    async fn get_pages(
        &self,
        _lesson_id: LessonId,
        _password: Option<&str>,
    ) -> Result<Vec<LessonPage>, RemoteError> {
        Ok(Vec::new())
    }

    async fn get_page_data(
        &self,
        _lesson_id: LessonId,
        page_id: PageId,
        _password: Option<&str>,
    ) -> Result<LessonPage, RemoteError> {
        Err(RemoteError::Business {
            code: "invalidrecord".into(),
            message: format!("page {page_id} is not scripted"),
        })
    }

    async fn get_pages_possible_jumps(
        &self,
        _lesson_id: LessonId,
    ) -> Result<PossibleJumps, RemoteError> {
        Ok(PossibleJumps::new())
    }

    async fn get_questions_attempts(
        &self,
        _lesson_id: LessonId,
        _retake: u32,
    ) -> Result<Vec<QuestionAttempt>, RemoteError> {
        Ok(Vec::new())
    }

    async fn get_content_pages_viewed(
        &self,
        _lesson_id: LessonId,
        _retake: u32,
    ) -> Result<Vec<PageId>, RemoteError> {
        Ok(Vec::new())
    }

    async fn process_page(
        &self,
        _lesson_id: LessonId,
        _page_id: PageId,
        _data: &AttemptData,
        _password: Option<&str>,
    ) -> Result<ProcessPageOutcome, RemoteError> {
        Ok(ProcessPageOutcome::default())
    }

    async fn finish_retake(
        &self,
        _lesson_id: LessonId,
        _password: Option<&str>,
        _out_of_time: bool,
        _review: bool,
    ) -> Result<FinishRetakeOutcome, RemoteError> {
        Ok(FinishRetakeOutcome::default())
    }

    async fn launch_retake(
        &self,
        _lesson_id: LessonId,
        _password: Option<&str>,
        _page_id: Option<PageId>,
        _review: bool,
    ) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn get_retakes_overview(
        &self,
        _lesson_id: LessonId,
    ) -> Result<RetakesOverview, RemoteError> {
        Ok(RetakesOverview::default())
    }

    async fn get_user_retake(
        &self,
        _lesson_id: LessonId,
        retake: u32,
    ) -> Result<UserRetake, RemoteError> {
        Ok(UserRetake {
            retake,
            completed: false,
            grade: None,
        })
    }

    async fn get_user_timers(&self, _lesson_id: LessonId) -> Result<Vec<UserTimer>, RemoteError> {
        Ok(Vec::new())
    }
}

struct FixedPrompt(Option<String>);

#[async_trait]
impl PasswordPrompt for FixedPrompt {
    async fn request_password(&self, _lesson_id: LessonId) -> Option<String> {
        self.0.clone()
    }
}

fn gate(
    remote: GateRemote,
    prompt: Option<FixedPrompt>,
) -> (PasswordGateService, Arc<GateRemote>, Storage) {
    let remote = Arc::new(remote);
    let storage = Storage::in_memory();
    let service = PasswordGateService::new(
        fixed_clock(),
        Arc::clone(&remote) as Arc<dyn LessonRemote>,
        Arc::clone(&storage.passwords),
        prompt.map(|p| Arc::new(p) as Arc<dyn PasswordPrompt>),
    );
    (service, remote, storage)
}

#[tokio::test]
async fn open_lesson_needs_no_password() {
    let (service, remote, _storage) = gate(GateRemote::open(), None);

    let data = service.gather(LessonId::new(LESSON), false).await.unwrap();
    assert!(data.password.is_none());
    assert!(data.lesson.is_none());
    assert!(remote.validations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cached_password_is_validated_and_reused() {
    let (service, remote, storage) = gate(GateRemote::password_protected("sesame"), None);
    storage
        .passwords
        .store_password(LessonId::new(LESSON), "sesame", 100)
        .await
        .unwrap();

    let data = service.gather(LessonId::new(LESSON), false).await.unwrap();
    assert_eq!(data.password.as_deref(), Some("sesame"));
    assert!(data.lesson.is_some());
    assert_eq!(*remote.validations.lock().unwrap(), vec!["sesame"]);
}

#[tokio::test]
async fn invalid_cached_password_is_evicted() {
    let (service, _remote, storage) = gate(GateRemote::password_protected("sesame"), None);
    storage
        .passwords
        .store_password(LessonId::new(LESSON), "stale", 100)
        .await
        .unwrap();

    let err = service.gather(LessonId::new(LESSON), false).await.unwrap_err();
    assert!(matches!(err, PasswordGateError::PasswordRequired(_)));

    // Never silently retried: the bad password is gone.
    assert!(matches!(
        storage.passwords.get_password(LessonId::new(LESSON)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn prompted_password_is_stored_after_validation() {
    let (service, _remote, storage) = gate(
        GateRemote::password_protected("sesame"),
        Some(FixedPrompt(Some("sesame".into()))),
    );

    let data = service.gather(LessonId::new(LESSON), true).await.unwrap();
    assert_eq!(data.password.as_deref(), Some("sesame"));

    let stored = storage
        .passwords
        .get_password(LessonId::new(LESSON))
        .await
        .unwrap();
    assert_eq!(stored.password, "sesame");
}

#[tokio::test]
async fn cancelled_prompt_is_an_access_failure() {
    let (service, _remote, _storage) = gate(
        GateRemote::password_protected("sesame"),
        Some(FixedPrompt(None)),
    );

    let err = service.gather(LessonId::new(LESSON), true).await.unwrap_err();
    assert!(matches!(err, PasswordGateError::PasswordRequired(_)));
}

#[tokio::test]
async fn non_password_prevention_carries_server_message() {
    let (service, _remote, _storage) = gate(GateRemote::closed("This lesson closed yesterday"), None);

    let err = service.gather(LessonId::new(LESSON), true).await.unwrap_err();
    match err {
        PasswordGateError::AccessPrevented(message) => {
            assert_eq!(message, "This lesson closed yesterday");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn wrong_prompted_password_propagates_rejection() {
    let (service, _remote, _storage) = gate(
        GateRemote::password_protected("sesame"),
        Some(FixedPrompt(Some("wrong".into()))),
    );

    let err = service.gather(LessonId::new(LESSON), true).await.unwrap_err();
    assert!(matches!(
        err,
        PasswordGateError::Remote(RemoteError::Business { .. })
    ));
}
