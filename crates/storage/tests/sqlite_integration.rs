use lesson_core::model::{
    AnswerId, AttemptData, CourseId, Jump, LessonId, PageId, PageType, UserResponse,
};
use storage::repository::{
    AttemptStore, PageAttemptRecord, PasswordStore, RetakeFinishedInSyncRecord, RetakeStore,
    Storage, StorageError,
};

fn attempt(lesson: u64, retake: u32, page: u64, ts: i64) -> PageAttemptRecord {
    PageAttemptRecord {
        lesson_id: LessonId::new(lesson),
        course_id: CourseId::new(3),
        retake,
        page_id: PageId::new(page),
        timestamp: ts,
        page_type: PageType::Question,
        data: AttemptData::Numerical {
            answer: "7".into(),
        },
        new_page_id: Some(PageId::new(page + 1)),
        answer_id: Some(AnswerId::new(40)),
        correct: true,
        user_response: Some(UserResponse::Text("7".into())),
    }
}

async fn storage(db: &str) -> Storage {
    let url = format!("sqlite:file:{db}?mode=memory&cache=shared");
    Storage::sqlite(&url).await.expect("storage")
}

#[tokio::test]
async fn attempt_rows_round_trip_with_payloads() {
    let storage = storage("memdb_attempt_roundtrip").await;

    let mut record = attempt(1, 0, 10, 100);
    record.data = AttemptData::Content {
        jump: Jump::ClusterJump,
    };
    record.page_type = PageType::Structure;
    record.user_response = None;
    storage.attempts.insert_attempt(&record).await.unwrap();

    let rows = storage
        .attempts
        .get_lesson_attempts(LessonId::new(1))
        .await
        .unwrap();
    assert_eq!(rows, vec![record]);
}

#[tokio::test]
async fn duplicate_attempt_key_is_a_conflict() {
    let storage = storage("memdb_attempt_conflict").await;

    let record = attempt(1, 0, 10, 100);
    storage.attempts.insert_attempt(&record).await.unwrap();
    let err = storage.attempts.insert_attempt(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn attempt_filters_and_deletes() {
    let storage = storage("memdb_attempt_filters").await;

    storage.record_attempt(&attempt(1, 0, 10, 100)).await.unwrap();
    storage.record_attempt(&attempt(1, 0, 10, 200)).await.unwrap();
    storage.record_attempt(&attempt(1, 1, 11, 300)).await.unwrap();
    storage.record_attempt(&attempt(2, 0, 10, 400)).await.unwrap();

    let retake0 = storage
        .attempts
        .get_retake_attempts(LessonId::new(1), 0)
        .await
        .unwrap();
    assert_eq!(retake0.len(), 2);

    let per_page = storage
        .attempts
        .get_retake_attempts_for_page(LessonId::new(1), 0, PageId::new(10))
        .await
        .unwrap();
    assert_eq!(per_page.len(), 2);

    storage
        .attempts
        .delete_attempt(LessonId::new(1), 0, PageId::new(10), 100)
        .await
        .unwrap();
    let remaining = storage
        .attempts
        .get_retake_attempts(LessonId::new(1), 0)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].timestamp, 200);

    let lessons = storage.get_lessons_with_data().await.unwrap();
    assert_eq!(lessons.len(), 2);
}

#[tokio::test]
async fn retake_row_is_keyed_by_lesson_only() {
    let storage = storage("memdb_retake_key").await;

    storage
        .mark_retake_finished(LessonId::new(7), CourseId::new(3), 0, true, false, 100)
        .await
        .unwrap();
    let row = storage.retakes.get_retake(LessonId::new(7)).await.unwrap();
    assert!(row.finished);
    assert_eq!(row.retake, 0);

    // A newer retake number replaces the row wholesale.
    storage
        .mark_retake_finished(LessonId::new(7), CourseId::new(3), 1, false, false, 200)
        .await
        .unwrap();
    let row = storage.retakes.get_retake(LessonId::new(7)).await.unwrap();
    assert_eq!(row.retake, 1);
    assert!(!row.finished);
    assert_eq!(row.last_question_page, None);

    storage.retakes.delete_retake(LessonId::new(7)).await.unwrap();
    assert!(matches!(
        storage.retakes.get_retake(LessonId::new(7)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn finished_marker_round_trip() {
    let storage = storage("memdb_marker").await;

    let marker = RetakeFinishedInSyncRecord {
        lesson_id: LessonId::new(42),
        retake: 0,
        page_id: PageId::new(99),
        time_finished: 500,
    };
    storage.retakes.set_finished_marker(&marker).await.unwrap();

    let fetched = storage
        .retakes
        .get_finished_marker(LessonId::new(42))
        .await
        .unwrap();
    assert_eq!(fetched, marker);

    storage
        .retakes
        .delete_finished_marker(LessonId::new(42))
        .await
        .unwrap();
    assert!(matches!(
        storage.retakes.get_finished_marker(LessonId::new(42)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn password_cache_upserts_and_evicts() {
    let storage = storage("memdb_password").await;
    let lesson = LessonId::new(5);

    storage.passwords.store_password(lesson, "first", 100).await.unwrap();
    storage.passwords.store_password(lesson, "second", 200).await.unwrap();

    let stored = storage.passwords.get_password(lesson).await.unwrap();
    assert_eq!(stored.password, "second");

    storage.passwords.remove_password(lesson).await.unwrap();
    assert!(matches!(
        storage.passwords.get_password(lesson).await,
        Err(StorageError::NotFound)
    ));
}
