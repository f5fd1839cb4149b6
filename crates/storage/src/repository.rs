use async_trait::async_trait;
use lesson_core::model::{
    AnswerId, AttemptData, CourseId, LessonId, PageId, PageType, UserResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
///
/// `NotFound` is a normal outcome for single-record lookups, not a fault.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One locally recorded page answer, waiting to be replayed to the server.
///
/// Rows are append-only; re-answering a page adds a new row with a later
/// timestamp. The timestamp is the only defined ordering between rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAttemptRecord {
    pub lesson_id: LessonId,
    pub course_id: CourseId,
    pub retake: u32,
    pub page_id: PageId,
    /// Unix seconds; part of the row key.
    pub timestamp: i64,
    pub page_type: PageType,
    pub data: AttemptData,
    /// Precomputed destination; `None` means end of lesson.
    pub new_page_id: Option<PageId>,
    pub answer_id: Option<AnswerId>,
    pub correct: bool,
    pub user_response: Option<UserResponse>,
}

/// Local state of the one in-flight offline retake for a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetakeRecord {
    pub lesson_id: LessonId,
    pub course_id: CourseId,
    pub retake: u32,
    pub finished: bool,
    pub out_of_time: bool,
    /// Last question page attempted, used to resume mid-retake.
    pub last_question_page: Option<PageId>,
    pub timestamp: i64,
}

impl RetakeRecord {
    #[must_use]
    pub fn new(lesson_id: LessonId, course_id: CourseId, retake: u32, timestamp: i64) -> Self {
        Self {
            lesson_id,
            course_id,
            retake,
            finished: false,
            out_of_time: false,
            last_question_page: None,
            timestamp,
        }
    }
}

/// Marker left after a sync finished a reviewable retake, so the UI can
/// offer the review without another round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetakeFinishedInSyncRecord {
    pub lesson_id: LessonId,
    pub retake: u32,
    /// Page to start reviewing from.
    pub page_id: PageId,
    pub time_finished: i64,
}

/// A lesson password validated against the server and cached locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPassword {
    pub lesson_id: LessonId,
    pub password: String,
    pub timestamp: i64,
}

/// A lesson that has offline rows pending synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LessonWithData {
    pub id: LessonId,
    pub course_id: CourseId,
}

/// Page attempt persistence. Append-only rows keyed by
/// (lesson, retake, page, timestamp).
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Append an attempt row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn insert_attempt(&self, record: &PageAttemptRecord) -> Result<(), StorageError>;

    /// All attempts for a lesson, in no particular order.
    async fn get_lesson_attempts(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<PageAttemptRecord>, StorageError>;

    /// All attempts for a retake.
    async fn get_retake_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<Vec<PageAttemptRecord>, StorageError>;

    /// Attempts for one page of a retake.
    async fn get_retake_attempts_for_page(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
    ) -> Result<Vec<PageAttemptRecord>, StorageError>;

    /// Attempts for the pages of a given type in a retake.
    async fn get_retake_attempts_for_type(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_type: PageType,
    ) -> Result<Vec<PageAttemptRecord>, StorageError>;

    /// Every stored attempt row across all lessons.
    async fn get_all_attempts(&self) -> Result<Vec<PageAttemptRecord>, StorageError>;

    /// Delete a single attempt row by its full key.
    async fn delete_attempt(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
        timestamp: i64,
    ) -> Result<(), StorageError>;

    /// Delete every attempt for a page within a retake.
    async fn delete_page_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
    ) -> Result<(), StorageError>;
}

/// Retake-state persistence, one row per lesson, plus the
/// finished-in-sync markers.
#[async_trait]
pub trait RetakeStore: Send + Sync {
    /// Insert or replace the retake row for a lesson.
    async fn upsert_retake(&self, record: &RetakeRecord) -> Result<(), StorageError>;

    /// Fetch the retake row for a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` when no offline retake exists.
    async fn get_retake(&self, lesson_id: LessonId) -> Result<RetakeRecord, StorageError>;

    async fn delete_retake(&self, lesson_id: LessonId) -> Result<(), StorageError>;

    async fn get_all_retakes(&self) -> Result<Vec<RetakeRecord>, StorageError>;

    async fn set_finished_marker(
        &self,
        record: &RetakeFinishedInSyncRecord,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` when no marker exists.
    async fn get_finished_marker(
        &self,
        lesson_id: LessonId,
    ) -> Result<RetakeFinishedInSyncRecord, StorageError>;

    async fn delete_finished_marker(&self, lesson_id: LessonId) -> Result<(), StorageError>;
}

/// Validated lesson password cache.
#[async_trait]
pub trait PasswordStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` when no password is cached.
    async fn get_password(&self, lesson_id: LessonId) -> Result<StoredPassword, StorageError>;

    async fn store_password(
        &self,
        lesson_id: LessonId,
        password: &str,
        timestamp: i64,
    ) -> Result<(), StorageError>;

    async fn remove_password(&self, lesson_id: LessonId) -> Result<(), StorageError>;
}

/// Aggregates the three stores behind trait objects for easy backend
/// swapping, and hosts the operations that span more than one table.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn AttemptStore>,
    pub retakes: Arc<dyn RetakeStore>,
    pub passwords: Arc<dyn PasswordStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let attempts: Arc<dyn AttemptStore> = Arc::new(repo.clone());
        let retakes: Arc<dyn RetakeStore> = Arc::new(repo.clone());
        let passwords: Arc<dyn PasswordStore> = Arc::new(repo);
        Self {
            attempts,
            retakes,
            passwords,
        }
    }

    /// Append an attempt and, for question pages, remember it as the last
    /// question page attempted on the retake row.
    ///
    /// # Errors
    ///
    /// Propagates storage failures from either table.
    pub async fn record_attempt(&self, record: &PageAttemptRecord) -> Result<(), StorageError> {
        self.attempts.insert_attempt(record).await?;

        if record.page_type == PageType::Question {
            let mut retake = self
                .retake_with_fallback(record.lesson_id, record.course_id, record.retake)
                .await?;
            retake.last_question_page = Some(record.page_id);
            retake.timestamp = record.timestamp;
            self.retakes.upsert_retake(&retake).await?;
        }

        Ok(())
    }

    /// Upsert the retake row with finish flags. A stored row for a
    /// different retake number is discarded, never merged.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn mark_retake_finished(
        &self,
        lesson_id: LessonId,
        course_id: CourseId,
        retake: u32,
        finished: bool,
        out_of_time: bool,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        let mut record = self.retake_with_fallback(lesson_id, course_id, retake).await?;
        record.finished = finished;
        record.out_of_time = out_of_time;
        record.timestamp = timestamp;
        self.retakes.upsert_retake(&record).await
    }

    /// Question-page attempts for a retake, optionally narrowed to one
    /// page or to correct answers only.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn get_questions_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
        correct_only: bool,
        page_id: Option<PageId>,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        let mut attempts = match page_id {
            Some(page_id) => {
                self.attempts
                    .get_retake_attempts_for_page(lesson_id, retake, page_id)
                    .await?
            }
            None => {
                self.attempts
                    .get_retake_attempts_for_type(lesson_id, retake, PageType::Question)
                    .await?
            }
        };

        if correct_only {
            attempts.retain(|a| a.correct);
        }
        Ok(attempts)
    }

    /// The most recent attempt on the retake's last question page, used
    /// to resume an interrupted retake.
    ///
    /// # Errors
    ///
    /// Propagates storage failures other than a missing retake row.
    pub async fn last_question_page_attempt(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<Option<PageAttemptRecord>, StorageError> {
        let record = match self.retakes.get_retake(lesson_id).await {
            Ok(record) if record.retake == retake => record,
            Ok(_) | Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(page_id) = record.last_question_page else {
            return Ok(None);
        };

        let attempts = self
            .attempts
            .get_retake_attempts_for_page(lesson_id, retake, page_id)
            .await?;
        Ok(attempts.into_iter().max_by_key(|a| a.timestamp))
    }

    /// Whether any offline rows exist for the lesson.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn has_offline_data(&self, lesson_id: LessonId) -> Result<bool, StorageError> {
        match self.retakes.get_retake(lesson_id).await {
            Ok(_) => return Ok(true),
            Err(StorageError::NotFound) => {}
            Err(e) => return Err(e),
        }
        Ok(!self.attempts.get_lesson_attempts(lesson_id).await?.is_empty())
    }

    /// Whether offline attempts exist for a specific retake.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn has_retake_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<bool, StorageError> {
        Ok(!self
            .attempts
            .get_retake_attempts(lesson_id, retake)
            .await?
            .is_empty())
    }

    /// Whether the lesson has a retake marked finished locally.
    ///
    /// # Errors
    ///
    /// Propagates storage failures other than a missing row.
    pub async fn has_finished_retake(&self, lesson_id: LessonId) -> Result<bool, StorageError> {
        match self.retakes.get_retake(lesson_id).await {
            Ok(record) => Ok(record.finished),
            Err(StorageError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Every lesson with pending offline rows (attempts or retake state).
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn get_lessons_with_data(&self) -> Result<Vec<LessonWithData>, StorageError> {
        let mut lessons: HashMap<LessonId, LessonWithData> = HashMap::new();

        for attempt in self.attempts.get_all_attempts().await? {
            lessons.entry(attempt.lesson_id).or_insert(LessonWithData {
                id: attempt.lesson_id,
                course_id: attempt.course_id,
            });
        }
        for retake in self.retakes.get_all_retakes().await? {
            lessons.entry(retake.lesson_id).or_insert(LessonWithData {
                id: retake.lesson_id,
                course_id: retake.course_id,
            });
        }

        let mut out: Vec<LessonWithData> = lessons.into_values().collect();
        out.sort_by_key(|l| l.id);
        Ok(out)
    }

    /// Stored retake row if it matches the given retake number, otherwise
    /// a fresh row replacing whatever was there.
    async fn retake_with_fallback(
        &self,
        lesson_id: LessonId,
        course_id: CourseId,
        retake: u32,
    ) -> Result<RetakeRecord, StorageError> {
        match self.retakes.get_retake(lesson_id).await {
            Ok(record) if record.retake == retake => Ok(record),
            Ok(_) | Err(StorageError::NotFound) => {
                Ok(RetakeRecord::new(lesson_id, course_id, retake, 0))
            }
            Err(e) => Err(e),
        }
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    attempts: Arc<Mutex<Vec<PageAttemptRecord>>>,
    retakes: Arc<Mutex<HashMap<LessonId, RetakeRecord>>>,
    markers: Arc<Mutex<HashMap<LessonId, RetakeFinishedInSyncRecord>>>,
    passwords: Arc<Mutex<HashMap<LessonId, StoredPassword>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<'a, T>(m: &'a Mutex<T>) -> Result<std::sync::MutexGuard<'a, T>, StorageError> {
        m.lock().map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl AttemptStore for InMemoryRepository {
    async fn insert_attempt(&self, record: &PageAttemptRecord) -> Result<(), StorageError> {
        Self::lock(&self.attempts)?.push(record.clone());
        Ok(())
    }

    async fn get_lesson_attempts(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        Ok(Self::lock(&self.attempts)?
            .iter()
            .filter(|a| a.lesson_id == lesson_id)
            .cloned()
            .collect())
    }

    async fn get_retake_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        Ok(Self::lock(&self.attempts)?
            .iter()
            .filter(|a| a.lesson_id == lesson_id && a.retake == retake)
            .cloned()
            .collect())
    }

    async fn get_retake_attempts_for_page(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        Ok(Self::lock(&self.attempts)?
            .iter()
            .filter(|a| a.lesson_id == lesson_id && a.retake == retake && a.page_id == page_id)
            .cloned()
            .collect())
    }

    async fn get_retake_attempts_for_type(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_type: PageType,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        Ok(Self::lock(&self.attempts)?
            .iter()
            .filter(|a| a.lesson_id == lesson_id && a.retake == retake && a.page_type == page_type)
            .cloned()
            .collect())
    }

    async fn get_all_attempts(&self) -> Result<Vec<PageAttemptRecord>, StorageError> {
        Ok(Self::lock(&self.attempts)?.clone())
    }

    async fn delete_attempt(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        Self::lock(&self.attempts)?.retain(|a| {
            !(a.lesson_id == lesson_id
                && a.retake == retake
                && a.page_id == page_id
                && a.timestamp == timestamp)
        });
        Ok(())
    }

    async fn delete_page_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
    ) -> Result<(), StorageError> {
        Self::lock(&self.attempts)?
            .retain(|a| !(a.lesson_id == lesson_id && a.retake == retake && a.page_id == page_id));
        Ok(())
    }
}

#[async_trait]
impl RetakeStore for InMemoryRepository {
    async fn upsert_retake(&self, record: &RetakeRecord) -> Result<(), StorageError> {
        Self::lock(&self.retakes)?.insert(record.lesson_id, record.clone());
        Ok(())
    }

    async fn get_retake(&self, lesson_id: LessonId) -> Result<RetakeRecord, StorageError> {
        Self::lock(&self.retakes)?
            .get(&lesson_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_retake(&self, lesson_id: LessonId) -> Result<(), StorageError> {
        Self::lock(&self.retakes)?.remove(&lesson_id);
        Ok(())
    }

    async fn get_all_retakes(&self) -> Result<Vec<RetakeRecord>, StorageError> {
        Ok(Self::lock(&self.retakes)?.values().cloned().collect())
    }

    async fn set_finished_marker(
        &self,
        record: &RetakeFinishedInSyncRecord,
    ) -> Result<(), StorageError> {
        Self::lock(&self.markers)?.insert(record.lesson_id, record.clone());
        Ok(())
    }

    async fn get_finished_marker(
        &self,
        lesson_id: LessonId,
    ) -> Result<RetakeFinishedInSyncRecord, StorageError> {
        Self::lock(&self.markers)?
            .get(&lesson_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_finished_marker(&self, lesson_id: LessonId) -> Result<(), StorageError> {
        Self::lock(&self.markers)?.remove(&lesson_id);
        Ok(())
    }
}

#[async_trait]
impl PasswordStore for InMemoryRepository {
    async fn get_password(&self, lesson_id: LessonId) -> Result<StoredPassword, StorageError> {
        Self::lock(&self.passwords)?
            .get(&lesson_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn store_password(
        &self,
        lesson_id: LessonId,
        password: &str,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        Self::lock(&self.passwords)?.insert(
            lesson_id,
            StoredPassword {
                lesson_id,
                password: password.to_string(),
                timestamp,
            },
        );
        Ok(())
    }

    async fn remove_password(&self, lesson_id: LessonId) -> Result<(), StorageError> {
        Self::lock(&self.passwords)?.remove(&lesson_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{AttemptData, Jump};

    fn attempt(lesson: u64, retake: u32, page: u64, ts: i64) -> PageAttemptRecord {
        PageAttemptRecord {
            lesson_id: LessonId::new(lesson),
            course_id: CourseId::new(5),
            retake,
            page_id: PageId::new(page),
            timestamp: ts,
            page_type: PageType::Question,
            data: AttemptData::ShortAnswer {
                answer: "x".into(),
            },
            new_page_id: Some(PageId::new(page + 1)),
            answer_id: None,
            correct: false,
            user_response: None,
        }
    }

    #[tokio::test]
    async fn attempts_are_append_only() {
        let storage = Storage::in_memory();
        storage.record_attempt(&attempt(1, 0, 10, 100)).await.unwrap();
        storage.record_attempt(&attempt(1, 0, 10, 200)).await.unwrap();

        let rows = storage.attempts.get_lesson_attempts(LessonId::new(1)).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn question_attempt_updates_last_question_page() {
        let storage = Storage::in_memory();
        storage.record_attempt(&attempt(1, 0, 10, 100)).await.unwrap();

        let retake = storage.retakes.get_retake(LessonId::new(1)).await.unwrap();
        assert_eq!(retake.last_question_page, Some(PageId::new(10)));
        assert!(!retake.finished);
    }

    #[tokio::test]
    async fn content_attempt_leaves_retake_row_alone() {
        let storage = Storage::in_memory();
        let mut record = attempt(1, 0, 10, 100);
        record.page_type = PageType::Structure;
        record.data = AttemptData::Content { jump: Jump::NextPage };
        storage.record_attempt(&record).await.unwrap();

        assert!(matches!(
            storage.retakes.get_retake(LessonId::new(1)).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn mismatched_retake_row_is_replaced_not_merged() {
        let storage = Storage::in_memory();
        storage
            .mark_retake_finished(LessonId::new(1), CourseId::new(5), 0, true, true, 100)
            .await
            .unwrap();
        storage
            .mark_retake_finished(LessonId::new(1), CourseId::new(5), 1, false, false, 200)
            .await
            .unwrap();

        let row = storage.retakes.get_retake(LessonId::new(1)).await.unwrap();
        assert_eq!(row.retake, 1);
        assert!(!row.finished);
        assert!(!row.out_of_time);
    }

    #[tokio::test]
    async fn lessons_with_data_union_of_attempts_and_retakes() {
        let storage = Storage::in_memory();
        storage.record_attempt(&attempt(1, 0, 10, 100)).await.unwrap();
        storage
            .mark_retake_finished(LessonId::new(2), CourseId::new(5), 0, true, false, 100)
            .await
            .unwrap();

        let lessons = storage.get_lessons_with_data().await.unwrap();
        let ids: Vec<u64> = lessons.iter().map(|l| l.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn last_question_page_attempt_picks_newest() {
        let storage = Storage::in_memory();
        storage.record_attempt(&attempt(1, 0, 10, 100)).await.unwrap();
        storage.record_attempt(&attempt(1, 0, 10, 300)).await.unwrap();
        storage.record_attempt(&attempt(1, 0, 10, 200)).await.unwrap();

        let last = storage
            .last_question_page_attempt(LessonId::new(1), 0)
            .await
            .unwrap()
            .expect("attempt");
        assert_eq!(last.timestamp, 300);
    }

    #[tokio::test]
    async fn invalid_password_can_be_evicted() {
        let storage = Storage::in_memory();
        let lesson = LessonId::new(9);
        storage.passwords.store_password(lesson, "hunter2", 100).await.unwrap();
        assert!(storage.passwords.get_password(lesson).await.is_ok());

        storage.passwords.remove_password(lesson).await.unwrap();
        assert!(matches!(
            storage.passwords.get_password(lesson).await,
            Err(StorageError::NotFound)
        ));
    }
}
