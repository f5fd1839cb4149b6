use lesson_core::model::{LessonId, PageId, PageType};

use super::{
    SqliteRepository,
    mapping::{attempt_data_json, id_to_i64, map_attempt_row, user_response_json},
};
use crate::repository::{AttemptStore, PageAttemptRecord, StorageError};

const ATTEMPT_COLUMNS: &str = r"
    lesson_id, retake, page_id, timestamp, course_id, page_type,
    data, new_page_id, answer_id, correct, user_response
";

#[async_trait::async_trait]
impl AttemptStore for SqliteRepository {
    async fn insert_attempt(&self, record: &PageAttemptRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_page_attempts (
                lesson_id, retake, page_id, timestamp, course_id, page_type,
                data, new_page_id, answer_id, correct, user_response
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(id_to_i64("lesson_id", record.lesson_id.value())?)
        .bind(i64::from(record.retake))
        .bind(id_to_i64("page_id", record.page_id.value())?)
        .bind(record.timestamp)
        .bind(id_to_i64("course_id", record.course_id.value())?)
        .bind(record.page_type.code())
        .bind(attempt_data_json(record)?)
        .bind(
            record
                .new_page_id
                .map(|p| id_to_i64("new_page_id", p.value()))
                .transpose()?,
        )
        .bind(
            record
                .answer_id
                .map(|a| id_to_i64("answer_id", a.value()))
                .transpose()?,
        )
        .bind(i64::from(record.correct))
        .bind(user_response_json(record)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => StorageError::Connection(other.to_string()),
        })?;

        Ok(())
    }

    async fn get_lesson_attempts(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM lesson_page_attempts WHERE lesson_id = ?1"
        ))
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn get_retake_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM lesson_page_attempts
             WHERE lesson_id = ?1 AND retake = ?2"
        ))
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .bind(i64::from(retake))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn get_retake_attempts_for_page(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM lesson_page_attempts
             WHERE lesson_id = ?1 AND retake = ?2 AND page_id = ?3"
        ))
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .bind(i64::from(retake))
        .bind(id_to_i64("page_id", page_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn get_retake_attempts_for_type(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_type: PageType,
    ) -> Result<Vec<PageAttemptRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM lesson_page_attempts
             WHERE lesson_id = ?1 AND retake = ?2 AND page_type = ?3"
        ))
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .bind(i64::from(retake))
        .bind(page_type.code())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn get_all_attempts(&self) -> Result<Vec<PageAttemptRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM lesson_page_attempts"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn delete_attempt(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            DELETE FROM lesson_page_attempts
            WHERE lesson_id = ?1 AND retake = ?2 AND page_id = ?3 AND timestamp = ?4
            ",
        )
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .bind(i64::from(retake))
        .bind(id_to_i64("page_id", page_id.value())?)
        .bind(timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn delete_page_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
        page_id: PageId,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            DELETE FROM lesson_page_attempts
            WHERE lesson_id = ?1 AND retake = ?2 AND page_id = ?3
            ",
        )
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .bind(i64::from(retake))
        .bind(id_to_i64("page_id", page_id.value())?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
