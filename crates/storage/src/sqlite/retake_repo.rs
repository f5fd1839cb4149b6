use lesson_core::model::LessonId;

use super::{
    SqliteRepository,
    mapping::{id_to_i64, map_marker_row, map_retake_row},
};
use crate::repository::{
    RetakeFinishedInSyncRecord, RetakeRecord, RetakeStore, StorageError,
};

#[async_trait::async_trait]
impl RetakeStore for SqliteRepository {
    async fn upsert_retake(&self, record: &RetakeRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_retakes (
                lesson_id, course_id, retake, finished, out_of_time,
                last_question_page, timestamp
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(lesson_id) DO UPDATE SET
                course_id = excluded.course_id,
                retake = excluded.retake,
                finished = excluded.finished,
                out_of_time = excluded.out_of_time,
                last_question_page = excluded.last_question_page,
                timestamp = excluded.timestamp
            ",
        )
        .bind(id_to_i64("lesson_id", record.lesson_id.value())?)
        .bind(id_to_i64("course_id", record.course_id.value())?)
        .bind(i64::from(record.retake))
        .bind(i64::from(record.finished))
        .bind(i64::from(record.out_of_time))
        .bind(
            record
                .last_question_page
                .map(|p| id_to_i64("last_question_page", p.value()))
                .transpose()?,
        )
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_retake(&self, lesson_id: LessonId) -> Result<RetakeRecord, StorageError> {
        let row = sqlx::query(
            r"
            SELECT lesson_id, course_id, retake, finished, out_of_time,
                   last_question_page, timestamp
            FROM lesson_retakes
            WHERE lesson_id = ?1
            ",
        )
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_retake_row(&row)
    }

    async fn delete_retake(&self, lesson_id: LessonId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM lesson_retakes WHERE lesson_id = ?1")
            .bind(id_to_i64("lesson_id", lesson_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_all_retakes(&self) -> Result<Vec<RetakeRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT lesson_id, course_id, retake, finished, out_of_time,
                   last_question_page, timestamp
            FROM lesson_retakes
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_retake_row).collect()
    }

    async fn set_finished_marker(
        &self,
        record: &RetakeFinishedInSyncRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_retakes_finished_sync (
                lesson_id, retake, page_id, time_finished
            )
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(lesson_id) DO UPDATE SET
                retake = excluded.retake,
                page_id = excluded.page_id,
                time_finished = excluded.time_finished
            ",
        )
        .bind(id_to_i64("lesson_id", record.lesson_id.value())?)
        .bind(i64::from(record.retake))
        .bind(id_to_i64("page_id", record.page_id.value())?)
        .bind(record.time_finished)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_finished_marker(
        &self,
        lesson_id: LessonId,
    ) -> Result<RetakeFinishedInSyncRecord, StorageError> {
        let row = sqlx::query(
            r"
            SELECT lesson_id, retake, page_id, time_finished
            FROM lesson_retakes_finished_sync
            WHERE lesson_id = ?1
            ",
        )
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_marker_row(&row)
    }

    async fn delete_finished_marker(&self, lesson_id: LessonId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM lesson_retakes_finished_sync WHERE lesson_id = ?1")
            .bind(id_to_i64("lesson_id", lesson_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
