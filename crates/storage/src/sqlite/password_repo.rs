use lesson_core::model::LessonId;

use super::{
    SqliteRepository,
    mapping::{id_to_i64, map_password_row},
};
use crate::repository::{PasswordStore, StorageError, StoredPassword};

#[async_trait::async_trait]
impl PasswordStore for SqliteRepository {
    async fn get_password(&self, lesson_id: LessonId) -> Result<StoredPassword, StorageError> {
        let row = sqlx::query(
            "SELECT lesson_id, password, timestamp FROM lesson_password WHERE lesson_id = ?1",
        )
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_password_row(&row)
    }

    async fn store_password(
        &self,
        lesson_id: LessonId,
        password: &str,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_password (lesson_id, password, timestamp)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(lesson_id) DO UPDATE SET
                password = excluded.password,
                timestamp = excluded.timestamp
            ",
        )
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .bind(password)
        .bind(timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn remove_password(&self, lesson_id: LessonId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM lesson_password WHERE lesson_id = ?1")
            .bind(id_to_i64("lesson_id", lesson_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
