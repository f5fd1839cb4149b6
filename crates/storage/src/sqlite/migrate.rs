use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the four offline tables: password cache, retake state, page
/// attempts, and finished-in-sync markers. There are deliberately no
/// foreign keys between them; orphan cleanup is application logic.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_password (
                    lesson_id INTEGER PRIMARY KEY,
                    password TEXT NOT NULL,
                    timestamp INTEGER NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_retakes (
                    lesson_id INTEGER PRIMARY KEY,
                    course_id INTEGER NOT NULL,
                    retake INTEGER NOT NULL CHECK (retake >= 0),
                    finished INTEGER NOT NULL CHECK (finished IN (0, 1)),
                    out_of_time INTEGER NOT NULL CHECK (out_of_time IN (0, 1)),
                    last_question_page INTEGER,
                    timestamp INTEGER NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_page_attempts (
                    lesson_id INTEGER NOT NULL,
                    retake INTEGER NOT NULL CHECK (retake >= 0),
                    page_id INTEGER NOT NULL,
                    timestamp INTEGER NOT NULL,
                    course_id INTEGER NOT NULL,
                    page_type INTEGER NOT NULL,
                    data TEXT NOT NULL,
                    new_page_id INTEGER,
                    answer_id INTEGER,
                    correct INTEGER NOT NULL CHECK (correct IN (0, 1)),
                    user_response TEXT,
                    PRIMARY KEY (lesson_id, retake, page_id, timestamp)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_retakes_finished_sync (
                    lesson_id INTEGER PRIMARY KEY,
                    retake INTEGER NOT NULL CHECK (retake >= 0),
                    page_id INTEGER NOT NULL,
                    time_finished INTEGER NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_page_attempts_lesson_retake
                    ON lesson_page_attempts (lesson_id, retake, timestamp);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_page_attempts_lesson_retake_type
                    ON lesson_page_attempts (lesson_id, retake, page_type);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
