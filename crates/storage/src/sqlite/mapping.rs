use lesson_core::model::{AnswerId, CourseId, LessonId, PageId, PageType};
use sqlx::Row;

use crate::repository::{
    PageAttemptRecord, RetakeFinishedInSyncRecord, RetakeRecord, StorageError, StoredPassword,
};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn page_id_from_i64(v: i64) -> Result<PageId, StorageError> {
    Ok(PageId::new(i64_to_u64("page_id", v)?))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn retake_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid retake: {v}")))
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<PageAttemptRecord, StorageError> {
    let type_code: i64 = row.try_get("page_type").map_err(ser)?;
    let page_type = PageType::from_code(type_code)
        .ok_or_else(|| StorageError::Serialization(format!("invalid page type: {type_code}")))?;

    let data_json: String = row.try_get("data").map_err(ser)?;
    let data = serde_json::from_str(&data_json).map_err(ser)?;

    let user_response = row
        .try_get::<Option<String>, _>("user_response")
        .map_err(ser)?
        .map(|json| serde_json::from_str(&json).map_err(ser))
        .transpose()?;

    Ok(PageAttemptRecord {
        lesson_id: lesson_id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        course_id: CourseId::new(i64_to_u64(
            "course_id",
            row.try_get("course_id").map_err(ser)?,
        )?),
        retake: retake_from_i64(row.try_get("retake").map_err(ser)?)?,
        page_id: page_id_from_i64(row.try_get("page_id").map_err(ser)?)?,
        timestamp: row.try_get("timestamp").map_err(ser)?,
        page_type,
        data,
        new_page_id: row
            .try_get::<Option<i64>, _>("new_page_id")
            .map_err(ser)?
            .map(page_id_from_i64)
            .transpose()?,
        answer_id: row
            .try_get::<Option<i64>, _>("answer_id")
            .map_err(ser)?
            .map(|v| Ok::<_, StorageError>(AnswerId::new(i64_to_u64("answer_id", v)?)))
            .transpose()?,
        correct: row.try_get::<i64, _>("correct").map_err(ser)? != 0,
        user_response,
    })
}

pub(crate) fn map_retake_row(row: &sqlx::sqlite::SqliteRow) -> Result<RetakeRecord, StorageError> {
    Ok(RetakeRecord {
        lesson_id: lesson_id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        course_id: CourseId::new(i64_to_u64(
            "course_id",
            row.try_get("course_id").map_err(ser)?,
        )?),
        retake: retake_from_i64(row.try_get("retake").map_err(ser)?)?,
        finished: row.try_get::<i64, _>("finished").map_err(ser)? != 0,
        out_of_time: row.try_get::<i64, _>("out_of_time").map_err(ser)? != 0,
        last_question_page: row
            .try_get::<Option<i64>, _>("last_question_page")
            .map_err(ser)?
            .map(page_id_from_i64)
            .transpose()?,
        timestamp: row.try_get("timestamp").map_err(ser)?,
    })
}

pub(crate) fn map_marker_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<RetakeFinishedInSyncRecord, StorageError> {
    Ok(RetakeFinishedInSyncRecord {
        lesson_id: lesson_id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        retake: retake_from_i64(row.try_get("retake").map_err(ser)?)?,
        page_id: page_id_from_i64(row.try_get("page_id").map_err(ser)?)?,
        time_finished: row.try_get("time_finished").map_err(ser)?,
    })
}

pub(crate) fn map_password_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredPassword, StorageError> {
    Ok(StoredPassword {
        lesson_id: lesson_id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        password: row.try_get("password").map_err(ser)?,
        timestamp: row.try_get("timestamp").map_err(ser)?,
    })
}

pub(crate) fn attempt_data_json(record: &PageAttemptRecord) -> Result<String, StorageError> {
    serde_json::to_string(&record.data).map_err(ser)
}

pub(crate) fn user_response_json(record: &PageAttemptRecord) -> Result<Option<String>, StorageError> {
    record
        .user_response
        .as_ref()
        .map(|r| serde_json::to_string(r).map_err(ser))
        .transpose()
}
