use serde::{Deserialize, Serialize};

use super::ids::{CourseId, LessonId, PageId};

/// Lesson settings that influence grading, navigation and offline play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub name: String,
    /// Custom scoring: answers carry configured point values instead of
    /// one point per correct attempt.
    pub custom_scoring: bool,
    /// Maximum number of attempts per question; 0 = unlimited.
    pub max_attempts: u32,
    /// Minimum number of questions a grade is computed over; 0 = none.
    pub min_questions: u32,
    /// Whether students may retake the lesson after finishing it.
    pub retake_allowed: bool,
    /// Whether the teacher supplied per-answer feedback.
    pub feedback: bool,
    /// Whether students may review a finished retake.
    pub review_allowed: bool,
    /// Maximum grade; `None` when the lesson is ungraded.
    pub grade: Option<u32>,
    /// Time limit in seconds; 0 = untimed.
    pub time_limit: u32,
    pub allow_offline_attempts: bool,
}

impl Lesson {
    /// Whether this lesson may be played without connectivity.
    #[must_use]
    pub fn is_offline_capable(&self) -> bool {
        self.allow_offline_attempts
    }
}

/// Reason code blocking access to a lesson, with the human-readable
/// message the server supplies for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreventReason {
    pub reason: String,
    pub message: String,
}

/// Wire reason code for password-protected lessons.
pub const REASON_PASSWORD_PROTECTED: &str = "passwordprotectedlesson";

/// Server-derived access snapshot; recomputed per operation, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessInfo {
    /// Number of finished retakes; doubles as the current retake number.
    pub attempts_count: u32,
    pub can_manage: bool,
    pub can_view_reports: bool,
    pub first_page_id: PageId,
    pub left_during_timed: bool,
    pub prevent_access_reasons: Vec<PreventReason>,
}

impl AccessInfo {
    #[must_use]
    pub fn retake(&self) -> u32 {
        self.attempts_count
    }

    #[must_use]
    pub fn is_password_protected(&self) -> bool {
        self.prevent_access_reasons
            .iter()
            .any(|r| r.reason == REASON_PASSWORD_PROTECTED)
    }

    /// True when a password is the only thing standing between the user
    /// and the lesson.
    #[must_use]
    pub fn password_is_only_barrier(&self) -> bool {
        self.prevent_access_reasons.len() == 1 && self.is_password_protected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(reasons: &[(&str, &str)]) -> AccessInfo {
        AccessInfo {
            attempts_count: 0,
            can_manage: false,
            can_view_reports: false,
            first_page_id: PageId::new(1),
            left_during_timed: false,
            prevent_access_reasons: reasons
                .iter()
                .map(|(r, m)| PreventReason {
                    reason: (*r).into(),
                    message: (*m).into(),
                })
                .collect(),
        }
    }

    #[test]
    fn password_only_barrier_requires_single_reason() {
        assert!(access(&[(REASON_PASSWORD_PROTECTED, "enter password")]).password_is_only_barrier());
        assert!(
            !access(&[
                (REASON_PASSWORD_PROTECTED, "enter password"),
                ("lessonclosed", "closed"),
            ])
            .password_is_only_barrier()
        );
        assert!(!access(&[("lessonclosed", "closed")]).is_password_protected());
    }
}
