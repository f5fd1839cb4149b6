//! Lesson grading over merged online and offline attempts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Lesson, PageId, PageIndex, PageSubtype, QuestionAttempt};
use crate::progress::round_decimals;

/// The computed grade for a retake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonGrade {
    /// Number of distinct question pages answered.
    pub questions_answered: u32,
    /// Number of attempts counted toward the grade.
    pub attempts_made: u32,
    /// Maximum points possible.
    pub total: i64,
    /// Points earned by the student.
    pub earned: i64,
    /// Percentage grade, rounded to 5 decimals.
    pub grade: f64,
    /// Essays awaiting manual grading.
    pub manual_count: u32,
    /// Points held back pending manual grading.
    pub manual_points: i64,
}

/// Grade a retake from the full set of its question attempts.
///
/// Attempts may arrive in any order; per page only the oldest
/// `max_attempts` count when the lesson caps attempts. Essay pages are
/// never auto-scored: they raise the manual counters and, under custom
/// scoring, contribute whatever score a grader has already assigned.
#[must_use]
pub fn lesson_grade(lesson: &Lesson, attempts: &[QuestionAttempt], index: &PageIndex) -> LessonGrade {
    let mut result = LessonGrade::default();

    if attempts.is_empty() {
        return result;
    }

    // Group attempts per page, oldest first.
    let mut by_page: HashMap<PageId, Vec<&QuestionAttempt>> = HashMap::new();
    for attempt in attempts {
        by_page.entry(attempt.page_id).or_default().push(attempt);
    }
    for page_attempts in by_page.values_mut() {
        page_attempts.sort_by_key(|a| a.timestamp);
        if lesson.max_attempts > 0 {
            page_attempts.truncate(lesson.max_attempts as usize);
        }
    }

    result.questions_answered = by_page.len() as u32;

    for (page_id, page_attempts) in &by_page {
        let is_essay = index
            .get(*page_id)
            .is_some_and(|p| p.subtype == PageSubtype::Essay);
        let last = page_attempts[page_attempts.len() - 1];

        if lesson.custom_scoring {
            if is_essay {
                if let Some(score) = last.essay_score() {
                    result.earned += score;
                }
                result.manual_count += 1;
                result.manual_points += answer_score(index, last);
            } else if last.answer_id.is_some() {
                result.earned += answer_score(index, last);
            }
        } else {
            result.earned += page_attempts.iter().filter(|a| a.correct).count() as i64;
            if is_essay {
                result.manual_count += 1;
                result.manual_points += 1;
            }
        }

        result.attempts_made += page_attempts.len() as u32;
    }

    if lesson.custom_scoring {
        // Best possible score per answered page.
        let mut best: HashMap<PageId, i64> = HashMap::new();
        for page_id in by_page.keys() {
            if let Some(page) = index.get(*page_id) {
                let max = page.answers.iter().map(|a| a.score).max().unwrap_or(0);
                best.insert(*page_id, max);
            }
        }
        result.total = best.values().sum();
    } else if lesson.min_questions > 0 && result.questions_answered < lesson.min_questions {
        // Short of the minimum: grade out of the attempts that should
        // have been made.
        result.total =
            i64::from(result.attempts_made) + i64::from(lesson.min_questions - result.questions_answered);
    } else {
        result.total = i64::from(result.attempts_made);
    }

    if result.total != 0 {
        result.grade = round_decimals(result.earned as f64 * 100.0 / result.total as f64, 5);
    }

    result
}

fn answer_score(index: &PageIndex, attempt: &QuestionAttempt) -> i64 {
    let Some(answer_id) = attempt.answer_id else {
        return 0;
    };
    index
        .get(attempt.page_id)
        .and_then(|p| p.answer(answer_id))
        .map_or(0, |a| a.score)
}
