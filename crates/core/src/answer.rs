//! Answer checking for every page kind.
//!
//! Each page subtype has its own matching rule; the outcome decides
//! correctness, the jump to take, and the canonical stored form of the
//! student's answer. These rules feed both grading and offline navigation,
//! so they must match the server's behavior answer for answer.

use regex::RegexBuilder;

use crate::model::{
    AnswerId, AttemptData, EssaySubmission, Jump, Lesson, LessonPage, PageAnswer, PageIndex,
    PageSubtype, UserResponse,
};
use crate::jumps::jump_is_forward;

/// Delimiter separating the per-answer parts of a multi-selection
/// multichoice response in its canonical stored form.
pub const MULTIANSWER_DELIMITER: &str = "@^#|";

/// Marker in a teacher-configured answer that catches every response no
/// explicit answer matched.
pub const OTHER_ANSWERS_MARKER: &str = "@#wronganswer#@";

/// Result of checking a submission against a page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    /// The configured answer that matched, if any.
    pub answer_id: Option<AnswerId>,
    /// The submission was empty or unusable; the page is shown again.
    pub no_answer: bool,
    pub correct: bool,
    pub is_essay: bool,
    /// Unresolved jump taken from the matched answer.
    pub jump: Jump,
    /// Canonical display form of what the student answered.
    pub student_answer: String,
    /// Stored record of the response (essay submissions keep structure).
    pub user_response: Option<UserResponse>,
    /// Teacher feedback attached to the matched answer.
    pub response: String,
    /// Jump without showing a feedback step (content pages).
    pub immediate_jump: bool,
}

impl CheckOutcome {
    fn empty() -> Self {
        Self {
            answer_id: None,
            no_answer: false,
            correct: false,
            is_essay: false,
            jump: Jump::ThisPage,
            student_answer: String::new(),
            user_response: None,
            response: String::new(),
            immediate_jump: false,
        }
    }

    fn no_answer() -> Self {
        Self {
            no_answer: true,
            ..Self::empty()
        }
    }
}

/// Check the submission for a page and work out correctness and navigation.
///
/// Dispatches on the page subtype; structure pages other than content pages
/// have no answers to check and jump immediately.
#[must_use]
pub fn check_answer(
    lesson: &Lesson,
    page: &LessonPage,
    data: &AttemptData,
    index: &PageIndex,
) -> CheckOutcome {
    match page.subtype {
        PageSubtype::Content
        | PageSubtype::EndOfBranch
        | PageSubtype::Cluster
        | PageSubtype::EndOfCluster => check_content(page, data),
        PageSubtype::Essay => check_essay(page, data),
        PageSubtype::Matching => check_matching(page, data),
        PageSubtype::Multichoice => check_multichoice(lesson, page, data, index),
        PageSubtype::Numerical => check_numerical(lesson, page, data, index),
        PageSubtype::ShortAnswer => check_short_answer(lesson, page, data, index),
        PageSubtype::TrueFalse => check_true_false(lesson, page, data, index),
    }
}

/// Whether a configured answer counts as correct.
///
/// Custom-scored lessons treat any positively scored answer as correct;
/// otherwise correctness is "the jump moves the student forward".
#[must_use]
pub fn answer_correct(
    lesson: &Lesson,
    page: &LessonPage,
    answer: &PageAnswer,
    index: &PageIndex,
) -> bool {
    if lesson.custom_scoring {
        answer.score > 0
    } else {
        jump_is_forward(page.id, answer.jump, index)
    }
}

fn check_content(page: &LessonPage, data: &AttemptData) -> CheckOutcome {
    let mut outcome = CheckOutcome::empty();
    outcome.immediate_jump = true;
    outcome.jump = match data {
        AttemptData::Content { jump } => *jump,
        _ => Jump::Page(page.id),
    };
    outcome
}

fn check_essay(page: &LessonPage, data: &AttemptData) -> CheckOutcome {
    let AttemptData::Essay { text } = data else {
        let mut outcome = CheckOutcome::empty();
        outcome.is_essay = true;
        outcome.immediate_jump = true;
        outcome.jump = Jump::Page(page.id);
        return outcome;
    };

    let mut outcome = CheckOutcome::empty();
    outcome.is_essay = true;

    if text.trim().is_empty() {
        outcome.no_answer = true;
        return outcome;
    }

    // Essay pages carry exactly one configured answer holding the jump.
    if let Some(answer) = page.answers.last() {
        outcome.answer_id = Some(answer.id);
        outcome.jump = answer.jump;
    }

    outcome.user_response = Some(UserResponse::Essay(EssaySubmission::new(text.clone())));
    outcome.student_answer = text.clone();
    outcome
}

fn check_matching(page: &LessonPage, data: &AttemptData) -> CheckOutcome {
    let AttemptData::Matching { responses } = data else {
        let mut outcome = CheckOutcome::empty();
        outcome.immediate_jump = true;
        outcome.jump = Jump::Page(page.id);
        return outcome;
    };

    let mut outcome = CheckOutcome::empty();

    // The first two configured answers are the correct/wrong response
    // templates; the rest are the rows to match.
    let mut configured = page.answers.iter();
    let Some(correct_template) = configured.next() else {
        return outcome;
    };
    let Some(wrong_template) = configured.next() else {
        return outcome;
    };
    let rows: Vec<&PageAnswer> = configured
        .filter(|a| !a.answer.is_empty() || !a.response.is_empty())
        .collect();

    let mut user_parts = Vec::new();
    let mut hits = 0usize;

    for (id, value) in responses {
        if value.is_empty() {
            return CheckOutcome::no_answer();
        }
        user_parts.push(value.clone());

        if let Some(row) = rows.iter().find(|r| r.id == *id) {
            outcome.student_answer += &format!("<br />{} = {}", row.answer, value);
            if !row.response.is_empty() && row.response.trim() == value.trim() {
                hits += 1;
            }
        }
    }

    outcome.user_response = Some(UserResponse::Text(user_parts.join(",")));

    let matched = if hits == rows.len() {
        outcome.correct = true;
        correct_template
    } else {
        wrong_template
    };
    outcome.response = matched.answer.clone();
    outcome.answer_id = Some(matched.id);
    outcome.jump = matched.jump;
    outcome
}

fn check_multichoice(
    lesson: &Lesson,
    page: &LessonPage,
    data: &AttemptData,
    index: &PageIndex,
) -> CheckOutcome {
    match data {
        AttemptData::MultichoiceMulti { answer_ids } if page.use_option => {
            check_multichoice_multi(lesson, page, answer_ids, index)
        }
        AttemptData::Multichoice { answer_id } if !page.use_option => {
            check_multichoice_single(lesson, page, *answer_id, index)
        }
        _ => CheckOutcome::no_answer(),
    }
}

fn check_multichoice_single(
    lesson: &Lesson,
    page: &LessonPage,
    selected: Option<AnswerId>,
    index: &PageIndex,
) -> CheckOutcome {
    let Some(selected) = selected else {
        return CheckOutcome::no_answer();
    };

    let mut outcome = CheckOutcome::empty();
    outcome.answer_id = Some(selected);

    if let Some(answer) = page.answer(selected) {
        outcome.correct = answer_correct(lesson, page, answer, index);
        outcome.jump = answer.jump;
        outcome.response = answer.response.clone();
        outcome.student_answer = answer.answer.clone();
        outcome.user_response = Some(UserResponse::Text(answer.answer.clone()));
    }
    outcome
}

fn check_multichoice_multi(
    lesson: &Lesson,
    page: &LessonPage,
    selected: &[AnswerId],
    index: &PageIndex,
) -> CheckOutcome {
    let mut outcome = CheckOutcome::empty();
    let used: Vec<&PageAnswer> = page.answers.iter().filter(|a| !a.answer.is_empty()).collect();

    outcome.user_response = Some(UserResponse::Text(
        selected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
    ));

    // Student answers and their feedback, in configured answer order.
    let mut picked_answers = Vec::new();
    let mut picked_responses = Vec::new();
    for answer in &used {
        if selected.contains(&answer.id) {
            picked_answers.push(answer.answer.clone());
            picked_responses.push(answer.response.clone());
        }
    }
    outcome.student_answer = picked_answers.join(MULTIANSWER_DELIMITER);

    let mut hits = 0usize;
    let mut correct_total = 0usize;
    let mut correct_answer: Option<&PageAnswer> = None;
    let mut wrong_answer: Option<&PageAnswer> = None;

    for answer in &used {
        let is_correct = answer_correct(lesson, page, answer, index);
        if selected.contains(&answer.id) {
            if is_correct {
                hits += 1;
            } else if wrong_answer.is_none() {
                wrong_answer = Some(answer);
            }
        }
        if is_correct {
            correct_total += 1;
            if correct_answer.is_none() {
                correct_answer = Some(answer);
            }
        }
    }

    outcome.response = picked_responses.join(MULTIANSWER_DELIMITER);

    let chosen = if selected.len() == correct_total && hits == correct_total {
        outcome.correct = true;
        correct_answer
    } else {
        wrong_answer
    };
    if let Some(answer) = chosen {
        outcome.jump = answer.jump;
        outcome.answer_id = Some(answer.id);
    }
    outcome
}

fn check_numerical(
    lesson: &Lesson,
    page: &LessonPage,
    data: &AttemptData,
    index: &PageIndex,
) -> CheckOutcome {
    let AttemptData::Numerical { answer } = data else {
        return CheckOutcome::no_answer();
    };

    let mut outcome = CheckOutcome::empty();
    let Some(value) = parse_number(answer) else {
        outcome.no_answer = true;
        return outcome;
    };

    outcome.student_answer = format_number(value);
    outcome.user_response = Some(UserResponse::Text(outcome.student_answer.clone()));

    for candidate in &page.answers {
        let Some((min, max)) = parse_range(&candidate.answer) else {
            continue;
        };
        if value >= min && value <= max {
            outcome.jump = candidate.jump;
            outcome.response = candidate.response.clone();
            outcome.correct = answer_correct(lesson, page, candidate, index);
            outcome.answer_id = Some(candidate.id);
            break;
        }
    }

    check_other_answers(lesson, page, &mut outcome);
    outcome
}

fn check_short_answer(
    lesson: &Lesson,
    page: &LessonPage,
    data: &AttemptData,
    index: &PageIndex,
) -> CheckOutcome {
    let AttemptData::ShortAnswer { answer } = data else {
        return CheckOutcome::no_answer();
    };

    let student = answer.trim();
    if student.is_empty() {
        return CheckOutcome::no_answer();
    }

    let mut outcome = CheckOutcome::empty();
    let use_regex = page.use_option;

    for candidate in &page.answers {
        let mut expected = candidate.answer.clone();
        let mut ignore_case = false;
        let mut matched = false;

        if use_regex {
            if let Some(stripped) = expected.strip_suffix("/i") {
                expected = stripped.to_string();
                ignore_case = true;
            }
        } else {
            // Plain analysis: a single `*` wildcard, case-insensitive. The
            // placeholder must survive escaping, so keep it alphanumeric.
            expected = expected.replacen('*', "WILDCARD000", 1);
            expected = regex::escape(&expected);
            expected = expected.replacen("WILDCARD000", ".*", 1);
        }

        if answer_correct(lesson, page, candidate, index) {
            let case_insensitive = !use_regex || ignore_case;
            if full_match(student, &expected, case_insensitive) {
                matched = true;
                outcome.correct = true;
            }
        } else if !use_regex {
            // A configured wrong answer, ignoring case.
            matched = full_match(student, &expected, true);
        } else if let Some(pattern) = expected.strip_prefix("--") {
            // Required string absent.
            matched = !full_match(student, pattern, ignore_case);
        } else if let Some(pattern) = expected.strip_prefix("++") {
            // Marked-wrong substrings anywhere in the answer.
            matched = find_anywhere(student, pattern, ignore_case);
        } else {
            matched = full_match(student, &expected, ignore_case);
        }

        if matched {
            outcome.jump = candidate.jump;
            outcome.response = candidate.response.clone();
            outcome.answer_id = Some(candidate.id);
            break;
        }
    }

    check_other_answers(lesson, page, &mut outcome);

    outcome.student_answer = student.to_string();
    outcome.user_response = Some(UserResponse::Text(student.to_string()));
    outcome
}

fn check_true_false(
    lesson: &Lesson,
    page: &LessonPage,
    data: &AttemptData,
    index: &PageIndex,
) -> CheckOutcome {
    let AttemptData::TrueFalse { answer_id } = data else {
        return CheckOutcome::no_answer();
    };

    let mut outcome = CheckOutcome::empty();
    outcome.answer_id = Some(*answer_id);

    if let Some(answer) = page.answer(*answer_id) {
        outcome.correct = answer_correct(lesson, page, answer, index);
        outcome.jump = answer.jump;
        outcome.response = answer.response.clone();
        outcome.student_answer = answer.answer.clone();
        outcome.user_response = Some(UserResponse::Text(answer.answer.clone()));
    }
    outcome
}

/// Apply the catch-all answer when nothing explicit matched.
fn check_other_answers(lesson: &Lesson, page: &LessonPage, outcome: &mut CheckOutcome) {
    if outcome.answer_id.is_some() {
        return;
    }
    let Some(last) = page.answers.last() else {
        return;
    };
    if !last.answer.contains(OTHER_ANSWERS_MARKER) {
        return;
    }

    outcome.jump = last.jump;
    outcome.response = last.response.clone();
    if lesson.custom_scoring {
        outcome.correct = last.score > 0;
    }
    outcome.answer_id = Some(last.id);
}

/// Full-string match; an uncompilable pattern matches nothing, like the
/// server's behavior with a broken teacher-authored pattern.
fn full_match(student: &str, pattern: &str, ignore_case: bool) -> bool {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(ignore_case)
        .build()
        .map(|re| re.is_match(student))
        .unwrap_or(false)
}

fn find_anywhere(student: &str, pattern: &str, ignore_case: bool) -> bool {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map(|re| re.is_match(student))
        .unwrap_or(false)
}

/// Parse a student-typed number; a decimal comma is accepted.
fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<f64>()
        .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse an expected numerical answer: either a single value or a
/// `min:max` range.
fn parse_range(expected: &str) -> Option<(f64, f64)> {
    match expected.split_once(':') {
        Some((lo, hi)) => {
            let min = lo.trim().parse::<f64>().ok()?;
            let max = hi.trim().parse::<f64>().ok()?;
            Some((min, max))
        }
        None => {
            let v = expected.trim().parse::<f64>().ok()?;
            Some((v, v))
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, LessonId, PageId};
    use std::collections::BTreeMap;

    fn lesson(custom: bool) -> Lesson {
        Lesson {
            id: LessonId::new(1),
            course_id: CourseId::new(1),
            name: "Sample".into(),
            custom_scoring: custom,
            max_attempts: 0,
            min_questions: 0,
            retake_allowed: true,
            feedback: false,
            review_allowed: false,
            grade: Some(100),
            time_limit: 0,
            allow_offline_attempts: true,
        }
    }

    fn answer(id: u64, page: u64, text: &str, jump: Jump, score: i64) -> PageAnswer {
        PageAnswer {
            id: AnswerId::new(id),
            page_id: PageId::new(page),
            answer: text.into(),
            response: String::new(),
            jump,
            score,
        }
    }

    fn question_page(
        id: u64,
        subtype: PageSubtype,
        use_option: bool,
        answers: Vec<PageAnswer>,
    ) -> LessonPage {
        LessonPage {
            id: PageId::new(id),
            title: format!("p{id}"),
            subtype,
            next_page_id: None,
            use_option,
            answers,
        }
    }

    fn single_page_index(page: &LessonPage) -> PageIndex {
        PageIndex::from_pages([page.clone()])
    }

    #[test]
    fn short_answer_exclude_pattern_matches_when_absent() {
        // Custom scoring so correctness comes from the score, keeping the
        // "--" candidate on the wrong-answer path.
        let lesson = lesson(true);
        let page = question_page(
            1,
            PageSubtype::ShortAnswer,
            true,
            vec![answer(11, 1, "--foo", Jump::ThisPage, 0)],
        );
        let index = single_page_index(&page);

        let hit = check_answer(
            &lesson,
            &page,
            &AttemptData::ShortAnswer { answer: "bar".into() },
            &index,
        );
        assert_eq!(hit.answer_id, Some(AnswerId::new(11)));

        let miss = check_answer(
            &lesson,
            &page,
            &AttemptData::ShortAnswer { answer: "foo".into() },
            &index,
        );
        assert_eq!(miss.answer_id, None);
    }

    #[test]
    fn short_answer_marked_wrong_pattern_matches_anywhere() {
        let lesson = lesson(true);
        let page = question_page(
            1,
            PageSubtype::ShortAnswer,
            true,
            vec![answer(11, 1, "++teh", Jump::ThisPage, 0)],
        );
        let index = single_page_index(&page);

        let hit = check_answer(
            &lesson,
            &page,
            &AttemptData::ShortAnswer { answer: "teh cat".into() },
            &index,
        );
        assert_eq!(hit.answer_id, Some(AnswerId::new(11)));
        assert!(!hit.correct);
    }

    #[test]
    fn short_answer_wildcard_and_case_fold_in_plain_mode() {
        let lesson = lesson(true);
        let page = question_page(
            1,
            PageSubtype::ShortAnswer,
            false,
            vec![answer(11, 1, "the *swer", Jump::NextPage, 1)],
        );
        let index = single_page_index(&page);

        let hit = check_answer(
            &lesson,
            &page,
            &AttemptData::ShortAnswer { answer: "The Answer".into() },
            &index,
        );
        assert!(hit.correct);
        assert_eq!(hit.jump, Jump::NextPage);
        assert_eq!(hit.student_answer, "The Answer");
    }

    #[test]
    fn numerical_range_and_other_answers_fallthrough() {
        let lesson = lesson(true);
        let page = question_page(
            1,
            PageSubtype::Numerical,
            false,
            vec![
                answer(11, 1, "5:10", Jump::Page(PageId::new(9)), 1),
                answer(12, 1, OTHER_ANSWERS_MARKER, Jump::ThisPage, 0),
            ],
        );
        let index = single_page_index(&page);

        let in_range = check_answer(
            &lesson,
            &page,
            &AttemptData::Numerical { answer: "7".into() },
            &index,
        );
        assert!(in_range.correct);
        assert_eq!(in_range.answer_id, Some(AnswerId::new(11)));
        assert_eq!(in_range.jump, Jump::Page(PageId::new(9)));

        let out_of_range = check_answer(
            &lesson,
            &page,
            &AttemptData::Numerical { answer: "11".into() },
            &index,
        );
        assert_eq!(out_of_range.answer_id, Some(AnswerId::new(12)));
        assert!(!out_of_range.correct);
        assert_eq!(out_of_range.jump, Jump::ThisPage);

        let unparsable = check_answer(
            &lesson,
            &page,
            &AttemptData::Numerical { answer: "not a number".into() },
            &index,
        );
        assert!(unparsable.no_answer);
    }

    #[test]
    fn multichoice_multi_requires_exact_selection() {
        let lesson = lesson(true);
        let page = question_page(
            1,
            PageSubtype::Multichoice,
            true,
            vec![
                answer(11, 1, "A", Jump::NextPage, 1),
                answer(12, 1, "B", Jump::NextPage, 1),
                answer(13, 1, "C", Jump::ThisPage, 0),
            ],
        );
        let index = single_page_index(&page);

        let exact = check_answer(
            &lesson,
            &page,
            &AttemptData::MultichoiceMulti {
                answer_ids: vec![AnswerId::new(11), AnswerId::new(12)],
            },
            &index,
        );
        assert!(exact.correct);
        assert_eq!(exact.answer_id, Some(AnswerId::new(11)));
        assert_eq!(
            exact.student_answer,
            format!("A{MULTIANSWER_DELIMITER}B")
        );

        let with_wrong = check_answer(
            &lesson,
            &page,
            &AttemptData::MultichoiceMulti {
                answer_ids: vec![AnswerId::new(11), AnswerId::new(13)],
            },
            &index,
        );
        assert!(!with_wrong.correct);
        assert_eq!(with_wrong.answer_id, Some(AnswerId::new(13)));

        let partial = check_answer(
            &lesson,
            &page,
            &AttemptData::MultichoiceMulti {
                answer_ids: vec![AnswerId::new(11)],
            },
            &index,
        );
        assert!(!partial.correct);
    }

    #[test]
    fn matching_counts_every_row() {
        let lesson = lesson(false);
        let mut correct_template = answer(1, 1, "Well done", Jump::NextPage, 0);
        correct_template.response = String::new();
        let wrong_template = answer(2, 1, "Try again", Jump::ThisPage, 0);
        let mut row_a = answer(3, 1, "cat", Jump::ThisPage, 0);
        row_a.response = "meow".into();
        let mut row_b = answer(4, 1, "dog", Jump::ThisPage, 0);
        row_b.response = "woof".into();

        let page = question_page(
            1,
            PageSubtype::Matching,
            false,
            vec![correct_template, wrong_template, row_a, row_b],
        );
        let index = PageIndex::from_pages([
            LessonPage {
                next_page_id: Some(PageId::new(2)),
                ..page.clone()
            },
            question_page(2, PageSubtype::Content, false, Vec::new()),
        ]);

        let all_right = check_answer(
            &lesson,
            &page,
            &AttemptData::Matching {
                responses: BTreeMap::from([
                    (AnswerId::new(3), "meow".to_string()),
                    (AnswerId::new(4), "woof".to_string()),
                ]),
            },
            &index,
        );
        assert!(all_right.correct);
        assert_eq!(all_right.answer_id, Some(AnswerId::new(1)));

        let one_wrong = check_answer(
            &lesson,
            &page,
            &AttemptData::Matching {
                responses: BTreeMap::from([
                    (AnswerId::new(3), "meow".to_string()),
                    (AnswerId::new(4), "moo".to_string()),
                ]),
            },
            &index,
        );
        assert!(!one_wrong.correct);
        assert_eq!(one_wrong.answer_id, Some(AnswerId::new(2)));

        let missing_row = check_answer(
            &lesson,
            &page,
            &AttemptData::Matching {
                responses: BTreeMap::from([
                    (AnswerId::new(3), "meow".to_string()),
                    (AnswerId::new(4), String::new()),
                ]),
            },
            &index,
        );
        assert!(missing_row.no_answer);
    }

    #[test]
    fn essay_is_never_auto_scored() {
        let lesson = lesson(false);
        let page = question_page(
            1,
            PageSubtype::Essay,
            false,
            vec![answer(11, 1, "", Jump::NextPage, 0)],
        );
        let index = single_page_index(&page);

        let submitted = check_answer(
            &lesson,
            &page,
            &AttemptData::Essay { text: "my thoughts".into() },
            &index,
        );
        assert!(submitted.is_essay);
        assert!(!submitted.correct);
        assert_eq!(submitted.jump, Jump::NextPage);
        assert!(matches!(
            submitted.user_response,
            Some(UserResponse::Essay(_))
        ));

        let empty = check_answer(
            &lesson,
            &page,
            &AttemptData::Essay { text: "   ".into() },
            &index,
        );
        assert!(empty.no_answer);
    }

    #[test]
    fn content_page_jumps_immediately() {
        let lesson = lesson(false);
        let page = question_page(1, PageSubtype::Content, false, Vec::new());
        let index = single_page_index(&page);

        let outcome = check_answer(
            &lesson,
            &page,
            &AttemptData::Content { jump: Jump::NextPage },
            &index,
        );
        assert!(outcome.immediate_jump);
        assert_eq!(outcome.jump, Jump::NextPage);
    }

    #[test]
    fn true_false_resolves_selected_answer() {
        let lesson = lesson(false);
        let t = answer(11, 1, "True", Jump::Page(PageId::new(2)), 0);
        let f = answer(12, 1, "False", Jump::ThisPage, 0);
        let page = question_page(1, PageSubtype::TrueFalse, false, vec![t, f]);
        let index = PageIndex::from_pages([
            LessonPage {
                next_page_id: Some(PageId::new(2)),
                ..page.clone()
            },
            question_page(2, PageSubtype::Content, false, Vec::new()),
        ]);

        let right = check_answer(
            &lesson,
            &page,
            &AttemptData::TrueFalse { answer_id: AnswerId::new(11) },
            &index,
        );
        assert!(right.correct);
        assert_eq!(right.student_answer, "True");

        let wrong = check_answer(
            &lesson,
            &page,
            &AttemptData::TrueFalse { answer_id: AnswerId::new(12) },
            &index,
        );
        assert!(!wrong.correct);
        assert_eq!(wrong.jump, Jump::ThisPage);
    }
}
