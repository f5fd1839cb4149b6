//! Offline play engine: records answers and retake finishes locally and
//! rebuilds the navigation/grading state the server would have produced.
//!
//! Every submission lands in the attempt store immediately; the
//! synchronizer replays it later. The end-of-lesson snapshot is computed
//! from cached pages and merged attempts so finishing a retake works with
//! no connectivity at all.

use std::collections::HashSet;

use rand::rng;

use lesson_core::Clock;
use lesson_core::answer::{CheckOutcome, check_answer};
use lesson_core::grade::{LessonGrade, lesson_grade};
use lesson_core::jumps::resolve_jump_or_fallback;
use lesson_core::model::{
    AccessInfo, AttemptData, Jump, JumpTarget, Lesson, LessonPage, PageId, PageIndex,
    PageSubtype, PossibleJumps, QuestionAttempt,
};
use lesson_core::progress::{calculate_progress, round_decimals};
use storage::repository::{AttemptStore, PageAttemptRecord, Storage};

use crate::error::PlayerError;
use crate::events::{DataSentKind, EventBus, LessonEvent};

/// Per-call context the player cannot derive locally: server-known counts
/// and viewed pages from the last time the lesson was fetched.
#[derive(Debug, Clone, Default)]
pub struct PlayContext {
    pub review: bool,
    /// Server-side attempts already made on the page being processed.
    pub online_attempts_on_page: u32,
    /// Server-side question attempts for the retake.
    pub online_attempts: Vec<QuestionAttempt>,
    /// Server-side viewed pages (content and question) for the retake.
    pub viewed_pages: Vec<PageId>,
}

/// Result of processing one page offline.
#[derive(Debug, Clone)]
pub struct ProcessPageResult {
    pub check: CheckOutcome,
    /// Where to go next; `None` only while staying on the same page is
    /// expressed as `JumpTarget::Page(current)`.
    pub new_page: JumpTarget,
    pub attempts_remaining: Option<u32>,
    pub max_attempts_reached: bool,
}

/// The end-of-lesson snapshot reconstructed offline.
#[derive(Debug, Clone, Default)]
pub struct EolPage {
    /// Marks the snapshot as locally computed.
    pub offline: bool,
    pub grade_info: Option<LessonGrade>,
    /// False when too few questions were answered to grade the retake.
    pub graded: bool,
    pub progress: Option<f64>,
    pub questions_answered: Option<u32>,
    /// How many questions should have been viewed, when short of the
    /// minimum.
    pub questions_to_view: Option<u32>,
    pub correct_answers: Option<i64>,
    pub earned: Option<i64>,
    pub total: Option<i64>,
    pub pending_essays: Option<u32>,
    /// Grade scaled to the lesson's maximum, one decimal.
    pub final_grade: Option<f64>,
    pub max_grade: Option<u32>,
    pub out_of_time: bool,
    pub well_done: bool,
}

/// Records answers and retake finishes while playing, online or offline.
#[derive(Clone)]
pub struct AttemptService {
    clock: Clock,
    storage: Storage,
    events: EventBus,
}

impl AttemptService {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage, events: EventBus) -> Self {
        Self {
            clock,
            storage,
            events,
        }
    }

    /// Process a page answer offline: check it, persist it, and resolve
    /// the next page.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` on storage failures.
    pub async fn process_page(
        &self,
        lesson: &Lesson,
        access_info: &AccessInfo,
        page: &LessonPage,
        data: &AttemptData,
        jumps: &PossibleJumps,
        index: &PageIndex,
        play: &PlayContext,
    ) -> Result<ProcessPageResult, PlayerError> {
        let check = check_answer(lesson, page, data, index);
        let retake = access_info.attempts_count;

        let mut seen: HashSet<PageId> = play.viewed_pages.iter().copied().collect();
        for attempt in self
            .storage
            .attempts
            .get_retake_attempts(lesson.id, retake)
            .await?
        {
            seen.insert(attempt.page_id);
        }

        if check.immediate_jump {
            // Content pages store their navigation and move on at once;
            // other structure pages just move on.
            let new_page = self.resolve(page.id, check.jump, jumps, index, &seen);
            if page.subtype == PageSubtype::Content {
                self.record(lesson, retake, page, data, &check, new_page)
                    .await?;
            }
            return Ok(ProcessPageResult {
                check,
                new_page,
                attempts_remaining: None,
                max_attempts_reached: false,
            });
        }

        if check.no_answer {
            // Question pages redisplay themselves when unanswered.
            return Ok(ProcessPageResult {
                check,
                new_page: JumpTarget::Page(page.id),
                attempts_remaining: None,
                max_attempts_reached: false,
            });
        }

        let mut attempts_remaining = None;
        let mut max_attempts_reached = false;
        let mut new_page = self.resolve(page.id, check.jump, jumps, index, &seen);

        if !access_info.can_manage {
            let offline_count = self
                .storage
                .get_questions_attempts(lesson.id, retake, false, Some(page.id))
                .await?
                .len() as u32;
            let mut attempts_made = play.online_attempts_on_page + offline_count;

            if lesson.max_attempts > 0 && attempts_made >= lesson.max_attempts {
                return Ok(ProcessPageResult {
                    check,
                    new_page: self.resolve(page.id, Jump::NextPage, jumps, index, &seen),
                    attempts_remaining: None,
                    max_attempts_reached: true,
                });
            }

            if !play.review && (lesson.retake_allowed || retake == 0) {
                self.record(lesson, retake, page, data, &check, new_page)
                    .await?;
                attempts_made += 1;
            }

            if !check.correct && check.jump == Jump::ThisPage {
                if lesson.max_attempts > 0 && attempts_made >= lesson.max_attempts {
                    if lesson.max_attempts > 1 {
                        max_attempts_reached = true;
                    }
                    new_page = self.resolve(page.id, Jump::NextPage, jumps, index, &seen);
                } else if lesson.max_attempts > 1 {
                    attempts_remaining = Some(lesson.max_attempts - attempts_made);
                }
            }
        }

        Ok(ProcessPageResult {
            check,
            new_page,
            attempts_remaining,
            max_attempts_reached,
        })
    }

    /// Finish the retake offline and rebuild the end-of-lesson snapshot.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` on storage failures.
    pub async fn finish_retake(
        &self,
        lesson: &Lesson,
        access_info: &AccessInfo,
        out_of_time: bool,
        index: &PageIndex,
        play: &PlayContext,
    ) -> Result<EolPage, PlayerError> {
        let retake = access_info.attempts_count;

        self.storage
            .mark_retake_finished(
                lesson.id,
                lesson.course_id,
                retake,
                true,
                out_of_time,
                self.clock.timestamp(),
            )
            .await?;

        let attempts = self
            .questions_attempts(lesson, retake, play.online_attempts.clone())
            .await?;
        let grade_info = lesson_grade(lesson, &attempts, index);

        let mut eol = EolPage {
            offline: true,
            graded: true,
            out_of_time,
            ..EolPage::default()
        };

        // Custom-scored lessons need the minimum questions answered before
        // a score means anything.
        if lesson.custom_scoring
            && !access_info.can_manage
            && lesson.min_questions > 0
            && grade_info.questions_answered < lesson.min_questions
        {
            eol.graded = false;
            eol.questions_answered = Some(grade_info.questions_answered);
            eol.questions_to_view = Some(lesson.min_questions);
        }

        if !access_info.can_manage && eol.graded {
            let mut viewed: Vec<PageId> = play.viewed_pages.clone();
            for attempt in &attempts {
                viewed.push(attempt.page_id);
            }
            eol.progress = Some(calculate_progress(
                access_info.first_page_id,
                index,
                &viewed,
                play.review,
            ));

            if grade_info.attempts_made > 0 {
                if !lesson.custom_scoring {
                    eol.questions_answered = Some(grade_info.questions_answered);
                    if lesson.min_questions > 0
                        && grade_info.questions_answered < lesson.min_questions
                    {
                        eol.questions_to_view = Some(lesson.min_questions);
                    }
                    eol.correct_answers = Some(grade_info.earned);
                }

                eol.earned = Some(grade_info.earned);
                eol.total = Some(grade_info.total);
                if grade_info.manual_count > 0 {
                    eol.pending_essays = Some(grade_info.manual_count);
                }

                if let Some(max_grade) = lesson.grade {
                    eol.final_grade =
                        Some(round_decimals(grade_info.grade * f64::from(max_grade) / 100.0, 1));
                    eol.max_grade = Some(max_grade);
                }
            } else if !out_of_time {
                // Only content pages were visited.
                eol.well_done = lesson.time_limit == 0;
            }
        }

        eol.grade_info = Some(grade_info);

        self.events.publish(LessonEvent::DataSent {
            lesson_id: lesson.id,
            kind: DataSentKind::Finish,
            page_id: None,
        });

        Ok(eol)
    }

    /// Merge server-known and offline question attempts for a retake.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` on storage failures.
    pub async fn questions_attempts(
        &self,
        lesson: &Lesson,
        retake: u32,
        online: Vec<QuestionAttempt>,
    ) -> Result<Vec<QuestionAttempt>, PlayerError> {
        let mut merged = online;
        let offline = self
            .storage
            .get_questions_attempts(lesson.id, retake, false, None)
            .await?;
        merged.extend(offline.into_iter().map(|record| QuestionAttempt {
            page_id: record.page_id,
            timestamp: record.timestamp,
            answer_id: record.answer_id,
            correct: record.correct,
            user_response: record.user_response,
        }));
        Ok(merged)
    }

    fn resolve(
        &self,
        page_id: PageId,
        jump: Jump,
        jumps: &PossibleJumps,
        index: &PageIndex,
        seen: &HashSet<PageId>,
    ) -> JumpTarget {
        resolve_jump_or_fallback(page_id, jump, jumps, index, seen, &mut rng())
    }

    async fn record(
        &self,
        lesson: &Lesson,
        retake: u32,
        page: &LessonPage,
        data: &AttemptData,
        check: &CheckOutcome,
        new_page: JumpTarget,
    ) -> Result<(), PlayerError> {
        let record = PageAttemptRecord {
            lesson_id: lesson.id,
            course_id: lesson.course_id,
            retake,
            page_id: page.id,
            timestamp: self.clock.timestamp(),
            page_type: page.page_type(),
            data: data.clone(),
            new_page_id: new_page.page_id(),
            answer_id: check.answer_id,
            correct: check.correct,
            user_response: check.user_response.clone(),
        };
        self.storage.record_attempt(&record).await?;

        self.events.publish(LessonEvent::DataSent {
            lesson_id: lesson.id,
            kind: DataSentKind::Process,
            page_id: Some(page.id),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{AnswerId, CourseId, LessonId, PageAnswer};
    use lesson_core::time::fixed_clock;
    use storage::repository::RetakeStore;

    fn lesson() -> Lesson {
        Lesson {
            id: LessonId::new(1),
            course_id: CourseId::new(2),
            name: "Offline".into(),
            custom_scoring: false,
            max_attempts: 2,
            min_questions: 0,
            retake_allowed: true,
            feedback: false,
            review_allowed: false,
            grade: Some(10),
            time_limit: 0,
            allow_offline_attempts: true,
        }
    }

    fn access(retake: u32) -> AccessInfo {
        AccessInfo {
            attempts_count: retake,
            can_manage: false,
            can_view_reports: false,
            first_page_id: PageId::new(10),
            left_during_timed: false,
            prevent_access_reasons: Vec::new(),
        }
    }

    fn tf_page(id: u64, next: Option<u64>) -> LessonPage {
        LessonPage {
            id: PageId::new(id),
            title: format!("p{id}"),
            subtype: PageSubtype::TrueFalse,
            next_page_id: next.map(PageId::new),
            use_option: false,
            answers: vec![
                PageAnswer {
                    id: AnswerId::new(id * 10 + 1),
                    page_id: PageId::new(id),
                    answer: "True".into(),
                    response: String::new(),
                    jump: Jump::NextPage,
                    score: 1,
                },
                PageAnswer {
                    id: AnswerId::new(id * 10 + 2),
                    page_id: PageId::new(id),
                    answer: "False".into(),
                    response: String::new(),
                    jump: Jump::ThisPage,
                    score: 0,
                },
            ],
        }
    }

    fn service() -> (AttemptService, Storage) {
        let storage = Storage::in_memory();
        let service = AttemptService::new(fixed_clock(), storage.clone(), EventBus::default());
        (service, storage)
    }

    #[tokio::test]
    async fn answering_persists_attempt_and_advances() {
        let (service, storage) = service();
        let lesson = lesson();
        let page = tf_page(10, Some(11));
        let index = PageIndex::from_pages([page.clone(), tf_page(11, None)]);

        let result = service
            .process_page(
                &lesson,
                &access(0),
                &page,
                &AttemptData::TrueFalse {
                    answer_id: AnswerId::new(101),
                },
                &PossibleJumps::new(),
                &index,
                &PlayContext::default(),
            )
            .await
            .unwrap();

        assert!(result.check.correct);
        assert_eq!(result.new_page, JumpTarget::Page(PageId::new(11)));

        let stored = storage
            .attempts
            .get_retake_attempts(lesson.id, 0)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].page_id, PageId::new(10));
        assert!(stored[0].correct);

        let retake = storage.retakes.get_retake(lesson.id).await.unwrap();
        assert_eq!(retake.last_question_page, Some(PageId::new(10)));
    }

    #[tokio::test]
    async fn wrong_answer_reports_attempts_remaining_then_moves_on() {
        let (service, storage) = service();
        let lesson = lesson();
        let page = tf_page(10, Some(11));
        let index = PageIndex::from_pages([page.clone(), tf_page(11, None)]);
        let wrong = AttemptData::TrueFalse {
            answer_id: AnswerId::new(102),
        };

        let first = service
            .process_page(
                &lesson,
                &access(0),
                &page,
                &wrong,
                &PossibleJumps::new(),
                &index,
                &PlayContext::default(),
            )
            .await
            .unwrap();
        assert!(!first.check.correct);
        assert_eq!(first.attempts_remaining, Some(1));
        assert!(!first.max_attempts_reached);

        let second = service
            .process_page(
                &lesson,
                &access(0),
                &page,
                &wrong,
                &PossibleJumps::new(),
                &index,
                &PlayContext::default(),
            )
            .await
            .unwrap();
        assert!(second.max_attempts_reached);
        assert_eq!(second.new_page, JumpTarget::Page(PageId::new(11)));

        // Cap hit: the third submission is refused before being stored.
        let third = service
            .process_page(
                &lesson,
                &access(0),
                &page,
                &wrong,
                &PossibleJumps::new(),
                &index,
                &PlayContext::default(),
            )
            .await
            .unwrap();
        assert!(third.max_attempts_reached);
        let stored = storage
            .attempts
            .get_retake_attempts(lesson.id, 0)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn finishing_offline_builds_graded_eol_snapshot() {
        let (service, storage) = service();
        let lesson = lesson();
        let page10 = tf_page(10, Some(11));
        let page11 = tf_page(11, None);
        let index = PageIndex::from_pages([page10.clone(), page11.clone()]);
        let play = PlayContext::default();

        for (page, answer) in [(&page10, 101u64), (&page11, 111)] {
            service
                .process_page(
                    &lesson,
                    &access(0),
                    page,
                    &AttemptData::TrueFalse {
                        answer_id: AnswerId::new(answer),
                    },
                    &PossibleJumps::new(),
                    &index,
                    &play,
                )
                .await
                .unwrap();
        }

        let eol = service
            .finish_retake(&lesson, &access(0), false, &index, &play)
            .await
            .unwrap();

        assert!(eol.offline);
        assert!(eol.graded);
        assert_eq!(eol.progress, Some(100.0));
        assert_eq!(eol.questions_answered, Some(2));
        assert_eq!(eol.correct_answers, Some(2));
        assert_eq!(eol.final_grade, Some(10.0));

        let retake = storage.retakes.get_retake(lesson.id).await.unwrap();
        assert!(retake.finished);
        assert!(!retake.out_of_time);
    }

    #[tokio::test]
    async fn content_only_retake_is_well_done() {
        let (service, _storage) = service();
        let lesson = lesson();
        let content = LessonPage {
            id: PageId::new(10),
            title: "intro".into(),
            subtype: PageSubtype::Content,
            next_page_id: None,
            use_option: false,
            answers: Vec::new(),
        };
        let index = PageIndex::from_pages([content]);

        let eol = service
            .finish_retake(&lesson, &access(0), false, &index, &PlayContext::default())
            .await
            .unwrap();

        assert!(eol.well_done);
        assert_eq!(eol.final_grade, None);
    }
}
