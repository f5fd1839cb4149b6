mod attempt;
mod ids;
mod jump;
mod lesson;
mod page;

pub use attempt::{AttemptData, EssaySubmission, QuestionAttempt, UserResponse};
pub use ids::{AnswerId, CourseId, LessonId, PageId};
pub use jump::{Jump, JumpEntry, JumpTarget, PossibleJumps};
pub use lesson::{AccessInfo, Lesson, PreventReason, REASON_PASSWORD_PROTECTED};
pub use page::{LessonPage, PageAnswer, PageIndex, PageSubtype, PageType};
