use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::{AnswerId, PageId};
use super::jump::Jump;

/// The decoded submission for a page, one variant per page kind.
///
/// Form payloads are decoded into this union once, at the UI boundary;
/// everything below works on typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptData {
    /// A content page navigation button press.
    Content { jump: Jump },
    ShortAnswer { answer: String },
    TrueFalse { answer_id: AnswerId },
    /// Single-selection multichoice; `None` when nothing was picked.
    Multichoice { answer_id: Option<AnswerId> },
    /// Multi-selection multichoice.
    MultichoiceMulti { answer_ids: Vec<AnswerId> },
    /// Per-row selections for a matching question, keyed by row answer id.
    Matching { responses: BTreeMap<AnswerId, String> },
    Numerical { answer: String },
    Essay { text: String },
}

/// An essay submission awaiting manual grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssaySubmission {
    pub sent: bool,
    pub graded: bool,
    pub score: i64,
    pub answer: String,
    pub response: String,
}

impl EssaySubmission {
    #[must_use]
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            sent: false,
            graded: false,
            score: 0,
            answer: answer.into(),
            response: String::new(),
        }
    }
}

/// The student's recorded response for an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserResponse {
    Essay(EssaySubmission),
    Text(String),
}

impl UserResponse {
    #[must_use]
    pub fn essay(&self) -> Option<&EssaySubmission> {
        match self {
            UserResponse::Essay(e) => Some(e),
            UserResponse::Text(_) => None,
        }
    }
}

/// One question attempt as seen by the grade calculator, online and
/// offline attempts brought into the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAttempt {
    pub page_id: PageId,
    /// Unix seconds; the only defined ordering between attempts.
    pub timestamp: i64,
    pub answer_id: Option<AnswerId>,
    pub correct: bool,
    pub user_response: Option<UserResponse>,
}

impl QuestionAttempt {
    /// Manually-assigned essay score, when one has been recorded.
    #[must_use]
    pub fn essay_score(&self) -> Option<i64> {
        let essay = self.user_response.as_ref()?.essay()?;
        essay.graded.then_some(essay.score)
    }
}
