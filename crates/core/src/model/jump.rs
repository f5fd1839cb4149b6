use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::PageId;

/// Where an answered page sends the student next.
///
/// Jumps are stored on the wire as signed integers: `0` means "stay on this
/// page", positive values are literal page ids, and the negative values are
/// symbolic codes resolved at play time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Jump {
    /// Code 0. No movement; an unanswered or invalid submission.
    ThisPage,
    /// Code -1. The linear successor of the current page.
    NextPage,
    /// Code -9. The end-of-lesson pseudo page.
    EndOfLesson,
    /// Code -50. A not-yet-seen page within the current branch.
    UnseenBranchPage,
    /// Code -60. A random page within the current branch.
    RandomPage,
    /// Code -70. A random content (branch table) page.
    RandomBranch,
    /// Code -80. A random unseen page within the cluster.
    ClusterJump,
    /// A literal target page id.
    Page(PageId),
}

impl Jump {
    /// Decode a wire jump code.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Jump::ThisPage,
            -1 => Jump::NextPage,
            -9 => Jump::EndOfLesson,
            -50 => Jump::UnseenBranchPage,
            -60 => Jump::RandomPage,
            -70 => Jump::RandomBranch,
            -80 => Jump::ClusterJump,
            id if id > 0 => Jump::Page(PageId::new(id as u64)),
            // Unknown negative codes behave like "stay".
            _ => Jump::ThisPage,
        }
    }

    /// Encode back to the wire code.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Jump::ThisPage => 0,
            Jump::NextPage => -1,
            Jump::EndOfLesson => -9,
            Jump::UnseenBranchPage => -50,
            Jump::RandomPage => -60,
            Jump::RandomBranch => -70,
            Jump::ClusterJump => -80,
            Jump::Page(id) => id.value() as i64,
        }
    }

    /// True for the symbolic codes that never point backwards.
    ///
    /// `RandomBranch` is deliberately absent: a random content page may sit
    /// before the current one.
    #[must_use]
    pub fn is_inherently_forward(&self) -> bool {
        matches!(
            self,
            Jump::NextPage
                | Jump::UnseenBranchPage
                | Jump::RandomPage
                | Jump::ClusterJump
                | Jump::EndOfLesson
        )
    }
}

impl Serialize for Jump {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for Jump {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Jump::from_code(i64::deserialize(deserializer)?))
    }
}

/// A concrete destination after jump resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    Page(PageId),
    EndOfLesson,
}

impl JumpTarget {
    #[must_use]
    pub fn page_id(&self) -> Option<PageId> {
        match self {
            JumpTarget::Page(id) => Some(*id),
            JumpTarget::EndOfLesson => None,
        }
    }
}

/// The `(page, jump code) -> concrete page` table precomputed by the server,
/// cached so symbolic jumps resolve offline without a round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PossibleJumps {
    entries: HashMap<PageId, HashMap<i64, JumpEntry>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JumpEntry {
    /// The concrete page the server computed for this jump, if any.
    pub calculated: Option<PageId>,
}

impl PossibleJumps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page_id: PageId, jump: Jump, calculated: Option<PageId>) {
        self.entries
            .entry(page_id)
            .or_default()
            .insert(jump.code(), JumpEntry { calculated });
    }

    /// Look up the server-calculated destination for a jump from a page.
    #[must_use]
    pub fn calculated(&self, page_id: PageId, jump: Jump) -> Option<JumpTarget> {
        let entry = self.entries.get(&page_id)?.get(&jump.code())?;
        Some(match entry.calculated {
            Some(id) => JumpTarget::Page(id),
            None => JumpTarget::EndOfLesson,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
