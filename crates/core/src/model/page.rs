use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::{AnswerId, PageId};
use super::jump::Jump;

/// Broad page category: a graded question or structural content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    Question,
    Structure,
}

impl PageType {
    /// Decode the wire value (0 = question, 1 = structure).
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PageType::Question),
            1 => Some(PageType::Structure),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            PageType::Question => 0,
            PageType::Structure => 1,
        }
    }
}

/// Concrete page kind, using the wire `qtype` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageSubtype {
    ShortAnswer,
    TrueFalse,
    Multichoice,
    Matching,
    Numerical,
    Essay,
    /// A content page ("branch table") with navigation buttons only.
    Content,
    EndOfBranch,
    Cluster,
    EndOfCluster,
}

impl PageSubtype {
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(PageSubtype::ShortAnswer),
            2 => Some(PageSubtype::TrueFalse),
            3 => Some(PageSubtype::Multichoice),
            5 => Some(PageSubtype::Matching),
            8 => Some(PageSubtype::Numerical),
            10 => Some(PageSubtype::Essay),
            20 => Some(PageSubtype::Content),
            21 => Some(PageSubtype::EndOfBranch),
            30 => Some(PageSubtype::Cluster),
            31 => Some(PageSubtype::EndOfCluster),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            PageSubtype::ShortAnswer => 1,
            PageSubtype::TrueFalse => 2,
            PageSubtype::Multichoice => 3,
            PageSubtype::Matching => 5,
            PageSubtype::Numerical => 8,
            PageSubtype::Essay => 10,
            PageSubtype::Content => 20,
            PageSubtype::EndOfBranch => 21,
            PageSubtype::Cluster => 30,
            PageSubtype::EndOfCluster => 31,
        }
    }

    #[must_use]
    pub fn page_type(&self) -> PageType {
        match self {
            PageSubtype::ShortAnswer
            | PageSubtype::TrueFalse
            | PageSubtype::Multichoice
            | PageSubtype::Matching
            | PageSubtype::Numerical
            | PageSubtype::Essay => PageType::Question,
            PageSubtype::Content
            | PageSubtype::EndOfBranch
            | PageSubtype::Cluster
            | PageSubtype::EndOfCluster => PageType::Structure,
        }
    }

    #[must_use]
    pub fn is_question(&self) -> bool {
        self.page_type() == PageType::Question
    }
}

/// An answer configured by the teacher on a page, including its jump target
/// and (for custom-scored lessons) its point value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnswer {
    pub id: AnswerId,
    pub page_id: PageId,
    pub answer: String,
    pub response: String,
    pub jump: Jump,
    pub score: i64,
}

/// A page in a lesson's directed page graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPage {
    pub id: PageId,
    pub title: String,
    pub subtype: PageSubtype,
    /// Default linear successor; `None` on the final page.
    pub next_page_id: Option<PageId>,
    /// Subtype-specific option flag: regex matching for short answers,
    /// multiple selection for multichoice.
    pub use_option: bool,
    pub answers: Vec<PageAnswer>,
}

impl LessonPage {
    #[must_use]
    pub fn page_type(&self) -> PageType {
        self.subtype.page_type()
    }

    #[must_use]
    pub fn answer(&self, id: AnswerId) -> Option<&PageAnswer> {
        self.answers.iter().find(|a| a.id == id)
    }
}

/// All pages of a lesson indexed by page id.
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    pages: HashMap<PageId, LessonPage>,
}

impl PageIndex {
    #[must_use]
    pub fn from_pages(pages: impl IntoIterator<Item = LessonPage>) -> Self {
        Self {
            pages: pages.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, id: PageId) -> Option<&LessonPage> {
        self.pages.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LessonPage> {
        self.pages.values()
    }

    /// Pages reached by walking `next_page_id` from (exclusive) `start`
    /// until a page whose subtype is in `ends`, or the chain runs out.
    ///
    /// Used to enumerate cluster and branch members.
    #[must_use]
    pub fn subpages_of(&self, start: PageId, ends: &[PageSubtype]) -> Vec<&LessonPage> {
        let mut out = Vec::new();
        let mut next = self.get(start).and_then(|p| p.next_page_id);
        while let Some(id) = next {
            let Some(page) = self.get(id) else { break };
            if ends.contains(&page.subtype) {
                break;
            }
            out.push(page);
            next = page.next_page_id;
            if out.len() > self.pages.len() {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: u64, subtype: PageSubtype, next: Option<u64>) -> LessonPage {
        LessonPage {
            id: PageId::new(id),
            title: format!("p{id}"),
            subtype,
            next_page_id: next.map(PageId::new),
            use_option: false,
            answers: Vec::new(),
        }
    }

    #[test]
    fn subtype_codes_round_trip() {
        for code in [1, 2, 3, 5, 8, 10, 20, 21, 30, 31] {
            let subtype = PageSubtype::from_code(code).unwrap();
            assert_eq!(subtype.code(), code);
        }
        assert!(PageSubtype::from_code(4).is_none());
    }

    #[test]
    fn question_and_structure_split() {
        assert!(PageSubtype::Essay.is_question());
        assert!(PageSubtype::Numerical.is_question());
        assert!(!PageSubtype::Content.is_question());
        assert!(!PageSubtype::EndOfCluster.is_question());
    }

    #[test]
    fn subpages_stop_at_end_marker() {
        let index = PageIndex::from_pages([
            page(1, PageSubtype::Cluster, Some(2)),
            page(2, PageSubtype::Multichoice, Some(3)),
            page(3, PageSubtype::Multichoice, Some(4)),
            page(4, PageSubtype::EndOfCluster, Some(5)),
            page(5, PageSubtype::Content, None),
        ]);

        let members = index.subpages_of(PageId::new(1), &[PageSubtype::EndOfCluster]);
        let ids: Vec<u64> = members.iter().map(|p| p.id.value()).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
