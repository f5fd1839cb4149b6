//! Jump resolution: turning a page's jump rule into a concrete next page.
//!
//! The server precomputes a `(page, jump) -> page` table which is cached for
//! offline use; resolution consults it first so offline navigation never
//! diverges from what the server would have done. When the table lacks an
//! entry for a symbolic code the local fallbacks below apply the same
//! selection rules the server uses.

use std::collections::HashSet;

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::model::{Jump, JumpTarget, PageId, PageIndex, PageSubtype, PossibleJumps};

/// Resolve a jump without any fallback computation.
///
/// Mirrors the server-side lookup order: the precomputed table wins for any
/// code (symbolic or literal); `ThisPage` resolves to the current page; a
/// literal id resolves to itself. Returns `None` for a symbolic code with no
/// table entry.
#[must_use]
pub fn resolve_jump(page_id: PageId, jump: Jump, jumps: &PossibleJumps) -> Option<JumpTarget> {
    if let Some(target) = jumps.calculated(page_id, jump) {
        return Some(target);
    }

    match jump {
        Jump::ThisPage => Some(JumpTarget::Page(page_id)),
        Jump::Page(id) => Some(JumpTarget::Page(id)),
        Jump::EndOfLesson => Some(JumpTarget::EndOfLesson),
        _ => None,
    }
}

/// Resolve a jump, computing symbolic codes locally when the precomputed
/// table has no entry.
///
/// `seen` is the set of pages already viewed in this retake; it drives the
/// unseen-page selections exactly as the server's algorithm does.
#[must_use]
pub fn resolve_jump_or_fallback<R: Rng + ?Sized>(
    page_id: PageId,
    jump: Jump,
    jumps: &PossibleJumps,
    index: &PageIndex,
    seen: &HashSet<PageId>,
    rng: &mut R,
) -> JumpTarget {
    if let Some(target) = resolve_jump(page_id, jump, jumps) {
        return target;
    }

    match jump {
        Jump::NextPage => next_page(page_id, index),
        Jump::UnseenBranchPage => unseen_branch_page(page_id, index, seen, rng),
        Jump::RandomPage => random_branch_page(page_id, index, rng),
        Jump::RandomBranch => random_branch(index, seen, rng),
        Jump::ClusterJump => cluster_jump(page_id, index, seen, rng),
        Jump::ThisPage => JumpTarget::Page(page_id),
        Jump::Page(id) => JumpTarget::Page(id),
        Jump::EndOfLesson => JumpTarget::EndOfLesson,
    }
}

/// True iff the jump can only move the student forward through the lesson.
///
/// Symbolic forward codes are forward by definition; a literal target is
/// forward iff walking `next_page_id` from the current page reaches it.
#[must_use]
pub fn jump_is_forward(page_id: PageId, jump: Jump, index: &PageIndex) -> bool {
    match jump {
        Jump::ThisPage => false,
        j if j.is_inherently_forward() => true,
        Jump::Page(target) => {
            let mut guard = index.len() + 1;
            let mut next = index.get(page_id).and_then(|p| p.next_page_id);
            while let Some(id) = next {
                if id == target {
                    return true;
                }
                guard = guard.saturating_sub(1);
                if guard == 0 {
                    break;
                }
                next = index.get(id).and_then(|p| p.next_page_id);
            }
            false
        }
        _ => false,
    }
}

fn next_page(page_id: PageId, index: &PageIndex) -> JumpTarget {
    match index.get(page_id).and_then(|p| p.next_page_id) {
        Some(id) => JumpTarget::Page(id),
        None => JumpTarget::EndOfLesson,
    }
}

/// Pages between the current page and the next end-of-branch marker.
fn branch_members<'a>(page_id: PageId, index: &'a PageIndex) -> Vec<&'a crate::model::LessonPage> {
    index.subpages_of(
        page_id,
        &[PageSubtype::EndOfBranch, PageSubtype::EndOfCluster],
    )
}

fn unseen_branch_page<R: Rng + ?Sized>(
    page_id: PageId,
    index: &PageIndex,
    seen: &HashSet<PageId>,
    rng: &mut R,
) -> JumpTarget {
    let candidates: Vec<PageId> = branch_members(page_id, index)
        .into_iter()
        .filter(|p| p.subtype.is_question() && !seen.contains(&p.id))
        .map(|p| p.id)
        .collect();

    match candidates.choose(rng) {
        Some(id) => JumpTarget::Page(*id),
        None => JumpTarget::EndOfLesson,
    }
}

fn random_branch_page<R: Rng + ?Sized>(
    page_id: PageId,
    index: &PageIndex,
    rng: &mut R,
) -> JumpTarget {
    let candidates: Vec<PageId> = branch_members(page_id, index)
        .into_iter()
        .map(|p| p.id)
        .collect();

    match candidates.choose(rng) {
        Some(id) => JumpTarget::Page(*id),
        None => JumpTarget::EndOfLesson,
    }
}

fn random_branch<R: Rng + ?Sized>(
    index: &PageIndex,
    seen: &HashSet<PageId>,
    rng: &mut R,
) -> JumpTarget {
    let mut candidates: Vec<PageId> = index
        .iter()
        .filter(|p| p.subtype == PageSubtype::Content && !seen.contains(&p.id))
        .map(|p| p.id)
        .collect();
    candidates.sort_unstable();

    match candidates.choose(rng) {
        Some(id) => JumpTarget::Page(*id),
        None => JumpTarget::EndOfLesson,
    }
}

fn cluster_jump<R: Rng + ?Sized>(
    page_id: PageId,
    index: &PageIndex,
    seen: &HashSet<PageId>,
    rng: &mut R,
) -> JumpTarget {
    let members = index.subpages_of(page_id, &[PageSubtype::EndOfCluster]);
    let candidates: Vec<PageId> = members
        .iter()
        .filter(|p| p.subtype.is_question() && !seen.contains(&p.id))
        .map(|p| p.id)
        .collect();

    if let Some(id) = candidates.choose(rng) {
        return JumpTarget::Page(*id);
    }

    // Cluster exhausted: leave through the page after its end marker.
    let exit = members
        .last()
        .and_then(|last| last.next_page_id)
        .and_then(|end_id| index.get(end_id))
        .and_then(|end| end.next_page_id);
    match exit {
        Some(id) => JumpTarget::Page(id),
        None => JumpTarget::EndOfLesson,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LessonPage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

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

    fn linear_index() -> PageIndex {
        PageIndex::from_pages([
            page(1, PageSubtype::Content, Some(2)),
            page(2, PageSubtype::Multichoice, Some(3)),
            page(3, PageSubtype::ShortAnswer, None),
        ])
    }

    #[test]
    fn table_entry_wins_over_literal_target() {
        let mut jumps = PossibleJumps::new();
        jumps.insert(PageId::new(1), Jump::Page(PageId::new(3)), Some(PageId::new(2)));

        assert_eq!(
            resolve_jump(PageId::new(1), Jump::Page(PageId::new(3)), &jumps),
            Some(JumpTarget::Page(PageId::new(2)))
        );
    }

    #[test]
    fn this_page_resolves_to_current_page() {
        let jumps = PossibleJumps::new();
        assert_eq!(
            resolve_jump(PageId::new(5), Jump::ThisPage, &jumps),
            Some(JumpTarget::Page(PageId::new(5)))
        );
    }

    #[test]
    fn symbolic_code_without_entry_is_unresolved() {
        let jumps = PossibleJumps::new();
        assert_eq!(resolve_jump(PageId::new(5), Jump::ClusterJump, &jumps), None);
    }

    #[test]
    fn next_page_fallback_follows_linear_order() {
        let index = linear_index();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            resolve_jump_or_fallback(
                PageId::new(2),
                Jump::NextPage,
                &PossibleJumps::new(),
                &index,
                &HashSet::new(),
                &mut rng,
            ),
            JumpTarget::Page(PageId::new(3))
        );
        assert_eq!(
            resolve_jump_or_fallback(
                PageId::new(3),
                Jump::NextPage,
                &PossibleJumps::new(),
                &index,
                &HashSet::new(),
                &mut rng,
            ),
            JumpTarget::EndOfLesson
        );
    }

    #[test]
    fn cluster_jump_skips_seen_members() {
        let index = PageIndex::from_pages([
            page(10, PageSubtype::Cluster, Some(11)),
            page(11, PageSubtype::TrueFalse, Some(12)),
            page(12, PageSubtype::TrueFalse, Some(13)),
            page(13, PageSubtype::EndOfCluster, Some(14)),
            page(14, PageSubtype::Content, None),
        ]);
        let seen: HashSet<PageId> = [PageId::new(11)].into();
        let mut rng = StdRng::seed_from_u64(7);

        let target = resolve_jump_or_fallback(
            PageId::new(10),
            Jump::ClusterJump,
            &PossibleJumps::new(),
            &index,
            &seen,
            &mut rng,
        );
        assert_eq!(target, JumpTarget::Page(PageId::new(12)));

        // Both members seen: exit past the end-of-cluster marker.
        let seen: HashSet<PageId> = [PageId::new(11), PageId::new(12)].into();
        let target = resolve_jump_or_fallback(
            PageId::new(10),
            Jump::ClusterJump,
            &PossibleJumps::new(),
            &index,
            &seen,
            &mut rng,
        );
        assert_eq!(target, JumpTarget::Page(PageId::new(14)));
    }

    #[test]
    fn forward_detection_walks_the_linear_chain() {
        let index = linear_index();
        assert!(jump_is_forward(PageId::new(1), Jump::Page(PageId::new(3)), &index));
        assert!(!jump_is_forward(PageId::new(3), Jump::Page(PageId::new(1)), &index));
        assert!(jump_is_forward(PageId::new(3), Jump::EndOfLesson, &index));
        assert!(!jump_is_forward(PageId::new(1), Jump::ThisPage, &index));
        assert!(!jump_is_forward(PageId::new(1), Jump::RandomBranch, &index));
    }
}
