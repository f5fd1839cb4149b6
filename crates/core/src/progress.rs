//! Lesson completion percentage.
//!
//! Reproduces the server's walk of the page graph so the percentage shown
//! offline is the one the server would report: end-of-branch and
//! end-of-cluster markers never count, and a cluster counts as a single
//! unit no matter how many of its members were viewed.

use std::collections::HashSet;

use crate::model::{PageId, PageIndex, PageSubtype};

/// Compute the completion percentage for a retake.
///
/// `viewed` is the set of question pages attempted plus content pages
/// viewed (online and offline merged). Reviewing a finished retake is
/// always complete.
#[must_use]
pub fn calculate_progress(
    first_page_id: PageId,
    index: &PageIndex,
    viewed: &[PageId],
    review: bool,
) -> f64 {
    if review {
        return 100.0;
    }

    let mut viewed: HashSet<PageId> = viewed.iter().copied().collect();
    let mut valid: HashSet<PageId> = HashSet::new();
    let mut walked: HashSet<PageId> = HashSet::new();

    let mut current = Some(first_page_id);
    while let Some(page_id) = current {
        if !walked.insert(page_id) {
            break;
        }
        let Some(page) = index.get(page_id) else { break };

        if page.subtype != PageSubtype::EndOfCluster && page.subtype != PageSubtype::EndOfBranch {
            valid.insert(page.id);
        }

        if page.subtype == PageSubtype::Cluster {
            // A cluster counts once: fold every viewed member into the
            // cluster page itself, and resume the walk past its end
            // marker so members never count separately.
            let members = index.subpages_of(page.id, &[PageSubtype::EndOfCluster]);
            for member in &members {
                if viewed.remove(&member.id) {
                    viewed.insert(page.id);
                }
            }

            let marker = match members.last() {
                Some(last) => last.next_page_id,
                None => page.next_page_id,
            };
            current = marker
                .and_then(|id| index.get(id))
                .filter(|p| p.subtype == PageSubtype::EndOfCluster)
                .and_then(|p| p.next_page_id);
            continue;
        }

        current = page.next_page_id;
    }

    if valid.is_empty() {
        return 0.0;
    }

    let ratio = viewed.len() as f64 / valid.len() as f64;
    round_decimals(ratio, 2) * 100.0
}

/// Round half away from zero to the given number of decimals.
#[must_use]
pub fn round_decimals(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
