/// Picking one player out of several search hits.
///
/// This is a heuristic, not identity resolution. The roster is a youth event,
/// so when a query matches several listings we lean towards the one young
/// enough to be entered. It will occasionally pick the wrong person; the
/// caller accepts that.
use crate::CandidateMatch;
use log::debug;

/// Oldest birth year treated as eligible: 20 or younger at the reference date
/// of the 2025 event.
pub const DEFAULT_CUTOFF_YEAR: u16 = 2005;

/// Choose the best candidate, or `None` when there are none.
///
/// A single candidate is returned as-is. With several, candidates born before
/// `cutoff_year` are dropped (unknown birth years are kept). If that leaves
/// nothing, the unfiltered list is used instead. The first remaining
/// candidate in source order wins.
pub fn select(candidates: Vec<CandidateMatch>, cutoff_year: u16) -> Option<CandidateMatch> {
    if candidates.len() <= 1 {
        return candidates.into_iter().next();
    }

    if all_same_listing(&candidates) {
        debug!(
            "{} listings share the name {:?} ({}), narrowing by birth year",
            candidates.len(),
            candidates[0].name,
            candidates[0].federation
        );
    } else {
        debug!(
            "query matched {} distinct players, narrowing by birth year",
            candidates.len()
        );
    }

    let eligible = candidates
        .iter()
        .position(|c| c.birth_year().is_none_or(|year| year >= cutoff_year));

    match eligible {
        Some(index) => candidates.into_iter().nth(index),
        None => {
            debug!("every candidate was born before {cutoff_year}, keeping the first listing");
            candidates.into_iter().next()
        }
    }
}

fn all_same_listing(candidates: &[CandidateMatch]) -> bool {
    candidates.split_first().is_some_and(|(first, rest)| {
        rest.iter()
            .all(|c| c.name == first.name && c.federation == first.federation)
    })
}
