//! Audience resolution.
//!
//! The audience of an event is the set of entities whose feeds it appears
//! in: the subject itself, plus any extra entities the caller insists on,
//! minus any the caller excludes.

use std::collections::HashSet;

use crate::entity::PolyRef;

/// Compute the audience for a new event.
///
/// Order is `about` first, then `ensure` in the given order; duplicates are
/// dropped and anything in `exclude` is removed, including `about`.
pub fn resolve_audience(
    about: Option<&PolyRef>,
    ensure: &[PolyRef],
    exclude: &[PolyRef],
) -> Vec<PolyRef> {
    let excluded: HashSet<&PolyRef> = exclude.iter().collect();
    let mut seen = HashSet::new();

    about
        .into_iter()
        .chain(ensure.iter())
        .filter(|r| !excluded.contains(r))
        .filter(|r| seen.insert(*r))
        .cloned()
        .collect()
}
