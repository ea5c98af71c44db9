//! Set operations over track identifiers.

use std::collections::HashSet;

use rand::Rng;

use crate::TrackId;

/// Distinct identifiers in `tracks`. Carries no order.
pub fn dedupe(tracks: &[TrackId]) -> HashSet<TrackId> {
    tracks.iter().cloned().collect()
}

/// Ordered union: every distinct identifier across `lists`, kept at the
/// position of its first occurrence.
pub fn union<'a, I>(lists: I) -> Vec<TrackId>
where
    I: IntoIterator<Item = &'a [TrackId]>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for list in lists {
        for track in list {
            if seen.insert(track.as_str()) {
                out.push(track.clone());
            }
        }
    }
    out
}

/// Distinct items of `from` that do not appear in `exclude`, in `from`'s order.
pub fn difference(from: &[TrackId], exclude: &HashSet<TrackId>) -> Vec<TrackId> {
    let mut seen = HashSet::new();
    from.iter()
        .filter(|t| !exclude.contains(*t) && seen.insert(t.as_str()))
        .cloned()
        .collect()
}

/// Unbiased in-place permutation (Fisher–Yates).
pub fn shuffle(tracks: &mut [TrackId]) {
    shuffle_with(tracks, &mut rand::thread_rng());
}

/// Fisher–Yates with a caller-supplied RNG.
pub fn shuffle_with<R: Rng + ?Sized>(tracks: &mut [TrackId], rng: &mut R) {
    for i in (1..tracks.len()).rev() {
        let j = rng.gen_range(0..=i);
        tracks.swap(i, j);
    }
}

/// Up to `size` distinct tracks picked uniformly at random from `pool`.
pub fn sample(pool: &[TrackId], size: usize) -> Vec<TrackId> {
    let mut distinct = union([pool]);
    shuffle(&mut distinct);
    distinct.truncate(size);
    distinct
}
