//! Brute-force Hamming matching and distance filtering.

use super::brief::Feature;

/// A nearest-neighbour correspondence between two feature sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureMatch {
    /// Index into the query set.
    pub query: usize,
    /// Index into the train set.
    pub train: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

/// For every query feature, finds the closest train feature.
///
/// Ties resolve to the lowest train index. Returns nothing when either
/// set is empty.
pub fn match_nearest(query: &[Feature], train: &[Feature]) -> Vec<FeatureMatch> {
    if train.is_empty() {
        return Vec::new();
    }

    query
        .iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            train
                .iter()
                .enumerate()
                .map(|(ti, t)| (ti, q.descriptor.hamming(&t.descriptor)))
                .min_by_key(|&(ti, d)| (d, ti))
                .map(|(train, distance)| FeatureMatch {
                    query: qi,
                    train,
                    distance,
                })
        })
        .collect()
}

/// Keeps matches closer than `max(min_distance * factor, floor)`.
///
/// The floor stops a single perfect match from shrinking the threshold
/// to zero.
pub fn filter_good_matches(matches: &[FeatureMatch], factor: f64, floor: f64) -> Vec<FeatureMatch> {
    let Some(min_distance) = matches.iter().map(|m| m.distance).min() else {
        return Vec::new();
    };
    let threshold = (min_distance as f64 * factor).max(floor);

    let good: Vec<FeatureMatch> = matches
        .iter()
        .filter(|m| (m.distance as f64) < threshold)
        .copied()
        .collect();

    tracing::trace!(
        total = matches.len(),
        good = good.len(),
        min_distance,
        threshold,
        "Filtered matches"
    );
    good
}
