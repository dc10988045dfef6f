// src/aggregate.rs
//! Groups raw submissions by entity and collapses each group to one weighted point.
//!
//! Read-only over its inputs; vote counts come in through a lookup so callers can
//! pass the live [`UpvoteCache`](crate::cache::UpvoteCache) or a fixed map.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::types::{BreakdownRow, DisplayPoint, EntityBreakdown, Submission, SubmissionId};
use crate::weighting::{WeightParams, compute_weights};

/// Partitions submissions by (name, category). Each group is sorted by id so the
/// weighting engine always sees the same order for the same data.
pub fn group_by_entity(submissions: &[Submission]) -> BTreeMap<(String, String), Vec<Submission>> {
    let mut groups: BTreeMap<(String, String), Vec<Submission>> = BTreeMap::new();
    for sub in submissions {
        groups
            .entry((sub.name.clone(), sub.category.clone()))
            .or_default()
            .push(sub.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|s| s.id);
    }
    groups
}

/// Weighted mean of (value, quality). Falls back to the plain mean when the
/// weights carry no mass.
pub fn weighted_mean(group: &[Submission], weights: &[f64]) -> (f64, f64) {
    if group.is_empty() {
        return (0.0, 0.0);
    }

    let total: f64 = weights.iter().sum();
    if total == 0.0 || !total.is_finite() || weights.len() != group.len() {
        let n = group.len() as f64;
        let value = group.iter().map(|s| s.value).sum::<f64>() / n;
        let quality = group.iter().map(|s| s.quality).sum::<f64>() / n;
        return (value, quality);
    }

    let value = group.iter().zip(weights).map(|(s, w)| s.value * w).sum::<f64>() / total;
    let quality = group.iter().zip(weights).map(|(s, w)| s.quality * w).sum::<f64>() / total;
    (value, quality)
}

/// One display point per entity, ordered by (name, category)
pub fn aggregate<F>(
    submissions: &[Submission],
    vote_count: F,
    params: &WeightParams,
    now: DateTime<Utc>,
) -> Vec<DisplayPoint>
where
    F: Fn(SubmissionId) -> u32,
{
    group_by_entity(submissions)
        .into_values()
        .filter_map(|group| {
            let weights = compute_weights(&group, &vote_count, params, now);
            let (weighted_value, weighted_quality) = weighted_mean(&group, &weights.weights);
            let first = group.first()?;

            Some(DisplayPoint {
                name: first.name.clone(),
                category: first.category.clone(),
                kind: first.kind.clone(),
                location: first.location.clone(),
                weighted_value,
                weighted_quality,
                member_count: group.len(),
            })
        })
        .collect()
}

/// Maps a weight onto 0.2..=1.0 between the group's lightest and heaviest weight
fn opacity(weight: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 1.0;
    }
    0.2 + 0.8 * (weight - min) / (max - min)
}

/// Per-submission view of one entity: weights, votes and whether `viewer_has_voted`.
///
/// Submissions outside (name, category) are ignored. Rows come back newest first,
/// undated rows last.
pub fn entity_breakdown<F, V>(
    name: &str,
    category: &str,
    submissions: &[Submission],
    vote_count: F,
    viewer_has_voted: V,
    params: &WeightParams,
    now: DateTime<Utc>,
) -> EntityBreakdown
where
    F: Fn(SubmissionId) -> u32,
    V: Fn(SubmissionId) -> bool,
{
    let mut group: Vec<Submission> = submissions
        .iter()
        .filter(|s| s.entity_key() == (name, category))
        .cloned()
        .collect();
    group.sort_by_key(|s| s.id);

    let weights = compute_weights(&group, vote_count, params, now);
    let (weighted_value, weighted_quality) = weighted_mean(&group, &weights.weights);

    let min = weights.weights.iter().copied().fold(f64::INFINITY, f64::min);
    let max = weights.weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut rows: Vec<BreakdownRow> = group
        .into_iter()
        .zip(weights.weights.iter().zip(&weights.upvotes))
        .map(|(submission, (&weight, &upvotes))| BreakdownRow {
            viewer_has_voted: viewer_has_voted(submission.id),
            opacity: opacity(weight, min, max),
            submission,
            weight,
            upvotes,
        })
        .collect();

    // Option orders None first, so reversing puts undated rows last
    rows.sort_by(|a, b| {
        b.submission
            .submitted_at
            .cmp(&a.submission.submitted_at)
            .then(a.submission.id.cmp(&b.submission.id))
    });

    EntityBreakdown {
        name: name.to_string(),
        category: category.to_string(),
        weighted_value,
        weighted_quality,
        rows,
    }
}
