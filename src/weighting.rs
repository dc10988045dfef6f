// src/weighting.rs
// Recency- and popularity-weighted share of influence for each submission in an entity group

use chrono::{DateTime, Utc};

use crate::types::{Submission, SubmissionId};

/// Tuning knobs for the weighting engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightParams {
    /// How strongly relative upvotes move a submission's weight
    pub vote_factor: f64,
    /// How strongly relative recency moves a submission's weight
    pub date_factor: f64,
    /// Age at which the recency score halves
    pub half_life_days: f64,
    /// Recency score never drops below this
    pub recency_floor: f64,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self {
            vote_factor: 1.0,
            date_factor: 0.3,
            half_life_days: 90.0,
            recency_floor: 0.25,
        }
    }
}

/// Relative scalars are clamped to at least this
const MIN_SCALAR: f64 = 0.5;

/// Output of [`compute_weights`]: parallel to the input slice
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weights {
    /// Normalized weights, summing to 100
    pub weights: Vec<f64>,
    /// Upvote counts that fed the weights
    pub upvotes: Vec<u32>,
}

impl Weights {
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Exponential recency decay: `max(floor, 0.5 ^ (days_ago / half_life))`.
///
/// Missing timestamps score 1.0. Ages are whole days; timestamps in the future count as today.
pub fn recency_weight(
    submitted_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    params: &WeightParams,
) -> f64 {
    let Some(submitted_at) = submitted_at else {
        return 1.0;
    };
    if params.half_life_days <= 0.0 {
        return 1.0;
    }

    let days_ago = now.signed_duration_since(submitted_at).num_days().max(0) as f64;
    0.5_f64
        .powf(days_ago / params.half_life_days)
        .max(params.recency_floor)
}

/// Scales each value against the group mean, clamped below at 0.5.
/// A non-positive mean yields 1.0 for everyone.
fn relative_scalars(values: &[f64]) -> Vec<f64> {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values
        .iter()
        .map(|v| {
            if mean > 0.0 {
                (v / mean).max(MIN_SCALAR)
            } else {
                1.0
            }
        })
        .collect()
}

/// Computes normalized weights for one entity group.
///
/// `vote_count` is consulted once per submission, in order. Pure apart from that
/// lookup: the same inputs and `now` always give the same output.
pub fn compute_weights<F>(
    submissions: &[Submission],
    vote_count: F,
    params: &WeightParams,
    now: DateTime<Utc>,
) -> Weights
where
    F: Fn(SubmissionId) -> u32,
{
    let n = submissions.len();
    if n == 0 {
        return Weights::default();
    }

    let base_weight = 1.0 / n as f64;

    let upvotes: Vec<u32> = submissions.iter().map(|s| vote_count(s.id)).collect();
    let vote_scalars = relative_scalars(&upvotes.iter().map(|&u| u as f64).collect::<Vec<_>>());

    let date_scores: Vec<f64> = submissions
        .iter()
        .map(|s| recency_weight(s.submitted_at, now, params))
        .collect();
    let date_scalars = relative_scalars(&date_scores);

    let raw_scores: Vec<f64> = vote_scalars
        .iter()
        .zip(&date_scalars)
        .map(|(vs, ds)| {
            base_weight
                * (1.0 + params.vote_factor * (vs - 1.0))
                * (1.0 + params.date_factor * (ds - 1.0))
        })
        .collect();

    let total: f64 = raw_scores.iter().sum();
    let weights = if total > 0.0 && total.is_finite() {
        raw_scores.iter().map(|w| w / total * 100.0).collect()
    } else {
        vec![100.0 / n as f64; n]
    };

    Weights { weights, upvotes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn sub(id: i64, value: f64, submitted_at: Option<DateTime<Utc>>) -> Submission {
        Submission {
            id,
            value,
            quality: value,
            kind: "Restaurant".to_string(),
            category: "Italian".to_string(),
            name: "Luigi's".to_string(),
            location: "Main St".to_string(),
            submitter_id: format!("user{}", id),
            submitted_at,
        }
    }

    fn votes(pairs: &[(i64, u32)]) -> impl Fn(SubmissionId) -> u32 {
        let map: HashMap<i64, u32> = pairs.iter().copied().collect();
        move |id| map.get(&id).copied().unwrap_or(0)
    }

    fn assert_sums_to_100(w: &Weights) {
        assert!((w.total() - 100.0).abs() < 1e-6, "weights sum to {}", w.total());
    }

    #[test]
    fn test_empty_group() {
        let w = compute_weights(&[], votes(&[]), &WeightParams::default(), now());
        assert!(w.weights.is_empty());
        assert!(w.upvotes.is_empty());
    }

    #[test]
    fn test_equal_weights_without_votes() {
        let subs = vec![
            sub(1, 80.0, Some(now())),
            sub(2, 90.0, Some(now())),
            sub(3, 70.0, Some(now())),
        ];
        let w = compute_weights(&subs, votes(&[]), &WeightParams::default(), now());

        assert_sums_to_100(&w);
        for weight in &w.weights {
            assert!((weight - 100.0 / 3.0).abs() < 1e-9);
        }
        assert_eq!(w.upvotes, vec![0, 0, 0]);
    }

    #[test]
    fn test_upvoted_submission_gains_weight() {
        let subs = vec![
            sub(1, 80.0, Some(now())),
            sub(2, 90.0, Some(now())),
            sub(3, 70.0, Some(now())),
        ];
        let w = compute_weights(&subs, votes(&[(1, 2)]), &WeightParams::default(), now());

        assert_sums_to_100(&w);
        assert_eq!(w.upvotes, vec![2, 0, 0]);
        assert!(w.weights[0] > 100.0 / 3.0);
        assert!(w.weights[1] < 100.0 / 3.0);
        assert!(w.weights[2] < 100.0 / 3.0);
        // scalars 3.0 / 0.5 / 0.5 with no date spread
        assert!((w.weights[0] - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_recency_weight_floor_and_half_life() {
        let params = WeightParams::default();
        let old = now() - Duration::days(180);
        let mid = now() - Duration::days(90);

        assert_eq!(recency_weight(Some(now()), now(), &params), 1.0);
        assert!((recency_weight(Some(mid), now(), &params) - 0.5).abs() < 1e-12);
        assert_eq!(recency_weight(Some(old), now(), &params), 0.25);
        assert_eq!(recency_weight(Some(now() - Duration::days(2000)), now(), &params), 0.25);
        assert_eq!(recency_weight(None, now(), &params), 1.0);
        assert_eq!(recency_weight(Some(now() + Duration::days(10)), now(), &params), 1.0);
    }

    #[test]
    fn test_older_submission_weighs_less() {
        let subs = vec![
            sub(1, 50.0, Some(now() - Duration::days(180))),
            sub(2, 50.0, Some(now())),
        ];
        let w = compute_weights(&subs, votes(&[]), &WeightParams::default(), now());

        assert_sums_to_100(&w);
        assert!(w.weights[0] < w.weights[1]);
    }

    #[test]
    fn test_missing_timestamp_counts_as_fresh() {
        let subs = vec![sub(1, 50.0, None), sub(2, 50.0, Some(now()))];
        let w = compute_weights(&subs, votes(&[]), &WeightParams::default(), now());
        assert!((w.weights[0] - w.weights[1]).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_upvotes() {
        let subs: Vec<Submission> = (1..=4)
            .map(|i| sub(i, 50.0, Some(now() - Duration::days(i * 20))))
            .collect();
        let others = [(2, 3), (3, 1), (4, 0)];

        let mut previous = 0.0;
        for count in 0..12 {
            let mut pairs = others.to_vec();
            pairs.push((1, count));
            let w = compute_weights(&subs, votes(&pairs), &WeightParams::default(), now());
            assert_sums_to_100(&w);
            assert!(
                w.weights[0] + 1e-9 >= previous,
                "weight dropped from {} to {} at {} upvotes",
                previous,
                w.weights[0],
                count
            );
            previous = w.weights[0];
        }
    }

    #[test]
    fn test_degenerate_scores_fall_back_to_equal() {
        // factors of 2 against 0.5 scalars: the old upvoted row loses on date,
        // the fresh unvoted row loses on votes, both raw scores are zero
        let params = WeightParams {
            vote_factor: 2.0,
            date_factor: 2.0,
            ..WeightParams::default()
        };
        let subs = vec![
            sub(1, 10.0, Some(now() - Duration::days(180))),
            sub(2, 20.0, Some(now())),
        ];
        let w = compute_weights(&subs, votes(&[(1, 1), (2, 0)]), &params, now());
        assert_eq!(w.weights, vec![50.0, 50.0]);
        assert_eq!(w.upvotes, vec![1, 0]);
    }

    #[test]
    fn test_repeatable() {
        let subs = vec![
            sub(1, 80.0, Some(now() - Duration::days(3))),
            sub(2, 90.0, Some(now() - Duration::days(40))),
        ];
        let lookup = votes(&[(1, 1), (2, 4)]);
        let a = compute_weights(&subs, &lookup, &WeightParams::default(), now());
        let b = compute_weights(&subs, &lookup, &WeightParams::default(), now());
        assert_eq!(a, b);
    }
}
