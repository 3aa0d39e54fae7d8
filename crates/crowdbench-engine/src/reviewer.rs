//! Reviewer trust leaderboard.
//!
//! A reviewer's trustworthiness is the Pearson product-moment correlation
//! between their opinions and the group consensus on the same prompts.
//! Self-feedback and prompts without other raters contribute nothing;
//! reviewers below the review-count gate are omitted entirely.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ReviewerCoefficients;
use crate::consensus::consensus_signal;
use crate::snapshot::Snapshot;

/// Degenerate-variance guard for the correlation denominator.
const VARIANCE_EPSILON: f64 = 1e-12;

/// Presentation band for a correlation value. Not part of the ranking key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl CorrelationBand {
    #[must_use]
    pub fn from_correlation(r: f64) -> Self {
        if r >= 0.7 {
            Self::Excellent
        } else if r >= 0.3 {
            Self::Good
        } else if r >= 0.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for CorrelationBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Fair => write!(f, "fair"),
            Self::Poor => write!(f, "poor"),
        }
    }
}

/// One row of the reviewer leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerLeaderboardEntry {
    pub user_id: String,
    /// In [-1, 1].
    pub pearson_correlation: f64,
    /// Usable opinion/consensus pairs for this reviewer.
    pub review_count: usize,
    pub band: CorrelationBand,
    /// 1-based position after ranking.
    pub rank: usize,
}

/// Pearson product-moment correlation coefficient.
///
/// Returns 0 when either vector has (near-)zero variance: an undefined
/// correlation is treated as neutral, not as an error. The result is
/// clamped to [-1, 1] against floating-point drift.
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator < VARIANCE_EPSILON {
        return 0.0;
    }
    (covariance / denominator).clamp(-1.0, 1.0)
}

/// Rank every reviewer passing the review-count gate.
///
/// For each feedback the reviewer left: skip self-feedback on their own
/// prompt and prompts with no other raters; otherwise pair the opinion
/// (±1) with the consensus signal among the other raters.
///
/// Order: `pearson_correlation` descending, then `review_count`
/// descending, then `user_id` ascending.
#[must_use]
pub fn rank_reviewers(
    snapshot: &Snapshot,
    coefficients: &ReviewerCoefficients,
) -> Vec<ReviewerLeaderboardEntry> {
    let mut entries: Vec<ReviewerLeaderboardEntry> = Vec::new();

    for reviewer_id in snapshot.reviewers() {
        let mut opinions = Vec::new();
        let mut targets = Vec::new();

        for feedback in snapshot.feedback_by_reviewer(reviewer_id) {
            let Some(prompt) = snapshot.prompt(&feedback.prompt_id) else {
                continue;
            };
            if prompt.author_id == reviewer_id {
                // Self-feedback never enters the correlation.
                continue;
            }
            let prompt_feedback = snapshot.feedback_for_prompt(&feedback.prompt_id);
            let Some(signal) = consensus_signal(prompt_feedback, reviewer_id) else {
                continue;
            };
            opinions.push(feedback.opinion.signal());
            targets.push(signal);
        }

        let review_count = opinions.len();
        if (review_count as u32) < coefficients.min_reviews_required {
            continue;
        }

        let r = pearson(&opinions, &targets);
        entries.push(ReviewerLeaderboardEntry {
            user_id: reviewer_id.to_string(),
            pearson_correlation: r,
            review_count,
            band: CorrelationBand::from_correlation(r),
            rank: 0, // set after sorting
        });
    }

    entries.sort_by(|a, b| {
        b.pearson_correlation
            .partial_cmp(&a.pearson_correlation)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.review_count.cmp(&a.review_count))
            .then(a.user_id.cmp(&b.user_id))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    entries
}
