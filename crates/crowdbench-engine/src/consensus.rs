//! Consensus over quick-feedback opinions.
//!
//! Pure functions over a slice of feedback for one target. Deterministic;
//! identical inputs always produce identical output. The rater's own
//! record is excluded wherever a rater is the subject (no
//! self-reinforcement); the prompt-quality fraction runs over all raters
//! because there is no subject to bias.

use crate::model::Feedback;

/// Agreement fraction for one rater: matching opinions among *other*
/// raters divided by the count of other raters.
///
/// Returns `None` when the rater has no record in `feedbacks` or no other
/// raters exist; returns `Some(0.0)` when all others disagree.
#[must_use]
pub fn consensus_for_rater(feedbacks: &[Feedback], rater_id: &str) -> Option<f64> {
    let own = feedbacks.iter().find(|f| f.reviewer_id == rater_id)?;
    let others: Vec<&Feedback> = feedbacks
        .iter()
        .filter(|f| f.reviewer_id != rater_id)
        .collect();
    if others.is_empty() {
        return None;
    }
    let matching = others.iter().filter(|f| f.opinion == own.opinion).count();
    Some(matching as f64 / others.len() as f64)
}

/// Fraction of positive opinions over all raters.
///
/// `None` on an empty slice; absence of evidence is not a zero-quality
/// verdict.
#[must_use]
pub fn positive_fraction(feedbacks: &[Feedback]) -> Option<f64> {
    if feedbacks.is_empty() {
        return None;
    }
    let positive = feedbacks.iter().filter(|f| f.opinion.is_positive()).count();
    Some(positive as f64 / feedbacks.len() as f64)
}

/// Group-opinion signal in [-1, 1] excluding one rater.
///
/// The positive fraction among the remaining raters mapped via `2f - 1`;
/// the regression target for the reviewer scorer. `None` when no other
/// raters exist.
#[must_use]
pub fn consensus_signal(feedbacks: &[Feedback], excluded_rater: &str) -> Option<f64> {
    let others: Vec<Feedback> = feedbacks
        .iter()
        .filter(|f| f.reviewer_id != excluded_rater)
        .cloned()
        .collect();
    positive_fraction(&others).map(|f| 2.0 * f - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Opinion;

    fn feedback(id: &str, reviewer: &str, opinion: Opinion) -> Feedback {
        Feedback {
            id: id.into(),
            reviewer_id: reviewer.into(),
            prompt_id: "p1".into(),
            opinion,
            flags: Vec::new(),
        }
    }

    #[test]
    fn excludes_own_record() {
        // Rater alone: removing all other raters yields None, never 1.
        let fs = vec![feedback("f1", "alice", Opinion::Positive)];
        assert_eq!(consensus_for_rater(&fs, "alice"), None);
    }

    #[test]
    fn full_agreement() {
        let fs = vec![
            feedback("f1", "alice", Opinion::Positive),
            feedback("f2", "bob", Opinion::Positive),
            feedback("f3", "carol", Opinion::Positive),
        ];
        assert_eq!(consensus_for_rater(&fs, "alice"), Some(1.0));
    }

    #[test]
    fn full_disagreement_is_zero_not_error() {
        let fs = vec![
            feedback("f1", "alice", Opinion::Positive),
            feedback("f2", "bob", Opinion::Negative),
            feedback("f3", "carol", Opinion::Negative),
        ];
        assert_eq!(consensus_for_rater(&fs, "alice"), Some(0.0));
    }

    #[test]
    fn partial_agreement() {
        let fs = vec![
            feedback("f1", "alice", Opinion::Negative),
            feedback("f2", "bob", Opinion::Negative),
            feedback("f3", "carol", Opinion::Positive),
            feedback("f4", "dave", Opinion::Negative),
        ];
        let c = consensus_for_rater(&fs, "alice").unwrap();
        assert!((c - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_rater_is_none() {
        let fs = vec![feedback("f1", "alice", Opinion::Positive)];
        assert_eq!(consensus_for_rater(&fs, "ghost"), None);
    }

    #[test]
    fn positive_fraction_over_all_raters() {
        let fs = vec![
            feedback("f1", "alice", Opinion::Positive),
            feedback("f2", "bob", Opinion::Positive),
            feedback("f3", "carol", Opinion::Negative),
            feedback("f4", "dave", Opinion::Positive),
        ];
        assert_eq!(positive_fraction(&fs), Some(0.75));
    }

    #[test]
    fn positive_fraction_empty_is_none() {
        assert_eq!(positive_fraction(&[]), None);
    }

    #[test]
    fn signal_maps_to_symmetric_range() {
        let fs = vec![
            feedback("f1", "alice", Opinion::Positive),
            feedback("f2", "bob", Opinion::Positive),
            feedback("f3", "carol", Opinion::Negative),
        ];
        // Excluding alice: 1 of 2 positive -> fraction 0.5 -> signal 0.0.
        assert_eq!(consensus_signal(&fs, "alice"), Some(0.0));
        // Excluding carol: 2 of 2 positive -> signal 1.0.
        assert_eq!(consensus_signal(&fs, "carol"), Some(1.0));
    }

    #[test]
    fn signal_without_other_raters_is_none() {
        let fs = vec![feedback("f1", "alice", Opinion::Positive)];
        assert_eq!(consensus_signal(&fs, "alice"), None);
    }
}
