//! Full pipeline over a dirty corpus: orphaned records surface as
//! warnings, every leaderboard still computes, and empty results are
//! plain empty vectors rather than errors.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};

use crowdbench_engine::config::EngineConfig;
use crowdbench_engine::contributor::rank_contributors;
use crowdbench_engine::curated::{CuratedQuery, curated_leaderboard};
use crowdbench_engine::model::{Feedback, Opinion, Prompt, PromptKind, PromptSet, Score, User};
use crowdbench_engine::reputation::rank_user_scores;
use crowdbench_engine::reviewer::rank_reviewers;
use crowdbench_engine::snapshot::{Snapshot, WarningKind};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 15, 0, 0, 0).unwrap()
}

fn user(id: &str) -> User {
    User {
        id: id.into(),
        display_name: id.into(),
        has_affiliation: false,
    }
}

fn prompt(id: &str, author: &str) -> Prompt {
    Prompt {
        id: id.into(),
        author_id: author.into(),
        set_id: "s1".into(),
        created_at: now() - chrono::Duration::days(2),
        tags: Vec::new(),
        kind: PromptKind::Task,
    }
}

fn feedback(id: &str, reviewer: &str, prompt_id: &str, opinion: Opinion) -> Feedback {
    Feedback {
        id: id.into(),
        reviewer_id: reviewer.into(),
        prompt_id: prompt_id.into(),
        opinion,
        flags: Vec::new(),
    }
}

fn score(id: &str, prompt_id: &str, model: &str, value: f64) -> Score {
    Score {
        id: id.into(),
        prompt_id: prompt_id.into(),
        model_id: model.into(),
        value,
        response_id: None,
    }
}

#[test]
fn dirty_corpus_yields_warnings_and_partial_results() {
    let users = vec![user("alice"), user("bob"), user("carol")];
    let sets = vec![PromptSet {
        id: "s1".into(),
        name: "Main".into(),
        creator_id: "alice".into(),
        tags: Vec::new(),
    }];
    let prompts = vec![
        prompt("p1", "alice"),
        prompt("p2", "bob"),
        prompt("p-ghost-author", "ghost"),
    ];
    let feedbacks = vec![
        feedback("f1", "bob", "p1", Opinion::Positive),
        feedback("f2", "carol", "p1", Opinion::Positive),
        feedback("f3", "carol", "p2", Opinion::Negative),
        feedback("f-orphan", "carol", "deleted-prompt", Opinion::Positive),
        feedback("f-dup", "carol", "p2", Opinion::Positive),
    ];
    let scores = vec![
        score("s1", "p1", "model-a", 0.8),
        score("s2", "p2", "model-a", 0.3),
        score("s-orphan", "deleted-prompt", "model-a", 0.9),
        score("s-nan", "p1", "model-b", f64::NAN),
    ];

    let (snapshot, warnings) = Snapshot::build(users, sets, prompts, feedbacks, scores, vec![]);

    let kinds: Vec<WarningKind> = warnings.iter().map(|w| w.kind).collect();
    assert!(kinds.contains(&WarningKind::PromptUnknownAuthor));
    assert!(kinds.contains(&WarningKind::FeedbackMissingPrompt));
    assert!(kinds.contains(&WarningKind::FeedbackDuplicate));
    assert!(kinds.contains(&WarningKind::ScoreMissingPrompt));
    assert!(kinds.contains(&WarningKind::ScoreInvalidValue));
    assert_eq!(warnings.len(), 5);

    // Warnings serialize for the caller's report.
    let rendered = serde_json::to_string(&warnings).unwrap();
    assert!(rendered.contains("feedback_duplicate"));

    let config = EngineConfig::default();

    // Both surviving authors are ranked; the ghost-authored prompt is gone.
    let contributors =
        rank_contributors(&snapshot, &config.contributor, &BTreeMap::new()).unwrap();
    let ids: Vec<&str> = contributors.iter().map(|e| e.user_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"alice"));
    assert!(ids.contains(&"bob"));

    // Nobody reaches the default review gate of 5: an empty board, not
    // an error.
    let reviewers = rank_reviewers(&snapshot, &config.reviewer);
    assert!(reviewers.is_empty());

    let user_scores =
        rank_user_scores(&snapshot, &config.user_score, &config.contributor).unwrap();
    assert!(user_scores.iter().any(|e| e.user_id == "carol"));

    let curated = curated_leaderboard(&snapshot, &CuratedQuery::default(), now()).unwrap();
    assert_eq!(curated.stats.total_distinct_prompts, 2);
    // The NaN score never reached aggregation: model-b is absent.
    assert_eq!(curated.leaderboard.len(), 1);
    assert_eq!(curated.leaderboard[0].model_id, "model-a");
    assert!((curated.leaderboard[0].avg_score - 0.55).abs() < 1e-12);
}

#[test]
fn empty_snapshot_produces_empty_boards() {
    let (snapshot, warnings) = Snapshot::build(vec![], vec![], vec![], vec![], vec![], vec![]);
    assert!(warnings.is_empty());

    let config = EngineConfig::default();
    assert!(
        rank_contributors(&snapshot, &config.contributor, &BTreeMap::new())
            .unwrap()
            .is_empty()
    );
    assert!(rank_reviewers(&snapshot, &config.reviewer).is_empty());
    assert!(
        rank_user_scores(&snapshot, &config.user_score, &config.contributor)
            .unwrap()
            .is_empty()
    );
    let curated = curated_leaderboard(&snapshot, &CuratedQuery::default(), now()).unwrap();
    assert!(curated.leaderboard.is_empty());
    assert!(curated.prompt_set_distribution.is_empty());
}
