//! Immutable input snapshot.
//!
//! `Snapshot::build` takes the raw record collections supplied by the
//! caller, indexes them for the scorers, and excludes orphaned or
//! malformed records. Exclusions are never fatal: each one produces an
//! [`IntegrityWarning`] that is returned alongside the snapshot so partial
//! leaderboards stay usable.
//!
//! All indexes are `BTreeMap`s keyed by record id, so iteration order (and
//! therefore floating-point summation order downstream) is independent of
//! the order the input slices arrived in.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Feedback, ModelResponse, Prompt, PromptSet, Score, User};

/// Classification of an excluded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    PromptSetUnknownCreator,
    PromptUnknownAuthor,
    PromptUnknownSet,
    FeedbackMissingPrompt,
    FeedbackDuplicate,
    ScoreMissingPrompt,
    ScoreInvalidValue,
    ScoreMissingResponse,
    ResponseMissingPrompt,
}

impl WarningKind {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::PromptSetUnknownCreator => "WRN_PROMPT_SET_UNKNOWN_CREATOR",
            Self::PromptUnknownAuthor => "WRN_PROMPT_UNKNOWN_AUTHOR",
            Self::PromptUnknownSet => "WRN_PROMPT_UNKNOWN_SET",
            Self::FeedbackMissingPrompt => "WRN_FEEDBACK_MISSING_PROMPT",
            Self::FeedbackDuplicate => "WRN_FEEDBACK_DUPLICATE",
            Self::ScoreMissingPrompt => "WRN_SCORE_MISSING_PROMPT",
            Self::ScoreInvalidValue => "WRN_SCORE_INVALID_VALUE",
            Self::ScoreMissingResponse => "WRN_SCORE_MISSING_RESPONSE",
            Self::ResponseMissingPrompt => "WRN_RESPONSE_MISSING_PROMPT",
        }
    }
}

/// A recovered data problem: the offending record was excluded (or, for
/// [`WarningKind::ScoreMissingResponse`], kept without its response link)
/// and the computation continued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityWarning {
    pub kind: WarningKind,
    /// Id of the record the warning is about.
    pub record_id: String,
    /// The dangling reference or offending value.
    pub detail: String,
}

impl IntegrityWarning {
    fn emit(kind: WarningKind, record_id: &str, detail: String) -> Self {
        warn!(
            code = kind.code(),
            record_id,
            detail = %detail,
            "excluding record from snapshot"
        );
        Self {
            kind,
            record_id: record_id.to_string(),
            detail,
        }
    }
}

/// Indexed, immutable view over one batch of input records.
///
/// Safe to share across threads; every scorer takes `&Snapshot`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    users: BTreeMap<String, User>,
    prompt_sets: BTreeMap<String, PromptSet>,
    prompts: BTreeMap<String, Prompt>,
    prompts_by_author: BTreeMap<String, Vec<String>>,
    feedback_by_prompt: BTreeMap<String, Vec<Feedback>>,
    feedback_by_reviewer: BTreeMap<String, Vec<Feedback>>,
    scores_by_prompt: BTreeMap<String, Vec<Score>>,
    responses: BTreeMap<String, ModelResponse>,
    responses_by_prompt: BTreeMap<String, Vec<String>>,
}

impl Snapshot {
    /// Index one batch of records, excluding orphans.
    ///
    /// Exclusion rules:
    /// - prompt set with unknown creator: set excluded (its prompts then
    ///   fail the unknown-set check);
    /// - prompt with unknown author or unknown set: excluded;
    /// - feedback on a missing prompt, or a second feedback by the same
    ///   reviewer on the same prompt: excluded (first wins);
    /// - score on a missing prompt or with a non-finite / out-of-[0,1]
    ///   value: excluded;
    /// - score referencing a missing response: kept, link severed;
    /// - response for a missing prompt: excluded.
    pub fn build(
        users: Vec<User>,
        prompt_sets: Vec<PromptSet>,
        prompts: Vec<Prompt>,
        feedbacks: Vec<Feedback>,
        scores: Vec<Score>,
        responses: Vec<ModelResponse>,
    ) -> (Self, Vec<IntegrityWarning>) {
        let mut warnings = Vec::new();
        let mut snapshot = Self::default();

        for user in users {
            snapshot.users.insert(user.id.clone(), user);
        }

        for set in prompt_sets {
            if !snapshot.users.contains_key(&set.creator_id) {
                warnings.push(IntegrityWarning::emit(
                    WarningKind::PromptSetUnknownCreator,
                    &set.id,
                    set.creator_id.clone(),
                ));
                continue;
            }
            snapshot.prompt_sets.insert(set.id.clone(), set);
        }

        for prompt in prompts {
            if !snapshot.users.contains_key(&prompt.author_id) {
                warnings.push(IntegrityWarning::emit(
                    WarningKind::PromptUnknownAuthor,
                    &prompt.id,
                    prompt.author_id.clone(),
                ));
                continue;
            }
            if !snapshot.prompt_sets.contains_key(&prompt.set_id) {
                warnings.push(IntegrityWarning::emit(
                    WarningKind::PromptUnknownSet,
                    &prompt.id,
                    prompt.set_id.clone(),
                ));
                continue;
            }
            snapshot
                .prompts_by_author
                .entry(prompt.author_id.clone())
                .or_default()
                .push(prompt.id.clone());
            snapshot.prompts.insert(prompt.id.clone(), prompt);
        }

        let mut seen_reviewer_prompt: BTreeMap<(String, String), ()> = BTreeMap::new();
        for feedback in feedbacks {
            if !snapshot.prompts.contains_key(&feedback.prompt_id) {
                warnings.push(IntegrityWarning::emit(
                    WarningKind::FeedbackMissingPrompt,
                    &feedback.id,
                    feedback.prompt_id.clone(),
                ));
                continue;
            }
            let key = (feedback.reviewer_id.clone(), feedback.prompt_id.clone());
            match seen_reviewer_prompt.entry(key) {
                Entry::Occupied(_) => {
                    warnings.push(IntegrityWarning::emit(
                        WarningKind::FeedbackDuplicate,
                        &feedback.id,
                        format!("{}/{}", feedback.reviewer_id, feedback.prompt_id),
                    ));
                    continue;
                }
                Entry::Vacant(slot) => {
                    slot.insert(());
                }
            }
            snapshot
                .feedback_by_prompt
                .entry(feedback.prompt_id.clone())
                .or_default()
                .push(feedback.clone());
            snapshot
                .feedback_by_reviewer
                .entry(feedback.reviewer_id.clone())
                .or_default()
                .push(feedback);
        }

        for response in responses {
            if !snapshot.prompts.contains_key(&response.prompt_id) {
                warnings.push(IntegrityWarning::emit(
                    WarningKind::ResponseMissingPrompt,
                    &response.id,
                    response.prompt_id.clone(),
                ));
                continue;
            }
            snapshot
                .responses_by_prompt
                .entry(response.prompt_id.clone())
                .or_default()
                .push(response.id.clone());
            snapshot.responses.insert(response.id.clone(), response);
        }

        for mut score in scores {
            if !snapshot.prompts.contains_key(&score.prompt_id) {
                warnings.push(IntegrityWarning::emit(
                    WarningKind::ScoreMissingPrompt,
                    &score.id,
                    score.prompt_id.clone(),
                ));
                continue;
            }
            if !score.value.is_finite() || !(0.0..=1.0).contains(&score.value) {
                warnings.push(IntegrityWarning::emit(
                    WarningKind::ScoreInvalidValue,
                    &score.id,
                    format!("{}", score.value),
                ));
                continue;
            }
            if let Some(response_id) = score.response_id.as_deref() {
                if !snapshot.responses.contains_key(response_id) {
                    warnings.push(IntegrityWarning::emit(
                        WarningKind::ScoreMissingResponse,
                        &score.id,
                        response_id.to_string(),
                    ));
                    score.response_id = None;
                }
            }
            snapshot
                .scores_by_prompt
                .entry(score.prompt_id.clone())
                .or_default()
                .push(score);
        }

        // Canonicalize per-key record order so downstream accumulation is
        // independent of input order.
        for prompt_ids in snapshot.prompts_by_author.values_mut() {
            prompt_ids.sort();
        }
        for feedbacks in snapshot.feedback_by_prompt.values_mut() {
            feedbacks.sort_by(|a, b| a.id.cmp(&b.id));
        }
        for feedbacks in snapshot.feedback_by_reviewer.values_mut() {
            feedbacks.sort_by(|a, b| a.id.cmp(&b.id));
        }
        for scores in snapshot.scores_by_prompt.values_mut() {
            scores.sort_by(|a, b| a.id.cmp(&b.id));
        }
        for response_ids in snapshot.responses_by_prompt.values_mut() {
            response_ids.sort();
        }

        debug!(
            users = snapshot.users.len(),
            prompt_sets = snapshot.prompt_sets.len(),
            prompts = snapshot.prompts.len(),
            warnings = warnings.len(),
            "snapshot built"
        );

        (snapshot, warnings)
    }

    #[must_use]
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    #[must_use]
    pub fn prompt_set(&self, id: &str) -> Option<&PromptSet> {
        self.prompt_sets.get(id)
    }

    pub fn prompt_sets(&self) -> impl Iterator<Item = &PromptSet> {
        self.prompt_sets.values()
    }

    #[must_use]
    pub fn prompt(&self, id: &str) -> Option<&Prompt> {
        self.prompts.get(id)
    }

    pub fn prompts(&self) -> impl Iterator<Item = &Prompt> {
        self.prompts.values()
    }

    /// Ids of prompts authored by `user_id`, sorted.
    #[must_use]
    pub fn prompts_by_author(&self, user_id: &str) -> &[String] {
        self.prompts_by_author
            .get(user_id)
            .map_or(&[], Vec::as_slice)
    }

    /// All feedback on one prompt, sorted by feedback id.
    #[must_use]
    pub fn feedback_for_prompt(&self, prompt_id: &str) -> &[Feedback] {
        self.feedback_by_prompt
            .get(prompt_id)
            .map_or(&[], Vec::as_slice)
    }

    /// All feedback left by one reviewer, sorted by feedback id.
    #[must_use]
    pub fn feedback_by_reviewer(&self, reviewer_id: &str) -> &[Feedback] {
        self.feedback_by_reviewer
            .get(reviewer_id)
            .map_or(&[], Vec::as_slice)
    }

    pub fn reviewers(&self) -> impl Iterator<Item = &str> {
        self.feedback_by_reviewer.keys().map(String::as_str)
    }

    /// All valid scores for one prompt, sorted by score id.
    #[must_use]
    pub fn scores_for_prompt(&self, prompt_id: &str) -> &[Score] {
        self.scores_by_prompt
            .get(prompt_id)
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn response(&self, id: &str) -> Option<&ModelResponse> {
        self.responses.get(id)
    }

    /// Ids of responses recorded for one prompt, sorted.
    #[must_use]
    pub fn responses_for_prompt(&self, prompt_id: &str) -> &[String] {
        self.responses_by_prompt
            .get(prompt_id)
            .map_or(&[], Vec::as_slice)
    }
}
