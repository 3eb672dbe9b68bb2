//! Fact scoring and merging
//!
//! Every contender for a slot gets a score vector over the fixed axis set.
//! `user_override` narrows the field to overriding contenders, and a stored
//! override stops counting once a new candidate overrides. The rest of the
//! axes are compared in [`AXIS_PRECEDENCE`] order and the first strict
//! difference decides. A full tie keeps the earliest contender, and an
//! existing record always goes first, so ties reinforce instead of overwrite.

use chrono::{DateTime, Utc};
use compass_core::config::FactConfig;
use compass_core::{FactCandidate, FactKey, FactRecord, ScoreAxis, SupersededValue, UserId};
use compass_store::FactStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Tie-break order after the override filter. `SourceReliability` is
/// compared net of `SystemPenalty`.
pub const AXIS_PRECEDENCE: &[ScoreAxis] = &[
    ScoreAxis::Finality,
    ScoreAxis::Recency,
    ScoreAxis::SourceReliability,
    ScoreAxis::SpecificityHint,
    ScoreAxis::CompletenessHint,
    ScoreAxis::ConsistencyHint,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreVector {
    pub source_reliability: i64,
    pub finality: i64,
    /// Milliseconds since the epoch.
    pub recency: i64,
    pub user_override: bool,
    pub system_penalty: i64,
    pub consistency_hint: i64,
    pub specificity_hint: i64,
    pub completeness_hint: i64,
}

impl ScoreVector {
    pub fn get(&self, axis: ScoreAxis) -> i64 {
        match axis {
            ScoreAxis::SourceReliability => self.source_reliability,
            ScoreAxis::Finality => self.finality,
            ScoreAxis::Recency => self.recency,
            ScoreAxis::UserOverride => self.user_override as i64,
            ScoreAxis::SystemPenalty => self.system_penalty,
            ScoreAxis::ConsistencyHint => self.consistency_hint,
            ScoreAxis::SpecificityHint => self.specificity_hint,
            ScoreAxis::CompletenessHint => self.completeness_hint,
        }
    }

    fn precedence_value(&self, axis: ScoreAxis) -> i64 {
        match axis {
            ScoreAxis::SourceReliability => self.source_reliability - self.system_penalty,
            other => self.get(other),
        }
    }

    /// Compare along [`AXIS_PRECEDENCE`]; `Equal` means a full tie.
    pub fn cascade_cmp(&self, other: &ScoreVector) -> Ordering {
        AXIS_PRECEDENCE
            .iter()
            .map(|axis| self.precedence_value(*axis).cmp(&other.precedence_value(*axis)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// How precise a value is, 0..=3.
pub fn specificity(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 3,
        Value::String(s) if s.trim().is_empty() => 0,
        Value::String(s) if s.chars().any(|c| c.is_ascii_digit()) => 3,
        Value::String(_) => 2,
        Value::Array(items) if items.is_empty() => 0,
        Value::Object(fields) if fields.is_empty() => 0,
        Value::Array(_) | Value::Object(_) => 2,
    }
}

/// Share of optional candidate fields that are filled, 0..=100.
pub fn completeness(candidate: &FactCandidate) -> i64 {
    let filled = [
        specificity(&candidate.value) > 0,
        !candidate.raw_text.is_empty(),
        !candidate.tags.is_empty(),
        !candidate.key.entity_id.is_empty(),
    ];
    (filled.iter().filter(|f| **f).count() as i64) * 25
}

/// Score `candidate` among `contenders` (which include the candidate itself).
pub fn score(candidate: &FactCandidate, contenders: &[FactCandidate]) -> ScoreVector {
    let same_value = contenders.iter().filter(|c| c.value == candidate.value).count();
    ScoreVector {
        source_reliability: candidate.source.reliability(),
        finality: candidate.finality.rank(),
        recency: candidate.observed_at.timestamp_millis(),
        user_override: candidate.user_override,
        system_penalty: candidate.source.is_system_origin() as i64,
        consistency_hint: same_value.saturating_sub(1) as i64,
        specificity_hint: specificity(&candidate.value),
        completeness_hint: completeness(candidate),
    }
}

/// Index of the winning contender, `None` only for an empty slice.
pub fn select_winner(contenders: &[FactCandidate]) -> Option<usize> {
    let scores: Vec<ScoreVector> = contenders.iter().map(|c| score(c, contenders)).collect();
    let any_override = scores.iter().any(|s| s.user_override);

    let mut best: Option<usize> = None;
    for (idx, s) in scores.iter().enumerate() {
        if any_override && !s.user_override {
            continue;
        }
        best = match best {
            Some(b) if s.cascade_cmp(&scores[b]) != Ordering::Greater => Some(b),
            _ => Some(idx),
        };
    }
    best
}

/// Outcome for one slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeDecision {
    /// No prior record; the winner becomes the record.
    Created { record: FactRecord, losers: Vec<FactCandidate> },
    /// The prior value won or tied; matching candidates and fully tied rivals
    /// were attached as evidence.
    Reinforced { record: FactRecord, attached: usize, losers: Vec<FactCandidate> },
    /// A different value won; the prior value moved into history.
    Replaced { record: FactRecord, previous: Value, losers: Vec<FactCandidate> },
}

impl MergeDecision {
    pub fn record(&self) -> &FactRecord {
        match self {
            MergeDecision::Created { record, .. }
            | MergeDecision::Reinforced { record, .. }
            | MergeDecision::Replaced { record, .. } => record,
        }
    }

    pub fn losers(&self) -> &[FactCandidate] {
        match self {
            MergeDecision::Created { losers, .. }
            | MergeDecision::Reinforced { losers, .. }
            | MergeDecision::Replaced { losers, .. } => losers,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MergeDecision::Created { .. } => "created",
            MergeDecision::Reinforced { .. } => "reinforced",
            MergeDecision::Replaced { .. } => "replaced",
        }
    }
}

fn push_bounded<T>(items: &mut Vec<T>, item: T, max: usize) {
    items.push(item);
    if items.len() > max {
        let excess = items.len() - max;
        items.drain(..excess);
    }
}

/// Decide one slot. `None` when there are no candidates.
pub fn merge_slot(
    existing: Option<&FactRecord>,
    candidates: &[FactCandidate],
    now: DateTime<Utc>,
    limits: &FactConfig,
) -> Option<MergeDecision> {
    if candidates.is_empty() {
        return None;
    }

    let overriding = candidates.iter().any(|c| c.user_override);
    let mut contenders: Vec<FactCandidate> = Vec::with_capacity(candidates.len() + 1);
    if let Some(record) = existing {
        let mut prior = record.as_candidate();
        // A fresh correction outranks an older one.
        prior.user_override &= !overriding;
        contenders.push(prior);
    }
    contenders.extend(candidates.iter().cloned());

    let winner_idx = select_winner(&contenders)?;
    let winner = contenders[winner_idx].clone();
    let (same, rest): (Vec<&FactCandidate>, Vec<&FactCandidate>) =
        candidates.iter().partition(|c| c.value == winner.value);

    let decision = match existing {
        Some(prior) if prior.value == winner.value => {
            // Rivals in a full tie with the kept value back it up as evidence.
            let kept = score(&contenders[winner_idx], &contenders);
            let (tied, losers): (Vec<&FactCandidate>, Vec<&FactCandidate>) = rest.into_iter().partition(|c| {
                let s = score(c, &contenders);
                s.user_override == kept.user_override && s.cascade_cmp(&kept) == Ordering::Equal
            });
            let losers: Vec<FactCandidate> = losers.into_iter().cloned().collect();

            let mut record = prior.clone();
            for c in &same {
                push_bounded(&mut record.evidence, c.evidence(), limits.max_evidence);
                record.finality = record.finality.max(c.finality);
                record.user_override |= c.user_override;
                for tag in &c.tags {
                    if !record.tags.contains(tag) {
                        record.tags.push(tag.clone());
                    }
                }
            }
            for c in &tied {
                push_bounded(&mut record.evidence, c.evidence(), limits.max_evidence);
            }
            record.updated_at = now;
            MergeDecision::Reinforced {
                record,
                attached: same.len() + tied.len(),
                losers,
            }
        }
        Some(prior) => {
            let losers: Vec<FactCandidate> = rest.into_iter().cloned().collect();
            let mut record = FactRecord::from_candidate(&winner, now);
            record.evidence.clear();
            for c in &same {
                push_bounded(&mut record.evidence, c.evidence(), limits.max_evidence);
            }
            record.history = prior.history.clone();
            push_bounded(
                &mut record.history,
                SupersededValue {
                    value: prior.value.clone(),
                    source: prior.source,
                    finality: prior.finality,
                    observed_at: prior.observed_at,
                    superseded_at: now,
                },
                limits.max_history,
            );
            MergeDecision::Replaced { record, previous: prior.value.clone(), losers }
        }
        None => {
            let losers: Vec<FactCandidate> = rest.into_iter().cloned().collect();
            let mut record = FactRecord::from_candidate(&winner, now);
            record.evidence.clear();
            for c in &same {
                push_bounded(&mut record.evidence, c.evidence(), limits.max_evidence);
            }
            MergeDecision::Created { record, losers }
        }
    };
    Some(decision)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotFailure {
    pub key: FactKey,
    pub error: String,
}

/// Result of merging one turn's candidates. Failed slots do not stop the others.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub decisions: Vec<MergeDecision>,
    pub failures: Vec<SlotFailure>,
}

impl MergeReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &FactRecord> {
        self.decisions.iter().map(|d| d.record())
    }
}

pub struct FactMerger {
    limits: FactConfig,
}

impl Default for FactMerger {
    fn default() -> Self {
        Self::new(FactConfig::default())
    }
}

impl FactMerger {
    pub fn new(limits: FactConfig) -> Self {
        Self { limits }
    }

    /// Group candidates by slot, decide each against the prior records and
    /// persist the winners.
    pub async fn merge_turn<S: FactStore + ?Sized>(
        &self,
        store: &S,
        user: &UserId,
        prior: &[FactRecord],
        candidates: Vec<FactCandidate>,
        now: DateTime<Utc>,
    ) -> MergeReport {
        let mut slots: BTreeMap<FactKey, Vec<FactCandidate>> = BTreeMap::new();
        for c in candidates {
            slots.entry(c.key.clone()).or_default().push(c);
        }

        let mut report = MergeReport::default();
        for (key, group) in slots {
            let existing = prior.iter().find(|r| r.key == key);
            let Some(decision) = merge_slot(existing, &group, now, &self.limits) else {
                continue;
            };

            for loser in decision.losers() {
                debug!(user = %user, slot = %key, value = %loser.value, "fact candidate lost");
            }

            if let Err(e) = store.put_fact(user, decision.record().clone()).await {
                warn!(user = %user, slot = %key, "fact write failed: {}", e);
                report.failures.push(SlotFailure { key, error: e.to_string() });
                continue;
            }

            match &decision {
                MergeDecision::Reinforced { attached, .. } => {
                    debug!(user = %user, slot = %key, attached, "fact reinforced")
                }
                other => info!(user = %user, slot = %key, value = %other.record().value, "fact {}", other.kind()),
            }
            report.decisions.push(decision);
        }
        report
    }
}
