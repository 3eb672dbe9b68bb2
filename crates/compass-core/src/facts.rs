//! Fact types: candidates, persisted records, and the fixed scoring axis set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slot a fact competes for: `(domain, key, entity_id)`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactKey {
    pub domain: String,
    pub key: String,
    #[serde(default)]
    pub entity_id: String,
}

impl FactKey {
    pub fn new(domain: impl Into<String>, key: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl std::fmt::Display for FactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.entity_id.is_empty() {
            write!(f, "{}/{}", self.domain, self.key)
        } else {
            write!(f, "{}/{}#{}", self.domain, self.key, self.entity_id)
        }
    }
}

/// Where an observation came from.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
    SystemDerived,
    #[default]
    AssistantInferred,
    Document,
    UserStated,
}

impl FactSource {
    /// Ordinal reliability, 0..=3.
    pub fn reliability(&self) -> i64 {
        match self {
            FactSource::SystemDerived => 0,
            FactSource::AssistantInferred => 1,
            FactSource::Document => 2,
            FactSource::UserStated => 3,
        }
    }

    /// System and derived origins carry a scoring penalty.
    pub fn is_system_origin(&self) -> bool {
        matches!(self, FactSource::SystemDerived)
    }
}

/// How settled a value is.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Finality {
    #[default]
    Draft,
    Tentative,
    Confirmed,
    Final,
}

impl Finality {
    pub fn rank(&self) -> i64 {
        *self as i64
    }
}

/// A newly observed fact competing for a slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactCandidate {
    #[serde(flatten)]
    pub key: FactKey,
    #[serde(default)]
    pub raw_text: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: FactSource,
    #[serde(default)]
    pub finality: Finality,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub user_override: bool,
}

impl FactCandidate {
    pub fn new(key: FactKey, value: serde_json::Value, observed_at: DateTime<Utc>) -> Self {
        Self {
            key,
            raw_text: String::new(),
            value,
            tags: Vec::new(),
            source: FactSource::default(),
            finality: Finality::default(),
            observed_at,
            user_override: false,
        }
    }

    pub fn with_source(mut self, source: FactSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_finality(mut self, finality: Finality) -> Self {
        self.finality = finality;
        self
    }

    pub fn with_override(mut self) -> Self {
        self.user_override = true;
        self
    }

    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = text.into();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Supporting-evidence view of this candidate.
    pub fn evidence(&self) -> FactEvidence {
        FactEvidence {
            source: self.source,
            observed_at: self.observed_at,
            raw_text: self.raw_text.clone(),
        }
    }
}

/// One observation backing the active value of a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactEvidence {
    pub source: FactSource,
    pub observed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_text: String,
}

/// A value that used to be active for a slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupersededValue {
    pub value: serde_json::Value,
    pub source: FactSource,
    pub finality: Finality,
    pub observed_at: DateTime<Utc>,
    pub superseded_at: DateTime<Utc>,
}

/// Persisted winner for a slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    #[serde(flatten)]
    pub key: FactKey,
    pub value: serde_json::Value,
    pub source: FactSource,
    pub finality: Finality,
    pub observed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub user_override: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<FactEvidence>,
    #[serde(default)]
    pub history: Vec<SupersededValue>,
}

impl FactRecord {
    pub fn from_candidate(candidate: &FactCandidate, now: DateTime<Utc>) -> Self {
        Self {
            key: candidate.key.clone(),
            value: candidate.value.clone(),
            source: candidate.source,
            finality: candidate.finality,
            observed_at: candidate.observed_at,
            updated_at: now,
            user_override: candidate.user_override,
            tags: candidate.tags.clone(),
            evidence: vec![candidate.evidence()],
            history: Vec::new(),
        }
    }

    /// The record viewed as a contender in a new merge round. A value the
    /// user set explicitly keeps its override until the user overrides again.
    pub fn as_candidate(&self) -> FactCandidate {
        FactCandidate {
            key: self.key.clone(),
            raw_text: String::new(),
            value: self.value.clone(),
            tags: self.tags.clone(),
            source: self.source,
            finality: self.finality,
            observed_at: self.observed_at,
            user_override: self.user_override,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring axes
// ---------------------------------------------------------------------------

/// Value domain an axis is measured in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AxisDomain {
    Boolean,
    Ordinal { min: i64, max: i64 },
    Timestamp,
    Count,
    Percent,
}

/// The fixed axis set used to resolve fact conflicts.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScoreAxis {
    SourceReliability,
    Finality,
    Recency,
    UserOverride,
    SystemPenalty,
    ConsistencyHint,
    SpecificityHint,
    CompletenessHint,
}

impl ScoreAxis {
    pub fn all() -> &'static [ScoreAxis] {
        &[
            ScoreAxis::SourceReliability,
            ScoreAxis::Finality,
            ScoreAxis::Recency,
            ScoreAxis::UserOverride,
            ScoreAxis::SystemPenalty,
            ScoreAxis::ConsistencyHint,
            ScoreAxis::SpecificityHint,
            ScoreAxis::CompletenessHint,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScoreAxis::SourceReliability => "source_reliability",
            ScoreAxis::Finality => "finality",
            ScoreAxis::Recency => "recency",
            ScoreAxis::UserOverride => "user_override",
            ScoreAxis::SystemPenalty => "system_penalty",
            ScoreAxis::ConsistencyHint => "consistency_hint",
            ScoreAxis::SpecificityHint => "specificity_hint",
            ScoreAxis::CompletenessHint => "completeness_hint",
        }
    }

    pub fn domain(&self) -> AxisDomain {
        match self {
            ScoreAxis::SourceReliability => AxisDomain::Ordinal { min: 0, max: 3 },
            ScoreAxis::Finality => AxisDomain::Ordinal { min: 0, max: 3 },
            ScoreAxis::Recency => AxisDomain::Timestamp,
            ScoreAxis::UserOverride => AxisDomain::Boolean,
            ScoreAxis::SystemPenalty => AxisDomain::Ordinal { min: 0, max: 1 },
            ScoreAxis::ConsistencyHint => AxisDomain::Count,
            ScoreAxis::SpecificityHint => AxisDomain::Ordinal { min: 0, max: 3 },
            ScoreAxis::CompletenessHint => AxisDomain::Percent,
        }
    }

    /// Only `user_override` may decide a winner on its own.
    pub fn can_dominate(&self) -> bool {
        matches!(self, ScoreAxis::UserOverride)
    }
}

impl std::fmt::Display for ScoreAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
