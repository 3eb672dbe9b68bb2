//! Core types for Compass: users, stance, triggers, intervention decisions

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// User identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Arc<str>);

impl UserId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Stance
// ---------------------------------------------------------------------------

pub const STANCE_SCHEMA_VERSION: u32 = 1;

/// One tunable dimension of a stance profile.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StanceField {
    Directness,
    InterventionDepth,
    Patience,
    EscalationThreshold,
    ReflectionLevel,
}

impl StanceField {
    pub fn all() -> &'static [StanceField] {
        &[
            StanceField::Directness,
            StanceField::InterventionDepth,
            StanceField::Patience,
            StanceField::EscalationThreshold,
            StanceField::ReflectionLevel,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StanceField::Directness => "directness",
            StanceField::InterventionDepth => "intervention_depth",
            StanceField::Patience => "patience",
            StanceField::EscalationThreshold => "escalation_threshold",
            StanceField::ReflectionLevel => "reflection_level",
        }
    }

    /// Inclusive `(min, max)` bounds.
    pub fn bounds(&self) -> (u8, u8) {
        match self {
            StanceField::EscalationThreshold => (1, 6),
            _ => (0, 10),
        }
    }

    pub fn default_value(&self) -> u8 {
        match self {
            StanceField::EscalationThreshold => 3,
            _ => 5,
        }
    }

    /// Clamp an arbitrary (possibly negative) target into bounds.
    pub fn clamp_value(&self, value: i32) -> u8 {
        let (lo, hi) = self.bounds();
        value.clamp(lo as i32, hi as i32) as u8
    }
}

impl std::fmt::Display for StanceField {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for StanceField {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StanceField::all()
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown stance field: {}", s))
    }
}

/// Per-user behavioral profile. Fields are private so every value stays
/// within its declared bounds; the only mutation path is [`StanceProfile::apply`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StanceProfileRepr")]
pub struct StanceProfile {
    directness: u8,
    intervention_depth: u8,
    patience: u8,
    escalation_threshold: u8,
    reflection_level: u8,
    version: u32,
}

#[derive(Deserialize)]
struct StanceProfileRepr {
    #[serde(default = "default_mid")]
    directness: u8,
    #[serde(default = "default_mid")]
    intervention_depth: u8,
    #[serde(default = "default_mid")]
    patience: u8,
    #[serde(default = "default_escalation")]
    escalation_threshold: u8,
    #[serde(default = "default_mid")]
    reflection_level: u8,
    #[serde(default = "default_version")]
    version: u32,
}

fn default_mid() -> u8 {
    5
}

fn default_escalation() -> u8 {
    StanceField::EscalationThreshold.default_value()
}

fn default_version() -> u32 {
    STANCE_SCHEMA_VERSION
}

impl From<StanceProfileRepr> for StanceProfile {
    fn from(r: StanceProfileRepr) -> Self {
        Self {
            directness: StanceField::Directness.clamp_value(r.directness as i32),
            intervention_depth: StanceField::InterventionDepth.clamp_value(r.intervention_depth as i32),
            patience: StanceField::Patience.clamp_value(r.patience as i32),
            escalation_threshold: StanceField::EscalationThreshold
                .clamp_value(r.escalation_threshold as i32),
            reflection_level: StanceField::ReflectionLevel.clamp_value(r.reflection_level as i32),
            version: r.version,
        }
    }
}

impl Default for StanceProfile {
    fn default() -> Self {
        Self {
            directness: StanceField::Directness.default_value(),
            intervention_depth: StanceField::InterventionDepth.default_value(),
            patience: StanceField::Patience.default_value(),
            escalation_threshold: StanceField::EscalationThreshold.default_value(),
            reflection_level: StanceField::ReflectionLevel.default_value(),
            version: STANCE_SCHEMA_VERSION,
        }
    }
}

impl StanceProfile {
    pub fn directness(&self) -> u8 {
        self.directness
    }
    pub fn intervention_depth(&self) -> u8 {
        self.intervention_depth
    }
    pub fn patience(&self) -> u8 {
        self.patience
    }
    pub fn escalation_threshold(&self) -> u8 {
        self.escalation_threshold
    }
    pub fn reflection_level(&self) -> u8 {
        self.reflection_level
    }
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn get(&self, field: StanceField) -> u8 {
        match field {
            StanceField::Directness => self.directness,
            StanceField::InterventionDepth => self.intervention_depth,
            StanceField::Patience => self.patience,
            StanceField::EscalationThreshold => self.escalation_threshold,
            StanceField::ReflectionLevel => self.reflection_level,
        }
    }

    /// Apply a patch, returning the new profile. Patch values are absolute
    /// targets, so applying the same patch twice is a no-op the second time.
    pub fn apply(&self, patch: &StancePatch) -> Self {
        let mut next = self.clone();
        for (field, value) in patch.entries() {
            let v = field.clamp_value(value as i32);
            match field {
                StanceField::Directness => next.directness = v,
                StanceField::InterventionDepth => next.intervention_depth = v,
                StanceField::Patience => next.patience = v,
                StanceField::EscalationThreshold => next.escalation_threshold = v,
                StanceField::ReflectionLevel => next.reflection_level = v,
            }
        }
        next
    }

    /// Whether applying the patch would change at least one field.
    pub fn would_change(&self, patch: &StancePatch) -> bool {
        patch
            .entries()
            .any(|(field, value)| field.clamp_value(value as i32) != self.get(field))
    }
}

/// Partial stance update. Each present field holds the absolute target value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StancePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention_depth: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patience: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_threshold: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_level: Option<u8>,
}

impl StancePatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    pub fn get(&self, field: StanceField) -> Option<u8> {
        match field {
            StanceField::Directness => self.directness,
            StanceField::InterventionDepth => self.intervention_depth,
            StanceField::Patience => self.patience,
            StanceField::EscalationThreshold => self.escalation_threshold,
            StanceField::ReflectionLevel => self.reflection_level,
        }
    }

    pub fn set(&mut self, field: StanceField, value: u8) {
        let slot = match field {
            StanceField::Directness => &mut self.directness,
            StanceField::InterventionDepth => &mut self.intervention_depth,
            StanceField::Patience => &mut self.patience,
            StanceField::EscalationThreshold => &mut self.escalation_threshold,
            StanceField::ReflectionLevel => &mut self.reflection_level,
        };
        *slot = Some(value);
    }

    /// Present fields in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (StanceField, u8)> + '_ {
        StanceField::all()
            .iter()
            .filter_map(move |f| self.get(*f).map(|v| (*f, v)))
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Deterministic linguistic signal detected in a message.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TriggerTag {
    Crisis,
    SelfDeprecation,
    Overwhelm,
    Avoidance,
    Rumination,
    AllOrNothing,
    ImpulsiveSpending,
    HelpRequest,
}

impl TriggerTag {
    pub fn name(&self) -> &'static str {
        match self {
            TriggerTag::Crisis => "crisis",
            TriggerTag::SelfDeprecation => "self_deprecation",
            TriggerTag::Overwhelm => "overwhelm",
            TriggerTag::Avoidance => "avoidance",
            TriggerTag::Rumination => "rumination",
            TriggerTag::AllOrNothing => "all_or_nothing",
            TriggerTag::ImpulsiveSpending => "impulsive_spending",
            TriggerTag::HelpRequest => "help_request",
        }
    }
}

impl std::fmt::Display for TriggerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, deduplicated set of triggers found in one message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResult {
    pub has_trigger: bool,
    pub triggers: Vec<TriggerTag>,
}

impl TriggerResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from tags in detection order; later duplicates are dropped.
    pub fn from_tags(tags: impl IntoIterator<Item = TriggerTag>) -> Self {
        let mut triggers = Vec::new();
        for tag in tags {
            if !triggers.contains(&tag) {
                triggers.push(tag);
            }
        }
        Self {
            has_trigger: !triggers.is_empty(),
            triggers,
        }
    }

    pub fn contains(&self, tag: TriggerTag) -> bool {
        self.triggers.contains(&tag)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Intervention
// ---------------------------------------------------------------------------

/// Ordered severity: `None < Low < Medium < High`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum InterventionLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl InterventionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionLevel::None => "none",
            InterventionLevel::Low => "low",
            InterventionLevel::Medium => "medium",
            InterventionLevel::High => "high",
        }
    }
}

impl std::fmt::Display for InterventionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What contributed to an intervention decision.
/// Serialized as `stance:<field>`, `trigger:<tag>` or `message:length`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ReasonCode {
    Stance(StanceField),
    Trigger(TriggerTag),
    MessageLength,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ReasonCode::Stance(field) => write!(f, "stance:{}", field),
            ReasonCode::Trigger(tag) => write!(f, "trigger:{}", tag),
            ReasonCode::MessageLength => f.write_str("message:length"),
        }
    }
}

impl From<ReasonCode> for String {
    fn from(code: ReasonCode) -> Self {
        code.to_string()
    }
}

impl TryFrom<String> for ReasonCode {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "message:length" {
            return Ok(ReasonCode::MessageLength);
        }
        if let Some(field) = s.strip_prefix("stance:") {
            return field.parse().map(ReasonCode::Stance);
        }
        if let Some(tag) = s.strip_prefix("trigger:") {
            let tag: TriggerTag = serde_json::from_value(serde_json::Value::String(tag.into()))
                .map_err(|_| format!("unknown trigger: {}", tag))?;
            return Ok(ReasonCode::Trigger(tag));
        }
        Err(format!("unknown reason code: {}", s))
    }
}

/// Output of the intervention policy. Fully determined by its inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterventionDecision {
    pub level: InterventionLevel,
    pub reason_codes: Vec<ReasonCode>,
    pub debug: serde_json::Value,
}
