//! Compass Engine - the per-turn decision pipeline

pub mod facts;
pub mod guardrail;
pub mod intervention;
pub mod learning;
pub mod orchestrator;
pub mod presence;
pub mod prompt;
pub mod sanitize;
pub mod triggers;

pub use facts::{
    merge_slot, score, select_winner, FactMerger, MergeDecision, MergeReport, ScoreVector,
    SlotFailure, AXIS_PRECEDENCE,
};
pub use guardrail::{enforce, evaluate, GuardOutcome, GuardResult, GuardRule, GuardViolation, FALLBACK_REPLY};
pub use intervention::{decide, InterventionRule, INTERVENTION_RULES, REFLECTION_MIN_CHARS};
pub use learning::{derive_patch, detect_feedback, FeedbackEvent, LearningEngine, LearningOutcome};
pub use orchestrator::{TurnEvaluation, TurnOrchestrator, TurnResponse};
pub use presence::{
    is_visible, latest_visible, latest_visible_within, suggestion_for, PresenceDecision,
    PresenceThrottle, SuppressReason,
};
pub use sanitize::sanitize;
pub use triggers::{detect_triggers, TRIGGER_RULES};
