//! Turn orchestrator - one message in, one reply out
//!
//! Order per turn: triggers, learning, intervention, completion, sanitation,
//! guardrail, fact merge, presence. Only validation and the completion call
//! can fail the turn; every other side effect reports its own failure.

use crate::facts::{FactMerger, MergeReport, SlotFailure};
use crate::guardrail::{enforce, GuardResult};
use crate::intervention::decide;
use crate::learning::{LearningEngine, LearningOutcome};
use crate::presence::{suggestion_for, PresenceDecision, PresenceThrottle};
use crate::prompt::build_request;
use crate::sanitize::sanitize;
use crate::triggers::detect_triggers;
use chrono::{DateTime, Utc};
use compass_core::config::SanitizeConfig;
use compass_core::{
    CompassConfig, CompletionReply, Error, FactRecord, InterventionDecision, Result, StancePatch,
    StanceProfile, TriggerResult, TurnRequest, UserId,
};
use compass_llm::CompletionService;
use compass_store::Store;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Every sub-result of one turn, independently inspectable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnEvaluation {
    pub triggers: TriggerResult,
    pub learning: LearningOutcome,
    pub intervention: InterventionDecision,
    pub guard: GuardResult,
    /// Sanitized and enforced reply.
    pub reply: CompletionReply,
    pub merged_facts: MergeReport,
    pub presence: PresenceDecision,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub user_id: UserId,
    pub reply: String,
    pub evaluation: TurnEvaluation,
}

pub struct TurnOrchestrator {
    store: Arc<dyn Store>,
    completion: Arc<dyn CompletionService>,
    learning: LearningEngine,
    merger: FactMerger,
    throttle: PresenceThrottle,
    sanitize: SanitizeConfig,
}

impl TurnOrchestrator {
    pub fn new(store: Arc<dyn Store>, completion: Arc<dyn CompletionService>, config: &CompassConfig) -> Self {
        Self {
            store,
            completion,
            learning: LearningEngine::new(config.stance.step),
            merger: FactMerger::new(config.facts.clone()),
            throttle: PresenceThrottle::new(&config.presence),
            sanitize: config.sanitize.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Validate, load state, evaluate.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnResponse> {
        request.validate()?;
        let user = request.user();
        let stance = self.load_or_create_stance(&user).await;

        let evaluation = match self.store.load_facts(&user).await {
            Ok(prior) => {
                self.evaluate(&user, &request.message, stance, Ok(&prior), Utc::now())
                    .await?
            }
            Err(e) => {
                warn!(user = %user, "fact load failed, merge skipped: {}", e);
                let reason = e.to_string();
                self.evaluate(&user, &request.message, stance, Err(&reason), Utc::now())
                    .await?
            }
        };

        Ok(TurnResponse {
            user_id: user,
            reply: evaluation.reply.text.clone(),
            evaluation,
        })
    }

    /// Run the pipeline with an already loaded stance and fact set.
    pub async fn evaluate_turn(
        &self,
        user: &UserId,
        message: &str,
        stance: StanceProfile,
        prior_facts: &[FactRecord],
    ) -> Result<TurnEvaluation> {
        self.evaluate(user, message, stance, Ok(prior_facts), Utc::now()).await
    }

    /// [`Self::evaluate_turn`] at a fixed clock.
    pub async fn evaluate_turn_at(
        &self,
        user: &UserId,
        message: &str,
        stance: StanceProfile,
        prior_facts: &[FactRecord],
        now: DateTime<Utc>,
    ) -> Result<TurnEvaluation> {
        self.evaluate(user, message, stance, Ok(prior_facts), now).await
    }

    async fn load_or_create_stance(&self, user: &UserId) -> StanceProfile {
        match self.store.load_stance(user).await {
            Ok(Some(stance)) => stance,
            Ok(None) => match self.store.merge_stance(user, &StancePatch::empty()).await {
                Ok(created) => {
                    info!(user = %user, "stance profile created");
                    created
                }
                Err(e) => {
                    warn!(user = %user, "stance create failed, using defaults: {}", e);
                    StanceProfile::default()
                }
            },
            Err(e) => {
                warn!(user = %user, "stance load failed, using defaults: {}", e);
                StanceProfile::default()
            }
        }
    }

    async fn evaluate(
        &self,
        user: &UserId,
        message: &str,
        stance: StanceProfile,
        prior_facts: std::result::Result<&[FactRecord], &str>,
        now: DateTime<Utc>,
    ) -> Result<TurnEvaluation> {
        let store = &*self.store;

        let triggers = detect_triggers(message);
        let learning = self.learning.observe(store, user, message, &stance).await;
        let stance = learning.profile.clone();

        let intervention = decide(message, &stance, &triggers);
        debug!(
            user = %user,
            level = %intervention.level,
            triggers = triggers.len(),
            rule = %intervention.debug["rule"],
            "intervention decided"
        );

        let facts_for_prompt = prior_facts.unwrap_or(&[]);
        let request = build_request(message, &stance, &triggers, &intervention, facts_for_prompt);
        let raw = self
            .completion
            .complete(request)
            .await
            .map_err(Error::from)?;

        let outcome = enforce(sanitize(raw, &self.sanitize, now));
        let reply = outcome.reply;
        let guard = outcome.result;

        let merged_facts = match prior_facts {
            Ok(prior) => {
                self.merger
                    .merge_turn(store, user, prior, reply.new_facts.clone(), now)
                    .await
            }
            Err(reason) => unavailable_report(&reply, reason),
        };

        // A blocked reply cancels every side effect, derived ones included.
        let suggestion = if guard.ok {
            suggestion_for(&reply, &triggers)
        } else {
            None
        };
        let presence = self.throttle.decide(store, user, suggestion.as_ref(), now).await;

        Ok(TurnEvaluation {
            triggers,
            learning,
            intervention,
            guard,
            reply,
            merged_facts,
            presence,
        })
    }
}

fn unavailable_report(reply: &CompletionReply, reason: &str) -> MergeReport {
    let keys: BTreeSet<_> = reply.new_facts.iter().map(|c| c.key.clone()).collect();
    MergeReport {
        decisions: Vec::new(),
        failures: keys
            .into_iter()
            .map(|key| SlotFailure {
                key,
                error: format!("prior facts unavailable: {}", reason),
            })
            .collect(),
    }
}
