//! Orchestration loop: one user turn per call.
//!
//! `Engine::run` drives the coordinator, capability invocation, and memory
//! application until the workflow completes or reaches a pause point that
//! needs fresh user input. Every failure is caught here and converted into a
//! response carrying the last good snapshot, so the conversation is always
//! resumable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::coordinator::decide;
use crate::core::decision::{DecisionType, SkillId, ToolId};
use crate::core::findings::{SearchRequest, parse_findings};
use crate::core::memory::{self, ActionResult, IngestLimits, Ingested, TrackingUpdate};
use crate::core::phase::{Phase, pause_after};
use crate::core::state::{AgentState, ChecklistSection};
use crate::error::EngineError;
use crate::io::config::EngineConfig;
use crate::io::executor::{SkillProvider, SkillRequest};
use crate::io::research::ResearchTool;
use crate::io::store::ChecklistStore;
use crate::skills::prompt::{PromptLimits, render_prompt};

/// Externally visible result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub phase: Phase,
    /// User-facing message for this turn.
    pub message: String,
    /// Checklist snapshot to surface alongside the message.
    pub sections: Vec<ChecklistSection>,
    pub complete: bool,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// New snapshot for the caller to persist and pass back next turn.
    pub state: AgentState,
}

/// The workflow engine, generic over its capability providers so tests can
/// script every external interaction.
pub struct Engine<S, R> {
    config: EngineConfig,
    skills: S,
    research: R,
}

impl<S: SkillProvider, R: ResearchTool> Engine<S, R> {
    pub fn new(config: EngineConfig, skills: S, research: R) -> Self {
        Self {
            config,
            skills,
            research,
        }
    }

    /// Process one user turn to completion or to its next pause point.
    #[instrument(skip_all, fields(thread = %self.config.thread_id))]
    pub fn run(&self, user_message: &str, prior: Option<AgentState>) -> AgentResponse {
        let message = user_message.trim();
        if message.is_empty() {
            let state = prior.unwrap_or_default();
            return self.failure_response(
                EngineError::Config {
                    reason: "user_message must be non-empty".to_string(),
                },
                state,
            );
        }

        let limits = IngestLimits {
            max_revisits: self.config.max_revisits,
            max_clarifications: self.config.max_clarifications,
        };
        let ingested = match prior {
            None => Ingested::Workflow(memory::initial_state(message, limits)),
            Some(prior_state) => match memory::ingest(&prior_state, message, limits) {
                Ok(ingested) => ingested,
                Err(err) => return self.failure_response(err, prior_state),
            },
        };

        let mut state = match ingested {
            Ingested::Tracking { state, update } => {
                self.persist_tracking(&state, &update);
                if update.open_items > 0 {
                    return self.tracking_response(state, &update);
                }
                // Last open item closed: fall through so the emission skill
                // produces the completion summary.
                state
            }
            Ingested::Workflow(state) => state,
        };

        // Generous backstop over the longest legal path (every loop-back
        // taken to its bound). Exceeding it means a routing bug, not work.
        let max_iterations = 16 * (1 + 2 * self.config.max_revisits as usize) + 8;
        let mut iterations = 0usize;

        loop {
            let decision = match decide(&state) {
                Ok(decision) => decision,
                Err(err) => return self.failure_response(err, state),
            };
            info!(phase = %state.workflow.phase, decision = ?decision.decision, "loop step");

            match decision.decision {
                DecisionType::Complete => break,
                DecisionType::RunSkill => {
                    let Some(skill) = decision.skill else {
                        return self.failure_response(
                            EngineError::InvalidPhase {
                                reason: "run-skill decision without a skill target".to_string(),
                            },
                            state,
                        );
                    };
                    let raw = match self.invoke_skill(skill, &state) {
                        Ok(raw) => raw,
                        Err(err) => return self.failure_response(err, state),
                    };
                    let output = match crate::skills::parse_output(skill, &raw) {
                        Ok(output) => output,
                        Err(err) => return self.failure_response(err, state),
                    };
                    state = match memory::apply(&state, &decision, ActionResult::Skill(output)) {
                        Ok(next) => next,
                        Err(err) => return self.failure_response(err, state),
                    };
                    if skill == SkillId::FinalizeChecklist {
                        self.persist_package(&state);
                    }
                }
                DecisionType::InvokeTool => {
                    let Some(tool) = decision.tool else {
                        return self.failure_response(
                            EngineError::InvalidPhase {
                                reason: "invoke-tool decision without a tool target".to_string(),
                            },
                            state,
                        );
                    };
                    let raw = match self.invoke_tool(tool, &state) {
                        Ok(raw) => raw,
                        Err(err) => return self.failure_response(err, state),
                    };
                    let findings = match parse_findings(tool, &raw) {
                        Ok(findings) => findings,
                        Err(err) => return self.failure_response(err, state),
                    };
                    state = match memory::apply(&state, &decision, ActionResult::Tool(findings)) {
                        Ok(next) => next,
                        Err(err) => return self.failure_response(err, state),
                    };
                }
            }

            if pause_after(
                state.workflow.phase,
                state.working.clarifications.pending(),
            ) {
                return self.clarification_response(state);
            }

            iterations += 1;
            if iterations >= max_iterations {
                return self.failure_response(
                    EngineError::InvalidPhase {
                        reason: format!("iteration backstop of {max_iterations} exceeded"),
                    },
                    state,
                );
            }
        }

        self.final_response(state)
    }

    /// Render the prompt and invoke the skill backend, retrying bounded
    /// capability faults once per configured retry.
    fn invoke_skill(&self, skill: SkillId, state: &AgentState) -> Result<Value, EngineError> {
        let limits = PromptLimits {
            history_budget_bytes: self.config.history_budget_bytes,
            max_clarifications: self.config.max_clarifications,
        };
        let request = SkillRequest {
            skill,
            prompt: render_prompt(skill, state, &limits),
            schema: skill.definition().schema,
            timeout: std::time::Duration::from_secs(self.config.skill_timeout_secs),
            output_limit_bytes: self.config.output_limit_bytes,
        };
        self.with_retries(|| self.skills.invoke(&request))
    }

    fn invoke_tool(&self, tool: ToolId, state: &AgentState) -> Result<Value, EngineError> {
        let ToolId::TavilySearch = tool;
        let request = SearchRequest::from_state(
            state,
            self.config.research.max_results,
            &self.config.research.search_depth,
        );
        self.with_retries(|| self.research.search(&request))
    }

    fn with_retries(
        &self,
        mut attempt: impl FnMut() -> Result<Value, EngineError>,
    ) -> Result<Value, EngineError> {
        let mut tries = 0u32;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && tries < self.config.capability_retries => {
                    tries += 1;
                    warn!(error = %err, retry = tries, "capability fault, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn persist_package(&self, state: &AgentState) {
        let Some(storage_dir) = self.config.storage_dir.as_deref() else {
            return;
        };
        let Some(package) = state.working.final_package.as_ref() else {
            return;
        };
        let store = ChecklistStore::new(storage_dir, &self.config.thread_id);
        if let Err(err) = store.write_package(package) {
            warn!(error = %err, "failed to persist checklist");
        }
    }

    fn persist_tracking(&self, state: &AgentState, update: &TrackingUpdate) {
        let Some(storage_dir) = self.config.storage_dir.as_deref() else {
            return;
        };
        let store = ChecklistStore::new(storage_dir, &self.config.thread_id);
        if let Some(package) = state.working.final_package.as_ref()
            && let Err(err) = store.write_package(package)
        {
            warn!(error = %err, "failed to persist tracked checklist");
        }
        if let Err(err) = store.append_tracking(update) {
            warn!(error = %err, "failed to append tracking log");
        }
    }

    /// The paused-for-clarifications response.
    fn clarification_response(&self, state: AgentState) -> AgentResponse {
        let mut message =
            String::from("Before I draft the checklist, a few clarifications:\n");
        for (idx, question) in state.working.clarifications.questions.iter().enumerate() {
            message.push_str(&format!("{}. {}\n", idx + 1, question));
        }
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "awaiting".to_string(),
            Value::String("clarifications".to_string()),
        );
        AgentResponse {
            phase: state.workflow.phase,
            message,
            sections: state.current_sections(),
            complete: false,
            metadata,
            state,
        }
    }

    /// Acknowledgement for a tracking update that left items open.
    fn tracking_response(&self, state: AgentState, update: &TrackingUpdate) -> AgentResponse {
        let verb = if update.completed {
            "complete"
        } else {
            "open again"
        };
        let message = format!(
            "Marked item {} as {}. {} of {} items remain open.",
            update.identifier, verb, update.open_items, update.total_items
        );
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "tracking".to_string(),
            Value::String(update.identifier.clone()),
        );
        AgentResponse {
            phase: state.workflow.phase,
            message,
            sections: state.current_sections(),
            complete: false,
            metadata,
            state,
        }
    }

    /// Completed-turn response, built from the emitted reply.
    fn final_response(&self, state: AgentState) -> AgentResponse {
        let Some(emitted) = state.working.emitted.clone() else {
            // Unreachable when the coordinator honors its contract; answer
            // with the best snapshot we have rather than failing the turn.
            return AgentResponse {
                phase: state.workflow.phase,
                message: "Checklist ready for review.".to_string(),
                sections: state.current_sections(),
                complete: true,
                metadata: fallback_metadata(),
                state,
            };
        };

        let mut message = emitted.message.clone();
        let completed = state
            .tracked_package()
            .map(|package| package.all_complete())
            .unwrap_or(false);
        if completed {
            let total = state
                .tracked_package()
                .map(|package| package.item_count())
                .unwrap_or_default();
            message.push_str(&format!("\n\nAll {total} checklist items are complete."));
        }
        message.push_str(&format!(
            "\n\nProgress log: {} steps recorded for this thread.",
            state.progress.len()
        ));

        let mut metadata = emitted.metadata.clone();
        metadata.insert(
            "progress_entries".to_string(),
            Value::Number(state.progress.len().into()),
        );
        AgentResponse {
            phase: emitted.phase,
            message,
            sections: emitted.sections.clone(),
            complete: true,
            metadata,
            state,
        }
    }

    /// Convert an engine failure into a resumable response carrying the last
    /// good snapshot, unchanged.
    fn failure_response(&self, err: EngineError, state: AgentState) -> AgentResponse {
        warn!(error = %err, phase = %state.workflow.phase, "turn failed");
        let message = match &err {
            EngineError::SkillOutput { .. }
            | EngineError::ToolOutput { .. }
            | EngineError::SkillTimeout { .. }
            | EngineError::ToolTimeout { .. }
            | EngineError::Capability { .. } => format!(
                "I hit a problem completing that step ({err}). Your progress is saved; please send the message again to retry."
            ),
            EngineError::StateTransition { reason, .. } => format!(
                "I could not advance the checklist: {reason}. Please add the missing detail and retry."
            ),
            EngineError::InvalidPhase { .. } => format!(
                "Internal error ({err}). The conversation state was left unchanged."
            ),
            EngineError::Config { reason } => format!("Invalid request: {reason}."),
        };
        let mut metadata = serde_json::Map::new();
        metadata.insert("error".to_string(), Value::String(err.to_string()));
        AgentResponse {
            phase: state.workflow.phase,
            message,
            sections: state.current_sections(),
            complete: false,
            metadata,
            state,
        }
    }
}

fn fallback_metadata() -> serde_json::Map<String, Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("fallback".to_string(), Value::Bool(true));
    metadata
}
