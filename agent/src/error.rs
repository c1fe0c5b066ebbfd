//! Failure taxonomy for the workflow engine.
//!
//! Every failure is caught at the orchestration-loop boundary and converted
//! into a user-visible response with the prior state unchanged; none of these
//! propagate as uncaught faults to the caller.

use thiserror::Error;

use crate::core::decision::{SkillId, ToolId};
use crate::core::phase::Phase;

/// The unified error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// State carried a phase/field combination outside the legal machine.
    /// Fatal-class: unreachable under correct memory behavior.
    #[error("invalid phase state: {reason}")]
    InvalidPhase { reason: String },

    /// A skill returned data that violates its declared output schema.
    #[error("skill '{skill}' returned invalid output: {reason}")]
    SkillOutput { skill: SkillId, reason: String },

    /// A tool returned data that violates the findings schema.
    #[error("tool '{tool}' returned invalid output: {reason}")]
    ToolOutput { tool: ToolId, reason: String },

    /// A skill invocation exceeded its deadline.
    #[error("skill '{skill}' timed out after {timeout_secs}s")]
    SkillTimeout { skill: SkillId, timeout_secs: u64 },

    /// A tool invocation exceeded its deadline.
    #[error("tool '{tool}' timed out after {timeout_secs}s")]
    ToolTimeout { tool: ToolId, timeout_secs: u64 },

    /// A capability could not be reached at all (spawn or transport fault).
    /// Recovered like a timeout: retry, then surface.
    #[error("capability '{name}' failed: {cause}")]
    Capability { name: String, cause: anyhow::Error },

    /// A result does not satisfy the entry invariant of the target phase.
    #[error("cannot leave phase '{phase}': {reason}")]
    StateTransition { phase: Phase, reason: String },

    /// Invalid runtime configuration or invocation input.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl EngineError {
    /// True for failures worth one more attempt before surfacing.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::SkillTimeout { .. }
                | EngineError::ToolTimeout { .. }
                | EngineError::Capability { .. }
        )
    }
}
