//! Deterministic next-action selection.
//!
//! `decide` is a pure function of the state snapshot: no I/O, no hidden
//! inputs, so every routing decision is reproducible after the fact from the
//! persisted state alone.

use crate::core::decision::{Decision, SkillId, ToolId};
use crate::core::phase::Phase;
use crate::core::state::AgentState;
use crate::error::EngineError;

/// Select the next unit of work for `state`.
///
/// Branch phases do not branch here: `decide` names the skill for the phase,
/// and the *result* of that skill (research flag, judge verdict, gap route)
/// is consumed by the memory manager to pick the next phase, which the next
/// `decide` call then sees.
pub fn decide(state: &AgentState) -> Result<Decision, EngineError> {
    match state.workflow.phase {
        Phase::WaitingForTaskInput => {
            if state.working.emitted.is_some() {
                return Ok(Decision::complete("Checklist emitted; workflow finished."));
            }
            if state.working.task_input.is_some() {
                return Ok(Decision::skill(
                    SkillId::ParseTask,
                    "Parse the freshly provided task input.",
                ));
            }
            Err(EngineError::InvalidPhase {
                reason: "waiting for task input with neither pending input nor emitted reply"
                    .to_string(),
            })
        }
        Phase::ParsingTask => Ok(Decision::skill(
            SkillId::ParseTask,
            "Structure the incoming task description.",
        )),
        Phase::ScopingAndAssumptions => Ok(Decision::skill(
            SkillId::ScopeAndAssume,
            "Capture assumptions, scope, and open clarifications.",
        )),
        Phase::DecidingResearch => Ok(Decision::skill(
            SkillId::DecideResearch,
            "Decide whether external research is required.",
        )),
        Phase::WebResearch => Ok(Decision::tool(
            ToolId::TavilySearch,
            "Run the web search to gather sources.",
        )),
        Phase::SourceSelection => Ok(Decision::skill(
            SkillId::SourceSelection,
            "Select the most credible sources.",
        )),
        Phase::ExtractingSignals => Ok(Decision::skill(
            SkillId::ExtractSignals,
            "Extract actionable signals from sources.",
        )),
        Phase::IntegratingFindings => Ok(Decision::skill(
            SkillId::IntegrateFindings,
            "Convert signals into checklist implications.",
        )),
        Phase::OutlineChecklistSkeleton => Ok(Decision::skill(
            SkillId::OutlineSkeleton,
            "Build the checklist skeleton.",
        )),
        Phase::DraftingChecklist => Ok(Decision::skill(
            SkillId::DraftChecklist,
            "Draft checklist items per section.",
        )),
        Phase::DeepeningChecklist => Ok(Decision::skill(
            SkillId::DeepenChecklist,
            "Deepen each checklist item with sub-steps.",
        )),
        Phase::NormalizingChecklist => Ok(Decision::skill(
            SkillId::NormalizeChecklist,
            "Normalize the checklist for consistency.",
        )),
        Phase::SelfJudge => Ok(Decision::skill(
            SkillId::SelfJudge,
            "Score the checklist against the rubric.",
        )),
        Phase::GapAnalysis => Ok(Decision::skill(
            SkillId::GapAnalysis,
            "Route remediation based on the quality gap.",
        )),
        Phase::FinalizingChecklist => Ok(Decision::skill(
            SkillId::FinalizeChecklist,
            "Lock the final checklist package.",
        )),
        Phase::EmittingChecklist => Ok(Decision::skill(
            SkillId::EmitChecklist,
            "Explain the finalized checklist to the user.",
        )),
    }
}
