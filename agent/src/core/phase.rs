//! Workflow phases and the legal transition graph.
//!
//! The workflow is a linear backbone with two branch points: the research
//! decision (skip or take the research arm) and the quality gap (loop back to
//! research or deepening, or advance to finalization). Every transition is an
//! explicit `(phase, route)` pair; there is no default edge.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

/// One step of the checklist workflow. Exactly one phase is active per state
/// snapshot, and it only changes through [`next_phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WaitingForTaskInput,
    ParsingTask,
    ScopingAndAssumptions,
    DecidingResearch,
    WebResearch,
    SourceSelection,
    ExtractingSignals,
    IntegratingFindings,
    OutlineChecklistSkeleton,
    DraftingChecklist,
    DeepeningChecklist,
    NormalizingChecklist,
    SelfJudge,
    GapAnalysis,
    FinalizingChecklist,
    EmittingChecklist,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::WaitingForTaskInput => "waiting_for_task_input",
            Phase::ParsingTask => "parsing_task",
            Phase::ScopingAndAssumptions => "scoping_and_assumptions",
            Phase::DecidingResearch => "deciding_research",
            Phase::WebResearch => "web_research",
            Phase::SourceSelection => "source_selection",
            Phase::ExtractingSignals => "extracting_signals",
            Phase::IntegratingFindings => "integrating_findings",
            Phase::OutlineChecklistSkeleton => "outline_checklist_skeleton",
            Phase::DraftingChecklist => "drafting_checklist",
            Phase::DeepeningChecklist => "deepening_checklist",
            Phase::NormalizingChecklist => "normalizing_checklist",
            Phase::SelfJudge => "self_judge",
            Phase::GapAnalysis => "gap_analysis",
            Phase::FinalizingChecklist => "finalizing_checklist",
            Phase::EmittingChecklist => "emitting_checklist",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation verdict produced by the gap-analysis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapRoute {
    NeedsResearch,
    NeedsDepth,
    Ready,
}

impl GapRoute {
    pub fn as_str(self) -> &'static str {
        match self {
            GapRoute::NeedsResearch => "needs_research",
            GapRoute::NeedsDepth => "needs_depth",
            GapRoute::Ready => "ready",
        }
    }
}

/// Routing hint extracted from a step's result, consumed by [`next_phase`].
///
/// `Linear` is the only hint accepted by single-successor phases. The two
/// branch points require their dedicated hint; supplying the wrong hint is a
/// transition error, never silently coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteHint {
    Linear,
    Research { needed: bool },
    Judge { threshold_met: bool },
    Gap(GapRoute),
}

/// Resolve the single legal successor of `phase` under `route`.
pub fn next_phase(phase: Phase, route: RouteHint) -> Result<Phase, EngineError> {
    match (phase, route) {
        (Phase::WaitingForTaskInput, RouteHint::Linear) => Ok(Phase::ParsingTask),
        (Phase::ParsingTask, RouteHint::Linear) => Ok(Phase::ScopingAndAssumptions),
        (Phase::ScopingAndAssumptions, RouteHint::Linear) => Ok(Phase::DecidingResearch),
        (Phase::DecidingResearch, RouteHint::Research { needed: true }) => Ok(Phase::WebResearch),
        // Skipping research skips the whole research arm, not just the search.
        (Phase::DecidingResearch, RouteHint::Research { needed: false }) => {
            Ok(Phase::OutlineChecklistSkeleton)
        }
        (Phase::WebResearch, RouteHint::Linear) => Ok(Phase::SourceSelection),
        (Phase::SourceSelection, RouteHint::Linear) => Ok(Phase::ExtractingSignals),
        (Phase::ExtractingSignals, RouteHint::Linear) => Ok(Phase::IntegratingFindings),
        (Phase::IntegratingFindings, RouteHint::Linear) => Ok(Phase::OutlineChecklistSkeleton),
        (Phase::OutlineChecklistSkeleton, RouteHint::Linear) => Ok(Phase::DraftingChecklist),
        (Phase::DraftingChecklist, RouteHint::Linear) => Ok(Phase::DeepeningChecklist),
        (Phase::DeepeningChecklist, RouteHint::Linear) => Ok(Phase::NormalizingChecklist),
        (Phase::NormalizingChecklist, RouteHint::Linear) => Ok(Phase::SelfJudge),
        (Phase::SelfJudge, RouteHint::Judge { threshold_met: true }) => {
            Ok(Phase::FinalizingChecklist)
        }
        (Phase::SelfJudge, RouteHint::Judge { threshold_met: false }) => Ok(Phase::GapAnalysis),
        (Phase::GapAnalysis, RouteHint::Gap(GapRoute::NeedsResearch)) => {
            Ok(Phase::DecidingResearch)
        }
        (Phase::GapAnalysis, RouteHint::Gap(GapRoute::NeedsDepth)) => Ok(Phase::DeepeningChecklist),
        (Phase::GapAnalysis, RouteHint::Gap(GapRoute::Ready)) => Ok(Phase::FinalizingChecklist),
        (Phase::FinalizingChecklist, RouteHint::Linear) => Ok(Phase::EmittingChecklist),
        // The workflow is cyclic at the top: emission re-arms the intake.
        (Phase::EmittingChecklist, RouteHint::Linear) => Ok(Phase::WaitingForTaskInput),
        (phase, _) => Err(EngineError::StateTransition {
            phase,
            reason: "route hint does not match any legal edge for this phase".to_string(),
        }),
    }
}

/// Whether the loop must hand control back to the user after entering `phase`.
///
/// The policy is listed per phase on purpose: pauses are part of the
/// contract, not an emergent property of whichever skill ran last.
pub fn pause_after(phase: Phase, clarifications_pending: bool) -> bool {
    match phase {
        Phase::DecidingResearch => clarifications_pending,
        Phase::WaitingForTaskInput
        | Phase::ParsingTask
        | Phase::ScopingAndAssumptions
        | Phase::WebResearch
        | Phase::SourceSelection
        | Phase::ExtractingSignals
        | Phase::IntegratingFindings
        | Phase::OutlineChecklistSkeleton
        | Phase::DraftingChecklist
        | Phase::DeepeningChecklist
        | Phase::NormalizingChecklist
        | Phase::SelfJudge
        | Phase::GapAnalysis
        | Phase::FinalizingChecklist
        | Phase::EmittingChecklist => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR_EDGES: &[(Phase, Phase)] = &[
        (Phase::WaitingForTaskInput, Phase::ParsingTask),
        (Phase::ParsingTask, Phase::ScopingAndAssumptions),
        (Phase::ScopingAndAssumptions, Phase::DecidingResearch),
        (Phase::WebResearch, Phase::SourceSelection),
        (Phase::SourceSelection, Phase::ExtractingSignals),
        (Phase::ExtractingSignals, Phase::IntegratingFindings),
        (Phase::IntegratingFindings, Phase::OutlineChecklistSkeleton),
        (Phase::OutlineChecklistSkeleton, Phase::DraftingChecklist),
        (Phase::DraftingChecklist, Phase::DeepeningChecklist),
        (Phase::DeepeningChecklist, Phase::NormalizingChecklist),
        (Phase::NormalizingChecklist, Phase::SelfJudge),
        (Phase::FinalizingChecklist, Phase::EmittingChecklist),
        (Phase::EmittingChecklist, Phase::WaitingForTaskInput),
    ];

    #[test]
    fn linear_backbone_is_deterministic() {
        for (from, to) in LINEAR_EDGES {
            assert_eq!(next_phase(*from, RouteHint::Linear).expect("edge"), *to);
        }
    }

    #[test]
    fn research_branch_takes_or_skips_the_whole_arm() {
        assert_eq!(
            next_phase(Phase::DecidingResearch, RouteHint::Research { needed: true })
                .expect("taken"),
            Phase::WebResearch
        );
        assert_eq!(
            next_phase(Phase::DecidingResearch, RouteHint::Research { needed: false })
                .expect("skipped"),
            Phase::OutlineChecklistSkeleton
        );
    }

    #[test]
    fn gap_routes_resolve_each_to_one_phase() {
        assert_eq!(
            next_phase(Phase::GapAnalysis, RouteHint::Gap(GapRoute::NeedsResearch)).expect("edge"),
            Phase::DecidingResearch
        );
        assert_eq!(
            next_phase(Phase::GapAnalysis, RouteHint::Gap(GapRoute::NeedsDepth)).expect("edge"),
            Phase::DeepeningChecklist
        );
        assert_eq!(
            next_phase(Phase::GapAnalysis, RouteHint::Gap(GapRoute::Ready)).expect("edge"),
            Phase::FinalizingChecklist
        );
    }

    /// Wrong hint for a branch phase is rejected rather than coerced.
    #[test]
    fn mismatched_route_hint_is_an_error() {
        let err = next_phase(Phase::DecidingResearch, RouteHint::Linear).expect_err("no edge");
        assert!(err.to_string().contains("deciding_research"));
        next_phase(Phase::ParsingTask, RouteHint::Gap(GapRoute::Ready)).expect_err("no edge");
    }

    #[test]
    fn only_the_clarification_pause_depends_on_state() {
        assert!(pause_after(Phase::DecidingResearch, true));
        assert!(!pause_after(Phase::DecidingResearch, false));
        assert!(!pause_after(Phase::DraftingChecklist, true));
    }
}
