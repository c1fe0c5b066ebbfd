//! Coordinator decisions and the closed capability registries.
//!
//! Skills and tools are tagged enums, not open-ended lookups: every
//! capability the coordinator can name exists at compile time, and dispatch
//! goes through one typed invocation path per kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Registered skill identifiers, one per structured-output capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    ParseTask,
    ScopeAndAssume,
    DecideResearch,
    SourceSelection,
    ExtractSignals,
    IntegrateFindings,
    OutlineSkeleton,
    DraftChecklist,
    DeepenChecklist,
    NormalizeChecklist,
    SelfJudge,
    GapAnalysis,
    FinalizeChecklist,
    EmitChecklist,
}

impl SkillId {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillId::ParseTask => "parse_task",
            SkillId::ScopeAndAssume => "scope_and_assume",
            SkillId::DecideResearch => "decide_research",
            SkillId::SourceSelection => "source_selection",
            SkillId::ExtractSignals => "extract_signals",
            SkillId::IntegrateFindings => "integrate_findings",
            SkillId::OutlineSkeleton => "outline_skeleton",
            SkillId::DraftChecklist => "draft_checklist",
            SkillId::DeepenChecklist => "deepen_checklist",
            SkillId::NormalizeChecklist => "normalize_checklist",
            SkillId::SelfJudge => "self_judge",
            SkillId::GapAnalysis => "gap_analysis",
            SkillId::FinalizeChecklist => "finalize_checklist",
            SkillId::EmitChecklist => "emit_checklist",
        }
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered external tool identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    TavilySearch,
}

impl ToolId {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolId::TavilySearch => "tavily_search",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of action the coordinator selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    RunSkill,
    InvokeTool,
    Complete,
}

/// Return value from the coordinator describing the next unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: DecisionType,
    /// Short rationale, recorded in the progress log.
    pub reason: String,
    pub skill: Option<SkillId>,
    pub tool: Option<ToolId>,
}

impl Decision {
    pub fn skill(skill: SkillId, reason: impl Into<String>) -> Self {
        Self {
            decision: DecisionType::RunSkill,
            reason: reason.into(),
            skill: Some(skill),
            tool: None,
        }
    }

    pub fn tool(tool: ToolId, reason: impl Into<String>) -> Self {
        Self {
            decision: DecisionType::InvokeTool,
            reason: reason.into(),
            skill: None,
            tool: Some(tool),
        }
    }

    pub fn complete(reason: impl Into<String>) -> Self {
        Self {
            decision: DecisionType::Complete,
            reason: reason.into(),
            skill: None,
            tool: None,
        }
    }
}
