//! Typed structured outputs, one per skill.
//!
//! Shapes mirror the per-skill JSON Schemas under `agent/schemas/`; the raw
//! payload is validated against the schema before deserializing into these
//! types, so `serde(default)` here only covers fields the schema marks
//! optional. Every output carries `ai_response`, the user-facing narration
//! appended to the conversation log.

use serde::{Deserialize, Serialize};

use crate::core::decision::SkillId;
use crate::core::phase::GapRoute;
use crate::core::state::{
    ActionableInsight, ChecklistSection, ResearchSignal, ResearchSource, TaskOverview,
};

/// Structured representation of the initial task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskParsingOutput {
    pub ai_response: String,
    pub goal: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

impl TaskParsingOutput {
    pub fn to_overview(&self) -> TaskOverview {
        TaskOverview {
            goal: self.goal.clone(),
            constraints: self.constraints.clone(),
            audience: self.audience.clone(),
            success_criteria: self.success_criteria.clone(),
        }
    }
}

/// Scope notes, assumptions, edge cases, and open clarifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopingOutput {
    pub ai_response: String,
    #[serde(default)]
    pub scope_notes: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub edge_cases: Vec<String>,
    /// Questions the user should answer before the checklist is built.
    #[serde(default)]
    pub clarifying_questions: Vec<String>,
}

/// Whether external research is warranted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchDecisionOutput {
    pub ai_response: String,
    pub needs_research: bool,
    pub justification: String,
    #[serde(default)]
    pub research_questions: Vec<String>,
}

/// Curated subset of surfaced sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSelectionOutput {
    pub ai_response: String,
    #[serde(default)]
    pub selected_sources: Vec<ResearchSource>,
}

/// Atomic insights pulled from the selected sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalExtractionOutput {
    pub ai_response: String,
    #[serde(default)]
    pub signals: Vec<ResearchSignal>,
}

/// Implications that convert raw signals into checklist guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationOutput {
    pub ai_response: String,
    #[serde(default)]
    pub actionable_insights: Vec<ActionableInsight>,
}

/// Top-level section scaffolding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSkeletonOutput {
    pub ai_response: String,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
}

/// First full draft of the checklist items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftChecklistOutput {
    pub ai_response: String,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
}

/// Sub-steps, prerequisites, and acceptance checks per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepenChecklistOutput {
    pub ai_response: String,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
}

/// Consistent phrasing, duplicates removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeChecklistOutput {
    pub ai_response: String,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
}

/// Rubric score for the normalized checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfJudgeOutput {
    pub ai_response: String,
    /// Rubric score in `[0, 1]`.
    pub score: f64,
    pub threshold_met: bool,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
}

/// Remediation route when the quality bar was missed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapAnalysisOutput {
    pub ai_response: String,
    pub route: GapRoute,
    pub reason: String,
    pub next_focus: String,
}

/// The locked final package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeChecklistOutput {
    pub ai_response: String,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub handoff_notes: Vec<String>,
}

/// User-facing narration for the finished checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitChecklistOutput {
    pub ai_response: String,
    pub final_message: String,
    pub call_to_action: String,
}

/// Tagged union over every skill's output, produced by
/// [`crate::skills::parse_output`] after schema validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SkillOutput {
    ParseTask(TaskParsingOutput),
    ScopeAndAssume(ScopingOutput),
    DecideResearch(ResearchDecisionOutput),
    SourceSelection(SourceSelectionOutput),
    ExtractSignals(SignalExtractionOutput),
    IntegrateFindings(IntegrationOutput),
    OutlineSkeleton(OutlineSkeletonOutput),
    DraftChecklist(DraftChecklistOutput),
    DeepenChecklist(DeepenChecklistOutput),
    NormalizeChecklist(NormalizeChecklistOutput),
    SelfJudge(SelfJudgeOutput),
    GapAnalysis(GapAnalysisOutput),
    FinalizeChecklist(FinalizeChecklistOutput),
    EmitChecklist(EmitChecklistOutput),
}

impl SkillOutput {
    /// The skill this output belongs to.
    pub fn skill(&self) -> SkillId {
        match self {
            SkillOutput::ParseTask(_) => SkillId::ParseTask,
            SkillOutput::ScopeAndAssume(_) => SkillId::ScopeAndAssume,
            SkillOutput::DecideResearch(_) => SkillId::DecideResearch,
            SkillOutput::SourceSelection(_) => SkillId::SourceSelection,
            SkillOutput::ExtractSignals(_) => SkillId::ExtractSignals,
            SkillOutput::IntegrateFindings(_) => SkillId::IntegrateFindings,
            SkillOutput::OutlineSkeleton(_) => SkillId::OutlineSkeleton,
            SkillOutput::DraftChecklist(_) => SkillId::DraftChecklist,
            SkillOutput::DeepenChecklist(_) => SkillId::DeepenChecklist,
            SkillOutput::NormalizeChecklist(_) => SkillId::NormalizeChecklist,
            SkillOutput::SelfJudge(_) => SkillId::SelfJudge,
            SkillOutput::GapAnalysis(_) => SkillId::GapAnalysis,
            SkillOutput::FinalizeChecklist(_) => SkillId::FinalizeChecklist,
            SkillOutput::EmitChecklist(_) => SkillId::EmitChecklist,
        }
    }

    /// User-facing narration shared by every output shape.
    pub fn ai_response(&self) -> &str {
        match self {
            SkillOutput::ParseTask(output) => &output.ai_response,
            SkillOutput::ScopeAndAssume(output) => &output.ai_response,
            SkillOutput::DecideResearch(output) => &output.ai_response,
            SkillOutput::SourceSelection(output) => &output.ai_response,
            SkillOutput::ExtractSignals(output) => &output.ai_response,
            SkillOutput::IntegrateFindings(output) => &output.ai_response,
            SkillOutput::OutlineSkeleton(output) => &output.ai_response,
            SkillOutput::DraftChecklist(output) => &output.ai_response,
            SkillOutput::DeepenChecklist(output) => &output.ai_response,
            SkillOutput::NormalizeChecklist(output) => &output.ai_response,
            SkillOutput::SelfJudge(output) => &output.ai_response,
            SkillOutput::GapAnalysis(output) => &output.ai_response,
            SkillOutput::FinalizeChecklist(output) => &output.ai_response,
            SkillOutput::EmitChecklist(output) => &output.ai_response,
        }
    }
}
