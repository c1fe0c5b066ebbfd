//! Agent state snapshots and the checklist data model.
//!
//! State is value data: every mutation in [`crate::core::memory`] clones the
//! snapshot and returns a new one, so callers can retain any number of
//! snapshots and replay from them. Conversation and progress logs are
//! append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::decision::{SkillId, ToolId};
use crate::core::phase::{GapRoute, Phase};

/// Structured summary of the task request, produced by parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOverview {
    pub goal: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

/// A source surfaced during research.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSource {
    pub title: String,
    pub url: String,
    pub summary: String,
    /// Free-form trust signal (e.g. "official docs", "search result").
    pub credibility: String,
}

/// Atomic insight extracted from a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSignal {
    pub source_title: String,
    pub signal: String,
    pub implication: String,
}

/// Connects research signals to concrete checklist recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionableInsight {
    pub area: String,
    pub recommendation: String,
    pub risk_mitigated: String,
}

/// Single actionable checklist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Stable dotted identifier (e.g. "1.2").
    pub identifier: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub sub_steps: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Tracking flag, owned by the engine; skills never set it.
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Logical grouping of checklist items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSection {
    pub name: String,
    pub objective: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

/// One revision of the checklist plus commentary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistPackage {
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ChecklistPackage {
    /// Iterate items in section order.
    pub fn items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.sections.iter().flat_map(|section| section.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.items().count()
    }

    pub fn open_item_count(&self) -> usize {
        self.items().filter(|item| !item.completed).count()
    }

    pub fn all_complete(&self) -> bool {
        self.item_count() > 0 && self.open_item_count() == 0
    }
}

/// Conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Single conversational exchange, append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// One phase transition taken, append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub from: Phase,
    pub to: Phase,
    pub at: DateTime<Utc>,
    pub summary: String,
}

/// Clarification questions raised at scoping and the user's replies.
///
/// A single batch per task: the workflow pauses after scoping while
/// `questions` outnumber recorded replies, and one reply releases the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clarifications {
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub replies: Vec<String>,
}

impl Clarifications {
    pub fn pending(&self) -> bool {
        !self.questions.is_empty() && self.replies.is_empty()
    }
}

/// Routing flags and bookkeeping consumed by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub phase: Phase,
    #[serde(default)]
    pub needs_research: bool,
    #[serde(default)]
    pub research_completed: bool,
    pub last_skill: Option<SkillId>,
    pub last_tool: Option<ToolId>,
    pub quality_score: Option<f64>,
    pub gap_route: Option<GapRoute>,
    /// Loop-back transitions taken per target phase within the current task.
    #[serde(default)]
    pub revisits: BTreeMap<String, u32>,
    /// Bound after which a loop-back edge is forced forward.
    #[serde(default = "default_max_revisits")]
    pub max_revisits: u32,
    /// Cap on clarifying questions surfaced per task.
    #[serde(default = "default_max_clarifications")]
    pub max_clarifications: usize,
}

fn default_max_revisits() -> u32 {
    3
}

fn default_max_clarifications() -> usize {
    3
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: Phase::WaitingForTaskInput,
            needs_research: false,
            research_completed: false,
            last_skill: None,
            last_tool: None,
            quality_score: None,
            gap_route: None,
            revisits: BTreeMap::new(),
            max_revisits: default_max_revisits(),
            max_clarifications: default_max_clarifications(),
        }
    }
}

/// Short-term data referenced throughout the workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemory {
    pub task_input: Option<String>,
    pub task_overview: Option<TaskOverview>,
    #[serde(default)]
    pub scope_notes: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub edge_cases: Vec<String>,
    #[serde(default)]
    pub clarifications: Clarifications,
    #[serde(default)]
    pub research_questions: Vec<String>,
    #[serde(default)]
    pub research_sources: Vec<ResearchSource>,
    #[serde(default)]
    pub selected_sources: Vec<ResearchSource>,
    #[serde(default)]
    pub research_signals: Vec<ResearchSignal>,
    #[serde(default)]
    pub actionable_insights: Vec<ActionableInsight>,
    pub draft_package: Option<ChecklistPackage>,
    pub normalized_package: Option<ChecklistPackage>,
    pub final_package: Option<ChecklistPackage>,
    pub agent_summary: Option<String>,
    pub gap_reason: Option<String>,
    pub final_message: Option<String>,
    pub emitted: Option<EmittedReply>,
}

/// The user-facing payload produced by the emission step, kept in state so a
/// completed turn can be replayed without re-running the skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedReply {
    pub phase: Phase,
    pub message: String,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate snapshot of the conversational workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub workflow: WorkflowState,
    #[serde(default)]
    pub working: WorkingMemory,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,
}

impl AgentState {
    /// The checklist revision tracking operates on: final, else normalized.
    pub fn tracked_package(&self) -> Option<&ChecklistPackage> {
        self.working
            .final_package
            .as_ref()
            .or(self.working.normalized_package.as_ref())
    }

    /// Sections to surface alongside a response, latest revision first.
    pub fn current_sections(&self) -> Vec<ChecklistSection> {
        self.working
            .final_package
            .as_ref()
            .or(self.working.normalized_package.as_ref())
            .or(self.working.draft_package.as_ref())
            .map(|package| package.sections.clone())
            .unwrap_or_default()
    }

    pub fn push_turn(&mut self, role: Role, content: impl Into<String>) {
        self.conversation.push(ConversationTurn {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn push_progress(&mut self, from: Phase, to: Phase, summary: impl Into<String>) {
        self.progress.push(ProgressEntry {
            from,
            to,
            at: Utc::now(),
            summary: summary.into(),
        });
    }
}

/// Check semantic invariants a state file must satisfy before the engine
/// accepts it. Returns every violation found rather than stopping early.
pub fn validate_state_invariants(state: &AgentState) -> Vec<String> {
    let mut errors = Vec::new();

    if state.workflow.max_revisits == 0 {
        errors.push("workflow.max_revisits must be > 0".to_string());
    }
    for (target, count) in &state.workflow.revisits {
        if *count > state.workflow.max_revisits {
            errors.push(format!(
                "workflow.revisits['{}'] = {} exceeds max_revisits {}",
                target, count, state.workflow.max_revisits
            ));
        }
    }
    if state.working.clarifications.replies.len() > state.working.clarifications.questions.len() {
        errors.push("clarifications carry more replies than questions".to_string());
    }

    for (label, package) in [
        ("draft_package", state.working.draft_package.as_ref()),
        ("normalized_package", state.working.normalized_package.as_ref()),
        ("final_package", state.working.final_package.as_ref()),
    ] {
        let Some(package) = package else { continue };
        let mut seen = std::collections::HashSet::new();
        for item in package.items() {
            if item.identifier.trim().is_empty() {
                errors.push(format!("{label}: item with empty identifier"));
            } else if !seen.insert(item.identifier.clone()) {
                errors.push(format!(
                    "{label}: duplicate item identifier '{}'",
                    item.identifier
                ));
            }
        }
    }

    if state
        .progress
        .windows(2)
        .any(|pair| pair[0].at > pair[1].at)
    {
        errors.push("progress log timestamps must be non-decreasing".to_string());
    }

    errors
}
