//! Prompt rendering over declared state slices.
//!
//! Each skill receives only the fields it declares, never the raw state
//! dump: the slice is assembled here and rendered through the skill's
//! minijinja template. Conversation history, where a skill declares it, is
//! capped to a byte budget taken from the end (most recent turns win).

use minijinja::{Environment, context};
use std::sync::LazyLock;

use crate::core::decision::SkillId;
use crate::core::state::{AgentState, ChecklistSection, Role};

/// Caps applied while assembling prompt slices.
#[derive(Debug, Clone, Copy)]
pub struct PromptLimits {
    /// Byte budget for the conversation-history slice.
    pub history_budget_bytes: usize,
    /// Clarifying-question cap surfaced to the scoping skill.
    pub max_clarifications: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            history_budget_bytes: 16_000,
            max_clarifications: 3,
        }
    }
}

static ENV: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    for skill in SkillId::all() {
        env.add_template(skill.as_str(), skill.definition().template)
            .expect("skill template should be valid");
    }
    env
});

/// Render the prompt for `skill` from its declared slice of `state`.
pub fn render_prompt(skill: SkillId, state: &AgentState, limits: &PromptLimits) -> String {
    let template = ENV
        .get_template(skill.as_str())
        .expect("every skill template is registered");
    let overview = state.working.task_overview.clone().unwrap_or_default();
    let goal = if overview.goal.is_empty() {
        state.working.task_input.clone().unwrap_or_default()
    } else {
        overview.goal.clone()
    };

    let rendered = match skill {
        SkillId::ParseTask => template.render(context! {
            task_input => state.working.task_input.as_deref().unwrap_or_default(),
            history => non_empty(history_slice(state, limits.history_budget_bytes)),
        }),
        SkillId::ScopeAndAssume => template.render(context! {
            goal => goal,
            constraints => &overview.constraints,
            audience => &overview.audience,
            max_clarifications => limits.max_clarifications,
        }),
        SkillId::DecideResearch => template.render(context! {
            goal => goal,
            scope_notes => &state.working.scope_notes,
            assumptions => &state.working.assumptions,
            clarification_questions => &state.working.clarifications.questions,
            clarification_replies => &state.working.clarifications.replies,
        }),
        SkillId::SourceSelection => template.render(context! {
            research_questions => &state.working.research_questions,
            sources => &state.working.research_sources,
        }),
        SkillId::ExtractSignals => template.render(context! {
            sources => &state.working.selected_sources,
        }),
        SkillId::IntegrateFindings => template.render(context! {
            signals => &state.working.research_signals,
        }),
        SkillId::OutlineSkeleton => template.render(context! {
            goal => goal,
            scope_notes => &state.working.scope_notes,
            assumptions => &state.working.assumptions,
            insights => &state.working.actionable_insights,
        }),
        SkillId::DraftChecklist => template.render(context! {
            goal => goal,
            sections => draft_sections(state),
            insights => &state.working.actionable_insights,
        }),
        SkillId::DeepenChecklist => template.render(context! {
            sections => draft_sections(state),
            edge_cases => &state.working.edge_cases,
        }),
        SkillId::NormalizeChecklist => template.render(context! {
            sections => draft_sections(state),
        }),
        SkillId::SelfJudge => template.render(context! {
            goal => goal,
            success_criteria => &overview.success_criteria,
            sections => normalized_sections(state),
        }),
        SkillId::GapAnalysis => template.render(context! {
            quality_score => state.workflow.quality_score.unwrap_or_default(),
            judge_summary => state.working.agent_summary.as_deref().unwrap_or_default(),
        }),
        SkillId::FinalizeChecklist => template.render(context! {
            sections => normalized_sections(state),
            assumptions => &state.working.assumptions,
        }),
        SkillId::EmitChecklist => template.render(context! {
            sections => state.current_sections(),
            highlights => state.working.agent_summary.as_deref().unwrap_or_default(),
            progress_steps => state.progress.len(),
        }),
    };
    rendered.expect("skill template rendering should not fail")
}

fn draft_sections(state: &AgentState) -> Vec<ChecklistSection> {
    state
        .working
        .draft_package
        .as_ref()
        .map(|package| package.sections.clone())
        .unwrap_or_default()
}

fn normalized_sections(state: &AgentState) -> Vec<ChecklistSection> {
    state
        .working
        .normalized_package
        .as_ref()
        .map(|package| package.sections.clone())
        .unwrap_or_default()
}

/// Most recent conversation turns, newest-last, within `budget` bytes.
fn history_slice(state: &AgentState, budget: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut used = 0usize;
    for turn in state.conversation.iter().rev() {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let line = format!("{role}: {}", turn.content);
        if used + line.len() > budget {
            break;
        }
        used += line.len();
        lines.push(line);
    }
    lines.reverse();
    lines.join("\n")
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() { None } else { Some(text) }
}
