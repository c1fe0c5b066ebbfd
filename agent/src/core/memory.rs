//! State transitions: the only place snapshots are produced.
//!
//! Every function here takes a borrowed snapshot and returns a new one; the
//! input is never mutated, so a caller holding the prior snapshot can always
//! resume from it after a failed iteration. Each successful `apply` appends
//! exactly one progress entry and at most one conversation turn, then
//! advances the phase through the transition table.

use crate::core::decision::{Decision, DecisionType, SkillId, ToolId};
use crate::core::findings::{Finding, ResearchFindings};
use crate::core::phase::{GapRoute, Phase, RouteHint, next_phase};
use crate::core::state::{
    AgentState, ChecklistPackage, ChecklistSection, Clarifications, EmittedReply, ResearchSource,
    Role, WorkflowState,
};
use crate::core::tracking::{ItemRef, TrackingCommand, parse_tracking_command};
use crate::error::EngineError;
use crate::skills::outputs::SkillOutput;

/// Bounds seeded into a fresh task's workflow state.
#[derive(Debug, Clone, Copy)]
pub struct IngestLimits {
    pub max_revisits: u32,
    pub max_clarifications: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_revisits: 3,
            max_clarifications: 3,
        }
    }
}

/// Result of one capability invocation, matched against the decision that
/// requested it before any state is touched.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Skill(SkillOutput),
    Tool(ResearchFindings),
}

/// What a tracking command did to the checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingUpdate {
    pub identifier: String,
    pub completed: bool,
    pub open_items: usize,
    pub total_items: usize,
}

/// How an incoming user message was routed.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    /// The loop should run: a new task, or a clarification reply.
    Workflow(AgentState),
    /// A tracking command was applied to the finalized checklist.
    Tracking {
        state: AgentState,
        update: TrackingUpdate,
    },
}

/// Bootstrap a fresh state from the first user message.
pub fn initial_state(user_message: &str, limits: IngestLimits) -> AgentState {
    let mut state = AgentState::default();
    state.workflow.max_revisits = limits.max_revisits;
    state.workflow.max_clarifications = limits.max_clarifications;
    state.working.task_input = Some(user_message.to_string());
    state.push_turn(Role::User, user_message);
    state.workflow.phase = Phase::ParsingTask;
    state.push_progress(
        Phase::WaitingForTaskInput,
        Phase::ParsingTask,
        "task input received",
    );
    state
}

/// Route an incoming message against a prior snapshot.
///
/// Priority order: an outstanding clarification pause consumes the message as
/// the reply; at intake, a finalized checklist consumes recognizable tracking
/// commands and anything else starts a new task; mid-workflow (reachable only
/// after a failed iteration) the message resumes the loop from the current
/// phase without resetting.
pub fn ingest(
    state: &AgentState,
    user_message: &str,
    limits: IngestLimits,
) -> Result<Ingested, EngineError> {
    if state.workflow.phase == Phase::DecidingResearch
        && state.working.clarifications.pending()
    {
        let mut new_state = state.clone();
        new_state.push_turn(Role::User, user_message);
        new_state
            .working
            .clarifications
            .replies
            .push(user_message.to_string());
        return Ok(Ingested::Workflow(new_state));
    }

    if state.workflow.phase == Phase::WaitingForTaskInput {
        if state.tracked_package().is_some()
            && let Some(command) = parse_tracking_command(user_message)
        {
            let (new_state, update) = apply_tracking(state, user_message, &command)?;
            return Ok(Ingested::Tracking {
                state: new_state,
                update,
            });
        }
        return Ok(Ingested::Workflow(reset_for_new_task(
            state,
            user_message,
            limits,
        )));
    }

    let mut new_state = state.clone();
    new_state.push_turn(Role::User, user_message);
    Ok(Ingested::Workflow(new_state))
}

/// Reset workflow bookkeeping for a fresh task on an existing thread.
/// Conversation and progress logs are kept; they are append-only history.
fn reset_for_new_task(state: &AgentState, user_message: &str, limits: IngestLimits) -> AgentState {
    let mut new_state = state.clone();
    new_state.push_turn(Role::User, user_message);

    let from = new_state.workflow.phase;
    new_state.workflow = WorkflowState {
        phase: Phase::ParsingTask,
        max_revisits: limits.max_revisits,
        max_clarifications: limits.max_clarifications,
        ..WorkflowState::default()
    };

    new_state.working.task_input = Some(user_message.to_string());
    new_state.working.clarifications = Clarifications::default();
    new_state.working.research_questions.clear();
    new_state.working.research_sources.clear();
    new_state.working.selected_sources.clear();
    new_state.working.research_signals.clear();
    new_state.working.actionable_insights.clear();
    new_state.working.agent_summary = None;
    new_state.working.gap_reason = None;
    new_state.working.final_message = None;
    new_state.working.emitted = None;

    new_state.push_progress(from, Phase::ParsingTask, "task input received");
    new_state
}

/// Merge a capability result into a new snapshot and advance the phase.
pub fn apply(
    state: &AgentState,
    decision: &Decision,
    result: ActionResult,
) -> Result<AgentState, EngineError> {
    match (decision.decision, result) {
        (DecisionType::RunSkill, ActionResult::Skill(output)) => {
            let skill = decision.skill.ok_or_else(|| EngineError::InvalidPhase {
                reason: "run-skill decision without a skill target".to_string(),
            })?;
            if output.skill() != skill {
                return Err(EngineError::SkillOutput {
                    skill,
                    reason: format!(
                        "output belongs to skill '{}', decision targeted '{}'",
                        output.skill(),
                        skill
                    ),
                });
            }
            apply_skill(state, output, &decision.reason)
        }
        (DecisionType::InvokeTool, ActionResult::Tool(findings)) => {
            let tool = decision.tool.ok_or_else(|| EngineError::InvalidPhase {
                reason: "invoke-tool decision without a tool target".to_string(),
            })?;
            apply_search(state, tool, &findings)
        }
        (DecisionType::Complete, _) => Err(EngineError::InvalidPhase {
            reason: "apply called for a complete decision".to_string(),
        }),
        (DecisionType::RunSkill, ActionResult::Tool(_)) => Err(EngineError::InvalidPhase {
            reason: "tool result supplied for a run-skill decision".to_string(),
        }),
        (DecisionType::InvokeTool, ActionResult::Skill(_)) => Err(EngineError::InvalidPhase {
            reason: "skill result supplied for an invoke-tool decision".to_string(),
        }),
    }
}

fn apply_skill(
    state: &AgentState,
    output: SkillOutput,
    reason: &str,
) -> Result<AgentState, EngineError> {
    let mut new_state = state.clone();
    let skill = output.skill();
    let narration = output.ai_response().to_string();

    let route = match output {
        SkillOutput::ParseTask(output) => {
            if output.goal.trim().is_empty() {
                return transition_error(state, "parsed goal is empty");
            }
            new_state.working.task_overview = Some(output.to_overview());
            new_state.working.scope_notes.clear();
            new_state.working.assumptions.clear();
            new_state.working.edge_cases.clear();
            RouteHint::Linear
        }
        SkillOutput::ScopeAndAssume(output) => {
            new_state.working.scope_notes = output.scope_notes;
            new_state.working.assumptions = output.assumptions;
            new_state.working.edge_cases = output.edge_cases;
            let cap = new_state.workflow.max_clarifications;
            let mut questions = output.clarifying_questions;
            questions.truncate(cap);
            new_state.working.clarifications = Clarifications {
                questions,
                replies: Vec::new(),
            };
            RouteHint::Linear
        }
        SkillOutput::DecideResearch(output) => {
            new_state.workflow.needs_research = output.needs_research;
            new_state.workflow.research_completed = !output.needs_research;
            new_state.working.research_questions = output.research_questions;
            RouteHint::Research {
                needed: output.needs_research,
            }
        }
        SkillOutput::SourceSelection(output) => {
            new_state.working.selected_sources = output.selected_sources;
            RouteHint::Linear
        }
        SkillOutput::ExtractSignals(output) => {
            new_state.working.research_signals = output.signals;
            RouteHint::Linear
        }
        SkillOutput::IntegrateFindings(output) => {
            new_state.working.actionable_insights = output.actionable_insights;
            RouteHint::Linear
        }
        SkillOutput::OutlineSkeleton(output) => {
            if output.sections.is_empty() {
                return transition_error(state, "outline produced no sections");
            }
            new_state.working.draft_package = Some(package(output.sections));
            RouteHint::Linear
        }
        SkillOutput::DraftChecklist(output) => {
            if count_items(&output.sections) == 0 {
                return transition_error(state, "draft produced an empty checklist");
            }
            new_state.working.draft_package = Some(package(output.sections));
            RouteHint::Linear
        }
        SkillOutput::DeepenChecklist(output) => {
            if count_items(&output.sections) == 0 {
                return transition_error(state, "deepening produced an empty checklist");
            }
            new_state.working.draft_package = Some(package(output.sections));
            RouteHint::Linear
        }
        SkillOutput::NormalizeChecklist(output) => {
            if count_items(&output.sections) == 0 {
                return transition_error(state, "normalization produced an empty checklist");
            }
            new_state.working.normalized_package = Some(package(output.sections));
            RouteHint::Linear
        }
        SkillOutput::SelfJudge(output) => {
            new_state.workflow.quality_score = Some(output.score);
            let mut lines = vec![format!("Score: {:.2}", output.score)];
            lines.extend(output.strengths.iter().map(|item| format!("Strength: {item}")));
            lines.extend(output.gaps.iter().map(|item| format!("Gap: {item}")));
            new_state.working.agent_summary = Some(lines.join("\n"));
            RouteHint::Judge {
                threshold_met: output.threshold_met,
            }
        }
        SkillOutput::GapAnalysis(output) => {
            let route = bounded_gap_route(&mut new_state, output.route);
            new_state.workflow.gap_route = Some(route);
            new_state.working.gap_reason = Some(output.reason);
            if route == GapRoute::NeedsResearch {
                new_state.workflow.needs_research = true;
            }
            RouteHint::Gap(route)
        }
        SkillOutput::FinalizeChecklist(output) => {
            if count_items(&output.sections) == 0 {
                return transition_error(state, "finalization produced an empty checklist");
            }
            new_state.working.final_package = Some(ChecklistPackage {
                sections: output.sections,
                notes: output.handoff_notes,
            });
            new_state.working.agent_summary = Some(output.highlights.join("\n"));
            RouteHint::Linear
        }
        SkillOutput::EmitChecklist(output) => {
            if output.final_message.trim().is_empty() {
                return transition_error(state, "emission produced an empty message");
            }
            let sections = new_state.current_sections();
            let mut metadata = serde_json::Map::new();
            metadata.insert(
                "call_to_action".to_string(),
                serde_json::Value::String(output.call_to_action),
            );
            new_state.working.final_message = Some(output.final_message.clone());
            new_state.working.emitted = Some(EmittedReply {
                phase: Phase::EmittingChecklist,
                message: output.final_message,
                sections,
                metadata,
            });
            RouteHint::Linear
        }
    };

    advance(
        &mut new_state,
        route,
        Some(&narration),
        &format!("{skill}: {reason}"),
    )?;
    new_state.workflow.last_skill = Some(skill);
    Ok(new_state)
}

/// Merge normalized web-search findings and advance past the research call.
fn apply_search(
    state: &AgentState,
    tool: ToolId,
    findings: &ResearchFindings,
) -> Result<AgentState, EngineError> {
    let mut new_state = state.clone();
    new_state.working.research_sources = sources_from_findings(findings);
    new_state.workflow.research_completed = true;

    let summary = format!(
        "web search returned {} sources",
        new_state.working.research_sources.len()
    );
    advance(&mut new_state, RouteHint::Linear, None, &summary)?;
    new_state.workflow.last_tool = Some(tool);
    Ok(new_state)
}

/// Flip one item's completion flag per a parsed tracking command.
///
/// Completing the last open item moves the workflow to emission so the next
/// iteration produces the closing summary.
pub fn apply_tracking(
    state: &AgentState,
    user_message: &str,
    command: &TrackingCommand,
) -> Result<(AgentState, TrackingUpdate), EngineError> {
    let mut new_state = state.clone();
    let phase = new_state.workflow.phase;

    let identifier = {
        let Some(package) = new_state.working.final_package.as_mut() else {
            return Err(EngineError::StateTransition {
                phase,
                reason: "no finalized checklist to track against".to_string(),
            });
        };
        let item = match &command.target {
            ItemRef::Index(index) => package
                .sections
                .iter_mut()
                .flat_map(|section| section.items.iter_mut())
                .nth(index - 1),
            ItemRef::Identifier(id) => package
                .sections
                .iter_mut()
                .flat_map(|section| section.items.iter_mut())
                .find(|item| item.identifier == *id),
        };
        let Some(item) = item else {
            return Err(EngineError::StateTransition {
                phase,
                reason: format!(
                    "no checklist item matching '{}'",
                    target_label(&command.target)
                ),
            });
        };
        item.completed = command.completed;
        item.identifier.clone()
    };

    let (open_items, total_items) = new_state
        .working
        .final_package
        .as_ref()
        .map(|package| (package.open_item_count(), package.item_count()))
        .unwrap_or_default();
    let update = TrackingUpdate {
        identifier: identifier.clone(),
        completed: command.completed,
        open_items,
        total_items,
    };

    new_state.push_turn(Role::User, user_message);
    let flag = if command.completed { "complete" } else { "open" };
    let summary = format!("item {identifier} marked {flag} ({open_items} of {total_items} open)");

    if update.open_items == 0 {
        new_state.working.emitted = None;
        new_state.workflow.phase = Phase::EmittingChecklist;
        new_state.push_progress(phase, Phase::EmittingChecklist, summary);
    } else {
        new_state.push_progress(phase, phase, summary);
    }

    Ok((new_state, update))
}

fn target_label(target: &ItemRef) -> String {
    match target {
        ItemRef::Index(index) => index.to_string(),
        ItemRef::Identifier(id) => id.clone(),
    }
}

/// Advance the phase, recording the transition and optional narration.
fn advance(
    state: &mut AgentState,
    route: RouteHint,
    narration: Option<&str>,
    step: &str,
) -> Result<(), EngineError> {
    let from = state.workflow.phase;
    let to = next_phase(from, route)?;
    state.workflow.phase = to;
    state.push_progress(from, to, step.to_string());
    if let Some(narration) = narration {
        state.push_turn(Role::Assistant, narration);
    }
    Ok(())
}

/// Enforce the revisit bound on loop-back gap routes.
///
/// Each loop-back target gets `max_revisits` passes per task; past that the
/// route is forced to `Ready` so the workflow always reaches finalization.
fn bounded_gap_route(state: &mut AgentState, route: GapRoute) -> GapRoute {
    let target = match route {
        GapRoute::NeedsResearch => Phase::DecidingResearch,
        GapRoute::NeedsDepth => Phase::DeepeningChecklist,
        GapRoute::Ready => return GapRoute::Ready,
    };
    let max_revisits = state.workflow.max_revisits;
    let counter = state
        .workflow
        .revisits
        .entry(target.as_str().to_string())
        .or_insert(0);
    if *counter >= max_revisits {
        return GapRoute::Ready;
    }
    *counter += 1;
    route
}

fn transition_error<T>(state: &AgentState, reason: &str) -> Result<T, EngineError> {
    Err(EngineError::StateTransition {
        phase: state.workflow.phase,
        reason: reason.to_string(),
    })
}

fn package(sections: Vec<ChecklistSection>) -> ChecklistPackage {
    ChecklistPackage {
        sections,
        notes: Vec::new(),
    }
}

fn count_items(sections: &[ChecklistSection]) -> usize {
    sections.iter().map(|section| section.items.len()).sum()
}

fn sources_from_findings(findings: &ResearchFindings) -> Vec<ResearchSource> {
    if findings.items.is_empty() {
        return vec![ResearchSource {
            title: findings.query.clone(),
            url: String::new(),
            summary: "No search results returned.".to_string(),
            credibility: "Tavily search result".to_string(),
        }];
    }
    findings
        .items
        .iter()
        .enumerate()
        .map(|(idx, finding)| source_from_finding(idx + 1, finding))
        .collect()
}

fn source_from_finding(position: usize, finding: &Finding) -> ResearchSource {
    let summary = finding.snippet.trim();
    let title = finding.title.trim();
    ResearchSource {
        title: if title.is_empty() {
            format!("Result {position}")
        } else {
            title.to_string()
        },
        url: finding.url.clone(),
        summary: if summary.is_empty() {
            "See linked source for details.".to_string()
        } else {
            summary.to_string()
        },
        credibility: "Tavily search result".to_string(),
    }
}
