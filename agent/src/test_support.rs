//! Test-only scripted capability providers and payload builders.
//!
//! Scripted providers return predetermined raw payloads in order, without
//! spawning processes or touching the network, which keeps loop tests fully
//! deterministic. Payload builders produce the minimal valid JSON for each
//! skill's schema.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::anyhow;
use serde_json::{Value, json};

use crate::core::decision::SkillId;
use crate::core::findings::SearchRequest;
use crate::error::EngineError;
use crate::io::executor::{SkillProvider, SkillRequest};
use crate::io::research::ResearchTool;

/// Skill provider that replays scripted payloads in order.
///
/// Runs out of script: returns a capability fault, which the loop surfaces
/// as a failed (but resumable) turn. Optional leading timeouts exercise the
/// retry path.
pub struct ScriptedSkills {
    payloads: RefCell<VecDeque<Value>>,
    leading_timeouts: Cell<u32>,
}

impl ScriptedSkills {
    pub fn new(payloads: Vec<Value>) -> Self {
        Self {
            payloads: RefCell::new(payloads.into()),
            leading_timeouts: Cell::new(0),
        }
    }

    /// Fail the first `count` invocations with a timeout before serving the
    /// script.
    pub fn with_leading_timeouts(self, count: u32) -> Self {
        self.leading_timeouts.set(count);
        self
    }

    pub fn remaining(&self) -> usize {
        self.payloads.borrow().len()
    }
}

impl SkillProvider for ScriptedSkills {
    fn invoke(&self, request: &SkillRequest) -> Result<Value, EngineError> {
        let pending = self.leading_timeouts.get();
        if pending > 0 {
            self.leading_timeouts.set(pending - 1);
            return Err(EngineError::SkillTimeout {
                skill: request.skill,
                timeout_secs: request.timeout.as_secs(),
            });
        }
        self.payloads.borrow_mut().pop_front().ok_or_else(|| {
            EngineError::Capability {
                name: request.skill.as_str().to_string(),
                cause: anyhow!("scripted skill provider exhausted"),
            }
        })
    }
}

/// Research tool that replays scripted findings payloads in order.
pub struct ScriptedResearch {
    payloads: RefCell<VecDeque<Value>>,
}

impl ScriptedResearch {
    pub fn new(payloads: Vec<Value>) -> Self {
        Self {
            payloads: RefCell::new(payloads.into()),
        }
    }
}

impl ResearchTool for ScriptedResearch {
    fn search(&self, _request: &SearchRequest) -> Result<Value, EngineError> {
        self.payloads.borrow_mut().pop_front().ok_or_else(|| {
            EngineError::Capability {
                name: "tavily_search".to_string(),
                cause: anyhow!("scripted research tool exhausted"),
            }
        })
    }
}

/// Research tool for flows that must never reach the tool boundary.
pub struct NoResearch;

impl ResearchTool for NoResearch {
    fn search(&self, _request: &SearchRequest) -> Result<Value, EngineError> {
        Err(EngineError::Capability {
            name: "tavily_search".to_string(),
            cause: anyhow!("research tool not available in this test"),
        })
    }
}

/// Sections payload shared by the checklist-shaped skills.
pub fn sections_value(identifiers: &[&str]) -> Value {
    json!([{
        "name": "Section",
        "objective": "Objective",
        "items": identifiers
            .iter()
            .map(|id| {
                json!({
                    "identifier": id,
                    "title": format!("{id} title"),
                    "description": format!("{id} description"),
                })
            })
            .collect::<Vec<_>>(),
    }])
}

pub fn parse_task_value(goal: &str) -> Value {
    json!({
        "ai_response": "Here is how I read the task.",
        "goal": goal,
        "constraints": [],
        "audience": [],
        "success_criteria": [],
    })
}

pub fn scoping_value(questions: &[&str]) -> Value {
    json!({
        "ai_response": "Scope and assumptions captured.",
        "scope_notes": ["only production systems"],
        "assumptions": ["change freeze is negotiable"],
        "edge_cases": ["replication lag during cutover"],
        "clarifying_questions": questions,
    })
}

pub fn decide_research_value(needs_research: bool, questions: &[&str]) -> Value {
    json!({
        "ai_response": "Research decision made.",
        "needs_research": needs_research,
        "justification": "based on domain familiarity",
        "research_questions": questions,
    })
}

pub fn source_selection_value(count: usize) -> Value {
    let sources: Vec<Value> = (0..count)
        .map(|idx| {
            json!({
                "title": format!("Source {idx}"),
                "url": format!("https://example.com/{idx}"),
                "summary": "Relevant guidance.",
                "credibility": "official docs",
            })
        })
        .collect();
    json!({ "ai_response": "Sources selected.", "selected_sources": sources })
}

pub fn extract_signals_value(count: usize) -> Value {
    let signals: Vec<Value> = (0..count)
        .map(|idx| {
            json!({
                "source_title": format!("Source {idx}"),
                "signal": format!("signal {idx}"),
                "implication": "shapes an item",
            })
        })
        .collect();
    json!({ "ai_response": "Signals extracted.", "signals": signals })
}

pub fn integrate_findings_value(count: usize) -> Value {
    let insights: Vec<Value> = (0..count)
        .map(|idx| {
            json!({
                "area": format!("area {idx}"),
                "recommendation": format!("recommendation {idx}"),
                "risk_mitigated": "data loss",
            })
        })
        .collect();
    json!({ "ai_response": "Findings integrated.", "actionable_insights": insights })
}

pub fn outline_value() -> Value {
    json!({
        "ai_response": "Skeleton outlined.",
        "sections": [{"name": "Preparation", "objective": "Everything staged", "items": []}],
    })
}

pub fn draft_value(identifiers: &[&str]) -> Value {
    json!({ "ai_response": "Checklist drafted.", "sections": sections_value(identifiers) })
}

pub fn normalize_value(identifiers: &[&str]) -> Value {
    json!({ "ai_response": "Checklist normalized.", "sections": sections_value(identifiers) })
}

pub fn judge_value(score: f64, threshold_met: bool) -> Value {
    json!({
        "ai_response": "Checklist judged.",
        "score": score,
        "threshold_met": threshold_met,
        "strengths": ["clear ordering"],
        "gaps": if threshold_met { Vec::<String>::new() } else { vec!["too shallow".to_string()] },
    })
}

pub fn gap_value(route: &str) -> Value {
    json!({
        "ai_response": "Gap routed.",
        "route": route,
        "reason": "quality gap analysis",
        "next_focus": "depth per item",
    })
}

pub fn finalize_value(identifiers: &[&str]) -> Value {
    json!({
        "ai_response": "Checklist finalized.",
        "sections": sections_value(identifiers),
        "highlights": ["covers rollback"],
        "handoff_notes": ["run during low traffic"],
    })
}

pub fn emit_value(final_message: &str) -> Value {
    json!({
        "ai_response": "Emitting the checklist.",
        "final_message": final_message,
        "call_to_action": "Start with the first open item.",
    })
}

pub fn findings_value(count: usize) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|idx| {
            json!({
                "title": format!("Finding {idx}"),
                "url": format!("https://example.com/f{idx}"),
                "snippet": format!("snippet {idx}"),
                "score": 0.5,
            })
        })
        .collect();
    json!({ "query": "scripted query", "items": items })
}

/// Sanity check used by the scripted-skill tests themselves.
pub fn assert_valid_for(skill: SkillId, payload: &Value) {
    crate::skills::parse_output(skill, payload).expect("scripted payload should match schema");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every builder must satisfy the schema of the skill it stands in for,
    /// or scripted loop tests would fail for the wrong reason.
    #[test]
    fn builders_match_their_schemas() {
        assert_valid_for(SkillId::ParseTask, &parse_task_value("goal"));
        assert_valid_for(SkillId::ScopeAndAssume, &scoping_value(&["q"]));
        assert_valid_for(SkillId::DecideResearch, &decide_research_value(true, &["q"]));
        assert_valid_for(SkillId::SourceSelection, &source_selection_value(2));
        assert_valid_for(SkillId::ExtractSignals, &extract_signals_value(2));
        assert_valid_for(SkillId::IntegrateFindings, &integrate_findings_value(2));
        assert_valid_for(SkillId::OutlineSkeleton, &outline_value());
        assert_valid_for(SkillId::DraftChecklist, &draft_value(&["1.1"]));
        assert_valid_for(SkillId::DeepenChecklist, &draft_value(&["1.1"]));
        assert_valid_for(SkillId::NormalizeChecklist, &normalize_value(&["1.1"]));
        assert_valid_for(SkillId::SelfJudge, &judge_value(0.4, false));
        assert_valid_for(SkillId::GapAnalysis, &gap_value("needs_depth"));
        assert_valid_for(SkillId::FinalizeChecklist, &finalize_value(&["1.1"]));
        assert_valid_for(SkillId::EmitChecklist, &emit_value("done"));
    }
}
