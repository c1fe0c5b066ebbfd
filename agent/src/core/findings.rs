//! Wire types for the web-research tool boundary.
//!
//! Tool output is deliberately a different shape from skill output: findings
//! are semi-structured snippets that the signal-extraction skill structures
//! downstream. Raw payloads are validated against the findings schema before
//! the memory manager sees them.

use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::core::decision::ToolId;
use crate::error::EngineError;

pub const RESEARCH_FINDINGS_SCHEMA: &str =
    include_str!("../../schemas/research_findings.schema.json");

/// Request handed to the research tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    pub max_results: usize,
    pub search_depth: String,
}

impl SearchRequest {
    /// Build the search request from state: first research question as the
    /// query, remaining questions as follow-ups, task goal as fallback.
    pub fn from_state(
        state: &crate::core::state::AgentState,
        max_results: usize,
        search_depth: &str,
    ) -> Self {
        let questions: Vec<String> = state
            .working
            .research_questions
            .iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        let mut query = questions.first().cloned().unwrap_or_default();
        let follow_up_questions = questions.into_iter().skip(1).collect();

        if query.is_empty() {
            query = state
                .working
                .task_overview
                .as_ref()
                .map(|overview| overview.goal.clone())
                .filter(|goal| !goal.is_empty())
                .or_else(|| state.working.task_input.clone())
                .unwrap_or_else(|| "Checklist research task".to_string());
        }

        Self {
            query,
            follow_up_questions,
            max_results,
            search_depth: search_depth.to_string(),
        }
    }
}

/// One semi-structured search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    pub score: Option<f64>,
}

/// Aggregate result of one research invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchFindings {
    pub query: String,
    #[serde(default)]
    pub items: Vec<Finding>,
}

static FINDINGS_VALIDATOR: LazyLock<jsonschema::Validator> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(RESEARCH_FINDINGS_SCHEMA)
        .expect("findings schema should be valid json");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("findings schema should compile")
});

/// Validate a raw tool payload and deserialize it.
pub fn parse_findings(tool: ToolId, raw: &Value) -> Result<ResearchFindings, EngineError> {
    let messages: Vec<String> = FINDINGS_VALIDATOR
        .iter_errors(raw)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(EngineError::ToolOutput {
            tool,
            reason: messages.join("; "),
        });
    }
    serde_json::from_value(raw.clone()).map_err(|err| EngineError::ToolOutput {
        tool,
        reason: err.to_string(),
    })
}
