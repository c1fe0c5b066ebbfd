//! The closed skill registry: templates, output schemas, and typed parsing.
//!
//! Each skill pairs a minijinja prompt template with a JSON Schema for its
//! structured output. The executor renders the template over the skill's
//! declared slice of state, and every raw payload is validated against the
//! schema before it becomes a typed [`SkillOutput`]; a payload that fails
//! validation never reaches the memory manager.

pub mod outputs;
pub mod prompt;

use jsonschema::Draft;
use serde_json::Value;

use crate::core::decision::SkillId;
use crate::error::EngineError;
use outputs::SkillOutput;

/// Declarative specification for a single skill.
#[derive(Debug, Clone, Copy)]
pub struct SkillDefinition {
    pub id: SkillId,
    /// Minijinja template source for the prompt.
    pub template: &'static str,
    /// JSON Schema (Draft 2020-12) constraining the structured output.
    pub schema: &'static str,
}

impl SkillId {
    /// Look up the declarative definition for this skill.
    pub fn definition(self) -> SkillDefinition {
        macro_rules! def {
            ($template:literal, $schema:literal) => {
                SkillDefinition {
                    id: self,
                    template: include_str!($template),
                    schema: include_str!($schema),
                }
            };
        }
        match self {
            SkillId::ParseTask => def!(
                "prompts/parse_task.md",
                "../../schemas/parse_task.schema.json"
            ),
            SkillId::ScopeAndAssume => def!(
                "prompts/scope_and_assume.md",
                "../../schemas/scope_and_assume.schema.json"
            ),
            SkillId::DecideResearch => def!(
                "prompts/decide_research.md",
                "../../schemas/decide_research.schema.json"
            ),
            SkillId::SourceSelection => def!(
                "prompts/source_selection.md",
                "../../schemas/source_selection.schema.json"
            ),
            SkillId::ExtractSignals => def!(
                "prompts/extract_signals.md",
                "../../schemas/extract_signals.schema.json"
            ),
            SkillId::IntegrateFindings => def!(
                "prompts/integrate_findings.md",
                "../../schemas/integrate_findings.schema.json"
            ),
            SkillId::OutlineSkeleton => def!(
                "prompts/outline_skeleton.md",
                "../../schemas/outline_skeleton.schema.json"
            ),
            SkillId::DraftChecklist => def!(
                "prompts/draft_checklist.md",
                "../../schemas/draft_checklist.schema.json"
            ),
            SkillId::DeepenChecklist => def!(
                "prompts/deepen_checklist.md",
                "../../schemas/deepen_checklist.schema.json"
            ),
            SkillId::NormalizeChecklist => def!(
                "prompts/normalize_checklist.md",
                "../../schemas/normalize_checklist.schema.json"
            ),
            SkillId::SelfJudge => def!(
                "prompts/self_judge.md",
                "../../schemas/self_judge.schema.json"
            ),
            SkillId::GapAnalysis => def!(
                "prompts/gap_analysis.md",
                "../../schemas/gap_analysis.schema.json"
            ),
            SkillId::FinalizeChecklist => def!(
                "prompts/finalize_checklist.md",
                "../../schemas/finalize_checklist.schema.json"
            ),
            SkillId::EmitChecklist => def!(
                "prompts/emit_checklist.md",
                "../../schemas/emit_checklist.schema.json"
            ),
        }
    }

    pub fn all() -> [SkillId; 14] {
        [
            SkillId::ParseTask,
            SkillId::ScopeAndAssume,
            SkillId::DecideResearch,
            SkillId::SourceSelection,
            SkillId::ExtractSignals,
            SkillId::IntegrateFindings,
            SkillId::OutlineSkeleton,
            SkillId::DraftChecklist,
            SkillId::DeepenChecklist,
            SkillId::NormalizeChecklist,
            SkillId::SelfJudge,
            SkillId::GapAnalysis,
            SkillId::FinalizeChecklist,
            SkillId::EmitChecklist,
        ]
    }
}

/// Validate a raw payload against `skill`'s schema and deserialize it into
/// the matching typed output.
pub fn parse_output(skill: SkillId, raw: &Value) -> Result<SkillOutput, EngineError> {
    validate_against_schema(skill, raw)?;

    let invalid = |err: serde_json::Error| EngineError::SkillOutput {
        skill,
        reason: err.to_string(),
    };
    let output = match skill {
        SkillId::ParseTask => SkillOutput::ParseTask(from_value(raw).map_err(invalid)?),
        SkillId::ScopeAndAssume => SkillOutput::ScopeAndAssume(from_value(raw).map_err(invalid)?),
        SkillId::DecideResearch => SkillOutput::DecideResearch(from_value(raw).map_err(invalid)?),
        SkillId::SourceSelection => SkillOutput::SourceSelection(from_value(raw).map_err(invalid)?),
        SkillId::ExtractSignals => SkillOutput::ExtractSignals(from_value(raw).map_err(invalid)?),
        SkillId::IntegrateFindings => {
            SkillOutput::IntegrateFindings(from_value(raw).map_err(invalid)?)
        }
        SkillId::OutlineSkeleton => SkillOutput::OutlineSkeleton(from_value(raw).map_err(invalid)?),
        SkillId::DraftChecklist => SkillOutput::DraftChecklist(from_value(raw).map_err(invalid)?),
        SkillId::DeepenChecklist => SkillOutput::DeepenChecklist(from_value(raw).map_err(invalid)?),
        SkillId::NormalizeChecklist => {
            SkillOutput::NormalizeChecklist(from_value(raw).map_err(invalid)?)
        }
        SkillId::SelfJudge => SkillOutput::SelfJudge(from_value(raw).map_err(invalid)?),
        SkillId::GapAnalysis => SkillOutput::GapAnalysis(from_value(raw).map_err(invalid)?),
        SkillId::FinalizeChecklist => {
            SkillOutput::FinalizeChecklist(from_value(raw).map_err(invalid)?)
        }
        SkillId::EmitChecklist => SkillOutput::EmitChecklist(from_value(raw).map_err(invalid)?),
    };
    Ok(output)
}

fn from_value<T: serde::de::DeserializeOwned>(raw: &Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(raw.clone())
}

fn validate_against_schema(skill: SkillId, raw: &Value) -> Result<(), EngineError> {
    let definition = skill.definition();
    let schema: Value =
        serde_json::from_str(definition.schema).map_err(|err| EngineError::SkillOutput {
            skill,
            reason: format!("skill schema is not valid json: {err}"),
        })?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| EngineError::SkillOutput {
            skill,
            reason: format!("skill schema failed to compile: {err}"),
        })?;
    let messages: Vec<String> = compiled.iter_errors(raw).map(|err| err.to_string()).collect();
    if !messages.is_empty() {
        return Err(EngineError::SkillOutput {
            skill,
            reason: messages.join("; "),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Every registered skill must carry a compilable schema and a non-empty
    /// template, or dispatch would fail at runtime.
    #[test]
    fn every_definition_is_well_formed() {
        for skill in SkillId::all() {
            let definition = skill.definition();
            assert!(!definition.template.trim().is_empty(), "{skill}");
            let schema: Value =
                serde_json::from_str(definition.schema).unwrap_or_else(|err| {
                    panic!("{skill}: schema not json: {err}");
                });
            jsonschema::options()
                .with_draft(Draft::Draft202012)
                .build(&schema)
                .unwrap_or_else(|err| panic!("{skill}: schema not compilable: {err}"));
        }
    }

    #[test]
    fn parse_output_round_trips_a_valid_payload() {
        let raw = json!({
            "ai_response": "Parsed the task.",
            "goal": "Migrate the orders database",
            "constraints": ["zero downtime"],
            "audience": ["platform team"],
            "success_criteria": ["old cluster decommissioned"]
        });
        let output = parse_output(SkillId::ParseTask, &raw).expect("parse");
        let SkillOutput::ParseTask(parsed) = output else {
            panic!("wrong variant");
        };
        assert_eq!(parsed.goal, "Migrate the orders database");
    }

    #[test]
    fn parse_output_rejects_missing_required_fields() {
        let raw = json!({"ai_response": "no goal here"});
        let err = parse_output(SkillId::ParseTask, &raw).expect_err("invalid");
        assert!(matches!(err, EngineError::SkillOutput { .. }));
    }

    #[test]
    fn parse_output_rejects_wrong_types() {
        let raw = json!({
            "ai_response": "judged",
            "score": "high",
            "threshold_met": true
        });
        parse_output(SkillId::SelfJudge, &raw).expect_err("invalid");
    }

    #[test]
    fn gap_route_must_be_a_known_variant() {
        let raw = json!({
            "ai_response": "routed",
            "route": "needs_coffee",
            "reason": "r",
            "next_focus": "f"
        });
        parse_output(SkillId::GapAnalysis, &raw).expect_err("invalid");
    }
}
