//! Loop-level harness tests for full workflow scenarios.
//!
//! These tests drive `Engine::run` across turns with scripted capability
//! providers to verify end-to-end behavior: phase traversal, pause points,
//! failure recovery, tracking, and termination.

use std::fs;

use agent::core::phase::Phase;
use agent::core::state::AgentState;
use agent::io::config::EngineConfig;
use agent::run::{AgentResponse, Engine};
use agent::test_support::{
    ScriptedResearch, ScriptedSkills, decide_research_value, draft_value, emit_value,
    extract_signals_value, finalize_value, findings_value, gap_value, integrate_findings_value,
    judge_value, normalize_value, outline_value, parse_task_value, scoping_value,
    source_selection_value,
};

fn engine_with(
    config: EngineConfig,
    skills: Vec<serde_json::Value>,
    research: Vec<serde_json::Value>,
) -> Engine<ScriptedSkills, ScriptedResearch> {
    Engine::new(config, ScriptedSkills::new(skills), ScriptedResearch::new(research))
}

/// Turn 1 of a fresh thread: parse and scope run back to back, then the loop
/// pauses with the scoping skill's clarification questions.
///
/// Asserts:
/// - phase has advanced past parsing and scoping (paused at deciding-research)
/// - at most 3 questions, all present in the message
/// - the turn is not complete
#[test]
fn scenario_a_fresh_task_pauses_with_clarifications() {
    let engine = engine_with(
        EngineConfig::default(),
        vec![
            parse_task_value("Migrate the orders database to a new cluster"),
            scoping_value(&[
                "Which database engine and version?",
                "How much downtime is acceptable?",
                "Is there a hard deadline?",
                "A fourth question that must be dropped",
            ]),
        ],
        vec![],
    );

    let response = engine.run("Plan a database migration", None);

    assert!(!response.complete);
    assert_eq!(response.state.workflow.phase, Phase::DecidingResearch);
    assert_eq!(response.state.working.clarifications.questions.len(), 3);
    assert!(response.message.contains("1. Which database engine and version?"));
    assert!(response.message.contains("3. Is there a hard deadline?"));
    assert!(!response.message.contains("fourth question"));

    // The pause is recorded in the progress log as real transitions.
    let phases_visited: Vec<Phase> = response.state.progress.iter().map(|p| p.to).collect();
    assert!(phases_visited.contains(&Phase::ScopingAndAssumptions));
    assert!(phases_visited.contains(&Phase::DecidingResearch));
}

/// Turn 2: the clarification reply releases the pause and the no-research
/// path runs to completion, producing a non-empty checklist.
#[test]
fn scenario_b_answers_resume_to_a_drafted_checklist() {
    let paused = paused_after_clarifications();

    let engine = engine_with(
        EngineConfig::default(),
        vec![
            decide_research_value(false, &[]),
            outline_value(),
            draft_value(&["1.1", "1.2"]),
            draft_value(&["1.1", "1.2"]),
            normalize_value(&["1.1", "1.2"]),
            judge_value(0.9, true),
            finalize_value(&["1.1", "1.2"]),
            emit_value("Your migration checklist is ready."),
        ],
        vec![],
    );
    let response = engine.run("Postgres 14; one hour of downtime is fine", Some(paused.state));

    assert!(response.complete);
    assert!(!response.sections.is_empty());
    assert!(!response.sections[0].items.is_empty());
    let final_package = response.state.working.final_package.as_ref().expect("final package");
    assert_eq!(final_package.item_count(), 2);
}

/// A malformed skill payload aborts the iteration: the response carries the
/// unchanged pre-call workflow and a retry-prompting message.
#[test]
fn scenario_c_malformed_payload_leaves_state_unchanged() {
    let paused = paused_after_clarifications();
    let before = paused.state.clone();

    let engine = engine_with(
        EngineConfig::default(),
        vec![serde_json::json!({"garbage": true})],
        vec![],
    );
    let response = engine.run("Postgres 14", Some(paused.state));

    assert!(!response.complete);
    assert!(response.message.contains("please send the message again"));
    // Workflow and working memory match the pre-call snapshot; only the
    // user's message was recorded before the capability ran.
    assert_eq!(response.state.workflow, before.workflow);
    assert_eq!(response.state.working.task_overview, before.working.task_overview);
    assert_eq!(response.state.working.draft_package, before.working.draft_package);
    assert_eq!(response.state.progress, before.progress);
    assert_eq!(response.state.conversation.len(), before.conversation.len() + 1);
}

/// "completed item 2" flips exactly the second item of the finalized
/// checklist and leaves every other item untouched.
#[test]
fn scenario_d_tracking_update_flips_one_item() {
    let finished = completed_workflow_state(&["1.1", "1.2", "1.3"]);

    let engine = engine_with(EngineConfig::default(), vec![], vec![]);
    let response = engine.run("completed item 2", Some(finished));

    assert!(!response.complete);
    assert!(response.message.contains("Marked item 1.2 as complete"));
    let items: Vec<_> = response
        .state
        .working
        .final_package
        .as_ref()
        .expect("package")
        .items()
        .map(|item| (item.identifier.clone(), item.completed))
        .collect();
    assert_eq!(
        items,
        vec![
            ("1.1".to_string(), false),
            ("1.2".to_string(), true),
            ("1.3".to_string(), false),
        ]
    );
}

/// Completing the final open item routes through emission: the next response
/// is complete and its summary references the progress log.
#[test]
fn scenario_e_all_items_complete_emits_a_summary() {
    let finished = completed_workflow_state(&["1.1", "1.2"]);

    let engine = engine_with(EngineConfig::default(), vec![], vec![]);
    let first = engine.run("completed item 1", Some(finished));
    assert!(!first.complete);

    let engine = engine_with(
        EngineConfig::default(),
        vec![emit_value("Everything on the checklist is done.")],
        vec![],
    );
    let second = engine.run("completed item 2", Some(first.state));

    assert!(second.complete);
    assert!(second.message.contains("Everything on the checklist is done."));
    assert!(second.message.contains("All 2 checklist items are complete."));
    assert!(second.message.contains("Progress log:"));
    assert!(second.metadata.contains_key("progress_entries"));
}

/// The research arm: deciding-research routes through the tool, and the
/// tool's findings feed the downstream skills.
#[test]
fn research_arm_runs_tool_then_structures_findings() {
    let paused = paused_after_clarifications();

    let engine = engine_with(
        EngineConfig::default(),
        vec![
            decide_research_value(true, &["current zero-downtime migration practice"]),
            source_selection_value(2),
            extract_signals_value(2),
            integrate_findings_value(2),
            outline_value(),
            draft_value(&["1.1"]),
            draft_value(&["1.1"]),
            normalize_value(&["1.1"]),
            judge_value(0.85, true),
            finalize_value(&["1.1"]),
            emit_value("Checklist ready, informed by research."),
        ],
        vec![findings_value(3)],
    );
    let response = engine.run("No further constraints", Some(paused.state));

    assert!(response.complete);
    assert_eq!(response.state.working.research_sources.len(), 3);
    assert_eq!(response.state.working.research_signals.len(), 2);
    let phases_visited: Vec<Phase> = response.state.progress.iter().map(|p| p.to).collect();
    assert!(phases_visited.contains(&Phase::WebResearch));
    assert!(phases_visited.contains(&Phase::SourceSelection));
}

/// Termination: a judge that never passes and a gap analysis that always
/// demands depth still reach finalization within the revisit bound.
#[test]
fn adversarial_gap_routes_terminate_within_the_bound() {
    let paused = paused_after_clarifications();

    // Each remediation round replays gap -> deepen -> normalize -> judge.
    // Rounds 1-3 loop back; the fourth gap verdict hits the bound and is
    // forced forward to finalization.
    let mut script = vec![
        decide_research_value(false, &[]),
        outline_value(),
        draft_value(&["1.1"]),
        draft_value(&["1.1"]),
        normalize_value(&["1.1"]),
        judge_value(0.4, false),
    ];
    for _ in 0..3 {
        script.push(gap_value("needs_depth"));
        script.push(draft_value(&["1.1"]));
        script.push(normalize_value(&["1.1"]));
        script.push(judge_value(0.4, false));
    }
    script.push(gap_value("needs_depth"));
    script.push(finalize_value(&["1.1"]));
    script.push(emit_value("Shipped despite the stubborn judge."));

    let engine = engine_with(EngineConfig::default(), script, vec![]);
    let response = engine.run("Ship it", Some(paused.state));

    assert!(response.complete, "message: {}", response.message);
    let revisits = &response.state.workflow.revisits;
    assert_eq!(revisits.get("deepening_checklist"), Some(&3));
}

/// Snapshots are value data: the caller's retained prior snapshot is
/// untouched by a later run over it, so rerunning from it is always safe.
#[test]
fn prior_snapshots_survive_later_runs() {
    let paused = paused_after_clarifications();
    let retained = paused.state.clone();

    let engine = engine_with(
        EngineConfig::default(),
        vec![decide_research_value(false, &[]), outline_value()],
        vec![],
    );
    let advanced = engine.run("Postgres 14", Some(paused.state));
    assert!(advanced.state.working.draft_package.is_some());

    assert_eq!(retained.workflow.phase, Phase::DecidingResearch);
    assert!(retained.working.draft_package.is_none());
    assert!(retained.working.clarifications.pending());

    // Rerunning from the retained snapshot still works.
    let engine = engine_with(
        EngineConfig::default(),
        vec![decide_research_value(false, &[]), outline_value()],
        vec![],
    );
    let rerun = engine.run("Postgres 14", Some(retained));
    assert!(rerun.state.working.draft_package.is_some());
}

/// Finalization persists the checklist under `storage_dir/<thread>`, and
/// tracking updates append to the tracking log.
#[test]
fn storage_dir_receives_checklist_and_tracking_log() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = EngineConfig {
        storage_dir: Some(temp.path().to_path_buf()),
        thread_id: "thread-42".to_string(),
        ..EngineConfig::default()
    };

    let paused = paused_after_clarifications();
    let engine = engine_with(
        config.clone(),
        vec![
            decide_research_value(false, &[]),
            outline_value(),
            draft_value(&["1.1", "1.2"]),
            draft_value(&["1.1", "1.2"]),
            normalize_value(&["1.1", "1.2"]),
            judge_value(0.9, true),
            finalize_value(&["1.1", "1.2"]),
            emit_value("Done."),
        ],
        vec![],
    );
    let completed = engine.run("Postgres 14", Some(paused.state));
    assert!(completed.complete);

    let checklist_path = temp.path().join("thread-42/checklist.json");
    assert!(checklist_path.is_file());

    let engine = engine_with(config, vec![], vec![]);
    let tracked = engine.run("completed item 1", Some(completed.state));
    assert!(!tracked.complete);

    let log = fs::read_to_string(temp.path().join("thread-42/tracking.log")).expect("log");
    assert!(log.contains("item=1.1 marked=complete"));

    // The persisted checklist reflects the flipped flag.
    let persisted = fs::read_to_string(&checklist_path).expect("checklist");
    assert!(persisted.contains("\"completed\": true"));
}

/// Drive a fresh thread to the clarification pause.
fn paused_after_clarifications() -> AgentResponse {
    let engine = engine_with(
        EngineConfig::default(),
        vec![
            parse_task_value("Migrate the orders database to a new cluster"),
            scoping_value(&["Which database engine and version?"]),
        ],
        vec![],
    );
    let response = engine.run("Plan a database migration", None);
    assert!(!response.complete);
    assert_eq!(response.state.workflow.phase, Phase::DecidingResearch);
    response
}

/// Drive a fresh thread through a full no-research build, ending back at
/// intake with a finalized package ready for tracking.
fn completed_workflow_state(identifiers: &[&str]) -> AgentState {
    let paused = paused_after_clarifications();

    let script = vec![
        decide_research_value(false, &[]),
        outline_value(),
        draft_value(identifiers),
        draft_value(identifiers),
        normalize_value(identifiers),
        judge_value(0.9, true),
        finalize_value(identifiers),
        emit_value("Checklist delivered."),
    ];
    let engine = engine_with(EngineConfig::default(), script, vec![]);
    let response = engine.run("Postgres 14", Some(paused.state));
    assert!(response.complete);
    response.state
}
