//! Conversational checklist agent CLI.
//!
//! One `turn` per invocation: the state snapshot lives in a JSON file owned
//! by the caller, so a thread can be resumed, inspected, or rewound by
//! keeping older snapshots around.

use std::fs;
use std::path::{Path, PathBuf};

use agent::core::state::{AgentState, ChecklistSection, validate_state_invariants};
use agent::io::config::load_config;
use agent::io::executor::CommandSkillProvider;
use agent::io::research::TavilyClient;
use agent::run::Engine;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "agent",
    version,
    about = "Deterministic conversational checklist-building agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one conversational turn and persist the new state snapshot.
    Turn {
        /// The user message for this turn.
        #[arg(short, long)]
        message: String,
        /// Path of the state snapshot file (created on first turn).
        #[arg(long, default_value = ".agent/state.json")]
        state: PathBuf,
        /// Path of the engine config file.
        #[arg(long, default_value = ".agent/config.toml")]
        config: PathBuf,
    },
    /// Check a state snapshot against its semantic invariants.
    Validate {
        #[arg(long, default_value = ".agent/state.json")]
        state: PathBuf,
    },
    /// Print the current checklist and progress for a snapshot.
    Show {
        #[arg(long, default_value = ".agent/state.json")]
        state: PathBuf,
    },
}

fn main() {
    agent::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Turn {
            message,
            state,
            config,
        } => cmd_turn(&message, &state, &config),
        Command::Validate { state } => cmd_validate(&state),
        Command::Show { state } => cmd_show(&state),
    }
}

fn cmd_turn(message: &str, state_path: &Path, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let prior = load_state_if_present(state_path)?;

    let skills = CommandSkillProvider::new(config.skill.command.clone());
    let research = TavilyClient::new(&config)?;
    let engine = Engine::new(config, skills, research);

    let response = engine.run(message, prior);

    println!("{}", response.message.trim_end());
    if !response.sections.is_empty() {
        println!();
        println!("{}", render_sections(&response.sections).trim_end());
    }
    if response.complete {
        println!();
        println!("[workflow complete]");
    }

    write_state(state_path, &response.state)
        .with_context(|| format!("persist state {}", state_path.display()))?;
    Ok(())
}

fn cmd_validate(state_path: &Path) -> Result<()> {
    let state = load_state(state_path)?;
    let errors = validate_state_invariants(&state);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    println!("ok");
    Ok(())
}

fn cmd_show(state_path: &Path) -> Result<()> {
    let state = load_state(state_path)?;
    println!("phase: {}", state.workflow.phase);

    let sections = state.current_sections();
    if sections.is_empty() {
        println!("no checklist yet");
    } else {
        println!();
        println!("{}", render_sections(&sections).trim_end());
    }

    if !state.progress.is_empty() {
        println!();
        println!("progress ({} steps):", state.progress.len());
        for entry in state.progress.iter().rev().take(10).rev() {
            println!("  {} -> {}: {}", entry.from, entry.to, entry.summary);
        }
    }
    Ok(())
}

fn load_state_if_present(path: &Path) -> Result<Option<AgentState>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(load_state(path)?))
}

fn load_state(path: &Path) -> Result<AgentState> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let state: AgentState = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    let errors = validate_state_invariants(&state);
    if !errors.is_empty() {
        bail!(
            "state {} violates invariants:\n- {}",
            path.display(),
            errors.join("\n- ")
        );
    }
    Ok(state)
}

/// Atomically write the state snapshot (temp file + rename).
fn write_state(path: &Path, state: &AgentState) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create state dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(state).context("serialize state")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}

fn render_sections(sections: &[ChecklistSection]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&format!("## {} ({})\n", section.name, section.objective));
        for item in &section.items {
            let mark = if item.completed { "x" } else { " " };
            out.push_str(&format!(
                "- [{mark}] {} {}: {}\n",
                item.identifier, item.title, item.description
            ));
            for step in &item.sub_steps {
                out.push_str(&format!("    - {step}\n"));
            }
        }
        out.push('\n');
    }
    out
}
