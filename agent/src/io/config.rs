//! Engine configuration loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Engine configuration (TOML).
///
/// Intended to be edited by humans; missing fields and a missing file both
/// fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for persisted checklists and tracking logs. Persistence
    /// is skipped entirely when unset.
    pub storage_dir: Option<PathBuf>,

    /// Thread key under which this conversation's artifacts are stored.
    pub thread_id: String,

    /// Loop-back passes allowed per revisited phase before forcing forward.
    pub max_revisits: u32,

    /// Clarifying questions surfaced to the user per task.
    pub max_clarifications: usize,

    /// Extra attempts after a timed-out or unreachable capability call.
    pub capability_retries: u32,

    /// Wall-clock budget for one skill invocation, in seconds.
    pub skill_timeout_secs: u64,

    /// Wall-clock budget for one tool invocation, in seconds.
    pub tool_timeout_secs: u64,

    /// Truncate captured capability output beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Byte budget for the conversation-history prompt slice.
    pub history_budget_bytes: usize,

    pub skill: SkillCommandConfig,
    pub research: ResearchConfig,
}

/// Command line for the structured-output skill backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkillCommandConfig {
    /// Base argv; the executor appends schema/output arguments.
    pub command: Vec<String>,
}

impl Default for SkillCommandConfig {
    fn default() -> Self {
        Self {
            command: vec!["codex".to_string(), "exec".to_string()],
        }
    }
}

/// Web-search tool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResearchConfig {
    /// API key; falls back to `TAVILY_API_KEY` when unset.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub max_results: usize,
    pub search_depth: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.tavily.com/search".to_string(),
            max_results: 8,
            search_depth: "advanced".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            thread_id: "default".to_string(),
            max_revisits: 3,
            max_clarifications: 3,
            capability_retries: 1,
            skill_timeout_secs: 5 * 60,
            tool_timeout_secs: 60,
            output_limit_bytes: 100_000,
            history_budget_bytes: 16_000,
            skill: SkillCommandConfig::default(),
            research: ResearchConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.thread_id.trim().is_empty() {
            return Err(anyhow!("thread_id must be non-empty"));
        }
        if self.max_revisits == 0 {
            return Err(anyhow!("max_revisits must be > 0"));
        }
        if self.skill_timeout_secs == 0 || self.tool_timeout_secs == 0 {
            return Err(anyhow!("capability timeouts must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.skill.command.is_empty() || self.skill.command[0].trim().is_empty() {
            return Err(anyhow!("skill.command must be a non-empty array"));
        }
        if self.research.max_results == 0 {
            return Err(anyhow!("research.max_results must be > 0"));
        }
        Ok(())
    }

    /// Research API key, config first, environment second.
    pub fn research_api_key(&self) -> Option<String> {
        self.research
            .api_key
            .clone()
            .or_else(|| std::env::var("TAVILY_API_KEY").ok())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = EngineConfig {
            thread_id: "migration-thread".to_string(),
            storage_dir: Some(temp.path().join("store")),
            ..EngineConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "thread_id = \"t1\"\nmax_revisits = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.thread_id, "t1");
        assert_eq!(cfg.max_revisits, 5);
        assert_eq!(
            cfg.skill.command,
            vec!["codex".to_string(), "exec".to_string()]
        );
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let cfg = EngineConfig {
            max_revisits: 0,
            ..EngineConfig::default()
        };
        cfg.validate().expect_err("invalid");
    }
}
