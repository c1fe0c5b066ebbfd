//! Skill-provider abstraction and the command-backed implementation.
//!
//! The [`SkillProvider`] trait decouples the orchestration loop from the
//! structured-output backend (by default `codex exec`). Providers return the
//! raw JSON payload; schema validation and typed parsing happen in
//! [`crate::skills::parse_output`], so a provider can never hand the memory
//! manager unvalidated data. Tests use scripted providers that return
//! predetermined payloads without spawning processes.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::anyhow;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::decision::SkillId;
use crate::error::EngineError;
use crate::io::process::run_command_with_timeout;

/// Parameters for one skill invocation.
#[derive(Debug, Clone)]
pub struct SkillRequest {
    pub skill: SkillId,
    /// Rendered prompt fed to the backend on stdin.
    pub prompt: String,
    /// JSON Schema constraining the structured output.
    pub schema: &'static str,
    /// Maximum time to wait for the backend.
    pub timeout: Duration,
    /// Truncate captured backend output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over structured-output skill backends.
pub trait SkillProvider {
    /// Run the skill and return its raw JSON payload.
    fn invoke(&self, request: &SkillRequest) -> Result<Value, EngineError>;
}

/// Provider that spawns a configurable structured-output agent command.
///
/// The configured argv is extended with `--output-schema <path>
/// --output-last-message <path> -`, the prompt is piped on stdin, and the
/// payload is read back from the output file.
pub struct CommandSkillProvider {
    command: Vec<String>,
    scratch_dir: PathBuf,
}

impl CommandSkillProvider {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            scratch_dir: std::env::temp_dir().join("agent-skill-exec"),
        }
    }

    /// Override where schema and output files are staged.
    pub fn with_scratch_dir(mut self, scratch_dir: PathBuf) -> Self {
        self.scratch_dir = scratch_dir;
        self
    }
}

impl SkillProvider for CommandSkillProvider {
    #[instrument(skip_all, fields(skill = %request.skill, timeout_secs = request.timeout.as_secs()))]
    fn invoke(&self, request: &SkillRequest) -> Result<Value, EngineError> {
        let skill = request.skill;
        let fault = |cause: anyhow::Error| EngineError::Capability {
            name: skill.as_str().to_string(),
            cause,
        };

        fs::create_dir_all(&self.scratch_dir)
            .map_err(|err| fault(anyhow!("create scratch dir: {err}")))?;
        let schema_path = self.scratch_dir.join(format!("{skill}.schema.json"));
        let output_path = self.scratch_dir.join(format!("{skill}.output.json"));
        fs::write(&schema_path, request.schema)
            .map_err(|err| fault(anyhow!("write schema file: {err}")))?;
        if output_path.exists() {
            fs::remove_file(&output_path)
                .map_err(|err| fault(anyhow!("clear stale output file: {err}")))?;
        }

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| fault(anyhow!("skill command is empty")))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg("--output-schema")
            .arg(&schema_path)
            .arg("--output-last-message")
            .arg(&output_path)
            .arg("-");

        info!(program, "invoking skill backend");
        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .map_err(fault)?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "skill backend timed out");
            return Err(EngineError::SkillTimeout {
                skill,
                timeout_secs: request.timeout.as_secs(),
            });
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "skill backend failed");
            return Err(fault(anyhow!(
                "exited with status {:?}: {}",
                output.status.code(),
                output.stderr_excerpt(400)
            )));
        }

        let contents = fs::read_to_string(&output_path).map_err(|err| EngineError::SkillOutput {
            skill,
            reason: format!("missing structured output file: {err}"),
        })?;
        let value: Value =
            serde_json::from_str(&contents).map_err(|err| EngineError::SkillOutput {
                skill,
                reason: format!("output is not valid json: {err}"),
            })?;
        debug!("skill backend produced structured output");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(skill: SkillId) -> SkillRequest {
        SkillRequest {
            skill,
            prompt: "prompt".to_string(),
            schema: skill.definition().schema,
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        }
    }

    /// A backend that copies stdin to the output file stands in for the real
    /// agent command: the provider must hand back exactly what was written.
    #[test]
    fn reads_back_the_output_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let provider = CommandSkillProvider::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            // Drains the piped prompt, then writes a fixed payload to the
            // --output-last-message path ($4).
            r#"cat >/dev/null; printf '{"ai_response":"ok","final_message":"m","call_to_action":"c"}' > "$4""#
                .to_string(),
            "sh".to_string(),
        ])
        .with_scratch_dir(temp.path().to_path_buf());

        let value = provider
            .invoke(&request(SkillId::EmitChecklist))
            .expect("invoke");
        assert_eq!(value["final_message"], "m");
    }

    #[test]
    fn missing_output_is_a_skill_output_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let provider = CommandSkillProvider::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat >/dev/null".to_string(),
            "sh".to_string(),
        ])
        .with_scratch_dir(temp.path().to_path_buf());
        let err = provider
            .invoke(&request(SkillId::EmitChecklist))
            .expect_err("no output");
        assert!(matches!(err, EngineError::SkillOutput { .. }));
    }

    #[test]
    fn nonzero_exit_is_a_capability_fault() {
        let temp = tempfile::tempdir().expect("tempdir");
        let provider = CommandSkillProvider::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat >/dev/null; exit 1".to_string(),
            "sh".to_string(),
        ])
        .with_scratch_dir(temp.path().to_path_buf());
        let err = provider
            .invoke(&request(SkillId::ParseTask))
            .expect_err("failure");
        assert!(matches!(err, EngineError::Capability { .. }));
    }

    #[test]
    fn slow_backends_surface_as_timeouts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let provider = CommandSkillProvider::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "sleep 5".to_string(),
        ])
        .with_scratch_dir(temp.path().to_path_buf());
        let mut req = request(SkillId::ParseTask);
        req.timeout = Duration::from_millis(100);
        let err = provider.invoke(&req).expect_err("timeout");
        assert!(matches!(err, EngineError::SkillTimeout { .. }));
    }
}
