//! Invocation of external collaborators (CAD kernel, LiDAR simulator).
//!
//! Each stage is a child process bounded by a timeout. Its output goes to a
//! log file next to the bridge's artifacts; a non-zero exit, a spawn failure
//! or an expired timeout becomes [`BridgeError::ExternalStageFailure`].

use crate::config::ExternalStageConfig;
use crate::error::{BridgeError, Result};
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ExternalStage<'a> {
    name: &'static str,
    config: &'a ExternalStageConfig,
}

impl<'a> ExternalStage<'a> {
    pub fn new(name: &'static str, config: &'a ExternalStageConfig) -> Self {
        Self { name, config }
    }

    /// Arguments with every `{key}` replaced by its value.
    pub fn arguments(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect()
    }

    fn failure(&self, reason: String) -> BridgeError {
        BridgeError::ExternalStageFailure {
            stage: self.name.to_string(),
            reason,
        }
    }

    /// Run the stage to completion, killing it when the timeout expires.
    pub fn run(&self, vars: &[(&str, &str)], log_path: &Path) -> Result<()> {
        let args = self.arguments(vars);
        log::info!("Running {} stage: {} {}", self.name, self.config.program, args.join(" "));

        let log_file = File::create(log_path)?;
        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file.try_clone()?))
            .stderr(Stdio::from(log_file))
            .spawn()
            .map_err(|e| self.failure(format!("could not start '{}': {e}", self.config.program)))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                return Err(self.failure(format!(
                    "exited with {status}, see {}",
                    log_path.display()
                )));
            }
            if Instant::now() >= deadline {
                // The child may exit between the poll and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.failure(format!(
                    "timed out after {}s",
                    timeout.as_secs()
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stage_config(program: &str, args: &[&str], timeout_secs: u64) -> ExternalStageConfig {
        ExternalStageConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs,
        }
    }

    #[test]
    fn placeholders_are_substituted() {
        let config = stage_config("helios", &["{survey}", "--output", "{output}/legs", "-vt"], 10);
        let stage = ExternalStage::new("lidar", &config);
        let args = stage.arguments(&[("survey", "s.xml"), ("output", "/tmp/out")]);
        assert_eq!(args, vec!["s.xml", "--output", "/tmp/out/legs", "-vt"]);
    }

    #[test]
    fn missing_program_is_a_stage_failure() {
        let dir = tempdir().unwrap();
        let config = stage_config("definitely-not-a-real-simulator", &[], 5);
        let err = ExternalStage::new("cad", &config)
            .run(&[], &dir.path().join("cad.log"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ExternalStageFailure { ref stage, .. } if stage == "cad"));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_and_timeout_fail() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("stage.log");

        let failing = stage_config("sh", &["-c", "echo broken >&2; exit 3"], 5);
        let err = ExternalStage::new("cad", &failing).run(&[], &log).unwrap_err();
        assert!(matches!(err, BridgeError::ExternalStageFailure { .. }));
        assert!(std::fs::read_to_string(&log).unwrap().contains("broken"));

        let slow = stage_config("sleep", &["5"], 0);
        let started = Instant::now();
        let err = ExternalStage::new("lidar", &slow).run(&[], &log).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));

        let ok = stage_config("sh", &["-c", "exit 0"], 5);
        ExternalStage::new("cad", &ok).run(&[], &log).unwrap();
    }
}
