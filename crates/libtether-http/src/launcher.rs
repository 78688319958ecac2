//! Launching the supervisor as a detached process

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use libtether_core::{Launcher, TetherConfig, TetherError};
use tokio::process::Command;
use tracing::info;

/// Binary looked up next to the current executable, then on `PATH`
pub const SUPERVISOR_BINARY: &str = "tether-supervisor";

/// Starts the supervisor binary with its output discarded
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `launch_target` from config, or the default supervisor binary
    pub fn from_config(config: &TetherConfig) -> Self {
        match config.launch_target {
            Some(ref target) => Self::new(target),
            None => Self::new(find_supervisor_binary()),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self) -> Result<(), TetherError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| {
                TetherError::Launch(format!("failed to spawn {}: {}", self.program.display(), e))
            })?;

        info!(program = %self.program.display(), pid = ?child.id(), "supervisor launched");
        Ok(())
    }
}

fn find_supervisor_binary() -> PathBuf {
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let candidate = dir.join(SUPERVISOR_BINARY);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    PathBuf::from(SUPERVISOR_BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_target_wins() {
        let config = TetherConfig {
            launch_target: Some(PathBuf::from("/opt/tether/bin/supervisor")),
            ..TetherConfig::default()
        };
        assert_eq!(
            ProcessLauncher::from_config(&config).program(),
            Path::new("/opt/tether/bin/supervisor")
        );
    }

    #[test]
    fn test_default_target_name() {
        let launcher = ProcessLauncher::from_config(&TetherConfig::default());
        assert!(launcher.program().ends_with(SUPERVISOR_BINARY));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ProcessLauncher::new(dir.path().join("does-not-exist"));
        let err = launcher.launch().await.unwrap_err();
        assert!(matches!(err, TetherError::Launch(_)));
        assert_eq!(err.error_code(), "launch_failed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_spawns_program() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("launched");
        let launcher = ProcessLauncher::new("/bin/sh")
            .arg("-c")
            .arg(format!("touch {}", marker.display()));

        launcher.launch().await.unwrap();

        for _ in 0..100 {
            if marker.exists() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("launched program never ran");
    }
}
