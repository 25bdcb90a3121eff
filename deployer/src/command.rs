//! External command execution

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Failure of a single external command.
///
/// `code` is `None` when the process could not be spawned or was killed by a signal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", self.describe())]
pub struct CommandError {
    pub code: Option<i32>,
    pub output: String,
}

impl CommandError {
    pub fn new(code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            code,
            output: output.into(),
        }
    }

    fn describe(&self) -> String {
        let output = self.output.trim();
        match (output.is_empty(), self.code) {
            (false, _) => output.to_string(),
            (true, Some(code)) => format!("exit status {}", code),
            (true, None) => "command terminated without exit status".to_string(),
        }
    }

    /// Whether the scheduler answered that the unit is already gone.
    ///
    /// A bare exit status 1 with no output counts as missing, that is how fleetctl
    /// reports a destroy of an unknown unit on some versions.
    pub fn is_missing_unit(&self) -> bool {
        let output = self.output.to_lowercase();
        if output.contains("does not exist") || output.contains("not found") {
            return true;
        }
        self.code == Some(1) && output.trim().is_empty()
    }
}

/// Executes external programs and returns their combined output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError>;
}

/// Runs commands as child processes of the server.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        debug!("exec: {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| CommandError::new(None, e.to_string()))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(CommandError::new(output.status.code(), combined));
        }
        Ok(combined)
    }
}
