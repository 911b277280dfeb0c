use std::time::Duration;

use log::{info, warn};
use rebuild_platform::{CommandError, CommandRunner};
use serde::Serialize;

/// `setx` truncates longer values.
pub const MAX_SETX_VALUE_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum EnvRestoreOutcome {
    Restored,
    Rejected(String),
    Failed(String),
    /// `setx` did not finish in time; the variable may or may not be set.
    Undetermined(String),
}

impl EnvRestoreOutcome {
    #[must_use]
    pub fn is_restored(&self) -> bool {
        matches!(self, Self::Restored)
    }
}

/// Persist a user environment variable with `setx`.
pub async fn restore_env_var(
    runner: &dyn CommandRunner,
    name: &str,
    value: &str,
    timeout: Duration,
) -> EnvRestoreOutcome {
    if name.trim().is_empty() || name.contains('=') {
        return EnvRestoreOutcome::Rejected(format!("Invalid variable name: {name:?}"));
    }
    let length = value.chars().count();
    if length > MAX_SETX_VALUE_LEN {
        warn!("Not restoring {name}: value is {length} characters");
        return EnvRestoreOutcome::Rejected(format!(
            "{name} is {length} characters, over the {MAX_SETX_VALUE_LEN} character limit of setx"
        ));
    }

    match runner.run("setx", &[name, value], timeout).await {
        Ok(output) if output.success() => {
            info!("Restored environment variable {name}");
            EnvRestoreOutcome::Restored
        }
        Ok(output) => EnvRestoreOutcome::Failed(format!(
            "setx {name} failed: {}",
            output.stderr.trim()
        )),
        Err(error @ CommandError::Timeout { .. }) => {
            EnvRestoreOutcome::Undetermined(error.to_string())
        }
        Err(error) => EnvRestoreOutcome::Failed(error.to_string()),
    }
}
