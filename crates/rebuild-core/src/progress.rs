use serde::Serialize;

use crate::restore::RestoreReport;

/// Discrete steps of an install-and-restore session, in the order a tool
/// passes through them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Starting {
        index: usize,
        total: usize,
        tool: String,
    },
    Installing {
        tool: String,
        method: String,
    },
    InstallComplete {
        tool: String,
        success: bool,
        message: String,
    },
    Restoring {
        tool: String,
    },
    Complete {
        tool: String,
        /// `None` when no install was attempted.
        install_ok: Option<bool>,
        requires_manual: bool,
        report: RestoreReport,
    },
}

impl ProgressEvent {
    #[must_use]
    pub fn tool(&self) -> &str {
        match self {
            Self::Starting { tool, .. }
            | Self::Installing { tool, .. }
            | Self::InstallComplete { tool, .. }
            | Self::Restoring { tool }
            | Self::Complete { tool, .. } => tool,
        }
    }
}
