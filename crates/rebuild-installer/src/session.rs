use std::path::Path;
use std::time::Duration;

use log::info;
use rebuild_core::{InstallPlan, ProgressEvent, RestoreEngine, RestoreReport, ToolManifestEntry};
use tokio::sync::mpsc;

use crate::installer::{InstallResult, Installer};

/// One tool to bring back. `plan` is `None` for tools that are already
/// installed and only need their configuration.
#[derive(Debug, Clone)]
pub struct SessionItem {
    pub entry: ToolManifestEntry,
    pub plan: Option<InstallPlan>,
}

#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool: String,
    pub install: Option<InstallResult>,
    pub report: RestoreReport,
}

impl ToolOutcome {
    #[must_use]
    pub fn requires_manual(&self) -> bool {
        self.install
            .as_ref()
            .is_some_and(|install| !install.success() && install.requires_manual())
    }
}

/// Installs and restores tools one after another, reporting each step.
pub struct RestoreSession<'a> {
    installer: &'a Installer,
    engine: &'a RestoreEngine,
    settle: Duration,
}

impl<'a> RestoreSession<'a> {
    pub fn new(installer: &'a Installer, engine: &'a RestoreEngine, settle: Duration) -> Self {
        Self {
            installer,
            engine,
            settle,
        }
    }

    /// Configuration is restored even when the install failed or needs a
    /// manual step, so it is in place once the tool is installed by hand.
    pub async fn run(
        &self,
        items: &[SessionItem],
        working_dir: &Path,
        recorded_location: Option<&Path>,
        progress: &mpsc::Sender<ProgressEvent>,
    ) -> Vec<ToolOutcome> {
        let total = items.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, item) in items.iter().enumerate() {
            let tool = item.entry.name.clone();
            let _ = progress
                .send(ProgressEvent::Starting {
                    index: index + 1,
                    total,
                    tool: tool.clone(),
                })
                .await;

            let install = match &item.plan {
                Some(plan) => Some(self.install(&tool, plan, progress).await),
                None => None,
            };

            let _ = progress
                .send(ProgressEvent::Restoring { tool: tool.clone() })
                .await;
            if install.as_ref().is_some_and(InstallResult::success) && !self.settle.is_zero() {
                tokio::time::sleep(self.settle).await;
            }
            let report = self
                .engine
                .restore(&item.entry, working_dir, recorded_location)
                .await;

            let outcome = ToolOutcome {
                tool: tool.clone(),
                install,
                report,
            };
            let _ = progress
                .send(ProgressEvent::Complete {
                    tool,
                    install_ok: outcome.install.as_ref().map(InstallResult::success),
                    requires_manual: outcome.requires_manual(),
                    report: outcome.report.clone(),
                })
                .await;
            outcomes.push(outcome);
        }

        info!("Session finished for {total} tools");
        outcomes
    }

    async fn install(
        &self,
        tool: &str,
        plan: &InstallPlan,
        progress: &mpsc::Sender<ProgressEvent>,
    ) -> InstallResult {
        if let Some(method) = Installer::describe(plan) {
            let _ = progress
                .send(ProgressEvent::Installing {
                    tool: tool.to_string(),
                    method,
                })
                .await;
        }
        let result = self.installer.install(tool, plan).await;
        let _ = progress
            .send(ProgressEvent::InstallComplete {
                tool: tool.to_string(),
                success: result.success(),
                message: result.message.clone(),
            })
            .await;
        result
    }
}
