use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rebuild_platform::CommandRunner;
use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::types::DetectedTool;

/// Runs the PowerShell detection script and parses the tools it reports.
pub struct Detector {
    runner: Arc<dyn CommandRunner>,
    script: PathBuf,
    timeout: Duration,
}

impl Detector {
    pub fn new(runner: Arc<dyn CommandRunner>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            runner,
            script: script.into(),
            timeout,
        }
    }

    /// # Errors
    /// Returns an error if the script is missing, fails, times out or prints
    /// something other than tool records.
    pub async fn detect(&self) -> Result<Vec<DetectedTool>, DetectError> {
        if !self.script.is_file() {
            return Err(DetectError::ScriptMissing {
                path: self.script.clone(),
            });
        }

        let script = self.script.to_string_lossy().into_owned();
        debug!("Running detection script {script}");
        let output = self
            .runner
            .run(
                "powershell",
                &[
                    "-ExecutionPolicy",
                    "Bypass",
                    "-NoLogo",
                    "-NonInteractive",
                    "-File",
                    script.as_str(),
                ],
                self.timeout,
            )
            .await?;

        let stdout = output.stdout.trim();
        if !output.success() || stdout.is_empty() {
            let stderr = output.stderr.trim();
            return Err(DetectError::Failed {
                stderr: if stderr.is_empty() {
                    "No output from detection script".to_string()
                } else {
                    stderr.to_string()
                },
            });
        }

        let tools = parse_detection_output(stdout)?;
        info!("Detected {} tools", tools.len());
        Ok(tools)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionOutput {
    Many(Vec<DetectedTool>),
    One(DetectedTool),
    Nothing(()),
}

/// Parse detection JSON: an array of records, a single record (PowerShell
/// unwraps one-element arrays), or `null`.
///
/// # Errors
/// Returns [`DetectError::Parse`] for anything else.
pub fn parse_detection_output(output: &str) -> Result<Vec<DetectedTool>, DetectError> {
    let parsed: DetectionOutput = serde_json::from_str(output).map_err(|error| {
        let preview: String = output.chars().take(200).collect();
        DetectError::Parse {
            details: format!("{error}; output was: {preview}"),
        }
    })?;
    Ok(match parsed {
        DetectionOutput::Many(tools) => tools,
        DetectionOutput::One(tool) => vec![tool],
        DetectionOutput::Nothing(()) => Vec::new(),
    })
}

/// Result of the last detection run, kept so repeated commands do not rerun
/// the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionCache {
    pub detected_at: DateTime<Utc>,
    pub tools: Vec<DetectedTool>,
}

impl DetectionCache {
    #[must_use]
    pub fn new(tools: Vec<DetectedTool>) -> Self {
        Self {
            detected_at: Utc::now(),
            tools,
        }
    }

    #[must_use]
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true;
        };
        now >= self.detected_at && now - self.detected_at < ttl
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&DetectedTool> {
        self.tools
            .iter()
            .find(|tool| tool.name.eq_ignore_ascii_case(name))
    }

    /// Tool counts keyed by detection category.
    #[must_use]
    pub fn summary(&self) -> BTreeMap<&str, usize> {
        let mut summary = BTreeMap::new();
        for tool in &self.tools {
            let category = if tool.category.is_empty() {
                "Unknown"
            } else {
                tool.category.as_str()
            };
            *summary.entry(category).or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use rebuild_platform::CommandOutput;
    use rebuild_platform::testing::ScriptedRunner;

    use super::{DetectionCache, Detector, parse_detection_output};
    use crate::error::DetectError;
    use crate::types::DetectedTool;

    #[test]
    fn parses_array_single_object_and_null() {
        let many = parse_detection_output(
            r#"[{"Name":"Git","Version":"2.43.0","Path":"C:\\Git","Type":"Tool"},
                {"Name":"Python","Version":null,"Path":"C:\\Python","Type":"Runtime"}]"#,
        )
        .expect("array should parse");
        assert_eq!(many.len(), 2);
        assert_eq!(many[0].category, "Tool");
        assert_eq!(many[1].version, "");

        let one = parse_detection_output(r#"{"Name":"Git","Version":"2.43.0","Path":"C:\\Git"}"#)
            .expect("object should parse");
        assert_eq!(one, vec![DetectedTool::new("Git", "2.43.0", "C:\\Git")]);

        assert!(parse_detection_output("null").expect("null").is_empty());
        assert!(matches!(
            parse_detection_output("WARNING: something"),
            Err(DetectError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn runs_script_with_bypass_policy() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("detect.ps1");
        std::fs::write(&script, "").expect("write script");
        let runner = Arc::new(ScriptedRunner::new().respond(
            "powershell",
            &["-ExecutionPolicy", "Bypass"],
            CommandOutput::ok(r#"[{"Name":"Git","Version":"2.43.0","Path":"C:\\Git"}]"#),
        ));

        let detector = Detector::new(runner.clone(), &script, Duration::from_secs(60));
        let tools = detector.detect().await.expect("detection should succeed");

        assert_eq!(tools.len(), 1);
        let call = &runner.calls_to("powershell")[0];
        assert_eq!(call[5], "-File");
        assert_eq!(call[6], script.to_string_lossy());
    }

    #[tokio::test]
    async fn empty_output_is_a_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("detect.ps1");
        std::fs::write(&script, "").expect("write script");
        let runner = Arc::new(ScriptedRunner::new().respond("powershell", &[], CommandOutput::ok("")));

        let result = Detector::new(runner, &script, Duration::from_secs(60)).detect().await;

        assert_eq!(
            result,
            Err(DetectError::Failed {
                stderr: "No output from detection script".to_string()
            })
        );
    }

    #[tokio::test]
    async fn missing_script_is_reported() {
        let runner = Arc::new(ScriptedRunner::new());
        let result = Detector::new(runner, "nope.ps1", Duration::from_secs(1)).detect().await;

        assert!(matches!(result, Err(DetectError::ScriptMissing { .. })));
    }

    #[test]
    fn cache_freshness_follows_ttl() {
        let detected_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("time");
        let cache = DetectionCache {
            detected_at,
            tools: vec![DetectedTool::new("Git", "2.43.0", "")],
        };
        let ttl = Duration::from_secs(30 * 60);

        assert!(cache.is_fresh(ttl, detected_at + chrono::Duration::minutes(10)));
        assert!(!cache.is_fresh(ttl, detected_at + chrono::Duration::minutes(31)));
        assert!(cache.find("git").is_some());
        assert_eq!(cache.summary().get("Unknown"), Some(&1));
    }
}
