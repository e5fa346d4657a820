//! Aggregated results of one invocation.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shaderloop_common::error::ShaderloopResult;

use crate::coordinator::ResolutionOutcome;

/// Per-resolution outcomes plus run-wide timing, written as
/// `output/run-report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub frame_count: u32,
    pub fps: u32,
    pub outcomes: Vec<ResolutionOutcome>,
}

impl RunReport {
    pub fn start(frame_count: u32, fps: u32) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            frame_count,
            fps,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: ResolutionOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn completed(&self) -> impl Iterator<Item = &ResolutionOutcome> {
        self.outcomes.iter().filter(|o| o.is_complete())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ResolutionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_complete())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }

    /// 0 when every resolution completed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }

    pub fn write_json(&self, path: &Path) -> ShaderloopResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "Run report written");
        Ok(())
    }

    /// Human-readable summary, one line per resolution.
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.outcomes.len() + 1);
        for outcome in &self.outcomes {
            let line = match (&outcome.artifact, &outcome.failure) {
                (Some(artifact), _) => format!(
                    "  ✓ {} -> {} ({:.1}s)",
                    outcome.resolution.label,
                    artifact.display(),
                    outcome.elapsed_secs
                ),
                (None, Some(failure)) => format!(
                    "  ✗ {} failed during {}: {}",
                    outcome.resolution.label, failure.stage, failure.message
                ),
                (None, None) => format!("  ? {}", outcome.resolution.label),
            };
            lines.push(line);
        }
        lines.push(format!(
            "{} of {} resolution(s) completed",
            self.completed().count(),
            self.outcomes.len()
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use shaderloop_job_model::{RenderMode, ResolutionSpec};

    use super::*;
    use crate::coordinator::{FailureInfo, RunState, Stage};

    fn outcome(width: u32, height: u32, ok: bool) -> ResolutionOutcome {
        let resolution = ResolutionSpec::new(width, height, format!("{width}x{height}")).unwrap();
        ResolutionOutcome {
            artifact: ok.then(|| PathBuf::from(format!("output/{width}x{height}/shader-loop.webm"))),
            failure: (!ok).then(|| FailureInfo {
                stage: Stage::Readiness,
                kind: "readiness_timeout".to_string(),
                message: "timed out".to_string(),
            }),
            resolution,
            mode: RenderMode::Sequence,
            state: if ok { RunState::Complete } else { RunState::Failed },
            reached: if ok { RunState::Encoding } else { RunState::ContentLoaded },
            frames_dir: None,
            frames_captured: if ok { 300 } else { 0 },
            elapsed_secs: 1.5,
        }
    }

    #[test]
    fn test_exit_code() {
        let mut report = RunReport::start(300, 30);
        assert_eq!(report.exit_code(), 0);
        report.push(outcome(1920, 1080, true));
        assert_eq!(report.exit_code(), 0);
        report.push(outcome(900, 1600, false));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.completed().count(), 1);
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output").join("run-report.json");
        let mut report = RunReport::start(300, 30);
        report.push(outcome(1920, 1080, true));
        report.push(outcome(900, 1600, false));
        report.finish();
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["frame_count"], 300);
        assert_eq!(value["outcomes"][0]["state"], "complete");
        assert_eq!(value["outcomes"][0]["mode"], "sequence");
        assert_eq!(value["outcomes"][1]["failure"]["stage"], "readiness");
        assert_eq!(value["outcomes"][1]["reached"], "content_loaded");
    }

    #[test]
    fn test_summary_lines() {
        let mut report = RunReport::start(300, 30);
        report.push(outcome(1920, 1080, true));
        report.push(outcome(900, 1600, false));
        let summary = report.summary();
        assert!(summary.contains("1920x1080 -> output/1920x1080/shader-loop.webm"));
        assert!(summary.contains("900x1600 failed during readiness: timed out"));
        assert!(summary.ends_with("1 of 2 resolution(s) completed"));
    }
}
