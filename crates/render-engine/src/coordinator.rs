//! Run coordinator.
//!
//! Drives one rendering environment per resolution through
//! launch → configure → load → await readiness → capture → destroy → encode,
//! one resolution at a time. A failure in one resolution is recorded and the
//! next resolution is still attempted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use shaderloop_capture_engine::{
    log_diagnostics, verify_sequence, ContentTarget, FrameProgressCallback, FrameSequencer,
    RenderSurface, SurfaceLauncher, Viewport,
};
use shaderloop_common::config::AppConfig;
use shaderloop_common::error::{ShaderloopError, ShaderloopResult};
use shaderloop_job_model::{OutputLayout, RenderJob, RenderMode, ResolutionSpec};

use crate::encode::{EncodeJob, ProgressCallback, VideoEncoder};
use crate::report::RunReport;

/// Lifecycle state of one resolution run. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    EnvironmentReady,
    ContentLoaded,
    Capturing,
    Encoding,
    Complete,
    Failed,
}

/// The operation a resolution run was performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    Launch,
    Configure,
    Load,
    Readiness,
    Capture,
    Verify,
    Encode,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Launch => "launch",
            Stage::Configure => "configure",
            Stage::Load => "load",
            Stage::Readiness => "readiness",
            Stage::Capture => "capture",
            Stage::Verify => "verify",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// Why a resolution run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub stage: Stage,
    pub kind: String,
    pub message: String,
}

/// Final record for one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub resolution: ResolutionSpec,
    #[serde(flatten)]
    pub mode: RenderMode,
    /// `Complete` or `Failed`.
    pub state: RunState,
    /// Last non-terminal state the run reached.
    pub reached: RunState,
    pub failure: Option<FailureInfo>,
    /// Encoded video or still image.
    pub artifact: Option<PathBuf>,
    /// Frames directory, when kept.
    pub frames_dir: Option<PathBuf>,
    pub frames_captured: u32,
    pub elapsed_secs: f64,
}

impl ResolutionOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete
    }
}

/// Settings shared by every resolution of one invocation.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub frame_count: u32,
    pub fps: u32,
    /// Content path or URL as given by the user.
    pub content: String,
    /// Directory relative content paths are resolved against.
    pub content_base: PathBuf,
    pub layout: OutputLayout,
    pub frames_root: PathBuf,
    pub keep_frames: bool,
    pub ready_timeout: Duration,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig, content_base: impl Into<PathBuf>) -> Self {
        Self {
            frame_count: config.render.frame_count,
            fps: config.render.fps,
            content: config.render.content.clone(),
            content_base: content_base.into(),
            layout: OutputLayout::new(
                config.render.output_dir.clone(),
                config.encoder.artifact_name.clone(),
            ),
            frames_root: config.render.frames_dir.clone(),
            keep_frames: config.render.keep_frames,
            ready_timeout: Duration::from_millis(config.surface.ready_timeout_ms),
        }
    }
}

struct Tracker {
    state: RunState,
    stage: Stage,
    frames_captured: u32,
    frames_dir: Option<PathBuf>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            state: RunState::Pending,
            stage: Stage::Setup,
            frames_captured: 0,
            frames_dir: None,
        }
    }

    fn advance(&mut self, label: &str, next: RunState) {
        debug_assert!(next > self.state, "{:?} -> {:?}", self.state, next);
        tracing::debug!(resolution = label, from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}

/// Runs render jobs against a surface launcher and a video encoder.
pub struct RunCoordinator {
    launcher: Box<dyn SurfaceLauncher>,
    encoder: Arc<dyn VideoEncoder>,
    settings: RunSettings,
    frame_progress: Option<FrameProgressCallback>,
    encode_progress: Option<ProgressCallback>,
}

impl RunCoordinator {
    pub fn new(
        launcher: Box<dyn SurfaceLauncher>,
        encoder: Arc<dyn VideoEncoder>,
        settings: RunSettings,
    ) -> Self {
        Self {
            launcher,
            encoder,
            settings,
            frame_progress: None,
            encode_progress: None,
        }
    }

    pub fn with_frame_progress(mut self, callback: FrameProgressCallback) -> Self {
        self.frame_progress = Some(callback);
        self
    }

    pub fn with_encode_progress(mut self, callback: ProgressCallback) -> Self {
        self.encode_progress = Some(callback);
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run every job in order and write the run report.
    pub async fn run_all(&self, jobs: &[RenderJob]) -> RunReport {
        let mut report = RunReport::start(self.settings.frame_count, self.settings.fps);

        tracing::info!(
            resolutions = jobs.len(),
            frames = self.settings.frame_count,
            fps = self.settings.fps,
            launcher = self.launcher.name(),
            encoder = self.encoder.name(),
            "Starting render run"
        );

        for job in jobs {
            let outcome = self.run_job(job).await;
            report.push(outcome);
        }
        report.finish();

        let report_path = self.settings.layout.report_path();
        if let Err(e) = report.write_json(&report_path) {
            tracing::warn!(path = %report_path.display(), error = %e, "Failed to write run report");
        }
        report
    }

    /// Run one resolution to `Complete` or `Failed`.
    pub async fn run_job(&self, job: &RenderJob) -> ResolutionOutcome {
        let label = job.resolution.label.clone();
        let started = Instant::now();
        let mut tracker = Tracker::new();

        tracing::info!(resolution = %label, mode = ?job.mode, "Rendering resolution");

        let result = self.drive(job, &mut tracker).await;
        let elapsed_secs = started.elapsed().as_secs_f64();
        let reached = tracker.state;

        match result {
            Ok(artifact) => {
                tracker.advance(&label, RunState::Complete);
                tracing::info!(
                    resolution = %label,
                    artifact = %artifact.display(),
                    elapsed_ms = (elapsed_secs * 1000.0) as u64,
                    "Resolution complete"
                );
                ResolutionOutcome {
                    resolution: job.resolution.clone(),
                    mode: job.mode,
                    state: RunState::Complete,
                    reached,
                    failure: None,
                    artifact: Some(artifact),
                    frames_dir: tracker.frames_dir,
                    frames_captured: tracker.frames_captured,
                    elapsed_secs,
                }
            }
            Err(e) => {
                tracing::error!(
                    resolution = %label,
                    stage = %tracker.stage,
                    state = ?reached,
                    error = %e,
                    "Resolution failed"
                );
                ResolutionOutcome {
                    resolution: job.resolution.clone(),
                    mode: job.mode,
                    state: RunState::Failed,
                    reached,
                    failure: Some(FailureInfo {
                        stage: tracker.stage,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    }),
                    artifact: None,
                    frames_dir: tracker.frames_dir,
                    frames_captured: tracker.frames_captured,
                    elapsed_secs,
                }
            }
        }
    }

    async fn drive(&self, job: &RenderJob, tracker: &mut Tracker) -> ShaderloopResult<PathBuf> {
        let settings = &self.settings;
        let label = job.resolution.label.as_str();

        job.validate(settings.frame_count)
            .map_err(|e| ShaderloopError::invalid_input(e.to_string()))?;
        let target = ContentTarget::resolve(&settings.content, &settings.content_base)?;

        let out_dir = settings.layout.resolution_dir(&job.resolution);
        tokio::fs::create_dir_all(&out_dir).await?;

        let scratch = match job.mode {
            RenderMode::Sequence => {
                tokio::fs::create_dir_all(&settings.frames_root).await?;
                let dir = tempfile::Builder::new()
                    .prefix(&format!("{}-", job.resolution.dimensions()))
                    .keep(settings.keep_frames)
                    .tempdir_in(&settings.frames_root)?;
                if settings.keep_frames {
                    tracker.frames_dir = Some(dir.path().to_path_buf());
                }
                tracing::debug!(resolution = label, dir = %dir.path().display(), "Frames directory ready");
                Some(dir)
            }
            RenderMode::Still { .. } => None,
        };

        let viewport = Viewport {
            width: job.resolution.width,
            height: job.resolution.height,
        };
        tracker.stage = Stage::Launch;
        let mut surface = self.launcher.launch(viewport).await?;

        let captured = self
            .drive_surface(
                surface.as_mut(),
                job,
                viewport,
                &target,
                scratch.as_ref().map(|d| d.path()),
                tracker,
            )
            .await;

        // Output buffered since the last drain, e.g. errors behind a readiness timeout.
        log_diagnostics(label, &surface.drain_diagnostics().await);
        if let Err(e) = surface.destroy().await {
            tracing::warn!(resolution = label, error = %e, "Failed to tear down rendering environment");
        }
        drop(surface);

        let still_path = captured?;

        match (job.mode, scratch) {
            (RenderMode::Sequence, Some(scratch)) => {
                tracker.stage = Stage::Verify;
                let dir = scratch.path().to_path_buf();
                let frame_count = settings.frame_count;
                tokio::task::spawn_blocking(move || verify_sequence(&dir, frame_count))
                    .await
                    .map_err(|e| join_error("frame verification", e))??;

                tracker.stage = Stage::Encode;
                tracker.advance(label, RunState::Encoding);
                self.encode(&job.resolution, scratch.path()).await
            }
            (RenderMode::Still { .. }, _) => {
                still_path.ok_or_else(|| ShaderloopError::unsupported("still capture produced no file"))
            }
            (RenderMode::Sequence, None) => Err(ShaderloopError::unsupported(
                "sequence run without a frames directory",
            )),
        }
    }

    async fn drive_surface(
        &self,
        surface: &mut dyn RenderSurface,
        job: &RenderJob,
        viewport: Viewport,
        target: &ContentTarget,
        frames_dir: Option<&Path>,
        tracker: &mut Tracker,
    ) -> ShaderloopResult<Option<PathBuf>> {
        let settings = &self.settings;
        let label = job.resolution.label.as_str();

        tracker.stage = Stage::Configure;
        surface.configure(viewport).await?;
        tracker.advance(label, RunState::EnvironmentReady);

        tracker.stage = Stage::Load;
        surface.load(target).await?;
        tracker.advance(label, RunState::ContentLoaded);

        tracker.stage = Stage::Readiness;
        surface.await_ready(settings.ready_timeout).await?;
        log_diagnostics(label, &surface.drain_diagnostics().await);
        tracker.advance(label, RunState::Capturing);

        tracker.stage = Stage::Capture;
        let sequencer = FrameSequencer::new(label, settings.frame_count)
            .with_progress(self.frame_progress.as_ref());

        match (job.mode, frames_dir) {
            (RenderMode::Sequence, Some(dir)) => {
                let summary = sequencer.capture_sequence(surface, dir).await;
                tracker.frames_captured = count_frames(dir).await;
                summary?;
                Ok(None)
            }
            (RenderMode::Still { frame_index, format }, _) => {
                let path = settings
                    .layout
                    .still_path(&job.resolution, frame_index, format);
                let saved = sequencer
                    .capture_still(surface, frame_index, format, &path)
                    .await?;
                tracker.frames_captured = 1;
                Ok(Some(saved))
            }
            (RenderMode::Sequence, None) => Err(ShaderloopError::unsupported(
                "sequence run without a frames directory",
            )),
        }
    }

    async fn encode(&self, resolution: &ResolutionSpec, frames_dir: &Path) -> ShaderloopResult<PathBuf> {
        let layout = &self.settings.layout;
        let partial = layout.partial_artifact_path(resolution);
        let artifact = layout.artifact_path(resolution);

        let job = EncodeJob {
            frames_dir: frames_dir.to_path_buf(),
            frame_count: self.settings.frame_count,
            fps: self.settings.fps,
            output_path: partial.clone(),
        };

        tracing::info!(
            resolution = %resolution.label,
            output = %artifact.display(),
            "Encoding video"
        );

        let encoder = Arc::clone(&self.encoder);
        let progress = self.encode_progress.clone();
        let encoded = tokio::task::spawn_blocking(move || encoder.encode(&job, progress))
            .await
            .map_err(|e| join_error("encoder", e))?;

        if let Err(e) = encoded {
            remove_if_present(&partial).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&partial, &artifact).await {
            remove_if_present(&partial).await;
            return Err(e.into());
        }
        Ok(artifact)
    }
}

async fn count_frames(dir: &Path) -> u32 {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(_)) = entries.next_entry().await {
        count += 1;
    }
    count
}

fn join_error(task: &str, e: tokio::task::JoinError) -> ShaderloopError {
    ShaderloopError::Other(anyhow::anyhow!("{task} task failed: {e}"))
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
