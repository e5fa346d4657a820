//! Frame sequence encoding through an external ffmpeg process.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use shaderloop_common::config::EncoderProfile;
use shaderloop_common::error::{ShaderloopError, ShaderloopResult};
use shaderloop_common::process::command_exists;
use shaderloop_job_model::layout::{ffmpeg_input_pattern, frame_pad_width};

/// A complete frame sequence ready to be encoded.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// Directory holding `frame_NNN.png` files.
    pub frames_dir: PathBuf,

    /// Number of frames in the directory.
    pub frame_count: u32,

    /// Input frame rate.
    pub fps: u32,

    /// File the encoder writes.
    pub output_path: PathBuf,
}

/// Progress callback for encoding.
pub type ProgressCallback = Arc<dyn Fn(EncodeProgress) + Send + Sync>;

/// Encoding progress report.
#[derive(Debug, Clone)]
pub struct EncodeProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames encoded so far.
    pub frames_encoded: u64,

    /// Total frames to encode.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: EncodeStage,
}

/// Stages of the encoding process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    Preparing,
    Encoding,
    Finalizing,
    Complete,
}

/// Trait for encoders that turn a frame sequence into a video.
///
/// `encode` blocks until the output is written or the encoder fails.
pub trait VideoEncoder: Send + Sync {
    /// Execute the encode job.
    fn encode(&self, job: &EncodeJob, progress: Option<ProgressCallback>) -> ShaderloopResult<()>;

    /// Check if this encoder is available on the system.
    fn is_available(&self) -> bool;

    /// Encoder name.
    fn name(&self) -> &str;
}

/// Encodes with the ffmpeg binary using a fixed profile.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    profile: EncoderProfile,
}

impl FfmpegEncoder {
    pub fn new(profile: EncoderProfile) -> Self {
        Self { profile }
    }

    /// Full argument list for `job`, excluding the binary.
    pub fn build_args(&self, job: &EncodeJob) -> Vec<String> {
        let pattern = job
            .frames_dir
            .join(ffmpeg_input_pattern(frame_pad_width(job.frame_count)));

        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-framerate".to_string(),
            job.fps.max(1).to_string(),
            "-i".to_string(),
            pattern.display().to_string(),
            "-c:v".to_string(),
            self.profile.codec.clone(),
            "-b:v".to_string(),
            self.profile.bitrate.clone(),
            "-pix_fmt".to_string(),
            self.profile.pixel_format.clone(),
            job.output_path.display().to_string(),
        ]
    }

    fn run_ffmpeg(
        &self,
        job: &EncodeJob,
        args: &[String],
        progress: Option<ProgressCallback>,
    ) -> ShaderloopResult<()> {
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut cmd = Command::new(&self.profile.ffmpeg);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd.spawn().map_err(|e| ShaderloopError::Encode {
            status: "not started".to_string(),
            stderr: format!("failed to start {}: {e}", self.profile.ffmpeg),
        })?;

        tracing::info!(
            pid = child.id(),
            total_frames = job.frame_count,
            fps = job.fps,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShaderloopError::unsupported("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShaderloopError::unsupported("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let total_frames = job.frame_count as u64;
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut latest = ProgressState::default();
        loop {
            line.clear();
            let bytes = match reader.read_line(&mut line) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed reading ffmpeg progress");
                    break;
                }
            };
            if bytes == 0 {
                break;
            }

            let trimmed = line.trim();
            if let Some((key, value)) = trimmed.split_once('=') {
                latest.update(key, value);
                if key == "progress" {
                    if let Some(cb) = &progress {
                        cb(progress_report(
                            &latest,
                            total_frames,
                            start.elapsed().as_secs_f64(),
                        ));
                    }
                }
            }
        }

        let status = child.wait()?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(ShaderloopError::Encode {
                status: status.to_string(),
                stderr: stderr_output.trim().to_string(),
            });
        }

        if let Some(cb) = &progress {
            cb(EncodeProgress {
                progress: 1.0,
                frames_encoded: total_frames,
                total_frames,
                eta_secs: 0.0,
                stage: EncodeStage::Complete,
            });
        }

        tracing::info!(
            output = %job.output_path.display(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(())
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, job: &EncodeJob, progress: Option<ProgressCallback>) -> ShaderloopResult<()> {
        if !job.frames_dir.is_dir() {
            return Err(ShaderloopError::FileNotFound {
                path: job.frames_dir.clone(),
            });
        }
        if let Some(parent) = job.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if let Some(cb) = &progress {
            cb(EncodeProgress {
                progress: 0.0,
                frames_encoded: 0,
                total_frames: job.frame_count as u64,
                eta_secs: 0.0,
                stage: EncodeStage::Preparing,
            });
        }

        let args = self.build_args(job);
        self.run_ffmpeg(job, &args, progress)
    }

    fn is_available(&self) -> bool {
        command_exists(&self.profile.ffmpeg)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    frame: u64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            "frame" => {
                if let Ok(frame) = value.trim().parse::<u64>() {
                    self.frame = frame;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(state: &ProgressState, total_frames: u64, elapsed_secs: f64) -> EncodeProgress {
    let progress = if total_frames == 0 {
        0.0
    } else {
        (state.frame as f64 / total_frames as f64).clamp(0.0, 1.0)
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    EncodeProgress {
        progress: if state.complete { 1.0 } else { progress },
        frames_encoded: state.frame.min(total_frames),
        total_frames,
        eta_secs,
        stage: if state.complete {
            EncodeStage::Finalizing
        } else {
            EncodeStage::Encoding
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> EncodeJob {
        EncodeJob {
            frames_dir: PathBuf::from("frames/1920x1080-abc"),
            frame_count: 300,
            fps: 30,
            output_path: PathBuf::from("output/1920x1080/shader-loop.partial.webm"),
        }
    }

    #[test]
    fn test_default_profile_args() {
        let args = FfmpegEncoder::new(EncoderProfile::default()).build_args(&job());
        let joined = args.join(" ");
        assert!(joined.contains("-framerate 30 -i frames/1920x1080-abc/frame_%03d.png"));
        assert!(joined.contains("-c:v libvpx-vp9 -b:v 12M -pix_fmt yuv420p"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("output/1920x1080/shader-loop.partial.webm")
        );
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn test_pattern_widens_for_long_loops() {
        let mut long = job();
        long.frame_count = 1200;
        let args = FfmpegEncoder::new(EncoderProfile::default()).build_args(&long);
        assert!(args.iter().any(|a| a.ends_with("frame_%04d.png")));
    }

    #[test]
    fn test_progress_state_tracks_frames() {
        let mut state = ProgressState::default();
        state.update("frame", "150");
        state.update("progress", "continue");
        let report = progress_report(&state, 300, 10.0);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert_eq!(report.frames_encoded, 150);
        assert!((report.eta_secs - 10.0).abs() < 1e-9);
        assert_eq!(report.stage, EncodeStage::Encoding);

        state.update("progress", "end");
        let report = progress_report(&state, 300, 20.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, EncodeStage::Finalizing);
    }

    #[test]
    fn test_missing_frames_dir_is_rejected() {
        let encoder = FfmpegEncoder::new(EncoderProfile::default());
        let mut missing = job();
        missing.frames_dir = PathBuf::from("/definitely/not/a/frames/dir");
        assert!(matches!(
            encoder.encode(&missing, None),
            Err(ShaderloopError::FileNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::new(EncoderProfile {
            ffmpeg: "false".to_string(),
            ..EncoderProfile::default()
        });
        let job = EncodeJob {
            frames_dir: dir.path().to_path_buf(),
            frame_count: 1,
            fps: 30,
            output_path: dir.path().join("out.webm"),
        };
        assert!(matches!(
            encoder.encode(&job, None),
            Err(ShaderloopError::Encode { .. })
        ));
    }
}
