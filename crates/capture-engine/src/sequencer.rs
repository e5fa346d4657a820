//! Frame sequencing: drive a surface through frame indices and write files.
//!
//! Captures are strictly sequential against one surface. The first failure
//! aborts the sequence and carries the offending index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use shaderloop_common::error::{ShaderloopError, ShaderloopResult};
use shaderloop_job_model::layout::{frame_pad_width, parse_sequence_frame_name, sequence_frame_name};
use shaderloop_job_model::ImageFormat;

use crate::surface::{log_diagnostics, RenderSurface};

/// Progress callback invoked after every written frame.
pub type FrameProgressCallback = Box<dyn Fn(FrameProgress) + Send + Sync>;

/// Per-frame progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    /// Index of the frame just written.
    pub index: u32,
    /// Frames written so far.
    pub completed: u32,
    /// Frames to write in total.
    pub total: u32,
}

/// Result of a complete sequence capture.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSummary {
    pub frames: u32,
    pub bytes_written: u64,
    pub elapsed_secs: f64,
}

/// Drives one surface through the frame range for one resolution.
pub struct FrameSequencer<'a> {
    label: &'a str,
    frame_count: u32,
    progress: Option<&'a FrameProgressCallback>,
}

impl<'a> FrameSequencer<'a> {
    pub fn new(label: &'a str, frame_count: u32) -> Self {
        Self {
            label,
            frame_count,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a FrameProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Capture frames `0..frame_count` into `frames_dir` as zero-padded PNGs.
    pub async fn capture_sequence(
        &self,
        surface: &mut dyn RenderSurface,
        frames_dir: &Path,
    ) -> ShaderloopResult<SequenceSummary> {
        let started = Instant::now();
        let pad = frame_pad_width(self.frame_count);
        let mut bytes_written = 0u64;

        tracing::info!(
            resolution = self.label,
            frames = self.frame_count,
            dir = %frames_dir.display(),
            "Starting frame rendering"
        );

        for index in 0..self.frame_count {
            let captured = surface.capture_frame(index, ImageFormat::Png).await;
            log_diagnostics(self.label, &surface.drain_diagnostics().await);

            let bytes = captured?.into_format(ImageFormat::Png)?;
            let path = frames_dir.join(sequence_frame_name(index, pad));
            tokio::fs::write(&path, &bytes).await.map_err(|e| {
                ShaderloopError::capture(index, format!("cannot write {}: {e}", path.display()))
            })?;
            bytes_written += bytes.len() as u64;

            let completed = index + 1;
            tracing::debug!(
                resolution = self.label,
                "Rendered frame {}/{}",
                completed,
                self.frame_count
            );
            if let Some(cb) = self.progress {
                cb(FrameProgress {
                    index,
                    completed,
                    total: self.frame_count,
                });
            }
        }

        let summary = SequenceSummary {
            frames: self.frame_count,
            bytes_written,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        tracing::info!(
            resolution = self.label,
            frames = summary.frames,
            bytes = summary.bytes_written,
            elapsed_secs = summary.elapsed_secs,
            "Frame sequence captured"
        );
        Ok(summary)
    }

    /// Capture exactly one frame and write it to `path` in `format`.
    pub async fn capture_still(
        &self,
        surface: &mut dyn RenderSurface,
        index: u32,
        format: ImageFormat,
        path: &Path,
    ) -> ShaderloopResult<PathBuf> {
        if index >= self.frame_count {
            return Err(ShaderloopError::invalid_input(format!(
                "frame index {index} is out of range [0, {})",
                self.frame_count
            )));
        }

        let captured = surface.capture_frame(index, format).await;
        log_diagnostics(self.label, &surface.drain_diagnostics().await);

        let bytes = captured?.into_format(format)?;
        tokio::fs::write(path, &bytes).await.map_err(|e| {
            ShaderloopError::capture(index, format!("cannot write {}: {e}", path.display()))
        })?;

        tracing::info!(
            resolution = self.label,
            index,
            format = %format,
            path = %path.display(),
            "Still frame saved"
        );
        if let Some(cb) = self.progress {
            cb(FrameProgress {
                index,
                completed: 1,
                total: 1,
            });
        }
        Ok(path.to_path_buf())
    }
}

/// Check that `frames_dir` holds exactly `frame_count` sequence frames with
/// contiguous indices and nothing else.
pub fn verify_sequence(frames_dir: &Path, frame_count: u32) -> ShaderloopResult<()> {
    let pad = frame_pad_width(frame_count);
    let mut indices = BTreeSet::new();
    let mut entries = 0usize;

    for entry in std::fs::read_dir(frames_dir)? {
        let entry = entry?;
        entries += 1;
        let name = entry.file_name();
        match name.to_str().and_then(|n| parse_sequence_frame_name(n, pad)) {
            Some(index) if index < frame_count => {
                indices.insert(index);
            }
            _ => {
                tracing::warn!(
                    dir = %frames_dir.display(),
                    entry = ?name,
                    "Unexpected entry in frame sequence directory"
                );
            }
        }
    }

    let first_missing = (0..frame_count).find(|i| !indices.contains(i));
    if entries != frame_count as usize || first_missing.is_some() {
        return Err(ShaderloopError::IncompleteSequence {
            expected: frame_count,
            found: entries,
            first_missing,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_frames(dir: &Path, indices: impl IntoIterator<Item = u32>, pad: usize) {
        for i in indices {
            std::fs::write(dir.join(sequence_frame_name(i, pad)), b"png").unwrap();
        }
    }

    #[test]
    fn test_verify_complete_sequence() {
        let dir = tempfile::tempdir().unwrap();
        touch_frames(dir.path(), 0..10, 3);
        assert!(verify_sequence(dir.path(), 10).is_ok());
    }

    #[test]
    fn test_verify_reports_gap() {
        let dir = tempfile::tempdir().unwrap();
        touch_frames(dir.path(), (0..10).filter(|i| *i != 4), 3);
        match verify_sequence(dir.path(), 10) {
            Err(ShaderloopError::IncompleteSequence {
                expected,
                found,
                first_missing,
            }) => {
                assert_eq!(expected, 10);
                assert_eq!(found, 9);
                assert_eq!(first_missing, Some(4));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_verify_rejects_stray_entries() {
        let dir = tempfile::tempdir().unwrap();
        touch_frames(dir.path(), 0..5, 3);
        std::fs::write(dir.path().join("frame_005.png"), b"png").unwrap();
        assert!(matches!(
            verify_sequence(dir.path(), 5),
            Err(ShaderloopError::IncompleteSequence {
                found: 6,
                first_missing: None,
                ..
            })
        ));
    }

    #[test]
    fn test_verify_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            verify_sequence(dir.path(), 3),
            Err(ShaderloopError::IncompleteSequence {
                found: 0,
                first_missing: Some(0),
                ..
            })
        ));
    }
}
