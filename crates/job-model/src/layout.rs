//! Filesystem layout for frames and outputs.
//!
//! ```text
//! frames/<w>x<h>-XXXXXX/frame_000.png ...   scratch, one directory per run
//! output/<w>x<h>/shader-loop.webm           video artifact
//! output/<w>x<h>/frame_<i>.<fmt>            still export
//! output/run-report.json                    batch summary
//! ```

use std::path::{Path, PathBuf};

use crate::job::ImageFormat;
use crate::resolution::ResolutionSpec;

const FRAME_PREFIX: &str = "frame_";
const MIN_PAD_WIDTH: usize = 3;

/// Zero-padding width for sequence frame names.
///
/// At least three digits; wider when the last index needs more, so that
/// lexicographic order always equals frame order.
pub fn frame_pad_width(frame_count: u32) -> usize {
    let last = frame_count.saturating_sub(1);
    last.to_string().len().max(MIN_PAD_WIDTH)
}

/// `frame_007.png` for index 7 at width 3.
pub fn sequence_frame_name(index: u32, pad_width: usize) -> String {
    format!("{FRAME_PREFIX}{index:0pad_width$}.png")
}

/// printf-style input pattern matching [`sequence_frame_name`].
pub fn ffmpeg_input_pattern(pad_width: usize) -> String {
    format!("{FRAME_PREFIX}%0{pad_width}d.png")
}

/// Parse a sequence frame file name back into its index.
///
/// Only names produced by [`sequence_frame_name`] at `pad_width` match.
pub fn parse_sequence_frame_name(name: &str, pad_width: usize) -> Option<u32> {
    let digits = name.strip_prefix(FRAME_PREFIX)?.strip_suffix(".png")?;
    if digits.len() != pad_width || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `frame_42.webp`: still exports use the literal index.
pub fn still_frame_name(index: u32, format: ImageFormat) -> String {
    format!("{FRAME_PREFIX}{index}.{}", format.extension())
}

/// Output paths rooted at one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    output_root: PathBuf,
    artifact_name: String,
}

impl OutputLayout {
    pub fn new(output_root: impl Into<PathBuf>, artifact_name: impl Into<String>) -> Self {
        Self {
            output_root: output_root.into(),
            artifact_name: artifact_name.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// `output/<w>x<h>`
    pub fn resolution_dir(&self, resolution: &ResolutionSpec) -> PathBuf {
        self.output_root.join(resolution.dimensions())
    }

    /// `output/<w>x<h>/shader-loop.webm`
    pub fn artifact_path(&self, resolution: &ResolutionSpec) -> PathBuf {
        self.resolution_dir(resolution).join(&self.artifact_name)
    }

    /// Sibling of the artifact that the encoder writes to before the
    /// final rename, e.g. `shader-loop.partial.webm`.
    pub fn partial_artifact_path(&self, resolution: &ResolutionSpec) -> PathBuf {
        let artifact = Path::new(&self.artifact_name);
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.artifact_name.clone());
        let name = match artifact.extension() {
            Some(ext) => format!("{stem}.partial.{}", ext.to_string_lossy()),
            None => format!("{stem}.partial"),
        };
        self.resolution_dir(resolution).join(name)
    }

    /// `output/<w>x<h>/frame_<i>.<fmt>`
    pub fn still_path(
        &self,
        resolution: &ResolutionSpec,
        index: u32,
        format: ImageFormat,
    ) -> PathBuf {
        self.resolution_dir(resolution)
            .join(still_frame_name(index, format))
    }

    /// `output/run-report.json`
    pub fn report_path(&self) -> PathBuf {
        self.output_root.join("run-report.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_hd() -> ResolutionSpec {
        ResolutionSpec::new(1920, 1080, "1920x1080 (Full HD)").unwrap()
    }

    #[test]
    fn test_pad_width() {
        assert_eq!(frame_pad_width(300), 3);
        assert_eq!(frame_pad_width(1), 3);
        assert_eq!(frame_pad_width(1000), 3);
        assert_eq!(frame_pad_width(1001), 4);
    }

    #[test]
    fn test_sequence_names() {
        assert_eq!(sequence_frame_name(0, 3), "frame_000.png");
        assert_eq!(sequence_frame_name(299, 3), "frame_299.png");
        assert_eq!(ffmpeg_input_pattern(3), "frame_%03d.png");
        assert_eq!(parse_sequence_frame_name("frame_042.png", 3), Some(42));
        assert_eq!(parse_sequence_frame_name("frame_42.png", 3), None);
        assert_eq!(parse_sequence_frame_name("frame_042.webp", 3), None);
        assert_eq!(parse_sequence_frame_name("frame_-01.png", 3), None);
    }

    #[test]
    fn test_output_paths() {
        let layout = OutputLayout::new("output", "shader-loop.webm");
        let res = full_hd();
        assert_eq!(
            layout.artifact_path(&res),
            PathBuf::from("output/1920x1080/shader-loop.webm")
        );
        assert_eq!(
            layout.partial_artifact_path(&res),
            PathBuf::from("output/1920x1080/shader-loop.partial.webm")
        );
        assert_eq!(layout.report_path(), PathBuf::from("output/run-report.json"));
    }

    #[test]
    fn test_still_path_uses_literal_index() {
        let layout = OutputLayout::new("output", "shader-loop.webm");
        let res = ResolutionSpec::new(900, 1600, "900x1600 (Tablet/Mobile)").unwrap();
        assert_eq!(
            layout.still_path(&res, 42, ImageFormat::Webp),
            PathBuf::from("output/900x1600/frame_42.webp")
        );
    }
}
