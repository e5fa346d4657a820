//! Render jobs: what to produce for one resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolution::ResolutionSpec;

/// Image formats available for still exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Webp];

    /// File extension (also the CLI spelling).
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }

    /// MIME type requested from the content.
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    /// Map a data-URI subtype (`png`, `jpeg`, `jpg`, `webp`) to a format.
    pub fn from_mime_subtype(subtype: &str) -> Option<Self> {
        match subtype.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(JobError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("unknown image format {0:?} (expected png, jpeg or webp)")]
    UnknownFormat(String),

    #[error("frame index {index} is out of range [0, {frame_count})")]
    FrameOutOfRange { index: u32, frame_count: u32 },
}

/// Export mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RenderMode {
    /// Every frame, then encode to video.
    Sequence,
    /// A single frame saved as an image; no encoding.
    Still {
        frame_index: u32,
        format: ImageFormat,
    },
}

impl RenderMode {
    pub fn is_sequence(&self) -> bool {
        matches!(self, RenderMode::Sequence)
    }

    /// Build a still mode, validating the index against the frame count.
    pub fn still(frame_index: u32, format: ImageFormat, frame_count: u32) -> Result<Self, JobError> {
        validate_frame_index(frame_index, frame_count)?;
        Ok(RenderMode::Still {
            frame_index,
            format,
        })
    }
}

/// One resolution's worth of work. Consumed once by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJob {
    pub resolution: ResolutionSpec,
    #[serde(flatten)]
    pub mode: RenderMode,
}

impl RenderJob {
    pub fn sequence(resolution: ResolutionSpec) -> Self {
        Self {
            resolution,
            mode: RenderMode::Sequence,
        }
    }

    pub fn still(resolution: ResolutionSpec, frame_index: u32, format: ImageFormat) -> Self {
        Self {
            resolution,
            mode: RenderMode::Still {
                frame_index,
                format,
            },
        }
    }

    /// Check the job against the configured frame count.
    pub fn validate(&self, frame_count: u32) -> Result<(), JobError> {
        match self.mode {
            RenderMode::Sequence => Ok(()),
            RenderMode::Still { frame_index, .. } => validate_frame_index(frame_index, frame_count),
        }
    }
}

/// Frame indices are zero-based and must be below `frame_count`.
pub fn validate_frame_index(index: u32, frame_count: u32) -> Result<(), JobError> {
    if index < frame_count {
        Ok(())
    } else {
        Err(JobError::FrameOutOfRange { index, frame_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("webp".parse::<ImageFormat>().unwrap(), ImageFormat::Webp);
        assert!("gif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_mime_subtypes() {
        assert_eq!(ImageFormat::from_mime_subtype("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime_subtype("svg+xml"), None);
        assert_eq!(ImageFormat::Webp.mime(), "image/webp");
    }

    #[test]
    fn test_frame_index_bounds() {
        assert!(validate_frame_index(0, 300).is_ok());
        assert!(validate_frame_index(299, 300).is_ok());
        assert_eq!(
            validate_frame_index(300, 300),
            Err(JobError::FrameOutOfRange {
                index: 300,
                frame_count: 300
            })
        );
    }

    #[test]
    fn test_job_validation() {
        let res = ResolutionSpec::new(900, 1600, "tablet").unwrap();
        assert!(RenderJob::still(res.clone(), 42, ImageFormat::Webp)
            .validate(300)
            .is_ok());
        assert!(RenderJob::still(res.clone(), 42, ImageFormat::Webp)
            .validate(10)
            .is_err());
        assert!(RenderJob::sequence(res).validate(1).is_ok());
    }

    #[test]
    fn test_job_serializes_with_mode_tag() {
        let res = ResolutionSpec::new(900, 1600, "tablet").unwrap();
        let json = serde_json::to_value(RenderJob::still(res, 42, ImageFormat::Webp)).unwrap();
        assert_eq!(json["mode"], "still");
        assert_eq!(json["frame_index"], 42);
        assert_eq!(json["format"], "webp");
    }
}
