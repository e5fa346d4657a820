//! Error types shared across shaderloop crates.

use std::path::PathBuf;

/// Top-level error type for shaderloop operations.
///
/// The first six variants form the pipeline taxonomy: each one aborts the
/// resolution run it occurs in, never the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum ShaderloopError {
    #[error("Failed to launch rendering environment: {message}")]
    EnvironmentLaunch { message: String },

    #[error("Failed to load content: {message}")]
    Load { message: String },

    #[error("Renderer not ready after {timeout_ms}ms (window.renderFrame never became callable)")]
    ReadinessTimeout { timeout_ms: u64 },

    #[error("Frame {index} capture failed: {message}")]
    FrameCapture { index: u32, message: String },

    #[error("Encoder failed (status {status}): {stderr}")]
    Encode { status: String, stderr: String },

    #[error(
        "Incomplete frame sequence: expected {expected} frames, found {found} (first missing: {first_missing:?})"
    )]
    IncompleteSequence {
        expected: u32,
        found: usize,
        first_missing: Option<u32>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShaderloopError.
pub type ShaderloopResult<T> = Result<T, ShaderloopError>;

impl ShaderloopError {
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::EnvironmentLaunch {
            message: msg.into(),
        }
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load {
            message: msg.into(),
        }
    }

    pub fn capture(index: u32, msg: impl Into<String>) -> Self {
        Self::FrameCapture {
            index,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Short machine-friendly name of the error kind, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EnvironmentLaunch { .. } => "environment_launch",
            Self::Load { .. } => "load",
            Self::ReadinessTimeout { .. } => "readiness_timeout",
            Self::FrameCapture { .. } => "frame_capture",
            Self::Encode { .. } => "encode",
            Self::IncompleteSequence { .. } => "incomplete_sequence",
            Self::Config { .. } => "config",
            Self::InvalidInput { .. } => "invalid_input",
            Self::FileNotFound { .. } => "file_not_found",
            Self::Unsupported { .. } => "unsupported",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}
