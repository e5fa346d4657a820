//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShaderloopError, ShaderloopResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Frame sequence and output layout settings.
    pub render: RenderDefaults,

    /// Rendering environment (headless browser) settings.
    pub surface: SurfaceSettings,

    /// Encoder profile.
    pub encoder: EncoderProfile,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Number of frames in one loop.
    pub frame_count: u32,

    /// Output frame rate handed to the encoder.
    pub fps: u32,

    /// Content document to load (a local HTML file or a URL).
    pub content: String,

    /// Root directory for per-resolution output.
    pub output_dir: PathBuf,

    /// Root directory for frame scratch directories.
    pub frames_dir: PathBuf,

    /// Keep frame scratch directories after a run instead of removing them.
    pub keep_frames: bool,
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceSettings {
    /// chromedriver executable (name on PATH or absolute path).
    pub chromedriver: String,

    /// Explicit Chrome binary. When unset chromedriver picks its default.
    pub chrome_binary: Option<PathBuf>,

    /// Run Chrome headless.
    pub headless: bool,

    /// Additional Chrome command-line flags.
    pub extra_args: Vec<String>,

    /// Budget for `window.renderFrame` to become callable.
    pub ready_timeout_ms: u64,

    /// Delay applied after readiness when the content exposes no
    /// `window.renderReady` promise.
    pub settle_ms: u64,

    /// Budget for chromedriver to accept a WebDriver session.
    pub connect_timeout_ms: u64,
}

/// ffmpeg encoding profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderProfile {
    /// ffmpeg executable.
    pub ffmpeg: String,

    /// Video codec (`-c:v`).
    pub codec: String,

    /// Target bitrate (`-b:v`), e.g. "12M".
    pub bitrate: String,

    /// Pixel format (`-pix_fmt`).
    pub pixel_format: String,

    /// Artifact file name inside each resolution's output directory.
    pub artifact_name: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shaderloop=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            render: RenderDefaults::default(),
            surface: SurfaceSettings::default(),
            encoder: EncoderProfile::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            frame_count: 300,
            fps: 30,
            content: "index.html".to_string(),
            output_dir: PathBuf::from("output"),
            frames_dir: PathBuf::from("frames"),
            keep_frames: false,
        }
    }
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            chromedriver: "chromedriver".to_string(),
            chrome_binary: None,
            headless: true,
            extra_args: Vec::new(),
            ready_timeout_ms: 60_000,
            settle_ms: 1_000,
            connect_timeout_ms: 15_000,
        }
    }
}

impl Default for EncoderProfile {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            codec: "libvpx-vp9".to_string(),
            bitrate: "12M".to_string(),
            pixel_format: "yuv420p".to_string(),
            artifact_name: "shader-loop.webm".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from an explicit path. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> ShaderloopResult<Self> {
        if !path.exists() {
            return Err(ShaderloopError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ShaderloopResult<()> {
        if self.render.frame_count == 0 {
            return Err(ShaderloopError::config("render.frame_count must be at least 1"));
        }
        if self.render.fps == 0 {
            return Err(ShaderloopError::config("render.fps must be at least 1"));
        }
        if self.render.content.trim().is_empty() {
            return Err(ShaderloopError::config("render.content must not be empty"));
        }
        if self.surface.ready_timeout_ms == 0 {
            return Err(ShaderloopError::config(
                "surface.ready_timeout_ms must be greater than zero",
            ));
        }
        if self.encoder.artifact_name.trim().is_empty() {
            return Err(ShaderloopError::config(
                "encoder.artifact_name must not be empty",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shaderloop").join("config.json")
}
