pub mod check;
pub mod config;
pub mod presets;
pub mod render;
pub mod still;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use shaderloop_capture_engine::backend::get_launcher;
use shaderloop_capture_engine::FrameProgress;
use shaderloop_common::config::{config_file_path, AppConfig};
use shaderloop_job_model::{RenderJob, ResolutionSpec};
use shaderloop_render_engine::{EncodeProgress, FfmpegEncoder, RunCoordinator, RunSettings};

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub frames: Option<u32>,
    pub fps: Option<u32>,
    pub content: Option<String>,
    pub output: Option<PathBuf>,
    pub keep_frames: bool,
    pub verbose: bool,
    pub json_logs: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(frames) = self.frames {
            config.render.frame_count = frames;
        }
        if let Some(fps) = self.fps {
            config.render.fps = fps;
        }
        if let Some(content) = &self.content {
            config.render.content = content.clone();
        }
        if let Some(output) = &self.output {
            config.render.output_dir = output.clone();
        }
        if self.keep_frames {
            config.render.keep_frames = true;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
        if self.json_logs {
            config.logging.json = true;
        }
    }
}

/// Load the configuration file (explicit path or the standard location),
/// apply command-line overrides and validate the result.
///
/// Runs before logging is initialized, so a broken standard config is
/// reported on stderr directly.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => load_default_config(&config_file_path()),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn load_default_config(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }
    match AppConfig::load_from(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: failed to load config {}: {e}. Using defaults.",
                path.display()
            );
            AppConfig::default()
        }
    }
}

/// Which resolutions to render.
#[derive(Debug, Clone, Args)]
pub struct Selection {
    /// Resolution as WIDTHxHEIGHT or a preset name (repeatable)
    #[arg(short = 'r', long = "resolution", value_name = "WxH|PRESET")]
    pub resolutions: Vec<ResolutionSpec>,

    /// Render every built-in preset
    #[arg(long)]
    pub all_presets: bool,
}

impl Selection {
    /// Selected resolutions in order, without duplicates.
    pub fn resolve(&self) -> anyhow::Result<Vec<ResolutionSpec>> {
        let mut selected: Vec<ResolutionSpec> = Vec::new();
        let candidates = if self.all_presets {
            ResolutionSpec::presets()
                .into_iter()
                .chain(self.resolutions.iter().cloned())
                .collect()
        } else {
            self.resolutions.clone()
        };
        for spec in candidates {
            if !selected
                .iter()
                .any(|s| s.width == spec.width && s.height == spec.height)
            {
                selected.push(spec);
            }
        }
        if selected.is_empty() {
            anyhow::bail!("No resolution selected. Use -r WIDTHxHEIGHT, -r <preset> or --all-presets");
        }
        Ok(selected)
    }
}

/// Run `jobs` with the browser launcher and ffmpeg, print a summary and
/// return the process exit code.
pub async fn run_jobs(config: &AppConfig, jobs: Vec<RenderJob>, encode: bool) -> anyhow::Result<u8> {
    let launcher = get_launcher(&config.surface);
    if !launcher.is_available() {
        anyhow::bail!(
            "{} not found: {}. Install it or set surface.chromedriver in the config",
            launcher.name(),
            config.surface.chromedriver
        );
    }

    let encoder = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
    if encode && !shaderloop_common::process::command_exists(&config.encoder.ffmpeg) {
        anyhow::bail!(
            "ffmpeg not found: {}. Install it or set encoder.ffmpeg in the config",
            config.encoder.ffmpeg
        );
    }

    let content_base = std::env::current_dir().context("Cannot determine working directory")?;
    let settings = RunSettings::from_config(config, content_base);

    println!("Content: {}", settings.content);
    println!("Frames: {} @ {} fps", settings.frame_count, settings.fps);
    for job in &jobs {
        println!("  {}", job.resolution.label);
    }

    let coordinator = RunCoordinator::new(launcher, encoder, settings)
        .with_frame_progress(Box::new(|p: FrameProgress| {
            print!("\r  Frames: {}/{}  ", p.completed, p.total);
            if p.completed == p.total {
                println!();
            }
            std::io::stdout().flush().ok();
        }))
        .with_encode_progress(Arc::new(|p: EncodeProgress| {
            print!(
                "\r  Encoding: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
                p.progress * 100.0,
                p.frames_encoded,
                p.total_frames,
                p.eta_secs,
            );
            std::io::stdout().flush().ok();
        }));

    let report = coordinator.run_all(&jobs).await;

    println!();
    println!("{}", report.summary());
    println!(
        "Report: {}",
        coordinator.settings().layout.report_path().display()
    );
    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(resolutions: &[&str], all_presets: bool) -> Selection {
        Selection {
            resolutions: resolutions.iter().map(|r| r.parse().unwrap()).collect(),
            all_presets,
        }
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = AppConfig::default();
        Overrides {
            frames: Some(60),
            fps: Some(24),
            content: Some("demo.html".to_string()),
            output: Some(PathBuf::from("renders")),
            keep_frames: true,
            verbose: true,
            json_logs: false,
        }
        .apply(&mut config);

        assert_eq!(config.render.frame_count, 60);
        assert_eq!(config.render.fps, 24);
        assert_eq!(config.render.content, "demo.html");
        assert_eq!(config.render.output_dir, PathBuf::from("renders"));
        assert!(config.render.keep_frames);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_zero_frames_rejected() {
        let overrides = Overrides {
            frames: Some(0),
            ..Overrides::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        AppConfig::default().save_to(&path).unwrap();
        assert!(load_config(Some(&path), &overrides).is_err());
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(load_config(Some(&missing), &Overrides::default()).is_err());
    }

    #[test]
    fn test_broken_default_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = load_default_config(&path);
        assert_eq!(config.render.frame_count, AppConfig::default().render.frame_count);
        assert_eq!(
            load_default_config(&dir.path().join("absent.json")).render.fps,
            AppConfig::default().render.fps
        );
    }

    #[test]
    fn test_selection_dedupes_in_order() {
        let resolved = selection(&["1920x1080", "900x1600", "1920x1080"], false)
            .resolve()
            .unwrap();
        let dims: Vec<String> = resolved.iter().map(|r| r.dimensions()).collect();
        assert_eq!(dims, vec!["1920x1080", "900x1600"]);
    }

    #[test]
    fn test_all_presets() {
        let resolved = selection(&["640x480"], true).resolve().unwrap();
        assert_eq!(resolved.len(), 6);
        assert_eq!(resolved[0].dimensions(), "2560x1440");
        assert_eq!(resolved[5].dimensions(), "640x480");
    }

    #[test]
    fn test_empty_selection_is_error() {
        assert!(selection(&[], false).resolve().is_err());
    }
}
