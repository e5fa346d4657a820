//! Rendering surface abstraction.
//!
//! A [`RenderSurface`] is one isolated rendering environment with one
//! content session. It is not reentrant: every call is awaited before the
//! next one starts, and the surface is never shared between tasks.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use shaderloop_common::error::{ShaderloopError, ShaderloopResult};
use shaderloop_job_model::ImageFormat;

use crate::frame::CapturedFrame;

/// Viewport dimensions injected into the content before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Creates rendering environments.
#[async_trait::async_trait]
pub trait SurfaceLauncher: Send + Sync {
    /// Allocate a fresh, isolated environment sized to `viewport`.
    async fn launch(&self, viewport: Viewport) -> ShaderloopResult<Box<dyn RenderSurface>>;

    /// Check if this launcher can run on the system.
    fn is_available(&self) -> bool;

    /// Launcher name.
    fn name(&self) -> &str;
}

/// One live rendering environment.
#[async_trait::async_trait]
pub trait RenderSurface: Send {
    /// Register `window.__renderConfig` so it exists before the first
    /// content script executes.
    async fn configure(&mut self, viewport: Viewport) -> ShaderloopResult<()>;

    /// Navigate to the content target.
    async fn load(&mut self, target: &ContentTarget) -> ShaderloopResult<()>;

    /// Wait until `window.renderFrame` is callable, bounded by `timeout`.
    async fn await_ready(&mut self, timeout: Duration) -> ShaderloopResult<()>;

    /// Render frame `index`. `format` is passed to the content as a hint;
    /// the returned frame carries whatever subtype the content produced.
    async fn capture_frame(
        &mut self,
        index: u32,
        format: ImageFormat,
    ) -> ShaderloopResult<CapturedFrame>;

    /// Take the console output and page errors collected since the last call.
    async fn drain_diagnostics(&mut self) -> Vec<PageDiagnostic>;

    /// Release every resource held by the environment. Later calls are no-ops.
    async fn destroy(&mut self) -> ShaderloopResult<()>;
}

/// Console or error output emitted by the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDiagnostic {
    pub kind: DiagnosticKind,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Console,
    PageError,
}

/// Emit diagnostics through tracing. Never fails.
pub fn log_diagnostics(label: &str, diagnostics: &[PageDiagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.kind {
            DiagnosticKind::Console => tracing::info!(
                target: "shaderloop::page",
                resolution = label,
                "[Browser Console] {}: {}",
                diagnostic.level,
                diagnostic.text
            ),
            DiagnosticKind::PageError => tracing::warn!(
                target: "shaderloop::page",
                resolution = label,
                "[Page Error] {}",
                diagnostic.text
            ),
        }
    }
}

/// A resolved content location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTarget {
    url: Url,
}

impl ContentTarget {
    /// Resolve a local path (relative to `base_dir`) or an
    /// `http(s)://` / `file://` URL.
    pub fn resolve(target: &str, base_dir: &Path) -> ShaderloopResult<Self> {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            return Err(ShaderloopError::load("content target is empty"));
        }

        if has_url_scheme(trimmed) {
            let url = Url::parse(trimmed)
                .map_err(|e| ShaderloopError::load(format!("malformed target {trimmed:?}: {e}")))?;
            return match url.scheme() {
                "http" | "https" => Ok(Self { url }),
                "file" => {
                    let path = url.to_file_path().map_err(|_| {
                        ShaderloopError::load(format!("malformed file URL {trimmed:?}"))
                    })?;
                    Self::from_path(&path)
                }
                other => Err(ShaderloopError::load(format!(
                    "unsupported target scheme {other:?}"
                ))),
            };
        }

        Self::from_path(&base_dir.join(trimmed))
    }

    fn from_path(path: &Path) -> ShaderloopResult<Self> {
        if !path.is_file() {
            return Err(ShaderloopError::load(format!(
                "content file {} does not exist",
                path.display()
            )));
        }
        let absolute = path.canonicalize()?;
        let url = Url::from_file_path(&absolute).map_err(|_| {
            ShaderloopError::load(format!("cannot express {} as a URL", absolute.display()))
        })?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn has_url_scheme(target: &str) -> bool {
    match target.split_once("://") {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl std::fmt::Display for ContentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let target = ContentTarget::resolve("index.html", dir.path()).unwrap();
        assert_eq!(target.url().scheme(), "file");
        assert!(target.url().path().ends_with("/index.html"));
    }

    #[test]
    fn test_resolve_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContentTarget::resolve("index.html", dir.path()).unwrap_err();
        assert!(matches!(err, ShaderloopError::Load { .. }));
    }

    #[test]
    fn test_resolve_urls() {
        let base = Path::new(".");
        let target = ContentTarget::resolve("http://localhost:8080/loop.html", base).unwrap();
        assert_eq!(target.to_string(), "http://localhost:8080/loop.html");

        assert!(matches!(
            ContentTarget::resolve("ftp://example.com/x.html", base),
            Err(ShaderloopError::Load { .. })
        ));
        assert!(matches!(
            ContentTarget::resolve("   ", base),
            Err(ShaderloopError::Load { .. })
        ));
    }

    #[test]
    fn test_diagnostics_deserialize_from_page_buffer() {
        let raw = serde_json::json!([
            { "kind": "console", "level": "warn", "text": "slow shader" },
            { "kind": "page_error", "level": "error", "text": "boom" }
        ]);
        let parsed: Vec<PageDiagnostic> = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed[0].kind, DiagnosticKind::Console);
        assert_eq!(parsed[1].text, "boom");
        log_diagnostics("test", &parsed);
    }
}
