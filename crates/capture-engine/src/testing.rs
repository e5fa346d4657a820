//! In-memory surfaces for exercising the pipeline without a browser.
//!
//! Enabled for this crate's tests and, through the `test-util` feature, for
//! downstream crates' tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use shaderloop_common::error::{ShaderloopError, ShaderloopResult};
use shaderloop_job_model::ImageFormat;

use crate::frame::CapturedFrame;
use crate::surface::{
    ContentTarget, DiagnosticKind, PageDiagnostic, RenderSurface, SurfaceLauncher, Viewport,
};

/// How a scripted surface behaves.
#[derive(Debug, Clone, Default)]
pub struct ScriptBehavior {
    /// Fail `launch` with an environment error.
    pub fail_launch: bool,
    /// Fail `load` with a load error.
    pub fail_load: bool,
    /// `renderFrame` never appears; `await_ready` runs into its timeout.
    pub never_ready: bool,
    /// Capture of this index throws.
    pub fail_at: Option<u32>,
    /// Return this raw string instead of a data URI.
    pub raw_payload: Option<String>,
    /// Answer every capture with this subtype regardless of the hint.
    pub force_subtype: Option<ImageFormat>,
    /// Page error raised by the content while it loads.
    pub load_error: Option<String>,
}

/// Everything a scripted surface was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Launched(Viewport),
    Configured(Viewport),
    Loaded(String),
    Ready,
    Captured(u32),
    /// A non-empty batch handed out by `drain_diagnostics`.
    Drained(Vec<PageDiagnostic>),
    Destroyed,
}

/// Shared event log, one per launcher.
pub type EventLog = Arc<Mutex<Vec<SurfaceEvent>>>;

/// Launcher producing [`ScriptedSurface`]s, with per-viewport behaviors.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    default_behavior: ScriptBehavior,
    behaviors: HashMap<(u32, u32), ScriptBehavior>,
    events: EventLog,
}

impl ScriptedLauncher {
    pub fn new(default_behavior: ScriptBehavior) -> Self {
        Self {
            default_behavior,
            ..Self::default()
        }
    }

    /// Override the behavior for one viewport size.
    pub fn with_behavior(mut self, width: u32, height: u32, behavior: ScriptBehavior) -> Self {
        self.behaviors.insert((width, height), behavior);
        self
    }

    /// Handle to the event log that stays valid after the launcher is boxed.
    pub fn event_log(&self) -> EventLog {
        Arc::clone(&self.events)
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, matcher: impl Fn(&SurfaceEvent) -> bool) -> usize {
        self.events().iter().filter(|e| matcher(e)).count()
    }
}

#[async_trait::async_trait]
impl SurfaceLauncher for ScriptedLauncher {
    async fn launch(&self, viewport: Viewport) -> ShaderloopResult<Box<dyn RenderSurface>> {
        let behavior = self
            .behaviors
            .get(&(viewport.width, viewport.height))
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone());
        if behavior.fail_launch {
            return Err(ShaderloopError::launch("scripted launch failure"));
        }
        record(&self.events, SurfaceEvent::Launched(viewport));
        Ok(Box::new(ScriptedSurface {
            behavior,
            viewport,
            events: Arc::clone(&self.events),
            pending: Vec::new(),
            destroyed: false,
        }))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A surface whose frames are tiny deterministic images.
#[derive(Debug)]
pub struct ScriptedSurface {
    behavior: ScriptBehavior,
    viewport: Viewport,
    events: EventLog,
    pending: Vec<PageDiagnostic>,
    destroyed: bool,
}

#[async_trait::async_trait]
impl RenderSurface for ScriptedSurface {
    async fn configure(&mut self, viewport: Viewport) -> ShaderloopResult<()> {
        record(&self.events, SurfaceEvent::Configured(viewport));
        Ok(())
    }

    async fn load(&mut self, target: &ContentTarget) -> ShaderloopResult<()> {
        if self.behavior.fail_load {
            return Err(ShaderloopError::load("scripted navigation failure"));
        }
        record(&self.events, SurfaceEvent::Loaded(target.to_string()));
        if let Some(message) = &self.behavior.load_error {
            self.pending.push(PageDiagnostic {
                kind: DiagnosticKind::PageError,
                level: "error".to_string(),
                text: message.clone(),
            });
        }
        Ok(())
    }

    async fn await_ready(&mut self, timeout: Duration) -> ShaderloopResult<()> {
        if self.behavior.never_ready {
            let _ = tokio::time::timeout(timeout, std::future::pending::<()>()).await;
            return Err(ShaderloopError::ReadinessTimeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        record(&self.events, SurfaceEvent::Ready);
        Ok(())
    }

    async fn capture_frame(
        &mut self,
        index: u32,
        format: ImageFormat,
    ) -> ShaderloopResult<CapturedFrame> {
        record(&self.events, SurfaceEvent::Captured(index));
        self.pending.push(PageDiagnostic {
            kind: DiagnosticKind::Console,
            level: "log".to_string(),
            text: format!("frame {index}"),
        });

        if self.behavior.fail_at == Some(index) {
            self.pending.push(PageDiagnostic {
                kind: DiagnosticKind::PageError,
                level: "error".to_string(),
                text: "scripted shader fault".to_string(),
            });
            return Err(ShaderloopError::capture(index, "Error: scripted shader fault"));
        }

        if let Some(raw) = &self.behavior.raw_payload {
            return CapturedFrame::from_data_uri(index, raw);
        }

        let format = self.behavior.force_subtype.unwrap_or(format);
        let bytes = frame_image(self.viewport, index, format)?;
        let uri = format!(
            "data:image/{};base64,{}",
            format.extension(),
            STANDARD.encode(bytes)
        );
        CapturedFrame::from_data_uri(index, &uri)
    }

    async fn drain_diagnostics(&mut self) -> Vec<PageDiagnostic> {
        let drained = std::mem::take(&mut self.pending);
        if !drained.is_empty() {
            record(&self.events, SurfaceEvent::Drained(drained.clone()));
        }
        drained
    }

    async fn destroy(&mut self) -> ShaderloopResult<()> {
        if !self.destroyed {
            self.destroyed = true;
            record(&self.events, SurfaceEvent::Destroyed);
        }
        Ok(())
    }
}

/// A 2x2 image whose color depends only on the frame index.
pub fn frame_image(viewport: Viewport, index: u32, format: ImageFormat) -> ShaderloopResult<Vec<u8>> {
    let shade = (index % 256) as u8;
    let tint = ((viewport.width ^ viewport.height) % 256) as u8;
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([shade, tint, 255 - shade]));
    let codec = match format {
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Webp => image::ImageFormat::WebP,
    };
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, codec)
        .map_err(|e| ShaderloopError::capture(index, e.to_string()))?;
    Ok(out.into_inner())
}

fn record(events: &EventLog, event: SurfaceEvent) {
    if let Ok(mut log) = events.lock() {
        log.push(event);
    }
}
