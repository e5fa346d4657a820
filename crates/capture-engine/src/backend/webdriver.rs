//! Headless Chrome driven over WebDriver.
//!
//! Every [`WebDriverSurface`] owns its own `chromedriver` process on a free
//! local port and its own Chrome profile directory, so no cache, cookies or
//! storage leak between resolution runs.

use std::net::TcpListener;
use std::process::Stdio;
use std::time::{Duration, Instant};

use fantoccini::wd::WebDriverCompatibleCommand;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Value as Json};
use tempfile::TempDir;
use tokio::process::{Child, Command};

use shaderloop_common::config::SurfaceSettings;
use shaderloop_common::error::{ShaderloopError, ShaderloopResult};
use shaderloop_common::process::command_exists;
use shaderloop_job_model::ImageFormat;

use crate::frame::CapturedFrame;
use crate::surface::{ContentTarget, PageDiagnostic, RenderSurface, SurfaceLauncher, Viewport};

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(150);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// WebGL through ANGLE, GPU rasterization, and file:// access for local
/// content.
const BASE_CHROME_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-web-security",
    "--allow-file-access-from-files",
    "--enable-webgl",
    "--use-gl=angle",
    "--use-angle=gl",
    "--enable-accelerated-2d-canvas",
    "--disable-gpu-sandbox",
    "--ignore-gpu-blacklist",
    "--enable-gpu-rasterization",
    "--enable-oop-rasterization",
    "--disable-features=VizDisplayCompositor",
    "--no-first-run",
    "--no-default-browser-check",
    "--hide-scrollbars",
    "--force-device-scale-factor=1",
];

/// Installed before any content script runs: the render config plus
/// console/error mirroring into `window.__shaderloopDiagnostics`.
const PRELOAD_TEMPLATE: &str = r#"(() => {
  window.__renderConfig = { width: __WIDTH__, height: __HEIGHT__ };
  window.__shaderloopDiagnostics = [];
  const push = (kind, level, text) => {
    const sink = window.__shaderloopDiagnostics;
    if (sink.length < 1000) sink.push({ kind, level, text: String(text) });
  };
  const show = (value) => {
    if (typeof value === 'string') return value;
    try { return JSON.stringify(value); } catch (_) { return String(value); }
  };
  for (const level of ['log', 'info', 'warn', 'error', 'debug']) {
    const original = console[level].bind(console);
    console[level] = (...args) => {
      push('console', level, args.map(show).join(' '));
      original(...args);
    };
  }
  window.addEventListener('error', (event) => {
    push('page_error', 'error', event.message || String(event.error));
  });
  window.addEventListener('unhandledrejection', (event) => {
    const reason = event.reason;
    push('page_error', 'error', (reason && reason.message) || String(reason));
  });
})();"#;

const RENDER_FRAME_DEFINED: &str = "return typeof window.renderFrame === 'function';";

const HOOK_READY_PROMISE: &str = r#"
const ready = window.renderReady;
if (!ready || typeof ready.then !== 'function') return false;
window.__shaderloopReady = null;
Promise.resolve(ready).then(
  () => { window.__shaderloopReady = 'ok'; },
  (err) => { window.__shaderloopReady = 'error: ' + String((err && err.message) || err); },
);
return true;
"#;

const READY_PROMISE_STATE: &str = "return window.__shaderloopReady;";

const CAPTURE_FRAME: &str = r#"
const result = window.renderFrame(arguments[0], arguments[1]);
if (result === null || result === undefined) {
  throw new Error('renderFrame returned null or undefined');
}
return result;
"#;

const DRAIN_DIAGNOSTICS: &str = "return (window.__shaderloopDiagnostics || []).splice(0);";

/// Launches one chromedriver + Chrome pair per surface.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    settings: SurfaceSettings,
}

impl WebDriverLauncher {
    pub fn new(settings: SurfaceSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl SurfaceLauncher for WebDriverLauncher {
    async fn launch(&self, viewport: Viewport) -> ShaderloopResult<Box<dyn RenderSurface>> {
        let surface = WebDriverSurface::launch(self.settings.clone(), viewport).await?;
        Ok(Box::new(surface))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.settings.chromedriver)
    }

    fn name(&self) -> &str {
        "webdriver-chrome"
    }
}

/// A live headless Chrome session.
pub struct WebDriverSurface {
    client: Option<Client>,
    driver: Option<Child>,
    profile: Option<TempDir>,
    settings: SurfaceSettings,
}

impl WebDriverSurface {
    async fn launch(settings: SurfaceSettings, viewport: Viewport) -> ShaderloopResult<Self> {
        let profile = tempfile::Builder::new()
            .prefix("shaderloop-profile-")
            .tempdir()
            .map_err(|e| ShaderloopError::launch(format!("cannot create profile dir: {e}")))?;

        let port = free_local_port()?;
        let mut driver = Command::new(&settings.chromedriver)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ShaderloopError::launch(format!(
                    "failed to start {}: {e}. Install chromedriver and ensure it is on PATH",
                    settings.chromedriver
                ))
            })?;

        tracing::info!(
            pid = driver.id(),
            port,
            profile = %profile.path().display(),
            "chromedriver started"
        );

        let webdriver_url = format!("http://127.0.0.1:{port}");
        let capabilities = chrome_capabilities(&settings, viewport, &profile);
        let deadline = Instant::now() + Duration::from_millis(settings.connect_timeout_ms);

        let client = loop {
            if let Some(status) = driver.try_wait()? {
                return Err(ShaderloopError::launch(format!(
                    "chromedriver exited early (status {status})"
                )));
            }

            match ClientBuilder::native()
                .capabilities(capabilities.clone())
                .connect(&webdriver_url)
                .await
            {
                Ok(client) => break client,
                Err(e) => {
                    let message = e.to_string();
                    // The driver answered but could not start Chrome; retrying won't help.
                    if message.to_ascii_lowercase().contains("session not created") {
                        let _ = driver.kill().await;
                        return Err(ShaderloopError::launch(format!(
                            "chromedriver could not start Chrome: {message}"
                        )));
                    }
                    if Instant::now() >= deadline {
                        let _ = driver.kill().await;
                        return Err(ShaderloopError::launch(format!(
                            "no WebDriver session at {webdriver_url} after {}ms: {message}",
                            settings.connect_timeout_ms
                        )));
                    }
                    tracing::trace!(error = %message, "WebDriver not accepting sessions yet");
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                }
            }
        };

        tracing::info!(
            width = viewport.width,
            height = viewport.height,
            "WebDriver session created"
        );

        Ok(Self {
            client: Some(client),
            driver: Some(driver),
            profile: Some(profile),
            settings,
        })
    }

    fn client(&self) -> ShaderloopResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ShaderloopError::unsupported("surface already destroyed"))
    }

    async fn poll_ready_promise(&self, client: &Client) -> ShaderloopResult<()> {
        loop {
            match client.execute(READY_PROMISE_STATE, vec![]).await {
                Ok(Json::String(state)) if state == "ok" => return Ok(()),
                Ok(Json::String(state)) => {
                    return Err(ShaderloopError::load(format!(
                        "content reported initialization failure ({state})"
                    )));
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "renderReady poll failed"),
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

#[async_trait::async_trait]
impl RenderSurface for WebDriverSurface {
    async fn configure(&mut self, viewport: Viewport) -> ShaderloopResult<()> {
        let client = self.client()?;
        let source = preload_script(viewport);
        client
            .issue_cmd(CdpCommand::new(
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": source }),
            ))
            .await
            .map_err(|e| {
                ShaderloopError::launch(format!("cannot register pre-load script: {e}"))
            })?;
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            "Registered pre-load render config"
        );
        Ok(())
    }

    async fn load(&mut self, target: &ContentTarget) -> ShaderloopResult<()> {
        tracing::info!(url = %target, "Loading page");
        self.client()?
            .goto(target.url().as_str())
            .await
            .map_err(|e| ShaderloopError::load(format!("navigation to {target} failed: {e}")))
    }

    async fn await_ready(&mut self, timeout: Duration) -> ShaderloopResult<()> {
        let client = self.client()?;
        let started = Instant::now();
        let timeout_ms = timeout.as_millis() as u64;

        tracing::info!(timeout_ms, "Waiting for renderer initialization...");
        let primary = async {
            loop {
                match client.execute(RENDER_FRAME_DEFINED, vec![]).await {
                    Ok(Json::Bool(true)) => return,
                    Ok(_) => {}
                    Err(e) => tracing::debug!(error = %e, "renderFrame poll failed"),
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, primary)
            .await
            .map_err(|_| ShaderloopError::ReadinessTimeout { timeout_ms })?;

        let has_ready_promise = matches!(
            client.execute(HOOK_READY_PROMISE, vec![]).await,
            Ok(Json::Bool(true))
        );

        if has_ready_promise {
            let remaining = timeout.saturating_sub(started.elapsed());
            tokio::time::timeout(remaining, self.poll_ready_promise(client))
                .await
                .map_err(|_| ShaderloopError::ReadinessTimeout { timeout_ms })??;
            tracing::debug!("window.renderReady resolved");
        } else {
            tokio::time::sleep(Duration::from_millis(self.settings.settle_ms)).await;
        }

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            explicit_signal = has_ready_promise,
            "Renderer ready"
        );
        Ok(())
    }

    async fn capture_frame(
        &mut self,
        index: u32,
        format: ImageFormat,
    ) -> ShaderloopResult<CapturedFrame> {
        let value = self
            .client()?
            .execute(CAPTURE_FRAME, vec![json!(index), json!(format.mime())])
            .await
            .map_err(|e| ShaderloopError::capture(index, e.to_string()))?;

        match value {
            Json::String(payload) => CapturedFrame::from_data_uri(index, &payload),
            Json::Null => Err(ShaderloopError::capture(
                index,
                "renderFrame returned null or undefined",
            )),
            other => Err(ShaderloopError::capture(
                index,
                format!("renderFrame returned a non-string value ({})", json_kind(&other)),
            )),
        }
    }

    async fn drain_diagnostics(&mut self) -> Vec<PageDiagnostic> {
        let Ok(client) = self.client() else {
            return Vec::new();
        };
        match client.execute(DRAIN_DIAGNOSTICS, vec![]).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Unreadable page diagnostics");
                Vec::new()
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to drain page diagnostics");
                Vec::new()
            }
        }
    }

    async fn destroy(&mut self) -> ShaderloopResult<()> {
        let mut first_error: Option<ShaderloopError> = None;

        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                tracing::warn!(error = %e, "Failed to end WebDriver session");
            }
        }

        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.kill().await {
                tracing::warn!(error = %e, "Failed to stop chromedriver");
                first_error.get_or_insert(ShaderloopError::Io(e));
            }
        }

        if let Some(profile) = self.profile.take() {
            let path = profile.path().to_path_buf();
            if let Err(e) = profile.close() {
                tracing::warn!(error = %e, path = %path.display(), "Failed to remove browser profile");
                first_error.get_or_insert(ShaderloopError::Io(e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A Chrome DevTools command sent through chromedriver's passthrough endpoint.
#[derive(Debug, Clone)]
struct CdpCommand {
    cmd: &'static str,
    params: Json,
}

impl CdpCommand {
    fn new(cmd: &'static str, params: Json) -> Self {
        Self { cmd, params }
    }
}

impl WebDriverCompatibleCommand for CdpCommand {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        let session = session_id.unwrap_or_default();
        base_url.join(&format!("session/{session}/goog/cdp/execute"))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        let body = json!({ "cmd": self.cmd, "params": self.params });
        (http::Method::POST, Some(body.to_string()))
    }
}

fn preload_script(viewport: Viewport) -> String {
    PRELOAD_TEMPLATE
        .replace("__WIDTH__", &viewport.width.to_string())
        .replace("__HEIGHT__", &viewport.height.to_string())
}

fn chrome_args(settings: &SurfaceSettings, viewport: Viewport, profile: &TempDir) -> Vec<String> {
    let mut args: Vec<String> = BASE_CHROME_ARGS.iter().map(|a| a.to_string()).collect();
    if settings.headless {
        args.push("--headless=new".to_string());
    }
    args.push(format!("--window-size={},{}", viewport.width, viewport.height));
    args.push(format!("--user-data-dir={}", profile.path().display()));
    args.extend(settings.extra_args.iter().cloned());
    args
}

fn chrome_capabilities(
    settings: &SurfaceSettings,
    viewport: Viewport,
    profile: &TempDir,
) -> serde_json::Map<String, Json> {
    let mut options = serde_json::Map::new();
    options.insert(
        "args".to_string(),
        json!(chrome_args(settings, viewport, profile)),
    );
    options.insert("excludeSwitches".to_string(), json!(["enable-logging"]));
    if let Some(binary) = &settings.chrome_binary {
        options.insert("binary".to_string(), json!(binary.display().to_string()));
    }

    let mut capabilities = serde_json::Map::new();
    capabilities.insert("browserName".to_string(), json!("chrome"));
    capabilities.insert("goog:chromeOptions".to_string(), Json::Object(options));
    capabilities
}

fn free_local_port() -> ShaderloopResult<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| ShaderloopError::launch(format!("cannot reserve a local port: {e}")))?;
    Ok(listener.local_addr()?.port())
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport {
            width: 1920,
            height: 1080,
        }
    }

    #[test]
    fn test_preload_script_embeds_dimensions() {
        let script = preload_script(viewport());
        assert!(script.contains("window.__renderConfig = { width: 1920, height: 1080 };"));
        assert!(!script.contains("__WIDTH__"));
        assert!(script.contains("unhandledrejection"));
    }

    #[test]
    fn test_chrome_args_isolate_profile_and_size_window() {
        let profile = tempfile::tempdir().unwrap();
        let mut settings = SurfaceSettings::default();
        settings.extra_args.push("--mute-audio".to_string());

        let args = chrome_args(&settings, viewport(), &profile);
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.contains(&format!("--user-data-dir={}", profile.path().display())));
        assert!(args.contains(&"--enable-webgl".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--mute-audio"));
    }

    #[test]
    fn test_headful_mode_omits_headless_flag() {
        let profile = tempfile::tempdir().unwrap();
        let settings = SurfaceSettings {
            headless: false,
            ..SurfaceSettings::default()
        };
        let args = chrome_args(&settings, viewport(), &profile);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn test_capabilities_include_binary_when_configured() {
        let profile = tempfile::tempdir().unwrap();
        let settings = SurfaceSettings {
            chrome_binary: Some("/opt/chrome/chrome".into()),
            ..SurfaceSettings::default()
        };
        let caps = chrome_capabilities(&settings, viewport(), &profile);
        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["goog:chromeOptions"]["binary"], "/opt/chrome/chrome");
    }

    #[test]
    fn test_cdp_command_targets_session_passthrough() {
        let cmd = CdpCommand::new("Page.addScriptToEvaluateOnNewDocument", json!({"source": "1"}));
        let base = url::Url::parse("http://127.0.0.1:9515/").unwrap();
        let endpoint = cmd.endpoint(&base, Some("abc123")).unwrap();
        assert_eq!(
            endpoint.as_str(),
            "http://127.0.0.1:9515/session/abc123/goog/cdp/execute"
        );

        let (method, body) = cmd.method_and_body(&endpoint);
        assert_eq!(method, http::Method::POST);
        let body: Json = serde_json::from_str(&body.unwrap()).unwrap();
        assert_eq!(body["cmd"], "Page.addScriptToEvaluateOnNewDocument");
        assert_eq!(body["params"]["source"], "1");
    }

    #[test]
    fn test_free_port_is_nonzero() {
        assert_ne!(free_local_port().unwrap(), 0);
    }
}
