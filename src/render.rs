//! The render state machine: `Init -> ContextReady -> Navigating ->
//! Stabilising -> Mutating -> Extracting -> Done`, with a lateral
//! `EmergencyRecovery` branch and a terminal `Failed`. This is the core's
//! largest and most load-bearing component.

use crate::behavior::InteractionSimulator;
use crate::browser::{BrowserLifecycleManager, CookieSpec, Session};
use crate::config::{Config, ImageFormat, Viewport};
use crate::error::{ErrorKind, RenderError};
use crate::extract::ArtifactExtractors;
use crate::headers::{canonical_headers, ResourceKind};
use crate::identity::{FingerprintSynthesiser, SessionIdentity};
use crate::stealth::StealthScriptProvider;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused, HeaderEntry,
};
use chromiumoxide::cdp::browser_protocol::log::{EnableParams as LogEnableParams, EventEntryAdded};
use chromiumoxide::cdp::js_protocol::runtime::{
    EnableParams as RuntimeEnableParams, EventConsoleApiCalled, RemoteObject,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WaitMode {
    Load,
    DomReady,
    NetworkIdle,
}

impl Default for WaitMode {
    fn default() -> Self {
        WaitMode::NetworkIdle
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScreenshotOptions {
    #[serde(default)]
    pub full_page: bool,
    #[serde(default)]
    pub format: ImageFormat,
    pub quality: Option<u8>,
    /// When set, captures only the first element matching this selector
    /// instead of the viewport/full page.
    pub selector: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PdfOptions {
    #[serde(default)]
    pub background: bool,
    pub margins_inches: Option<(f64, f64, f64, f64)>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RenderRequest {
    pub url: String,
    #[serde(default)]
    pub wait_mode: WaitMode,
    pub hard_timeout_ms: Option<u64>,
    pub post_load_wait_ms: Option<u64>,
    pub user_agent_override: Option<String>,
    #[serde(default)]
    pub cookies: Vec<CookieSpec>,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
    pub viewport: Option<Viewport>,
    #[serde(default = "default_true")]
    pub scroll_to_bottom: bool,
    #[serde(default)]
    pub wait_for_selectors: Vec<String>,
    #[serde(default)]
    pub click_selectors: Vec<String>,
    #[serde(default)]
    pub remove_selectors: Vec<String>,
    pub custom_script: Option<String>,
    #[serde(default)]
    pub capture_console: bool,
    #[serde(default = "default_true")]
    pub return_partial_on_timeout: bool,
    pub want_screenshot: Option<ScreenshotOptions>,
    pub want_pdf: Option<PdfOptions>,
    #[serde(default)]
    pub want_html: bool,
    #[serde(default)]
    pub want_text: bool,
}

fn default_true() -> bool {
    true
}

impl RenderRequest {
    pub fn hard_timeout(&self) -> Duration {
        let ms = self.hard_timeout_ms.unwrap_or(30_000).min(120_000);
        Duration::from_millis(ms)
    }

    pub fn post_load_wait(&self, config_default: Duration) -> Duration {
        self.post_load_wait_ms.map(Duration::from_millis).unwrap_or(config_default).max(Duration::from_secs(5))
    }

    pub fn effective_viewport(&self, config_default: Viewport) -> Viewport {
        self.viewport.unwrap_or(config_default)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub html: Option<String>,
    pub text: Option<String>,
    pub title: Option<String>,
    pub final_url: String,
    pub original_url: String,
    pub started_at_iso: String,
    pub duration_ms: u64,
    pub was_timeout: bool,
    pub is_emergency_extraction: bool,
    pub content_length: usize,
    pub console_logs: Option<Vec<String>>,
    #[serde(skip)]
    pub screenshot_bytes: Option<Vec<u8>>,
    #[serde(skip)]
    pub pdf_bytes: Option<Vec<u8>>,
}

pub struct RenderStateMachine {
    config: Config,
    browser: Arc<BrowserLifecycleManager>,
}

impl RenderStateMachine {
    pub fn new(config: Config, browser: Arc<BrowserLifecycleManager>) -> Self {
        Self { config, browser }
    }

    pub async fn render(&self, request: RenderRequest) -> Result<RenderOutcome, RenderError> {
        let request_id = Uuid::new_v4();
        self.render_inner(&request, request_id).await.map_err(|e| e.with_request_id(request_id))
    }

    /// Every exit path from `render` funnels through here so the caller's
    /// `request_id` can be stamped onto the error exactly once, regardless
    /// of which branch (primary, timeout, emergency recovery) produced it.
    async fn render_inner(
        &self,
        request: &RenderRequest,
        request_id: Uuid,
    ) -> Result<RenderOutcome, RenderError> {
        crate::utils::validate_url(&request.url)
            .map_err(|e| RenderError::invalid_input(format!("invalid url {:?}: {e}", request.url)))?;

        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let budget = request.hard_timeout();

        match timeout(budget, self.run_primary(request, request_id, started_at, start)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) if err.kind == ErrorKind::Timeout && request.return_partial_on_timeout => {
                self.emergency_recovery(request, request_id, started_at, start).await
            }
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => {
                if request.return_partial_on_timeout {
                    self.emergency_recovery(request, request_id, started_at, start).await
                } else {
                    Err(RenderError::timeout(budget))
                }
            }
        }
    }

    async fn run_primary(
        &self,
        request: &RenderRequest,
        request_id: Uuid,
        started_at: chrono::DateTime<chrono::Utc>,
        start: Instant,
    ) -> Result<RenderOutcome, RenderError> {
        let viewport = request.effective_viewport(self.config.viewport);
        let identity = FingerprintSynthesiser::generate(
            request.user_agent_override.as_deref(),
            (viewport.width, viewport.height),
        );
        let stealth_script = StealthScriptProvider::generate(&identity);

        let google_apex = google_apex_for_url(&request.url);
        let is_google = google_apex.is_some();
        let mut cookies = request.cookies.clone();
        if let Some(apex) = &google_apex {
            cookies.extend(CookieSpec::google_consent_preload(apex));
        }

        // ContextReady
        let session = self.browser.acquire_session(request_id, identity, &stealth_script, &cookies).await?;
        let interceptor = spawn_interceptor(&session, request.extra_headers.clone()).await;
        let console_collector =
            if request.capture_console { Some(spawn_console_collector(&session.page).await) } else { None };

        let result = self.drive_session(&session, request, is_google).await;

        let artifacts = match &result {
            Ok((_, _, _, final_url)) => Some(self.capture_requested_artifacts(&session, request, final_url).await),
            Err(_) => None,
        };

        let console_logs = match console_collector {
            Some((handles, buffer)) => {
                for handle in handles {
                    handle.abort();
                }
                Some(buffer.lock().await.clone())
            }
            None => None,
        };

        interceptor.abort();
        self.browser.release_session(session).await;

        let (html, text, title, final_url) = result?;
        let (screenshot_bytes, pdf_bytes) = artifacts.unwrap_or((None, None));

        let mut outcome = RenderOutcome {
            html,
            text,
            title,
            final_url,
            original_url: request.url.clone(),
            started_at_iso: started_at.to_rfc3339(),
            duration_ms: start.elapsed().as_millis() as u64,
            was_timeout: false,
            is_emergency_extraction: false,
            content_length: 0,
            console_logs,
            screenshot_bytes,
            pdf_bytes,
        };
        outcome.content_length = outcome.html.as_ref().map(|h| h.len()).unwrap_or(0);
        Ok(outcome)
    }

    /// Navigating -> Stabilising -> Mutating -> Extracting, returning the
    /// (html, text, title, final_url) tuple `run_primary` wraps.
    async fn drive_session(
        &self,
        session: &Session,
        request: &RenderRequest,
        is_google: bool,
    ) -> Result<(Option<String>, Option<String>, Option<String>, String), RenderError> {
        let page = &session.page;

        // Navigating
        if is_google {
            navigate_google_aware(page, &request.url).await?;
        } else {
            navigate_standard(page, &request.url, request.wait_mode, request.hard_timeout()).await?;
        }

        // Stabilising
        let post_load = request.post_load_wait(self.config.extra_wait_time);
        tokio::time::sleep(post_load).await;
        InteractionSimulator::wait_for_stylesheets_and_images(page).await;
        InteractionSimulator::wait_for_frameworks(page).await;

        // Mutating
        for selector in &request.wait_for_selectors {
            if let Err(e) = wait_for_selector(page, selector, Duration::from_secs(30)).await {
                warn!(selector, error = %e, "soft selector wait failed, continuing");
            }
        }
        for selector in &request.click_selectors {
            if let Err(e) = click_selector(page, selector, Duration::from_secs(20)).await {
                warn!(selector, error = %e, "best-effort click failed, continuing");
            } else {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }

        force_desktop_layout(page).await;
        InteractionSimulator::simulate_mouse(page, (request.effective_viewport(self.config.viewport).width, request.effective_viewport(self.config.viewport).height)).await;
        if request.scroll_to_bottom {
            InteractionSimulator::eased_scroll_to_bottom(page).await;
        }

        if let Some(script) = &request.custom_script {
            if let Err(e) = page.evaluate(script.as_str()).await {
                warn!(error = %e, "custom script failed, continuing");
            }
        }

        for selector in &request.remove_selectors {
            let script = format!(
                "document.querySelectorAll({:?}).forEach((el) => el.remove())",
                selector
            );
            if let Err(e) = page.evaluate(script).await {
                warn!(selector, error = %e, "remove-selector step failed, continuing");
            }
        }

        // Extracting
        let title = page.get_title().await.ok().flatten();
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| request.url.clone());

        if !crate::utils::is_same_domain(&request.url, &final_url) {
            debug!(
                requested_domain = ?crate::utils::extract_domain(&request.url),
                final_domain = ?crate::utils::extract_domain(&final_url),
                "navigation left the requested domain"
            );
        }

        let html = if request.want_html || request.want_screenshot.is_none() && request.want_pdf.is_none() {
            Some(ArtifactExtractors::html(page).await?)
        } else {
            None
        };

        let text = if request.want_text {
            Some(ArtifactExtractors::plain_text(page).await?)
        } else {
            None
        };

        Ok((html, text, title, final_url))
    }

    async fn emergency_recovery(
        &self,
        request: &RenderRequest,
        request_id: Uuid,
        started_at: chrono::DateTime<chrono::Utc>,
        start: Instant,
    ) -> Result<RenderOutcome, RenderError> {
        warn!(url = %request.url, "entering emergency recovery");

        let identity = FingerprintSynthesiser::generate(None, (self.config.viewport.width, self.config.viewport.height));
        let stealth_script = StealthScriptProvider::generate(&identity);
        let recovery_budget = Duration::from_secs(45);

        let recovery = async {
            let session = self.browser.acquire_session(request_id, identity, &stealth_script, &[]).await?;
            let console_collector =
                if request.capture_console { Some(spawn_console_collector(&session.page).await) } else { None };

            let page_result = async {
                navigate_standard(&session.page, &request.url, WaitMode::NetworkIdle, recovery_budget).await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                let title = session.page.get_title().await.ok().flatten();
                let final_url = session.page.url().await.ok().flatten().unwrap_or_else(|| request.url.clone());
                let html = ArtifactExtractors::html(&session.page).await?;
                Ok::<_, RenderError>((html, title, final_url))
            }
            .await;

            let console_logs = match console_collector {
                Some((handles, buffer)) => {
                    for handle in handles {
                        handle.abort();
                    }
                    Some(buffer.lock().await.clone())
                }
                None => None,
            };

            self.browser.release_session(session).await;
            page_result.map(|(html, title, final_url)| (html, title, final_url, console_logs))
        };

        let (html, title, final_url, console_logs) = timeout(recovery_budget, recovery)
            .await
            .map_err(|_| RenderError::timeout(recovery_budget))??;

        Ok(RenderOutcome {
            html: Some(html.clone()),
            text: None,
            title,
            final_url,
            original_url: request.url.clone(),
            started_at_iso: started_at.to_rfc3339(),
            duration_ms: start.elapsed().as_millis() as u64,
            was_timeout: true,
            is_emergency_extraction: true,
            content_length: html.len(),
            console_logs,
            screenshot_bytes: None,
            pdf_bytes: None,
        })
    }

    /// Screenshot is extracted from the already-settled page, per §4.5's
    /// Extracting stage. PDF instead takes a fresh navigation path — a
    /// network-idle reload with explicit stylesheet/image waits — since
    /// print layout can differ from the screen layout already stabilised
    /// for HTML/screenshot extraction. Both run while the session is still
    /// open, since they're separate CDP round trips against the same page.
    async fn capture_requested_artifacts(
        &self,
        session: &Session,
        request: &RenderRequest,
        final_url: &str,
    ) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
        let screenshot = if let Some(options) = &request.want_screenshot {
            let result = match &options.selector {
                Some(selector) => ArtifactExtractors::screenshot_element(&session.page, selector, options.format).await,
                None => ArtifactExtractors::screenshot(&session.page, options.full_page, options.format, options.quality).await,
            };
            match result {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(error = %e, "screenshot capture failed, html result unaffected");
                    None
                }
            }
        } else {
            None
        };

        let pdf = if let Some(options) = &request.want_pdf {
            match ArtifactExtractors::pdf(&session.page, final_url, options.background, options.margins_inches).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(error = %e, "pdf capture failed, html result unaffected");
                    None
                }
            }
        } else {
            None
        };

        (screenshot, pdf)
    }
}

/// Returns the matched `google.<tld>` apex (e.g. `google.co.uk` for
/// `www.google.co.uk`) if `url`'s host is a Google property under any
/// country TLD, not just `.com`.
fn google_apex_for_url(url: &str) -> Option<String> {
    let host = url::Url::parse(url).ok().and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))?;
    google_apex(&host)
}

fn google_apex(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.split('.').collect();
    let pos = labels.iter().position(|&l| l == "google")?;
    let suffix = &labels[pos + 1..];
    if suffix.is_empty() || suffix.len() > 2 {
        return None;
    }
    Some(format!("google.{}", suffix.join(".")))
}

fn is_google_host(url: &str) -> bool {
    google_apex_for_url(url).is_some()
}

/// Standard navigation regime (§4.5): the caller's `WaitMode` runs under a
/// ceiling of 70% of the request's hard timeout, each mode polling
/// `document.readyState` to a different target. If that primary wait
/// errors or exceeds its ceiling, fall back to a plain dom-ready wait capped
/// at 50% of the hard timeout rather than failing the whole render outright.
async fn navigate_standard(
    page: &Page,
    url: &str,
    wait_mode: WaitMode,
    hard_timeout: Duration,
) -> Result<(), RenderError> {
    page.goto(url).await.map_err(classify_navigation_error)?;

    let primary_ceiling = hard_timeout.mul_f64(0.7);
    let primary = timeout(primary_ceiling, async {
        page.wait_for_navigation().await.map_err(classify_navigation_error)?;
        match wait_mode {
            WaitMode::Load => wait_for_ready_state(page, ReadyStateTarget::Complete).await,
            WaitMode::DomReady => wait_for_ready_state(page, ReadyStateTarget::Interactive).await,
            WaitMode::NetworkIdle => {
                wait_for_ready_state(page, ReadyStateTarget::Complete).await?;
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            }
        }
    })
    .await;

    match primary {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) | Err(_) => {
            debug!(?wait_mode, "primary navigation wait failed, falling back to dom-ready");
            let fallback_ceiling = hard_timeout.mul_f64(0.5);
            timeout(fallback_ceiling, page.wait_for_navigation())
                .await
                .map_err(|_| RenderError::timeout(fallback_ceiling))?
                .map_err(classify_navigation_error)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadyStateTarget {
    Interactive,
    Complete,
}

/// Polls `document.readyState` until it reaches `target` or 10s elapse,
/// bounded separately from the caller's overall navigation ceiling.
async fn wait_for_ready_state(page: &Page, target: ReadyStateTarget) -> Result<(), RenderError> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let state: String = page
            .evaluate("document.readyState")
            .await
            .map_err(classify_navigation_error)?
            .into_value()
            .unwrap_or_else(|_| "loading".to_string());

        let satisfied = match target {
            ReadyStateTarget::Complete => state == "complete",
            ReadyStateTarget::Interactive => state == "interactive" || state == "complete",
        };
        if satisfied || Instant::now() >= deadline {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn navigate_google_aware(page: &Page, url: &str) -> Result<(), RenderError> {
    timeout(Duration::from_secs(30), page.goto(url))
        .await
        .map_err(|_| RenderError::timeout(Duration::from_secs(30)))?
        .map_err(classify_navigation_error)?;
    let _ = timeout(Duration::from_secs(15), page.wait_for_navigation()).await;

    let blocked: bool = page
        .evaluate(
            r#"(function() {
                const body = (document.body && document.body.innerText || '').toLowerCase();
                return body.includes('unusual traffic') || body.includes('automated queries')
                    || body.includes('are you a robot') || body.includes('recaptcha');
            })()"#,
        )
        .await
        .ok()
        .and_then(|v| v.into_value().ok())
        .unwrap_or(false);

    if blocked {
        tokio::time::sleep(Duration::from_secs(10)).await;
        page.reload().await.map_err(classify_navigation_error)?;
        let _ = page.wait_for_navigation().await;
    }

    Ok(())
}

fn classify_navigation_error(err: chromiumoxide::error::CdpError) -> RenderError {
    let message = err.to_string();
    if message.contains("net::") || message.contains("DNS") || message.contains("ERR_") {
        RenderError::network_error(message)
    } else {
        RenderError::new(crate::error::ErrorKind::NavigationBlocked, message)
    }
}

async fn wait_for_selector(page: &Page, selector: &str, ceiling: Duration) -> Result<(), RenderError> {
    timeout(ceiling, page.find_element(selector))
        .await
        .map_err(|_| RenderError::timeout(ceiling))?
        .map(|_| ())
        .map_err(|e| RenderError::extraction_error(e.to_string()))
}

async fn click_selector(page: &Page, selector: &str, ceiling: Duration) -> Result<(), RenderError> {
    let element = timeout(ceiling, page.find_element(selector))
        .await
        .map_err(|_| RenderError::timeout(ceiling))?
        .map_err(|e| RenderError::extraction_error(e.to_string()))?;

    element
        .click()
        .await
        .map_err(|e| RenderError::extraction_error(e.to_string()))?;
    Ok(())
}

/// A narrower reading of "force desktop layout": set a minimum width on the
/// root elements rather than hiding every mobile-breakpoint element.
async fn force_desktop_layout(page: &Page) {
    let script = r#"(function() {
        const style = document.createElement('style');
        style.textContent = 'html, body { min-width: 1920px !important; }';
        document.head && document.head.appendChild(style);
    })()"#;
    if let Err(e) = page.evaluate(script).await {
        warn!(error = %e, "desktop layout injection failed, continuing");
    }
}

/// Installs the request-interception hook: every sub-resource request gets
/// its headers rewritten to the canonical table for this session's identity
/// before it leaves the page (§4.5).
async fn spawn_interceptor(
    session: &Session,
    caller_extra_headers: BTreeMap<String, String>,
) -> tokio::task::JoinHandle<()> {
    let page = session.page.clone();
    let identity = session.identity.clone();

    if let Err(e) = page.execute(FetchEnableParams::builder().build()).await {
        warn!(error = %e, "failed to enable request interception, headers will be default");
    }

    let mut events = match page.event_listener::<EventRequestPaused>().await {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "failed to subscribe to request-paused events");
            return tokio::spawn(async {});
        }
    };

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let kind = classify_resource(&event.resource_type);
            let headers = canonical_headers(&identity, kind, &caller_extra_headers);
            let header_entries: Vec<HeaderEntry> = headers
                .into_iter()
                .map(|(name, value)| HeaderEntry { name, value })
                .collect();

            let params = ContinueRequestParams::builder()
                .request_id(event.request_id.clone())
                .headers(header_entries)
                .build()
                .expect("request_id is always set");

            if let Err(e) = page.execute(params).await {
                warn!(error = %e, "failed to continue intercepted request");
            }
        }
    })
}

fn classify_resource(resource_type: &chromiumoxide::cdp::browser_protocol::network::ResourceType) -> ResourceKind {
    use chromiumoxide::cdp::browser_protocol::network::ResourceType as RT;
    match resource_type {
        RT::Document => ResourceKind::Document,
        RT::Stylesheet => ResourceKind::Stylesheet,
        RT::Script => ResourceKind::Script,
        RT::Image => ResourceKind::Image,
        _ => ResourceKind::Other,
    }
}

/// Installs `Runtime.consoleAPICalled` and `Log.entryAdded` listeners when
/// `captureConsole` is set, buffering formatted entries for the outcome
/// (§4.5). Returns the spawned listener tasks (aborted once the render
/// finishes) alongside the shared buffer they append to.
async fn spawn_console_collector(page: &Page) -> (Vec<tokio::task::JoinHandle<()>>, Arc<Mutex<Vec<String>>>) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();

    if let Err(e) = page.execute(RuntimeEnableParams::default()).await {
        warn!(error = %e, "failed to enable runtime domain, console logs will not be captured");
    }
    match page.event_listener::<EventConsoleApiCalled>().await {
        Ok(mut events) => {
            let collected = buffer.clone();
            handles.push(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    let level = format!("{:?}", event.r#type).to_lowercase();
                    let message = format_console_args(&event.args);
                    collected.lock().await.push(format!("[{level}] {message}"));
                }
            }));
        }
        Err(e) => warn!(error = %e, "failed to subscribe to console API events"),
    }

    if let Err(e) = page.execute(LogEnableParams::default()).await {
        warn!(error = %e, "failed to enable log domain, browser-side console logs will not be captured");
    }
    match page.event_listener::<EventEntryAdded>().await {
        Ok(mut events) => {
            let collected = buffer.clone();
            handles.push(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    let level = format!("{:?}", event.entry.level).to_lowercase();
                    collected.lock().await.push(format!("[{level}] {}", event.entry.text));
                }
            }));
        }
        Err(e) => warn!(error = %e, "failed to subscribe to log entry-added events"),
    }

    (handles, buffer)
}

fn format_console_args(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| {
            arg.value
                .as_ref()
                .map(|v| v.to_string())
                .or_else(|| arg.description.clone())
                .unwrap_or_else(|| "<object>".to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_timeout_clamps_to_120s() {
        let request = RenderRequest { hard_timeout_ms: Some(999_999), ..default_request() };
        assert_eq!(request.hard_timeout(), Duration::from_millis(120_000));
    }

    #[test]
    fn default_wait_mode_is_network_idle() {
        assert_eq!(WaitMode::default(), WaitMode::NetworkIdle);
    }

    #[test]
    fn google_host_detection() {
        assert!(is_google_host("https://www.google.com/search?q=x"));
        assert!(!is_google_host("https://example.com"));
    }

    #[test]
    fn google_host_detection_covers_country_tlds() {
        assert!(is_google_host("https://www.google.co.uk/search?q=x"));
        assert!(is_google_host("https://www.google.de/search?q=x"));
        assert!(is_google_host("https://www.google.com.au/search?q=x"));
        assert_eq!(google_apex_for_url("https://www.google.co.uk"), Some("google.co.uk".to_string()));
    }

    #[test]
    fn google_host_detection_rejects_lookalikes() {
        assert!(!is_google_host("https://googleusercontent.com"));
        assert!(!is_google_host("https://notgoogle.com"));
    }

    fn default_request() -> RenderRequest {
        RenderRequest {
            url: "https://example.com".to_string(),
            wait_mode: WaitMode::default(),
            hard_timeout_ms: None,
            post_load_wait_ms: None,
            user_agent_override: None,
            cookies: vec![],
            extra_headers: BTreeMap::new(),
            viewport: None,
            scroll_to_bottom: true,
            wait_for_selectors: vec![],
            click_selectors: vec![],
            remove_selectors: vec![],
            custom_script: None,
            capture_console: false,
            return_partial_on_timeout: true,
            want_screenshot: None,
            want_pdf: None,
            want_html: true,
            want_text: false,
        }
    }
}
