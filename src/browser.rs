//! Browser lifecycle management: owns the single Chrome process the whole
//! process shares, lazily starting it and restarting it after a fatal
//! session error. Concurrency is achieved through isolated per-session
//! browser contexts, not multiple OS processes.

use crate::config::{create_browser_config, Config};
use crate::error::{CircuitBreaker, RenderError};
use crate::identity::SessionIdentity;
use chromiumoxide::browser::{Browser, BrowserContext};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserState {
    Uninitialised,
    Starting,
    Ready,
    Degraded,
    Shutdown,
}

struct Inner {
    browser: Option<Browser>,
    handler: Option<tokio::task::JoinHandle<()>>,
    state: BrowserState,
}

/// Singleton manager for the one Chrome process the service runs.
pub struct BrowserLifecycleManager {
    config: Config,
    inner: Mutex<Inner>,
    concurrency: Arc<Semaphore>,
    is_shutting_down: AtomicBool,
    circuit: CircuitBreaker,
}

/// A rendering session: one isolated browser context and page, owned by
/// exactly one in-flight request.
pub struct Session {
    pub request_id: Uuid,
    pub identity: SessionIdentity,
    pub page: Page,
    context: BrowserContext,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl BrowserLifecycleManager {
    pub fn new(config: Config) -> Arc<Self> {
        let max_concurrency = config.max_concurrency;
        Arc::new(Self {
            config,
            inner: Mutex::new(Inner { browser: None, handler: None, state: BrowserState::Uninitialised }),
            concurrency: Arc::new(Semaphore::new(max_concurrency)),
            is_shutting_down: AtomicBool::new(false),
            circuit: CircuitBreaker::new(5, Duration::from_secs(30)),
        })
    }

    pub async fn state(&self) -> BrowserState {
        self.inner.lock().await.state
    }

    pub async fn is_connected(&self) -> bool {
        matches!(self.state().await, BrowserState::Ready)
    }

    pub fn available_permits(&self) -> usize {
        self.concurrency.available_permits()
    }

    pub fn max_concurrency(&self) -> usize {
        self.config.max_concurrency
    }

    /// Start the browser if it isn't already running. Concurrent callers
    /// serialise on the inner lock, so at most one launch ever happens at a
    /// time (testable property 4).
    async fn ensure_started(&self) -> Result<(), RenderError> {
        let mut inner = self.inner.lock().await;

        if inner.state == BrowserState::Ready && inner.browser.is_some() {
            return Ok(());
        }

        inner.state = BrowserState::Starting;
        info!("launching browser engine");

        let browser_config = create_browser_config(&self.config);
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::browser_unavailable(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!(error = %e, "browser handler error");
                        break;
                    }
                    None => {
                        info!("browser handler stream ended");
                        break;
                    }
                }
            }
        });

        inner.browser = Some(browser);
        inner.handler = Some(handler_task);
        inner.state = BrowserState::Ready;
        info!("browser engine ready");
        Ok(())
    }

    async fn mark_degraded(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(handler) = inner.handler.take() {
            handler.abort();
        }
        inner.browser = None;
        inner.state = BrowserState::Degraded;
        warn!("browser transitioned to degraded state");
    }

    /// Acquire an isolated session: a fresh browser context with its own
    /// cookie jar, configured with the caller's identity and cookies, and
    /// the stealth script installed as a document-start init. Guarded by a
    /// circuit breaker that opens after repeated `SessionCreationFailed`/
    /// `BrowserUnavailable` failures, so a wedged engine stops being hammered
    /// with launch/context attempts until its recovery window elapses.
    pub async fn acquire_session(
        &self,
        request_id: Uuid,
        identity: SessionIdentity,
        stealth_script: &str,
        cookies: &[CookieSpec],
    ) -> Result<Session, RenderError> {
        if self.is_shutting_down.load(Ordering::Relaxed) {
            return Err(RenderError::browser_unavailable("shutting down"));
        }

        if !self.circuit.can_execute() {
            return Err(RenderError::browser_unavailable(
                "circuit breaker open: too many recent session failures",
            ));
        }

        let permit = self.concurrency.clone().acquire_owned().await.map_err(RenderError::from)?;

        if let Err(e) = self.ensure_started().await {
            self.circuit.record_failure();
            return Err(e);
        }

        let context_result = {
            let inner = self.inner.lock().await;
            let browser = inner
                .browser
                .as_ref()
                .ok_or_else(|| RenderError::browser_unavailable("engine not running"))?;
            browser.create_browser_context(Default::default()).await
        };

        let context = match context_result {
            Ok(ctx) => ctx,
            Err(e) => {
                self.mark_degraded().await;
                self.circuit.record_failure();
                return Err(RenderError::session_creation_failed(e.to_string()));
            }
        };

        let page = match context.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                self.circuit.record_failure();
                return Err(RenderError::session_creation_failed(e.to_string()));
            }
        };

        if let Err(e) = page.evaluate_on_new_document(stealth_script).await {
            warn!(error = %e, "failed to install stealth script, session continues without it");
        }

        if !cookies.is_empty() {
            let cdp_cookies: Vec<CookieParam> = cookies.iter().map(CookieSpec::to_cdp).collect();
            if let Err(e) = page.set_cookies(cdp_cookies).await {
                warn!(error = %e, "failed to install caller cookies");
            }
        }

        self.circuit.record_success();
        Ok(Session { request_id, identity, page, context, _permit: permit })
    }

    /// Close a session's context. Idempotent in effect: errors are logged,
    /// never propagated, since the caller has already gotten their outcome.
    pub async fn release_session(&self, session: Session) {
        if let Err(e) = session.page.close().await {
            warn!(error = %e, "error closing page on release");
        }
        if let Err(e) = session.context.dispose().await {
            warn!(error = %e, "error disposing browser context on release");
        }
    }

    pub async fn shutdown(&self) {
        self.is_shutting_down.store(true, Ordering::Relaxed);
        let mut inner = self.inner.lock().await;
        if let Some(handler) = inner.handler.take() {
            handler.abort();
        }
        if let Some(mut browser) = inner.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "error closing browser during shutdown");
            }
        }
        inner.state = BrowserState::Shutdown;
        info!("browser lifecycle manager shut down");
    }
}

/// Wire-shaped cookie the HTTP layer deserialises a `RenderRequest`'s
/// `cookies` field into before handing it to the lifecycle manager.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub same_site: Option<String>,
    pub expires: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieSpec {
    fn to_cdp(&self) -> CookieParam {
        let mut builder = CookieParam::builder()
            .name(self.name.clone())
            .value(self.value.clone())
            .domain(self.domain.clone())
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only);

        if let Some(same_site) = &self.same_site {
            let parsed = match same_site.as_str() {
                "Strict" => Some(CookieSameSite::Strict),
                "None" => Some(CookieSameSite::None),
                _ => Some(CookieSameSite::Lax),
            };
            if let Some(parsed) = parsed {
                builder = builder.same_site(parsed);
            }
        }

        if let Some(expires) = self.expires {
            builder = builder.expires(expires);
        }

        builder.build().expect("required cookie fields are always set")
    }

    /// Google's consent cookies, added ahead of navigation when the target
    /// host matches `google.*` (spec §4.5). `apex_domain` is the matched
    /// registrable domain (e.g. `google.com`, `google.co.uk`), so the
    /// cookies land on whichever Google ccTLD is actually being rendered.
    pub fn google_consent_preload(apex_domain: &str) -> Vec<CookieSpec> {
        let one_year_from_now = (chrono::Utc::now() + chrono::Duration::days(365)).timestamp() as f64;
        let domain = format!(".{apex_domain}");
        vec![
            CookieSpec {
                name: "CONSENT".to_string(),
                value: "YES+CB.en+V14".to_string(),
                domain: domain.clone(),
                path: "/".to_string(),
                secure: true,
                http_only: false,
                same_site: Some("None".to_string()),
                expires: Some(one_year_from_now),
            },
            CookieSpec {
                name: "SOCS".to_string(),
                value: "CAI".to_string(),
                domain,
                path: "/".to_string(),
                secure: true,
                http_only: false,
                same_site: Some("None".to_string()),
                expires: Some(one_year_from_now),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_consent_preload_sets_expected_cookies() {
        let cookies = CookieSpec::google_consent_preload("google.com");
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c| c.name == "CONSENT"));
        assert!(cookies.iter().any(|c| c.name == "SOCS"));
        assert!(cookies.iter().all(|c| c.domain == ".google.com"));
    }

    #[test]
    fn google_consent_preload_follows_the_matched_cctld() {
        let cookies = CookieSpec::google_consent_preload("google.co.uk");
        assert!(cookies.iter().all(|c| c.domain == ".google.co.uk"));
    }
}
