//! Configuration management with serde serialization/deserialization
//!
//! Loads the process-wide [`Config`] from the environment, with an optional
//! JSON file overlay and CLI overrides layered on top (see `main.rs`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for the render orchestrator.
///
/// Controls the HTTP surface, browser launch behaviour, and the default
/// rendering bounds applied to requests that don't override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Shared-secret token callers must present (`AUTH_TOKEN`). Required.
    pub auth_token: String,

    /// Bind host (`HOST`, default `0.0.0.0`).
    pub host: String,

    /// Bind port (`PORT`, default `8080`).
    pub port: u16,

    /// Default hard timeout applied to a render when the request omits one
    /// (`BROWSER_TIMEOUT`, milliseconds, default 30000).
    pub browser_timeout: Duration,

    /// Default post-load settle wait (`EXTRA_WAIT_TIME`, milliseconds, default 2000).
    pub extra_wait_time: Duration,

    /// Process-wide cap on in-flight renders (`MAX_CONCURRENCY`, default `num_cpus * 4`).
    pub max_concurrency: usize,

    /// Max URLs accepted in one batch request (`MAX_BATCH_URLS`, default 10).
    pub max_batch_urls: usize,

    /// Max request body size in bytes (`BODY_LIMIT`, default 10MiB).
    pub body_limit: usize,

    /// Default viewport applied when a request doesn't specify one.
    pub viewport: Viewport,

    /// Path to Chrome/Chromium executable (auto-detected if `None`).
    pub chrome_path: Option<String>,

    /// Soft memory ceiling used by the health monitor to flag degradation.
    pub memory_limit: Option<usize>,
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// defaults for everything except `AUTH_TOKEN`.
    pub fn from_env() -> Result<Self, crate::error::RenderError> {
        let auth_token = std::env::var("AUTH_TOKEN").map_err(|_| {
            crate::error::RenderError::configuration("AUTH_TOKEN environment variable is required")
        })?;

        let mut config = Self {
            auth_token,
            ..Self::default()
        };

        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }
        if let Ok(v) = env_parsed::<u16>("PORT") {
            config.port = v;
        }
        if let Ok(v) = env_parsed::<u64>("BROWSER_TIMEOUT") {
            config.browser_timeout = Duration::from_millis(v);
        }
        if let Ok(v) = env_parsed::<u64>("EXTRA_WAIT_TIME") {
            config.extra_wait_time = Duration::from_millis(v);
        }
        if let Ok(v) = env_parsed::<usize>("MAX_CONCURRENCY") {
            config.max_concurrency = v;
        }
        if let Ok(v) = env_parsed::<usize>("MAX_BATCH_URLS") {
            config.max_batch_urls = v;
        }
        if let Ok(v) = env_parsed::<usize>("BODY_LIMIT") {
            config.body_limit = v;
        }
        if let Ok(path) = std::env::var("CHROME_PATH") {
            config.chrome_path = Some(path);
        }

        Ok(config)
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<T, ()> {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).ok_or(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_token: String::new(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            browser_timeout: Duration::from_secs(30),
            extra_wait_time: Duration::from_secs(2),
            max_concurrency: num_cpus::get() * 4,
            max_batch_urls: 10,
            body_limit: 10 * 1024 * 1024,
            viewport: Viewport::default(),
            chrome_path: None,
            memory_limit: Some(1024 * 1024 * 1024),
        }
    }
}

/// Browser viewport configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Output image formats for screenshot artifacts.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl Default for ImageFormat {
    fn default() -> Self {
        Self::Png
    }
}

/// Generate the Chrome command-line arguments the singleton browser is
/// launched with: headless flags tuned for server operation, plus the
/// automation-disclosure flags stealth sessions depend on being absent.
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let unique_id = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4());

    let mut args = vec![
        "--headless=new".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-features=TranslateUI,IsolateOrigins,site-per-process".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--disable-web-security".to_string(),
        "--allow-running-insecure-content".to_string(),
        "--ignore-certificate-errors".to_string(),
        "--ignore-ssl-errors".to_string(),
        "--mute-audio".to_string(),
        "--memory-pressure-off".to_string(),
        // Automation disclosure must be off for stealth sessions (spec 4.3).
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--exclude-switches=enable-automation".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!("--user-data-dir=/tmp/render-orchestrator-{unique_id}"),
    ];

    if let Some(memory_limit) = config.memory_limit {
        args.push(format!(
            "--max_old_space_size={}",
            memory_limit / 1024 / 1024
        ));
    }

    args
}

/// Build the chromiumoxide launch configuration for the singleton browser.
pub fn create_browser_config(config: &Config) -> chromiumoxide::browser::BrowserConfig {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder
        .build()
        .unwrap_or_else(|_| BrowserConfig::with_executable("/usr/bin/chromium"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_safe_bounds() {
        let config = Config::default();
        assert_eq!(config.browser_timeout, Duration::from_secs(30));
        assert_eq!(config.max_batch_urls, 10);
        assert_eq!(config.viewport.width, 1920);
    }

    #[test]
    fn chrome_args_disable_automation_markers() {
        let config = Config::default();
        let args = get_chrome_args(&config);
        assert!(args.iter().any(|a| a.contains("AutomationControlled")));
        assert!(args.contains(&"--headless=new".to_string()));
    }
}
