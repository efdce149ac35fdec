//! # render-orchestrator
//!
//! A stealth-aware browser render orchestration service built on a singleton
//! headless Chrome process (via `chromiumoxide`) fronted by an `axum` HTTP
//! API. Each request gets its own isolated browser context; a bounded
//! semaphore caps total concurrent sessions.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use render_orchestrator::{Config, BrowserLifecycleManager, RenderStateMachine, RenderRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let browser = BrowserLifecycleManager::new(config.clone());
//!     let renderer = RenderStateMachine::new(config, browser);
//!
//!     let request = RenderRequest { url: "https://example.com".to_string(), ..Default::default() };
//!     let outcome = renderer.render(request).await?;
//!     println!("rendered {} bytes of HTML", outcome.content_length);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI usage
//!
//! ```bash
//! render-orchestrator single --url https://example.com
//! render-orchestrator batch --input urls.txt --max-parallel 5
//! render-orchestrator serve
//! ```

/// Configuration loading and Chrome launch-argument construction.
pub mod config;

/// Error types, `ErrorKind`, and the circuit breaker.
pub mod error;

/// Per-session fingerprint synthesis (stealth identity).
pub mod identity;

/// Stealth JS injected into every session to mask automation fingerprints.
pub mod stealth;

/// Singleton browser process and per-request session lifecycle.
pub mod browser;

/// Human-like mouse movement, scrolling, and page-settle waiting.
pub mod behavior;

/// Canonical per-resource-kind HTTP header tables.
pub mod headers;

/// The render state machine driving navigation through extraction.
pub mod render;

/// Order-preserving bounded-concurrency batch scheduling.
pub mod batch;

/// HTML/text/screenshot/PDF extraction from a live page.
pub mod extract;

/// System and browser health checking.
pub mod health;

/// Metrics collection and the Prometheus exporter.
pub mod metrics;

/// The axum HTTP surface.
pub mod http;

/// Command-line interface.
pub mod cli;

/// URL validation and small formatting helpers.
pub mod utils;

pub use batch::{BatchItemOutcome, BatchOutcome, BatchRequest, BatchScheduler};
pub use browser::BrowserLifecycleManager;
pub use config::Config;
pub use error::RenderError;
pub use health::{HealthMonitor, HealthReport, SystemHealthChecker};
pub use metrics::{Metrics, MetricsCollector, PrometheusExporter};
pub use render::{RenderOutcome, RenderRequest, RenderStateMachine};
