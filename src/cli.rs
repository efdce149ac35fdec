//! Command-line interface: a thin dev harness around the same components
//! the HTTP server uses, plus the one subcommand (`serve`) that starts it.

use crate::batch::{BatchItemTemplate, BatchRequest, BatchScheduler};
use crate::browser::BrowserLifecycleManager;
use crate::config::Config;
use crate::health::{HealthMonitor, SystemHealthChecker};
use crate::http::{build_router, AppState};
use crate::metrics::{Metrics, MetricsCollector, PrometheusExporter};
use crate::render::{RenderRequest, RenderStateMachine, WaitMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "render-orchestrator")]
#[command(about = "Stealth-aware render orchestration service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Enable verbose (debug-level) logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a single URL and print the result summary (or save HTML to a file).
    Single {
        #[arg(short, long)]
        url: String,

        #[arg(short, long, help = "Write HTML output to this file instead of stdout")]
        output: Option<PathBuf>,

        #[arg(long, help = "Hard timeout in milliseconds")]
        timeout_ms: Option<u64>,
    },

    /// Render every URL in a newline-delimited file.
    Batch {
        #[arg(short, long, help = "Input file, one URL per line")]
        input: PathBuf,

        #[arg(long, default_value = "3")]
        max_parallel: usize,
    },

    /// Start the HTTP server.
    Serve,

    /// Validate the environment-derived configuration and exit.
    Validate,

    /// Print a one-shot health report.
    Health,
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

pub struct Runtime {
    pub config: Config,
    pub browser: Arc<BrowserLifecycleManager>,
    pub renderer: Arc<RenderStateMachine>,
    pub metrics: Arc<Metrics>,
}

impl Runtime {
    pub fn new(config: Config) -> Self {
        let browser = BrowserLifecycleManager::new(config.clone());
        let renderer = Arc::new(RenderStateMachine::new(config.clone(), browser.clone()));
        let metrics = Arc::new(Metrics::new());
        Self { config, browser, renderer, metrics }
    }
}

pub async fn run(cli: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Single { url, output, timeout_ms } => run_single(config, url, output, timeout_ms).await,
        Commands::Batch { input, max_parallel } => run_batch(config, input, max_parallel).await,
        Commands::Serve => run_serve(config).await,
        Commands::Validate => run_validate(config),
        Commands::Health => run_health(config).await,
    }
}

async fn run_single(
    config: Config,
    url: String,
    output: Option<PathBuf>,
    timeout_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::new(config);

    let request = RenderRequest {
        url,
        wait_mode: WaitMode::default(),
        hard_timeout_ms: timeout_ms,
        post_load_wait_ms: None,
        user_agent_override: None,
        cookies: vec![],
        extra_headers: Default::default(),
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
    };

    let outcome = runtime.renderer.render(request).await?;

    info!(
        final_url = outcome.final_url,
        duration_ms = outcome.duration_ms,
        was_timeout = outcome.was_timeout,
        "render complete"
    );

    match output {
        Some(path) => {
            tokio::fs::write(&path, outcome.html.unwrap_or_default()).await?;
            println!("wrote {}", path.display());
        }
        None => {
            println!("{}", outcome.html.unwrap_or_default());
        }
    }

    runtime.browser.shutdown().await;
    Ok(())
}

async fn run_batch(config: Config, input: PathBuf, max_parallel: usize) -> Result<(), Box<dyn std::error::Error>> {
    let urls = read_urls_from_file(&input).await?;
    info!(count = urls.len(), "loaded URLs for batch");

    let max_batch_urls = config.max_batch_urls;
    let runtime = Runtime::new(config);
    let scheduler = BatchScheduler::new(runtime.renderer.clone(), max_batch_urls);

    let request = BatchRequest {
        urls,
        max_parallel: Some(max_parallel),
        template: BatchItemTemplate::default(),
    };

    let outcome = scheduler.run(request, tokio_util::sync::CancellationToken::new()).await?;
    println!(
        "batch complete: {} succeeded, {} failed, {} cancelled",
        outcome.succeeded, outcome.failed, outcome.cancelled
    );

    for item in &outcome.results {
        if !item.ok {
            println!("  FAILED {}: {}", item.url, item.error.as_deref().unwrap_or("unknown error"));
        }
    }

    runtime.browser.shutdown().await;
    Ok(())
}

async fn run_serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::new(config);

    let metrics_collector = MetricsCollector::new(runtime.metrics.clone());
    metrics_collector.start_collection();

    let prometheus = PrometheusExporter::new(runtime.config.port + 1);
    prometheus.start().await?;

    let health_monitor = HealthMonitor::new(runtime.browser.clone(), runtime.metrics.clone());
    tokio::spawn(health_monitor.run(std::time::Duration::from_secs(30)));

    let health = Arc::new(SystemHealthChecker::new(runtime.browser.clone()));
    let batch = Arc::new(BatchScheduler::new(runtime.renderer.clone(), runtime.config.max_batch_urls));

    let state = Arc::new(AppState {
        config: runtime.config.clone(),
        browser: runtime.browser.clone(),
        renderer: runtime.renderer.clone(),
        batch,
        metrics: runtime.metrics.clone(),
        health,
    });

    let addr: std::net::SocketAddr = format!("{}:{}", runtime.config.host, runtime.config.port).parse()?;
    info!(%addr, "starting render-orchestrator HTTP server");

    let app = build_router(state);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(setup_shutdown_handler(shutdown_tx));

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    runtime.browser.shutdown().await;
    Ok(())
}

fn run_validate(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.auth_token.is_empty() {
        return Err("AUTH_TOKEN must be set".into());
    }
    if config.max_batch_urls == 0 {
        return Err("MAX_BATCH_URLS must be greater than 0".into());
    }
    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err("viewport dimensions must be greater than 0".into());
    }

    println!("configuration valid");
    println!("  host: {}:{}", config.host, config.port);
    println!("  max_concurrency: {}", config.max_concurrency);
    println!("  max_batch_urls: {}", config.max_batch_urls);
    Ok(())
}

async fn run_health(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::new(config);
    let checker = SystemHealthChecker::new(runtime.browser.clone());
    let report = checker.report().await;

    println!("browser_connected: {}", report.browser_connected);
    println!("uptime_sec: {}", report.uptime_sec);
    println!("memory_bytes: {}", report.memory_bytes);

    runtime.browser.shutdown().await;
    Ok(())
}

async fn setup_shutdown_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("failed to install SIGINT handler");
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }

    let _ = shutdown_tx.send(());
}

async fn read_urls_from_file(path: &PathBuf) -> Result<Vec<String>, std::io::Error> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')).map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_urls_skips_blank_and_comment_lines() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("render-orchestrator-test-urls-{}.txt", std::process::id()));
        tokio::fs::write(&path, "https://example.com\n\n# a comment\nhttps://example.org\n").await.unwrap();

        let urls = read_urls_from_file(&path).await.unwrap();
        assert_eq!(urls, vec!["https://example.com".to_string(), "https://example.org".to_string()]);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
