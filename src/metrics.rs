//! Process metrics: in-memory counters/gauges exported over Prometheus,
//! retargeted from the teacher's screenshot-pool vocabulary to renders and
//! batch items.

use crate::error::ErrorKind;
use metrics::{Counter, Gauge, Histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

pub struct Metrics {
    pub renders_completed: Counter,
    pub renders_failed: Counter,
    pub render_duration: Histogram,
    pub emergency_extractions: Counter,
    pub batch_items_completed: Counter,
    pub batch_items_failed: Counter,
    pub active_sessions: Gauge,
    pub memory_usage: Gauge,
    pub browser_restarts: Counter,
    pub network_errors: Counter,
    pub timeout_errors: Counter,
    pub navigation_blocked: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            renders_completed: Counter::noop(),
            renders_failed: Counter::noop(),
            render_duration: Histogram::noop(),
            emergency_extractions: Counter::noop(),
            batch_items_completed: Counter::noop(),
            batch_items_failed: Counter::noop(),
            active_sessions: Gauge::noop(),
            memory_usage: Gauge::noop(),
            browser_restarts: Counter::noop(),
            network_errors: Counter::noop(),
            timeout_errors: Counter::noop(),
            navigation_blocked: Counter::noop(),
        }
    }

    pub fn record_render(&self, duration: Duration, success: bool, was_emergency: bool) {
        if success {
            self.renders_completed.increment(1);
        } else {
            self.renders_failed.increment(1);
        }
        if was_emergency {
            self.emergency_extractions.increment(1);
        }
        self.render_duration.record(duration.as_secs_f64());
    }

    pub fn record_batch_item(&self, success: bool) {
        if success {
            self.batch_items_completed.increment(1);
        } else {
            self.batch_items_failed.increment(1);
        }
    }

    pub fn record_error(&self, kind: ErrorKind) {
        match kind {
            ErrorKind::NetworkError => self.network_errors.increment(1),
            ErrorKind::Timeout => self.timeout_errors.increment(1),
            ErrorKind::NavigationBlocked => self.navigation_blocked.increment(1),
            _ => {}
        }
    }

    pub fn record_browser_restart(&self) {
        self.browser_restarts.increment(1);
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions.set(count as f64);
    }

    pub fn set_memory_usage(&self, bytes: usize) {
        self.memory_usage.set(bytes as f64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples process RSS on an interval and feeds it back into [`Metrics`].
pub struct MetricsCollector {
    metrics: Arc<Metrics>,
    start_time: Instant,
    collection_interval: Duration,
}

impl MetricsCollector {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics, start_time: Instant::now(), collection_interval: Duration::from_secs(10) }
    }

    pub fn start_collection(&self) {
        let metrics = self.metrics.clone();
        let interval = self.collection_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                if let Ok(memory) = read_rss_bytes() {
                    metrics.set_memory_usage(memory);
                }
            }
        });
    }

    pub fn get_uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Reads resident set size from `/proc/self/status`; `0` on platforms
/// without a `/proc` filesystem.
pub fn read_rss_bytes() -> Result<usize, std::io::Error> {
    let content = std::fs::read_to_string("/proc/self/status")?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            if let Some(kb) = rest.split_whitespace().next().and_then(|v| v.parse::<usize>().ok()) {
                return Ok(kb * 1024);
            }
        }
    }
    Ok(0)
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub renders_completed: u64,
    pub renders_failed: u64,
    pub average_duration: f64,
    pub memory_usage: usize,
    pub uptime: Duration,
}

/// Rolling request-latency and per-error-kind tracker, independent of the
/// Prometheus pipeline, used by `/api/status`.
pub struct PerformanceTracker {
    request_times: Arc<RwLock<Vec<Duration>>>,
    error_rates: Arc<RwLock<HashMap<String, usize>>>,
    max_samples: usize,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            request_times: Arc::new(RwLock::new(Vec::new())),
            error_rates: Arc::new(RwLock::new(HashMap::new())),
            max_samples: 1000,
        }
    }

    pub async fn record_request_time(&self, duration: Duration) {
        let mut times = self.request_times.write().await;
        times.push(duration);
        if times.len() > self.max_samples {
            times.remove(0);
        }
    }

    pub async fn record_error_rate(&self, error_type: String) {
        let mut rates = self.error_rates.write().await;
        *rates.entry(error_type).or_insert(0) += 1;
    }

    pub async fn get_performance_stats(&self) -> PerformanceStats {
        let times = self.request_times.read().await;
        let errors = self.error_rates.read().await;

        let total_requests = times.len();
        let avg_duration = if total_requests > 0 {
            times.iter().map(|d| d.as_secs_f64()).sum::<f64>() / total_requests as f64
        } else {
            0.0
        };

        let mut sorted_times = times.clone();
        sorted_times.sort();
        let p95_duration = if total_requests > 0 {
            let p95_index = ((total_requests as f64 * 0.95) as usize).min(total_requests - 1);
            sorted_times[p95_index].as_secs_f64()
        } else {
            0.0
        };

        PerformanceStats {
            total_requests,
            average_duration: avg_duration,
            p95_duration,
            error_rates: errors.clone(),
        }
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceStats {
    pub total_requests: usize,
    pub average_duration: f64,
    pub p95_duration: f64,
    pub error_rates: HashMap<String, usize>,
}

/// Installs the global Prometheus recorder and serves `/metrics` on its own
/// listener, separate from the main API's axum router.
pub struct PrometheusExporter {
    port: u16,
}

impl PrometheusExporter {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn start(&self) -> Result<(), crate::error::RenderError> {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| crate::error::RenderError::extraction_error(e.to_string()))?;

        let app = axum::Router::new().route(
            "/metrics",
            axum::routing::get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.port));
        info!(%addr, "starting prometheus metrics listener");

        tokio::spawn(async move {
            if let Err(e) = axum::Server::bind(&addr).serve(app.into_make_service()).await {
                tracing::error!(error = %e, "metrics server stopped");
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn performance_tracker_computes_average() {
        let tracker = PerformanceTracker::new();
        tracker.record_request_time(Duration::from_millis(100)).await;
        tracker.record_request_time(Duration::from_millis(300)).await;
        let stats = tracker.get_performance_stats().await;
        assert_eq!(stats.total_requests, 2);
        assert!((stats.average_duration - 0.2).abs() < 1e-6);
    }
}
