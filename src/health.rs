//! System health monitoring: periodic checks of browser connectivity,
//! session-pool utilisation, and memory, plus the alerting wrapper the
//! teacher's health module built around them.

use crate::browser::BrowserLifecycleManager;
use crate::metrics::{read_rss_bytes, Metrics};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub overall: HealthLevel,
    pub browser: HealthLevel,
    pub resources: HealthLevel,
    #[serde(skip)]
    pub timestamp: SystemTime,
}

/// The plain §6 `Health()` contract: `{browserConnected, uptimeSec, memoryBytes}`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub browser_connected: bool,
    pub uptime_sec: u64,
    pub memory_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct HealthThresholds {
    pub max_memory_bytes: usize,
    pub min_free_permits_fraction: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self { max_memory_bytes: 1024 * 1024 * 1024, min_free_permits_fraction: 0.1 }
    }
}

pub struct SystemHealthChecker {
    browser: Arc<BrowserLifecycleManager>,
    started_at: Instant,
    thresholds: HealthThresholds,
}

impl SystemHealthChecker {
    pub fn new(browser: Arc<BrowserLifecycleManager>) -> Self {
        Self { browser, started_at: Instant::now(), thresholds: HealthThresholds::default() }
    }

    pub async fn report(&self) -> HealthReport {
        HealthReport {
            browser_connected: self.browser.is_connected().await,
            uptime_sec: self.started_at.elapsed().as_secs(),
            memory_bytes: read_rss_bytes().unwrap_or(0),
        }
    }

    pub async fn check_system_health(&self) -> HealthStatus {
        let browser_health = self.check_browser_health().await;
        let resource_health = self.check_resource_health();
        let overall = Self::worst_of(&[browser_health, resource_health]);

        info!(?overall, "health check completed");

        HealthStatus { overall, browser: browser_health, resources: resource_health, timestamp: SystemTime::now() }
    }

    async fn check_browser_health(&self) -> HealthLevel {
        if !self.browser.is_connected().await {
            warn!("browser engine is not connected");
            return HealthLevel::Critical;
        }

        let max = self.browser.max_concurrency().max(1);
        let free_fraction = self.browser.available_permits() as f64 / max as f64;
        if free_fraction < self.thresholds.min_free_permits_fraction {
            warn!(free_fraction, "session pool nearly saturated");
            HealthLevel::Warning
        } else {
            HealthLevel::Healthy
        }
    }

    fn check_resource_health(&self) -> HealthLevel {
        let memory = read_rss_bytes().unwrap_or(0);
        if memory > self.thresholds.max_memory_bytes {
            error!(memory, "resource health critical: memory over threshold");
            HealthLevel::Critical
        } else if memory > self.thresholds.max_memory_bytes * 8 / 10 {
            HealthLevel::Warning
        } else {
            HealthLevel::Healthy
        }
    }

    fn worst_of(levels: &[HealthLevel]) -> HealthLevel {
        if levels.contains(&HealthLevel::Critical) {
            HealthLevel::Critical
        } else if levels.contains(&HealthLevel::Warning) {
            HealthLevel::Warning
        } else {
            HealthLevel::Healthy
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthAlert {
    pub id: String,
    pub message: String,
    pub timestamp: SystemTime,
    pub acknowledged: bool,
}

/// Wraps [`SystemHealthChecker`] with a periodic loop and a rolling alert
/// log, mirroring the teacher's `HealthMonitor`.
pub struct HealthMonitor {
    checker: SystemHealthChecker,
    metrics: Arc<Metrics>,
    alerts: Vec<HealthAlert>,
}

impl HealthMonitor {
    pub fn new(browser: Arc<BrowserLifecycleManager>, metrics: Arc<Metrics>) -> Self {
        Self { checker: SystemHealthChecker::new(browser), metrics, alerts: Vec::new() }
    }

    pub async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let status = self.checker.check_system_health().await;
            self.metrics.set_memory_usage(read_rss_bytes().unwrap_or(0));

            if status.overall == HealthLevel::Critical {
                self.create_alert(format!("system health critical: browser={:?} resources={:?}", status.browser, status.resources));
            }
            self.cleanup_old_alerts();
        }
    }

    fn create_alert(&mut self, message: String) {
        error!(message, "health alert");
        self.alerts.push(HealthAlert {
            id: uuid::Uuid::new_v4().to_string(),
            message,
            timestamp: SystemTime::now(),
            acknowledged: false,
        });
    }

    fn cleanup_old_alerts(&mut self) {
        let cutoff = SystemTime::now() - Duration::from_secs(24 * 60 * 60);
        self.alerts.retain(|a| a.timestamp > cutoff);
    }

    pub fn active_alerts(&self) -> Vec<&HealthAlert> {
        self.alerts.iter().filter(|a| !a.acknowledged).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_of_prefers_critical_over_warning() {
        assert_eq!(
            SystemHealthChecker::worst_of(&[HealthLevel::Warning, HealthLevel::Critical]),
            HealthLevel::Critical
        );
    }

    #[test]
    fn worst_of_is_healthy_when_all_healthy() {
        assert_eq!(
            SystemHealthChecker::worst_of(&[HealthLevel::Healthy, HealthLevel::Healthy]),
            HealthLevel::Healthy
        );
    }
}
