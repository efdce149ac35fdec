use std::time::Duration;
use thiserror::Error;
use tokio::sync::AcquireError;
use uuid::Uuid;

/// The error kind a caller sees, independent of the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    BrowserUnavailable,
    SessionCreationFailed,
    NavigationBlocked,
    NetworkError,
    Timeout,
    ExtractionError,
}

impl ErrorKind {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::NavigationBlocked => 502,
            ErrorKind::NetworkError => 502,
            ErrorKind::BrowserUnavailable | ErrorKind::SessionCreationFailed => 503,
            ErrorKind::Timeout => 504,
            ErrorKind::ExtractionError => 500,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct RenderError {
    pub kind: ErrorKind,
    pub message: String,
    pub original_message: Option<String>,
    pub remediation: Option<String>,
    pub request_id: Option<Uuid>,
}

impl RenderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            original_message: None,
            remediation: None,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: Uuid) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original_message = Some(original.into());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "missing or invalid token")
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        // Configuration failures are fatal at startup, surfaced the same way
        // an invalid-input error would be if they ever escape past init.
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn browser_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BrowserUnavailable, message)
            .with_remediation("retry shortly, the browser engine is restarting")
    }

    pub fn session_creation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionCreationFailed, message)
    }

    pub fn navigation_blocked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NavigationBlocked, message)
            .with_remediation("the target page appears to be challenging automated clients")
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(ErrorKind::Timeout, format!("timed out after {after:?}"))
    }

    pub fn extraction_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExtractionError, message)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::BrowserUnavailable | ErrorKind::NetworkError | ErrorKind::Timeout
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.kind {
            ErrorKind::InvalidInput | ErrorKind::Unauthorized => ErrorSeverity::Low,
            ErrorKind::NavigationBlocked | ErrorKind::ExtractionError => ErrorSeverity::Medium,
            ErrorKind::NetworkError | ErrorKind::Timeout => ErrorSeverity::Medium,
            ErrorKind::BrowserUnavailable | ErrorKind::SessionCreationFailed => {
                ErrorSeverity::High
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Per-browser circuit breaker guarding against hammering an engine that
/// keeps failing to produce sessions.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: std::sync::Arc<std::sync::Mutex<CircuitState>>,
    failure_threshold: usize,
    recovery_timeout: Duration,
    failure_count: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    last_failure_time: std::sync::Arc<std::sync::Mutex<Option<std::time::Instant>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: usize, recovery_timeout: Duration) -> Self {
        Self {
            state: std::sync::Arc::new(std::sync::Mutex::new(CircuitState::Closed)),
            failure_threshold,
            recovery_timeout,
            failure_count: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            last_failure_time: std::sync::Arc::new(std::sync::Mutex::new(None)),
        }
    }

    pub fn can_execute(&self) -> bool {
        let state = *self.state.lock().unwrap();
        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if let Some(last_failure) = *self.last_failure_time.lock().unwrap() {
                    if last_failure.elapsed() > self.recovery_timeout {
                        *self.state.lock().unwrap() = CircuitState::HalfOpen;
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        self.failure_count
            .store(0, std::sync::atomic::Ordering::Relaxed);
        *self.state.lock().unwrap() = CircuitState::Closed;
        *self.last_failure_time.lock().unwrap() = None;
    }

    pub fn record_failure(&self) {
        let failures = self
            .failure_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;
        *self.last_failure_time.lock().unwrap() = Some(std::time::Instant::now());

        if failures >= self.failure_threshold {
            *self.state.lock().unwrap() = CircuitState::Open;
        }
    }

    pub fn get_state(&self) -> CircuitState {
        *self.state.lock().unwrap()
    }

    pub fn get_failure_count(&self) -> usize {
        self.failure_count
            .load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl From<AcquireError> for RenderError {
    fn from(err: AcquireError) -> Self {
        RenderError::new(ErrorKind::BrowserUnavailable, err.to_string())
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::new(ErrorKind::ExtractionError, err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::invalid_input(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for RenderError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        RenderError::new(ErrorKind::ExtractionError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(2, Duration::from_millis(50));
        assert!(breaker.can_execute());
        breaker.record_failure();
        assert!(breaker.can_execute());
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    #[test]
    fn timeout_and_browser_unavailable_are_retryable() {
        assert!(RenderError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(RenderError::browser_unavailable("down").is_retryable());
        assert!(!RenderError::invalid_input("bad url").is_retryable());
    }
}
