//! HTTP surface: the axum router the teacher's `cli.rs::run_server` never
//! implemented. Auth is a shared-secret constant-time compare, checked
//! against a query param, `X-Token` header, or `Authorization: Bearer`.

use crate::batch::{BatchOutcome, BatchRequest, BatchScheduler};
use crate::browser::BrowserLifecycleManager;
use crate::config::{Config, ImageFormat};
use crate::error::{ErrorKind, RenderError};
use crate::health::{HealthReport, SystemHealthChecker};
use crate::metrics::Metrics;
use crate::render::{PdfOptions, RenderOutcome, RenderRequest, RenderStateMachine, ScreenshotOptions, WaitMode};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub browser: Arc<BrowserLifecycleManager>,
    pub renderer: Arc<RenderStateMachine>,
    pub batch: Arc<BatchScheduler>,
    pub metrics: Arc<Metrics>,
    pub health: Arc<SystemHealthChecker>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit;

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/api/render", post(render_handler))
        .route("/api/html", get(html_get_handler).post(html_post_handler))
        .route("/api/content", get(content_get_handler).post(content_post_handler))
        .route("/api/screenshot", get(screenshot_handler))
        .route("/api/pdf", get(pdf_handler))
        .route("/api/batch", post(batch_handler))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_authorized(state: &AppState, headers: &HeaderMap, query_token: Option<&str>) -> bool {
    let presented = query_token
        .map(str::to_string)
        .or_else(|| headers.get("x-token").and_then(|v| v.to_str().ok()).map(str::to_string))
        .or_else(|| {
            headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        });

    match presented {
        Some(token) => constant_time_eq(token.as_bytes(), state.config.auth_token.as_bytes()),
        None => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

struct ApiError(RenderError);

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(ErrorBody {
            kind: format!("{:?}", self.0.kind),
            message: self.0.message,
            original_message: self.0.original_message,
            remediation: self.0.remediation,
            request_id: self.0.request_id.map(|id| id.to_string()),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    original_message: Option<String>,
    remediation: Option<String>,
    request_id: Option<String>,
}

fn unauthorized() -> ApiError {
    ApiError(RenderError::unauthorized())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.health.report().await)
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    health: HealthReport,
    browser_connected: bool,
    available_permits: usize,
    max_concurrency: usize,
}

async fn status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    if !is_authorized(&state, &headers, query.token.as_deref()) {
        return Err(unauthorized());
    }

    Ok(Json(StatusResponse {
        health: state.health.report().await,
        browser_connected: state.browser.is_connected().await,
        available_permits: state.browser.available_permits(),
        max_concurrency: state.browser.max_concurrency(),
    }))
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenderQuery {
    url: String,
    token: Option<String>,
    wait_mode: Option<WaitMode>,
    hard_timeout_ms: Option<u64>,
    full_page: Option<bool>,
    format: Option<ImageFormat>,
    quality: Option<u8>,
    selector: Option<String>,
}

impl RenderQuery {
    fn into_html_request(self) -> RenderRequest {
        base_request(self.url, self.wait_mode, self.hard_timeout_ms)
    }
}

fn base_request(url: String, wait_mode: Option<WaitMode>, hard_timeout_ms: Option<u64>) -> RenderRequest {
    RenderRequest {
        url,
        wait_mode: wait_mode.unwrap_or_default(),
        hard_timeout_ms,
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
    }
}

async fn render_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderOutcome>, ApiError> {
    if !is_authorized(&state, &headers, None) {
        return Err(unauthorized());
    }
    let outcome = state.renderer.render(request).await?;
    Ok(Json(outcome))
}

fn outcome_headers(outcome: &RenderOutcome) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = outcome.final_url.parse() {
        headers.insert("x-rendered-url", value);
    }
    if let Some(title) = &outcome.title {
        if let Ok(value) = title.parse() {
            headers.insert("x-page-title", value);
        }
    }
    headers.insert("x-was-timeout", outcome.was_timeout.to_string().parse().unwrap());
    headers.insert("x-is-emergency", outcome.is_emergency_extraction.to_string().parse().unwrap());
    headers.insert("x-content-length", outcome.content_length.to_string().parse().unwrap());
    headers
}

async fn html_get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RenderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_authorized(&state, &headers, query.token.as_deref()) {
        return Err(unauthorized());
    }
    let request = query.into_html_request();
    let outcome = state.renderer.render(request).await?;
    let response_headers = outcome_headers(&outcome);
    Ok((response_headers, outcome.html.unwrap_or_default()))
}

async fn html_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut request): Json<RenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_authorized(&state, &headers, None) {
        return Err(unauthorized());
    }
    request.want_html = true;
    let outcome = state.renderer.render(request).await?;
    let response_headers = outcome_headers(&outcome);
    Ok((response_headers, outcome.html.unwrap_or_default()))
}

async fn content_get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RenderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_authorized(&state, &headers, query.token.as_deref()) {
        return Err(unauthorized());
    }
    let mut request = query.into_html_request();
    request.want_html = false;
    request.want_text = true;
    let outcome = state.renderer.render(request).await?;
    let response_headers = outcome_headers(&outcome);
    Ok((response_headers, outcome.text.unwrap_or_default()))
}

async fn content_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut request): Json<RenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_authorized(&state, &headers, None) {
        return Err(unauthorized());
    }
    request.want_text = true;
    let outcome = state.renderer.render(request).await?;
    let response_headers = outcome_headers(&outcome);
    Ok((response_headers, outcome.text.unwrap_or_default()))
}

async fn screenshot_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RenderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_authorized(&state, &headers, query.token.as_deref()) {
        return Err(unauthorized());
    }

    let format = query.format.unwrap_or_default();
    let mut request = base_request(query.url, query.wait_mode, query.hard_timeout_ms);
    request.want_html = false;
    request.want_screenshot = Some(ScreenshotOptions {
        full_page: query.full_page.unwrap_or(true),
        format,
        quality: query.quality,
        selector: query.selector,
    });

    let outcome = state.renderer.render(request).await?;
    let bytes = outcome
        .screenshot_bytes
        .ok_or_else(|| ApiError(RenderError::extraction_error("screenshot was not captured")))?;

    let content_type = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
    };
    Ok(([("content-type", content_type)], bytes))
}

async fn pdf_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RenderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_authorized(&state, &headers, query.token.as_deref()) {
        return Err(unauthorized());
    }

    let mut request = base_request(query.url, query.wait_mode, query.hard_timeout_ms);
    request.want_html = false;
    request.want_pdf = Some(PdfOptions { background: true, margins_inches: None });

    let outcome = state.renderer.render(request).await?;
    let bytes = outcome.pdf_bytes.ok_or_else(|| ApiError(RenderError::extraction_error("pdf was not captured")))?;

    Ok(([("content-type", "application/pdf")], bytes))
}

async fn batch_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchOutcome>, ApiError> {
    if !is_authorized(&state, &headers, None) {
        return Err(unauthorized());
    }

    let cancel = tokio_util::sync::CancellationToken::new();
    let outcome = state.batch.run(request, cancel).await?;

    for item in &outcome.results {
        state.metrics.record_batch_item(item.ok);
        if let Some(error) = &item.error {
            if error != "cancelled" {
                state.metrics.record_error(ErrorKind::ExtractionError);
            }
        }
    }

    info!(succeeded = outcome.succeeded, failed = outcome.failed, "batch request complete");
    Ok(Json(outcome))
}
