//! Batch scheduling: render many URLs with bounded parallelism while
//! preserving input order and isolating each URL's failure from the rest
//! (testable property 5).

use crate::error::RenderError;
use crate::render::{RenderOutcome, RenderRequest, RenderStateMachine};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub max_parallel: Option<usize>,
    /// Per-URL render options, applied identically to every URL in the
    /// batch; only `url` itself varies per item.
    #[serde(flatten)]
    pub template: BatchItemTemplate,
}

/// The subset of [`RenderRequest`] fields a batch shares across all its
/// URLs. `url` is filled in per item from [`BatchRequest::urls`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BatchItemTemplate {
    #[serde(default)]
    pub wait_mode: Option<crate::render::WaitMode>,
    pub hard_timeout_ms: Option<u64>,
    pub post_load_wait_ms: Option<u64>,
    #[serde(default)]
    pub scroll_to_bottom: Option<bool>,
    #[serde(default)]
    pub want_html: Option<bool>,
    #[serde(default)]
    pub want_text: Option<bool>,
}

impl BatchItemTemplate {
    fn into_request(self, url: String) -> RenderRequest {
        RenderRequest {
            url,
            wait_mode: self.wait_mode.unwrap_or_default(),
            hard_timeout_ms: self.hard_timeout_ms,
            post_load_wait_ms: self.post_load_wait_ms,
            user_agent_override: None,
            cookies: vec![],
            extra_headers: Default::default(),
            viewport: None,
            scroll_to_bottom: self.scroll_to_bottom.unwrap_or(true),
            wait_for_selectors: vec![],
            click_selectors: vec![],
            remove_selectors: vec![],
            custom_script: None,
            capture_console: false,
            return_partial_on_timeout: true,
            want_screenshot: None,
            want_pdf: None,
            want_html: self.want_html.unwrap_or(true),
            want_text: self.want_text.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemOutcome {
    pub url: String,
    pub ok: bool,
    pub outcome: Option<RenderOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<BatchItemOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub struct BatchScheduler {
    renderer: std::sync::Arc<RenderStateMachine>,
    global_cap: usize,
}

impl BatchScheduler {
    pub fn new(renderer: std::sync::Arc<RenderStateMachine>, global_cap: usize) -> Self {
        Self { renderer, global_cap }
    }

    /// Run every URL in `request.urls`, in order, with at most
    /// `max_parallel` (clamped to `[1, 5]`) in flight at once. A URL that
    /// fails does not affect its siblings. If `cancel` fires mid-batch,
    /// items not yet started are recorded as cancelled and in-flight items
    /// are allowed to finish.
    pub async fn run(&self, request: BatchRequest, cancel: CancellationToken) -> Result<BatchOutcome, RenderError> {
        if request.urls.is_empty() {
            return Err(RenderError::invalid_input("batch requires at least one URL"));
        }
        if request.urls.len() > self.global_cap {
            return Err(RenderError::invalid_input(format!(
                "batch of {} URLs exceeds the configured maximum of {}",
                request.urls.len(),
                self.global_cap
            )));
        }

        let max_parallel = request.max_parallel.unwrap_or(3).clamp(1, 5);
        info!(count = request.urls.len(), max_parallel, "starting batch");

        let renderer = self.renderer.clone();
        let template = request.template.clone();
        let cancel_for_stream = cancel.clone();

        let items: Vec<(usize, String)> = request.urls.into_iter().enumerate().collect();

        let results = stream::iter(items)
            .map(|(index, url)| {
                let renderer = renderer.clone();
                let template = template.clone();
                let cancel = cancel_for_stream.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (index, BatchItemOutcome { url, ok: false, outcome: None, error: Some("cancelled".to_string()) });
                    }

                    let render_request = template.into_request(url.clone());
                    let outcome = tokio::select! {
                        result = renderer.render(render_request) => result,
                        _ = cancel.cancelled() => Err(RenderError::browser_unavailable("batch cancelled")),
                    };

                    match outcome {
                        Ok(outcome) => (index, BatchItemOutcome { url, ok: true, outcome: Some(outcome), error: None }),
                        Err(err) => {
                            warn!(url, error = %err, "batch item failed, continuing with remaining URLs");
                            (index, BatchItemOutcome { url, ok: false, outcome: None, error: Some(err.message.clone()) })
                        }
                    }
                }
            })
            .buffered(max_parallel)
            .collect::<Vec<_>>()
            .await;

        let mut ordered: Vec<Option<BatchItemOutcome>> = vec![None; results.len()];
        for (index, item) in results {
            ordered[index] = Some(item);
        }
        let results: Vec<BatchItemOutcome> = ordered.into_iter().map(|item| item.expect("every index filled")).collect();

        let succeeded = results.iter().filter(|r| r.ok).count();
        let cancelled = results.iter().filter(|r| r.error.as_deref() == Some("cancelled")).count();
        let failed = results.len() - succeeded - cancelled;

        info!(succeeded, failed, cancelled, "batch complete");

        Ok(BatchOutcome { results, succeeded, failed, cancelled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_defaults_render_html_only() {
        let template = BatchItemTemplate::default();
        let request = template.into_request("https://example.com".to_string());
        assert!(request.want_html);
        assert!(!request.want_text);
    }

    #[test]
    fn max_parallel_clamps_into_range() {
        assert_eq!(Some(99usize).unwrap_or(3).clamp(1, 5), 5);
        assert_eq!(Some(0usize).unwrap_or(3).clamp(1, 5), 1);
    }
}
