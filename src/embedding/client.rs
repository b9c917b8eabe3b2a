use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{EmbeddingRequest, EmbeddingResponse};
use super::Embedder;
use crate::config::{EmbeddingConfig, RequestConfig};
use crate::error::{EmbeddingError, EmbeddingResult};

/// Upper bound on a single backoff sleep.
const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Delay before retry number `retry` (1-based), doubling from `base_ms` and
/// capped at [`MAX_RETRY_DELAY_MS`].
fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 2_u64.checked_pow(retry.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_RETRY_DELAY_MS))
}

/// Client for an OpenAI-compatible embeddings API
#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    request_config: RequestConfig,
}

impl HttpEmbedder {
    /// Create a new embedding client
    pub fn new(config: &EmbeddingConfig, request_config: RequestConfig) -> EmbeddingResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(EmbeddingError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Log the endpoint this client will call
    pub fn log_endpoint(&self) {
        info!(
            base_url = %self.base_url,
            model = %self.model,
            dimensions = self.dimensions,
            "Embedding client initialized"
        );
    }

    /// Embed one text, retrying transient failures with exponential backoff
    async fn embed_with_retry(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let request = EmbeddingRequest::single(&self.model, text);

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = backoff_delay(self.request_config.retry_delay_ms, retries);
                warn!(
                    model = %self.model,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying embedding request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(vector) => {
                    debug!(
                        model = %self.model,
                        latency_ms = start.elapsed().as_millis(),
                        "Embedding request succeeded"
                    );
                    return Ok(vector);
                }
                Err(e) if is_permanent(&e) => return Err(e),
                Err(e) => {
                    error!(
                        model = %self.model,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Embedding request failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(EmbeddingError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request(
        &self,
        url: &str,
        request: &EmbeddingRequest,
    ) -> EmbeddingResult<Vec<f32>> {
        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout {
                    timeout_ms: self.request_config.timeout_ms,
                }
            } else {
                EmbeddingError::Http(e)
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        body.into_vector(0)
            .ok_or_else(|| EmbeddingError::InvalidResponse {
                message: "Response contained no embedding for input 0".to_string(),
            })
    }
}

/// Client errors and malformed payloads will not improve on retry.
fn is_permanent(error: &EmbeddingError) -> bool {
    match error {
        EmbeddingError::InvalidResponse { .. } => true,
        EmbeddingError::Api { status, .. } => (400..500).contains(status) && *status != 429,
        _ => false,
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.embed_with_retry(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}
