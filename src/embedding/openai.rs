//! OpenAI-compatible embeddings provider using the `/embeddings` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingProvider, ProviderError};

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Output sizes of the hosted OpenAI embedding models.
pub fn known_dimensions(model: &str) -> Option<u64> {
    match model {
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    dims: u64,
    /// Forward `dimensions` in the request (text-embedding-3 models only).
    request_dimensions: bool,
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

fn embeddings_endpoint(base_url: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with("/embeddings") {
        return normalized;
    }
    if has_version_suffix(&normalized) {
        return format!("{normalized}/embeddings");
    }
    format!("{normalized}/v1/embeddings")
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            base_url: normalize_base_url(DEFAULT_BASE_URL),
            model: DEFAULT_MODEL.to_string(),
            dims: 1536,
            request_dimensions: false,
        }
    }

    /// Select the model. `explicit_dims` marks `dims` as a caller override to forward.
    pub fn with_model(mut self, model: &str, dims: u64, explicit_dims: bool) -> Self {
        self.model = model.to_string();
        self.dims = dims;
        self.request_dimensions = explicit_dims && model.starts_with("text-embedding-3");
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = normalize_base_url(url);
        self
    }

    fn request(&self, text: &str) -> EmbeddingRequest {
        EmbeddingRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
            dimensions: self.request_dimensions.then_some(self.dims),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u64>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Map a non-success response to the matching provider error.
fn classify_failure(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    let lower = message.to_lowercase();
    match status {
        401 | 403 => ProviderError::Auth(message),
        400 if lower.contains("context length") || lower.contains("too many tokens") => {
            ProviderError::InputTooLong(message)
        }
        _ => ProviderError::Api { status, message },
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        debug!(model = %self.model, chars = text.len(), "Requesting remote embedding");

        let response = self
            .client
            .post(embeddings_endpoint(&self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        let embedding = response
            .json::<EmbeddingResponse>()
            .await?
            .data
            .pop()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::Inference("empty embedding response".to_string()))?;

        if embedding.len() as u64 != self.dims {
            return Err(ProviderError::Inference(format!(
                "model '{}' returned {} dimensions, expected {}",
                self.model,
                embedding.len(),
                self.dims
            )));
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> u64 {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
