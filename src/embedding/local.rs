//! Local ONNX embedding provider.
//!
//! Runs a sentence-embedding model (bge-small-en-v1.5 by default) with mean
//! pooling and L2 normalization. The model and tokenizer are fetched from the
//! HuggingFace Hub into the configured cache on first use and stay resident
//! for the life of the process.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hf_hub::api::sync::ApiBuilder;
use ort::inputs;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};
use tokio::sync::OnceCell;
use tracing::info;

use super::{EmbeddingProvider, ProviderError};

pub const DEFAULT_MODEL: &str = "BAAI/bge-small-en-v1.5";

/// Longer inputs are truncated by the tokenizer.
const MAX_TOKENS: usize = 512;

/// Output sizes of commonly used sentence-embedding models.
///
/// The organisation prefix is optional, so `all-MiniLM-L6-v2` and
/// `sentence-transformers/all-MiniLM-L6-v2` resolve the same way.
pub fn known_dimensions(model: &str) -> Option<u64> {
    let name = model.rsplit('/').next().unwrap_or(model);
    match name {
        "bge-small-en-v1.5" => Some(384),
        "bge-base-en-v1.5" => Some(768),
        "bge-large-en-v1.5" => Some(1024),
        "all-MiniLM-L6-v2" | "all-MiniLM-L12-v2" => Some(384),
        "all-mpnet-base-v2" => Some(768),
        "nomic-embed-text-v1.5" => Some(768),
        _ => None,
    }
}

/// Hardware to run local inference on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
    /// CUDA when compiled in, otherwise CPU.
    Auto,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Auto => "auto",
        })
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            "auto" => Ok(Device::Auto),
            other => Err(format!("unknown device '{other}' (expected cpu, cuda or auto)")),
        }
    }
}

/// Synchronous ONNX engine. Not safe for concurrent use; callers hold a lock.
struct EmbeddingEngine {
    session: Session,
    tokenizer: Tokenizer,
    requires_token_type_ids: bool,
    dims: usize,
}

impl EmbeddingEngine {
    /// Load model from cache or download on first use.
    fn load(
        model_id: &str,
        cache_dir: PathBuf,
        device: Device,
        dims: usize,
    ) -> Result<Self, ProviderError> {
        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir)
            .with_progress(false)
            .build()?;
        let repo = api.model(model_id.to_string());

        let model_path = repo
            .get("onnx/model.onnx")
            .or_else(|_| repo.get("model.onnx"))?;
        let tokenizer_path = repo.get("tokenizer.json")?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)?;
        tokenizer
            .with_padding(None)
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))?;

        let mut builder =
            Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level1)?;
        if use_cuda(device) {
            builder = register_cuda(builder)?;
        }
        let session = builder.commit_from_file(&model_path)?;

        // Check if model requires token_type_ids input
        let requires_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        Ok(Self {
            session,
            tokenizer,
            requires_token_type_ids,
            dims,
        })
    }

    /// Embed one text into an L2-normalized vector of `dims` values.
    ///
    /// Empty input yields a zero vector.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.is_empty() {
            return Ok(vec![0.0f32; self.dims]);
        }

        let encoding = self.tokenizer.encode(text, true)?;
        let input_ids = encoding.get_ids();
        let attention_mask = encoding.get_attention_mask();

        if input_ids.is_empty() {
            return Ok(vec![0.0f32; self.dims]);
        }

        let seq_len = input_ids.len();
        let input_ids_vec: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let attention_mask_vec: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();

        let input_ids_tensor = Tensor::from_array(([1usize, seq_len], input_ids_vec))?;
        let attention_mask_tensor = Tensor::from_array(([1usize, seq_len], attention_mask_vec))?;

        let outputs = if self.requires_token_type_ids {
            let token_type_ids_tensor = Tensor::from_array(([1usize, seq_len], vec![0i64; seq_len]))?;
            self.session.run(inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            ])?
        } else {
            self.session.run(inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])?
        };

        let (shape, data) = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .ok_or_else(|| {
                ProviderError::Inference(
                    "model output has neither 'last_hidden_state' nor 'token_embeddings'".to_string(),
                )
            })?
            .try_extract_tensor::<f32>()?;

        if shape.len() != 3 {
            return Err(ProviderError::Inference(format!(
                "expected 3D output (batch, seq_len, hidden), got {shape:?}"
            )));
        }
        let hidden_dim = shape[2] as usize;
        if shape[0] != 1 || hidden_dim != self.dims {
            return Err(ProviderError::Inference(format!(
                "unexpected output shape {shape:?}: batch=1, hidden={} expected",
                self.dims
            )));
        }

        Ok(l2_normalize(&mean_pool(data, attention_mask, seq_len, hidden_dim)))
    }
}

#[cfg(feature = "cuda")]
fn use_cuda(device: Device) -> bool {
    matches!(device, Device::Cuda | Device::Auto)
}

#[cfg(not(feature = "cuda"))]
fn use_cuda(device: Device) -> bool {
    if device == Device::Cuda {
        tracing::warn!("Built without the `cuda` feature; running the embedding model on CPU");
    }
    false
}

#[cfg(feature = "cuda")]
fn register_cuda(
    builder: ort::session::builder::SessionBuilder,
) -> Result<ort::session::builder::SessionBuilder, ProviderError> {
    use ort::execution_providers::CUDAExecutionProvider;
    Ok(builder.with_execution_providers([CUDAExecutionProvider::default().build()])?)
}

#[cfg(not(feature = "cuda"))]
fn register_cuda(
    builder: ort::session::builder::SessionBuilder,
) -> Result<ort::session::builder::SessionBuilder, ProviderError> {
    Ok(builder)
}

/// Average token embeddings, weighting each token by its attention mask.
fn mean_pool(data: &[f32], attention_mask: &[u32], seq_len: usize, hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];

    for (token_idx, chunk) in data.chunks(hidden_dim).take(seq_len).enumerate() {
        let mask_value = attention_mask.get(token_idx).copied().unwrap_or(0) as f32;
        for (pooled_value, value) in pooled.iter_mut().zip(chunk) {
            *pooled_value += value * mask_value;
        }
    }

    let mask_sum: f32 = attention_mask
        .iter()
        .take(seq_len)
        .map(|&m| m as f32)
        .sum::<f32>()
        .max(1e-9);

    for value in pooled.iter_mut() {
        *value /= mask_sum;
    }
    pooled
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    let norm = norm.max(1e-9);

    vec.iter().map(|&x| x / norm).collect()
}

/// Embedding provider backed by a lazily loaded local ONNX model.
pub struct LocalEmbeddingProvider {
    model: String,
    dims: u64,
    device: Device,
    cache_dir: PathBuf,
    engine: OnceCell<Arc<Mutex<EmbeddingEngine>>>,
}

impl LocalEmbeddingProvider {
    pub fn new(model: &str, dims: u64, device: Device, cache_dir: PathBuf) -> Self {
        Self {
            model: model.to_string(),
            dims,
            device,
            cache_dir,
            engine: OnceCell::new(),
        }
    }

    /// Load the model once; concurrent first callers wait for the same load.
    async fn engine(&self) -> Result<Arc<Mutex<EmbeddingEngine>>, ProviderError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                info!(model = %self.model, device = %self.device, "Loading local embedding model");
                let model = self.model.clone();
                let cache_dir = self.cache_dir.clone();
                let device = self.device;
                let dims = self.dims as usize;
                let engine = tokio::task::spawn_blocking(move || {
                    EmbeddingEngine::load(&model, cache_dir, device, dims)
                })
                .await
                .map_err(|e| ProviderError::Unavailable(format!("model loading task failed: {e}")))??;
                info!(model = %self.model, "Local embedding model ready");
                Ok::<_, ProviderError>(Arc::new(Mutex::new(engine)))
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let engine = self.engine().await?;
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let mut engine = engine
                .lock()
                .map_err(|_| ProviderError::Unavailable("embedding engine lock poisoned".to_string()))?;
            engine.embed(&text)
        })
        .await
        .map_err(|e| ProviderError::Inference(format!("inference task failed: {e}")))?
    }

    fn dimensions(&self) -> u64 {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_dimensions() {
        assert_eq!(known_dimensions("BAAI/bge-small-en-v1.5"), Some(384));
        assert_eq!(known_dimensions("BAAI/bge-large-en-v1.5"), Some(1024));
        assert_eq!(known_dimensions("all-MiniLM-L6-v2"), Some(384));
        assert_eq!(known_dimensions("sentence-transformers/all-mpnet-base-v2"), Some(768));
        assert_eq!(known_dimensions("someone/unknown"), None);
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!("auto".parse::<Device>().unwrap(), Device::Auto);
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_mean_pool_respects_mask() {
        // two tokens of hidden size 2; second token masked out
        let data = [1.0, 3.0, 100.0, 100.0];
        let pooled = mean_pool(&data, &[1, 0], 2, 2);
        assert_eq!(pooled, vec![1.0, 3.0]);
    }

    #[test]
    fn test_l2_normalize_magnitude() {
        let normalized = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = normalized.iter().map(|&x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_provider_does_not_load_eagerly() {
        let provider = LocalEmbeddingProvider::new(
            DEFAULT_MODEL,
            384,
            Device::Cpu,
            std::env::temp_dir().join("qdrant-mcp-test-models"),
        );
        assert_eq!(provider.dimensions(), 384);
        assert!(provider.engine.get().is_none());
    }

    #[ignore]
    #[tokio::test]
    async fn test_integration_simple_text() {
        let cache = tempfile::TempDir::new().unwrap();
        let provider =
            LocalEmbeddingProvider::new(DEFAULT_MODEL, 384, Device::Cpu, cache.path().to_path_buf());
        let embedding = provider.embed("hello world").await.expect("embed text");

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|&x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "Embedding should be L2-normalized");
    }

    #[ignore]
    #[tokio::test]
    async fn test_integration_concurrent_first_use_loads_once() {
        let cache = tempfile::TempDir::new().unwrap();
        let provider = Arc::new(LocalEmbeddingProvider::new(
            DEFAULT_MODEL,
            384,
            Device::Cpu,
            cache.path().to_path_buf(),
        ));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let provider = Arc::clone(&provider);
                tokio::spawn(async move { provider.embed(&format!("text {i}")).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().len(), 384);
        }
    }
}
