//! Sentence embedder using Candle.
//!
//! Uses sentence-transformers/all-MiniLM-L6-v2 by default:
//! - 384 dimensions
//! - 256 max tokens
//! - BERT architecture, mean pooled
//!
//! Other BERT checkpoints load only if their hidden size is also 384; the
//! text collection's width is fixed when it is created.

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{Repo, RepoType, api::tokio::ApiBuilder};
use mmrag_core::{EmbedError, Embedder, EmbeddingConfig, Modality};
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Default model identifier on HuggingFace Hub.
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Embedding dimension for all-MiniLM-L6-v2.
const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length.
const MAX_TOKENS: usize = 256;

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// BERT sentence embedder. Weights are fetched and loaded on first use.
pub struct BertEmbedder {
    model_id: String,
    device: Device,
    cache_dir: Option<PathBuf>,
    loaded: OnceCell<Arc<LoadedModel>>,
}

impl BertEmbedder {
    /// Create an embedder for the default model.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        // Try to use CUDA if available, fallback to CPU
        let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
        info!("BertEmbedder using device: {:?}", device);
        Self::with_device(DEFAULT_MODEL_ID, cache_dir, device)
    }

    /// Create with a specific model and device.
    pub fn with_device(model_id: impl Into<String>, cache_dir: Option<PathBuf>, device: Device) -> Self {
        Self {
            model_id: model_id.into(),
            device,
            cache_dir,
            loaded: OnceCell::new(),
        }
    }

    /// Load the model (download if needed). Idempotent and safe under concurrent callers.
    pub async fn init(&self) -> Result<(), EmbedError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<Arc<LoadedModel>, EmbedError> {
        self.loaded
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    async fn load(&self) -> Result<Arc<LoadedModel>, EmbedError> {
        info!("Initializing BertEmbedder with model: {}", self.model_id);

        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        let api = builder
            .build()
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to create HF API: {e}")))?;
        let repo = api.repo(Repo::new(self.model_id.clone(), RepoType::Model));

        debug!("Fetching tokenizer, config and weights");
        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to download tokenizer: {e}")))?;
        let config_path = repo
            .get("config.json")
            .await
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to download config: {e}")))?;
        let weights_path = repo
            .get("model.safetensors")
            .await
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to download weights: {e}")))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to load tokenizer: {e}")))?;

        let config_str = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to read config: {e}")))?;
        check_hidden_size(&self.model_id, &config_str, EMBEDDING_DIM)?;
        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to parse config: {e}")))?;

        let device = self.device.clone();
        let model = tokio::task::spawn_blocking(move || {
            // SAFETY: The safetensors file comes from the HuggingFace cache and is only
            // read; the mapping outlives no borrow of the file.
            #[allow(unsafe_code)]
            let vb = unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                    .map_err(|e| EmbedError::ModelUnavailable(format!("failed to load weights: {e}")))?
            };
            BertModel::load(vb, &config)
                .map_err(|e| EmbedError::ModelUnavailable(format!("failed to create BERT model: {e}")))
        })
        .await
        .map_err(|e| EmbedError::ModelUnavailable(format!("model loading task failed: {e}")))??;

        info!("BertEmbedder initialized successfully");
        Ok(Arc::new(LoadedModel {
            model,
            tokenizer,
            device: self.device.clone(),
        }))
    }
}

impl LoadedModel {
    /// Encode one batch: tokenize, forward, mean pool, optionally normalize.
    fn encode_batch(&self, texts: &[String], normalize: bool) -> Result<Vec<Vec<f32>>, EmbedError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedError::Inference(format!("tokenization failed: {e}")))?;

        let max_len = encodings
            .iter()
            .map(tokenizers::Encoding::len)
            .max()
            .unwrap_or(0)
            .clamp(1, MAX_TOKENS);

        let batch_size = texts.len();
        let mut input_ids = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask = Vec::with_capacity(batch_size * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let len = ids.len().min(max_len);
            for i in 0..max_len {
                if i < len {
                    input_ids.push(ids[i]);
                    attention_mask.push(1u32);
                } else {
                    input_ids.push(0);
                    attention_mask.push(0);
                }
            }
        }
        let token_type_ids = vec![0u32; batch_size * max_len];

        let input_ids = Tensor::from_vec(input_ids, (batch_size, max_len), &self.device)
            .map_err(|e| EmbedError::Inference(format!("failed to create input_ids tensor: {e}")))?;
        let attention_mask = Tensor::from_vec(attention_mask, (batch_size, max_len), &self.device)
            .map_err(|e| EmbedError::Inference(format!("failed to create attention_mask tensor: {e}")))?;
        let token_type_ids = Tensor::from_vec(token_type_ids, (batch_size, max_len), &self.device)
            .map_err(|e| EmbedError::Inference(format!("failed to create token_type_ids tensor: {e}")))?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| EmbedError::Inference(format!("model forward failed: {e}")))?;

        let pooled = mean_pooling(&output, &attention_mask)
            .map_err(|e| EmbedError::Inference(format!("mean pooling failed: {e}")))?;
        let embeddings = if normalize {
            l2_normalize(&pooled).map_err(|e| EmbedError::Inference(format!("normalize failed: {e}")))?
        } else {
            pooled
        };

        embeddings
            .to_vec2::<f32>()
            .map_err(|e| EmbedError::Inference(format!("failed to convert to vec: {e}")))
    }
}

/// Fail the load if the checkpoint's hidden size is not `expected`.
fn check_hidden_size(model_id: &str, config_json: &str, expected: usize) -> Result<(), EmbedError> {
    let config: serde_json::Value = serde_json::from_str(config_json)
        .map_err(|e| EmbedError::ModelUnavailable(format!("failed to parse config: {e}")))?;
    match config.get("hidden_size").and_then(serde_json::Value::as_u64) {
        Some(size) if usize::try_from(size).ok() == Some(expected) => Ok(()),
        Some(size) => Err(EmbedError::ModelUnavailable(format!(
            "{model_id} produces {size}-dimensional vectors, the text collection needs {expected}"
        ))),
        None => Err(EmbedError::ModelUnavailable(format!(
            "{model_id} config has no hidden_size"
        ))),
    }
}

/// Mean pooling with attention mask.
fn mean_pooling(token_embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)?
        .broadcast_as(token_embeddings.shape())?
        .to_dtype(DType::F32)?;
    let sum = token_embeddings.mul(&mask)?.sum(1)?;
    let count = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    sum.div(&count)
}

/// L2 normalize each row.
pub(crate) fn l2_normalize(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    let norm = embeddings
        .sqr()?
        .sum_keepdim(1)?
        .sqrt()?
        .clamp(1e-12, f64::MAX)?;
    embeddings.broadcast_div(&norm)
}

#[async_trait]
impl Embedder for BertEmbedder {
    fn model_name(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn modalities(&self) -> &[Modality] {
        &[Modality::Text]
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        debug!("Embedding {} texts with batch_size {}", texts.len(), config.batch_size);

        let mut all_results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(config.batch_size.max(1)) {
            let batch: Vec<String> = chunk.iter().map(|t| (*t).to_string()).collect();
            let model = Arc::clone(&model);
            let normalize = config.normalize;
            let outputs = tokio::task::spawn_blocking(move || model.encode_batch(&batch, normalize))
                .await
                .map_err(|e| EmbedError::Inference(format!("embedding task failed: {e}")))??;
            all_results.extend(outputs);
        }

        Ok(all_results)
    }
}
