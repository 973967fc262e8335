//! CLIP embedder using Candle.
//!
//! Embeds both images and text into one shared 512-dimensional space
//! (openai/clip-vit-base-patch32), so a text query can be compared with
//! stored image vectors.
//!
//! The model architecture is fixed to ViT-B/32; another checkpoint id loads
//! only if its config.json describes the same shape.

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use hf_hub::{Repo, RepoType, api::tokio::ApiBuilder};
use image::imageops::FilterType;
use mmrag_core::{EmbedError, Embedder, EmbeddingConfig, Modality};
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::bert::l2_normalize;

/// Default model identifier on HuggingFace Hub.
pub const DEFAULT_MODEL_ID: &str = "openai/clip-vit-base-patch32";

/// Hub revision that carries a safetensors checkpoint.
pub const DEFAULT_REVISION: &str = "refs/pr/15";

const EMBEDDING_DIM: usize = 512;

/// CLIP text context length.
const MAX_TOKENS: usize = 77;

const PAD_TOKEN: &str = "<|endoftext|>";

struct LoadedClip {
    model: ClipModel,
    tokenizer: Tokenizer,
    pad_id: u32,
    image_size: usize,
    device: Device,
}

/// CLIP image/text embedder. Weights are fetched and loaded on first use.
pub struct ClipEmbedder {
    model_id: String,
    revision: String,
    device: Device,
    cache_dir: Option<PathBuf>,
    loaded: OnceCell<Arc<LoadedClip>>,
}

impl ClipEmbedder {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
        info!("ClipEmbedder using device: {:?}", device);
        Self::with_device(DEFAULT_MODEL_ID, DEFAULT_REVISION, cache_dir, device)
    }

    pub fn with_device(
        model_id: impl Into<String>,
        revision: impl Into<String>,
        cache_dir: Option<PathBuf>,
        device: Device,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            revision: revision.into(),
            device,
            cache_dir,
            loaded: OnceCell::new(),
        }
    }

    /// Load the model (download if needed). Idempotent.
    pub async fn init(&self) -> Result<(), EmbedError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<Arc<LoadedClip>, EmbedError> {
        self.loaded
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    async fn load(&self) -> Result<Arc<LoadedClip>, EmbedError> {
        info!("Initializing ClipEmbedder with model: {}", self.model_id);

        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        let api = builder
            .build()
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to create HF API: {e}")))?;
        let repo = api.repo(Repo::with_revision(
            self.model_id.clone(),
            RepoType::Model,
            self.revision.clone(),
        ));

        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to download tokenizer: {e}")))?;
        let config_path = repo
            .get("config.json")
            .await
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to download config: {e}")))?;
        let config_str = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to read config: {e}")))?;
        check_clip_config(&self.model_id, &config_str)?;

        let weights_path = repo
            .get("model.safetensors")
            .await
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to download weights: {e}")))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to load tokenizer: {e}")))?;
        let pad_id = *tokenizer
            .get_vocab(true)
            .get(PAD_TOKEN)
            .ok_or_else(|| EmbedError::ModelUnavailable(format!("tokenizer has no {PAD_TOKEN} token")))?;

        let config = ClipConfig::vit_base_patch32();
        let image_size = config.image_size;
        let device = self.device.clone();
        let model = tokio::task::spawn_blocking(move || {
            // SAFETY: The safetensors file comes from the HuggingFace cache and is only read.
            #[allow(unsafe_code)]
            let vb = unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                    .map_err(|e| EmbedError::ModelUnavailable(format!("failed to load weights: {e}")))?
            };
            ClipModel::new(vb, &config)
                .map_err(|e| EmbedError::ModelUnavailable(format!("failed to create CLIP model: {e}")))
        })
        .await
        .map_err(|e| EmbedError::ModelUnavailable(format!("model loading task failed: {e}")))??;

        info!("ClipEmbedder initialized successfully");
        Ok(Arc::new(LoadedClip {
            model,
            tokenizer,
            pad_id,
            image_size,
            device: self.device.clone(),
        }))
    }
}

impl LoadedClip {
    fn encode_texts(&self, texts: &[String], normalize: bool) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut tokens = Vec::with_capacity(texts.len());
        for text in texts {
            let encoding = self
                .tokenizer
                .encode(text.as_str(), true)
                .map_err(|e| EmbedError::Inference(format!("tokenization failed: {e}")))?;
            tokens.push(truncate_tokens(encoding.get_ids(), self.pad_id));
        }
        let max_len = tokens.iter().map(Vec::len).max().unwrap_or(0).max(1);
        for ids in &mut tokens {
            ids.resize(max_len, self.pad_id);
        }

        let input_ids = Tensor::new(tokens, &self.device)
            .map_err(|e| EmbedError::Inference(format!("failed to create input_ids tensor: {e}")))?;
        let features = self
            .model
            .get_text_features(&input_ids)
            .map_err(|e| EmbedError::Inference(format!("text forward failed: {e}")))?;

        to_rows(&features, normalize)
    }

    fn encode_image(&self, data: &[u8], normalize: bool) -> Result<Vec<f32>, EmbedError> {
        let pixels = preprocess_image(data, self.image_size, &self.device)?;
        let features = self
            .model
            .get_image_features(&pixels.unsqueeze(0).map_err(|e| EmbedError::Inference(e.to_string()))?)
            .map_err(|e| EmbedError::Inference(format!("vision forward failed: {e}")))?;

        to_rows(&features, normalize)?
            .pop()
            .ok_or_else(|| EmbedError::Inference("empty image embedding".to_string()))
    }
}

/// Clip a token sequence to the context length, keeping the closing token.
fn truncate_tokens(ids: &[u32], eos_id: u32) -> Vec<u32> {
    if ids.len() <= MAX_TOKENS {
        return ids.to_vec();
    }
    let mut out = ids[..MAX_TOKENS - 1].to_vec();
    out.push(eos_id);
    out
}

/// Decode, resize to a square and scale pixels to [-1, 1], channels first.
fn preprocess_image(data: &[u8], image_size: usize, device: &Device) -> Result<Tensor, EmbedError> {
    let img = image::load_from_memory(data)
        .map_err(|e| EmbedError::Inference(format!("failed to decode image: {e}")))?;
    let side = u32::try_from(image_size).unwrap_or(224);
    let img = img
        .resize_to_fill(side, side, FilterType::Triangle)
        .to_rgb8()
        .into_raw();
    Tensor::from_vec(img, (image_size, image_size, 3), device)
        .and_then(|t| t.permute((2, 0, 1)))
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.affine(2. / 255., -1.))
        .map_err(|e| EmbedError::Inference(format!("failed to build pixel tensor: {e}")))
}

/// Fail the load unless the checkpoint is a ViT-B/32 with 512-wide projections.
fn check_clip_config(model_id: &str, config_json: &str) -> Result<(), EmbedError> {
    let config: serde_json::Value = serde_json::from_str(config_json)
        .map_err(|e| EmbedError::ModelUnavailable(format!("failed to parse config: {e}")))?;
    let projection_dim = config
        .get("projection_dim")
        .and_then(serde_json::Value::as_u64);
    let patch_size = config
        .pointer("/vision_config/patch_size")
        .and_then(serde_json::Value::as_u64);

    if projection_dim == Some(EMBEDDING_DIM as u64) && patch_size == Some(32) {
        Ok(())
    } else {
        Err(EmbedError::ModelUnavailable(format!(
            "{model_id} is not a ViT-B/32 CLIP checkpoint with {EMBEDDING_DIM}-dimensional \
             projections (projection_dim {projection_dim:?}, patch_size {patch_size:?})"
        )))
    }
}

fn to_rows(features: &Tensor, normalize: bool) -> Result<Vec<Vec<f32>>, EmbedError> {
    let features = if normalize {
        l2_normalize(features).map_err(|e| EmbedError::Inference(format!("normalize failed: {e}")))?
    } else {
        features.clone()
    };
    features
        .to_vec2::<f32>()
        .map_err(|e| EmbedError::Inference(format!("failed to convert to vec: {e}")))
}

#[async_trait]
impl Embedder for ClipEmbedder {
    fn model_name(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn modalities(&self) -> &[Modality] {
        &[Modality::Text, Modality::Image]
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
        debug!("Embedding {} texts into the cross-modal space", texts.len());

        let mut all_results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(config.batch_size.max(1)) {
            let batch: Vec<String> = chunk.iter().map(|t| (*t).to_string()).collect();
            let model = Arc::clone(&model);
            let normalize = config.normalize;
            let outputs = tokio::task::spawn_blocking(move || model.encode_texts(&batch, normalize))
                .await
                .map_err(|e| EmbedError::Inference(format!("embedding task failed: {e}")))??;
            all_results.extend(outputs);
        }
        Ok(all_results)
    }

    async fn embed_image(
        &self,
        image_data: &[u8],
        config: &EmbeddingConfig,
    ) -> Result<Vec<f32>, EmbedError> {
        let model = self.model().await?;
        let data = image_data.to_vec();
        let normalize = config.normalize;
        tokio::task::spawn_blocking(move || model.encode_image(&data, normalize))
            .await
            .map_err(|e| EmbedError::Inference(format!("embedding task failed: {e}")))?
    }
}
