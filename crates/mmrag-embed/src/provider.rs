//! The embedding provider used by ingestion and retrieval.

use mmrag_core::{EmbedError, Embedder, EmbeddingConfig, Modality};
use std::sync::Arc;
use tracing::debug;

use crate::hash::normalize_in_place;

/// Pairs a text encoder with a cross-modal (image + text) encoder.
///
/// Every vector handed out is unit length, whatever the backend returns.
/// Cheap to clone; encoders are shared.
#[derive(Clone)]
pub struct EmbeddingProvider {
    text: Arc<dyn Embedder>,
    cross_modal: Arc<dyn Embedder>,
    config: EmbeddingConfig,
}

impl EmbeddingProvider {
    /// Build a provider from two encoders.
    ///
    /// The cross-modal encoder must support images.
    pub fn new(text: Arc<dyn Embedder>, cross_modal: Arc<dyn Embedder>) -> Result<Self, EmbedError> {
        if !cross_modal.modalities().contains(&Modality::Image) {
            return Err(EmbedError::ModalityNotSupported(Modality::Image));
        }
        Ok(Self {
            text,
            cross_modal,
            config: EmbeddingConfig::default(),
        })
    }

    /// Local Candle models (MiniLM for text, CLIP for images), loaded lazily.
    #[cfg(feature = "candle")]
    pub fn local(cache_dir: Option<std::path::PathBuf>) -> Self {
        Self {
            text: Arc::new(crate::BertEmbedder::new(cache_dir.clone())),
            cross_modal: Arc::new(crate::ClipEmbedder::new(cache_dir)),
            config: EmbeddingConfig::default(),
        }
    }

    /// Local Candle models with explicit model ids.
    ///
    /// `use_gpu` picks CUDA device 0 when available, CPU otherwise.
    #[cfg(feature = "candle")]
    pub fn local_models(
        text_model: &str,
        image_model: &str,
        cache_dir: Option<std::path::PathBuf>,
        use_gpu: bool,
    ) -> Self {
        use candle_core::Device;

        let device = if use_gpu {
            Device::cuda_if_available(0).unwrap_or(Device::Cpu)
        } else {
            Device::Cpu
        };
        let revision = if image_model == crate::clip::DEFAULT_MODEL_ID {
            crate::clip::DEFAULT_REVISION
        } else {
            "main"
        };
        Self {
            text: Arc::new(crate::BertEmbedder::with_device(
                text_model,
                cache_dir.clone(),
                device.clone(),
            )),
            cross_modal: Arc::new(crate::ClipEmbedder::with_device(
                image_model,
                revision,
                cache_dir,
                device,
            )),
            config: EmbeddingConfig::default(),
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size.max(1);
        self
    }

    /// Dimension of the text collection.
    pub fn text_dimension(&self) -> usize {
        self.text.dimension()
    }

    /// Dimension of the image collection.
    pub fn image_dimension(&self) -> usize {
        self.cross_modal.dimension()
    }

    pub fn text_model(&self) -> &str {
        self.text.model_name()
    }

    pub fn image_model(&self) -> &str {
        self.cross_modal.model_name()
    }

    /// Embed texts for the text collection.
    pub async fn embed_text(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let outputs = self.text.embed_text(texts, &self.config).await?;
        finish(outputs, texts.len(), self.text.dimension())
    }

    /// Embed texts into the image-compatible space.
    pub async fn embed_cross_modal_text(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let outputs = self.cross_modal.embed_text(texts, &self.config).await?;
        finish(outputs, texts.len(), self.cross_modal.dimension())
    }

    /// Embed encoded images for the image collection.
    pub async fn embed_image(&self, images: &[&[u8]]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut outputs = Vec::with_capacity(images.len());
        for data in images {
            outputs.push(self.cross_modal.embed_image(data, &self.config).await?);
        }
        debug!("Embedded {} images", outputs.len());
        finish(outputs, images.len(), self.cross_modal.dimension())
    }
}

fn finish(
    outputs: Vec<Vec<f32>>,
    expected_len: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if outputs.len() != expected_len {
        return Err(EmbedError::Inference(format!(
            "expected {expected_len} embeddings, got {}",
            outputs.len()
        )));
    }
    outputs
        .into_iter()
        .map(|mut vector| {
            if vector.len() != dimension {
                return Err(EmbedError::Inference(format!(
                    "expected dimension {dimension}, got {}",
                    vector.len()
                )));
            }
            normalize_in_place(&mut vector);
            Ok(vector)
        })
        .collect()
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("text", &self.text.model_name())
            .field("cross_modal", &self.cross_modal.model_name())
            .field("batch_size", &self.config.batch_size)
            .finish()
    }
}
