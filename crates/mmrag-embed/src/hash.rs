//! Deterministic feature-hashing embedder.
//!
//! [`HashEmbedder`] needs no model weights: every lowercase word is hashed
//! with blake3 into one of `dimension` buckets. Texts that share words get
//! similar vectors, which is enough to exercise ranking in tests and in
//! builds without the `candle` feature. Image bytes hash into the same
//! space, so cross-modal lookups return results but carry no meaning.

use async_trait::async_trait;
use mmrag_core::{EmbedError, Embedder, EmbeddingConfig, Modality};

/// Bag-of-words hashing embedder.
///
/// # Example
///
/// ```rust
/// use mmrag_embed::HashEmbedder;
/// use mmrag_core::{Embedder, EmbeddingConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = HashEmbedder::new(384);
/// let vectors = embedder
///     .embed_text(&["machine learning", "learning machines"], &EmbeddingConfig::default())
///     .await?;
/// assert_eq!(vectors[0].len(), 384);
/// # Ok(())
/// # }
/// ```
pub struct HashEmbedder {
    dimension: usize,
    modalities: Vec<Modality>,
}

impl HashEmbedder {
    /// Text-only embedder of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            modalities: vec![Modality::Text],
        }
    }

    /// Embedder that also accepts images.
    #[must_use]
    pub fn cross_modal(dimension: usize) -> Self {
        Self {
            dimension,
            modalities: vec![Modality::Text, Modality::Image],
        }
    }

    fn bucket(&self, feature: &[u8]) -> (usize, f32) {
        let hash = blake3::hash(feature);
        let bytes = hash.as_bytes();
        let mut index = [0u8; 8];
        index.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(index) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }

    fn embed_words(&self, text: &str, normalize: bool) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let (bucket, sign) = self.bucket(word.as_bytes());
            embedding[bucket] += sign;
        }
        if normalize {
            normalize_in_place(&mut embedding);
        }
        embedding
    }
}

/// Scale a vector to unit length. Zero vectors are left untouched.
pub fn normalize_in_place(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn modalities(&self) -> &[Modality] {
        &self.modalities
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| self.embed_words(text, config.normalize))
            .collect())
    }

    async fn embed_image(
        &self,
        image_data: &[u8],
        config: &EmbeddingConfig,
    ) -> Result<Vec<f32>, EmbedError> {
        if !self.modalities.contains(&Modality::Image) {
            return Err(EmbedError::ModalityNotSupported(Modality::Image));
        }
        let mut embedding = vec![0.0f32; self.dimension];
        for block in image_data.chunks(64) {
            let (bucket, sign) = self.bucket(block);
            embedding[bucket] += sign;
        }
        if config.normalize {
            normalize_in_place(&mut embedding);
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hash_new() {
        let embedder = HashEmbedder::new(384);
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.model_name(), "hash");
        assert_eq!(embedder.modalities(), &[Modality::Text]);
    }

    #[tokio::test]
    async fn test_hash_deterministic_and_unit_length() {
        let embedder = HashEmbedder::new(64);
        let config = EmbeddingConfig::default();
        let a = embedder.embed_text(&["Neural networks learn"], &config).await.unwrap();
        let b = embedder.embed_text(&["Neural networks learn"], &config).await.unwrap();
        assert_eq!(a[0], b[0]);

        let norm = cosine(&a[0], &a[0]).sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_shared_words_score_higher() {
        let embedder = HashEmbedder::new(256);
        let config = EmbeddingConfig::default();
        let out = embedder
            .embed_text(
                &[
                    "what is machine learning",
                    "machine learning is a field of study",
                    "boil pasta in salted water",
                ],
                &config,
            )
            .await
            .unwrap();
        let related = cosine(&out[0], &out[1]);
        let unrelated = cosine(&out[0], &out[2]);
        assert!(related > unrelated);
    }

    #[tokio::test]
    async fn test_hash_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let out = embedder
            .embed_text(&["  ... "], &EmbeddingConfig::default())
            .await
            .unwrap();
        assert!(out[0].iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_hash_image_requires_cross_modal() {
        let config = EmbeddingConfig::default();
        let text_only = HashEmbedder::new(32);
        assert!(matches!(
            text_only.embed_image(&[1, 2, 3], &config).await,
            Err(EmbedError::ModalityNotSupported(Modality::Image))
        ));

        let cross = HashEmbedder::cross_modal(32);
        let out = cross.embed_image(&[1, 2, 3], &config).await.unwrap();
        assert_eq!(out.len(), 32);
    }

    #[test]
    fn test_normalize_in_place() {
        let mut v = vec![3.0, 4.0];
        normalize_in_place(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize_in_place(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
