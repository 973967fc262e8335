//! Core traits for mmrag components.
//!
//! - [`Embedder`]: Generate vector embeddings for text and, optionally, images
//! - [`VectorStore`]: Store and search vectors in per-modality collections
//! - [`FileStore`]: Durable byte storage for uploads and rendered pages

use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{EmbedError, StoreError};
use crate::types::{EmbeddingConfig, Modality, StoreStats, StoredHit, VectorRecord};

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Supported modalities.
    fn modalities(&self) -> &[Modality];

    /// Embed text content, one vector per input.
    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed an encoded image (PNG or JPEG bytes).
    async fn embed_image(
        &self,
        _image_data: &[u8],
        _config: &EmbeddingConfig,
    ) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::ModalityNotSupported(Modality::Image))
    }
}

// ============================================================================
// Vector Storage
// ============================================================================

/// Trait for vector storage and nearest-neighbour search.
///
/// Records live in one of two collections keyed by [`Modality`]. Each
/// collection has a fixed dimension; distances are cosine distances.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Initialize the store, creating collections that do not exist yet.
    async fn init(&self) -> Result<(), StoreError>;

    /// Vector dimension of a collection.
    fn dimension(&self, collection: Modality) -> usize;

    /// Insert or replace records by id.
    async fn upsert(&self, collection: Modality, records: &[VectorRecord])
    -> Result<(), StoreError>;

    /// The `top_k` nearest records, ascending by distance.
    async fn query(
        &self,
        collection: Modality,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<StoredHit>, StoreError>;

    /// Fetch a single record by id.
    async fn get(&self, collection: Modality, id: &str)
    -> Result<Option<VectorRecord>, StoreError>;

    /// Number of records in a collection.
    async fn count(&self, collection: Modality) -> Result<u64, StoreError>;

    /// Delete every record of a document. Returns how many were removed.
    async fn delete_document(&self, collection: Modality, doc_id: &Uuid)
    -> Result<u64, StoreError>;

    /// Get store statistics.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

// ============================================================================
// File Storage
// ============================================================================

/// Byte-addressable durable storage.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write `data` under `key`, returning the location it was stored at.
    async fn put(&self, key: &str, data: &[u8]) -> std::io::Result<PathBuf>;

    /// Read the bytes stored under `key`.
    async fn get(&self, key: &str) -> std::io::Result<Vec<u8>>;

    /// Remove everything stored under a key prefix.
    async fn delete_prefix(&self, prefix: &str) -> std::io::Result<()>;
}
