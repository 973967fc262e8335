//! In-memory store for testing without `LanceDB`.
//!
//! [`MemoryStore`] keeps both collections in memory and answers queries by
//! brute-force cosine distance. Useful for unit tests and for builds
//! without the `lancedb` feature.

use async_trait::async_trait;
use mmrag_core::{Modality, StoreError, StoreStats, StoredHit, VectorRecord, VectorStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{check_dimensions, check_query};

type Collection = HashMap<String, VectorRecord>;

/// In-memory vector store.
///
/// # Example
///
/// ```rust
/// use mmrag_store::MemoryStore;
/// use mmrag_core::{Modality, VectorStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new(384, 512);
/// store.init().await?;
/// assert_eq!(store.count(Modality::Text).await?, 0);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    text_dim: usize,
    image_dim: usize,
    text: Arc<RwLock<Collection>>,
    image: Arc<RwLock<Collection>>,
}

impl MemoryStore {
    /// Create a store with the given collection dimensions.
    #[must_use]
    pub fn new(text_dim: usize, image_dim: usize) -> Self {
        Self {
            text_dim,
            image_dim,
            text: Arc::new(RwLock::new(HashMap::new())),
            image: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn collection(&self, collection: Modality) -> &RwLock<Collection> {
        match collection {
            Modality::Text => &self.text,
            Modality::Image => &self.image,
        }
    }

    /// Cosine distance; zero vectors are maximally dissimilar to everything.
    fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }

        1.0 - dot / (norm_a * norm_b)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(384, 512)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn init(&self) -> Result<(), StoreError> {
        debug!(
            "MemoryStore initialized (text: {}, image: {})",
            self.text_dim, self.image_dim
        );
        Ok(())
    }

    fn dimension(&self, collection: Modality) -> usize {
        match collection {
            Modality::Text => self.text_dim,
            Modality::Image => self.image_dim,
        }
    }

    async fn upsert(&self, collection: Modality, records: &[VectorRecord]) -> Result<(), StoreError> {
        check_dimensions(collection, self.dimension(collection), records)?;

        let mut store = self.collection(collection).write().await;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        debug!("Upserted {} records into {}", records.len(), collection);
        Ok(())
    }

    async fn query(
        &self,
        collection: Modality,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<StoredHit>, StoreError> {
        check_query(collection, self.dimension(collection), vector, top_k)?;

        let store = self.collection(collection).read().await;
        let mut hits: Vec<StoredHit> = store
            .values()
            .map(|record| StoredHit {
                id: record.id.clone(),
                distance: Self::cosine_distance(vector, &record.vector),
                metadata: record.metadata.clone(),
                content: record.content.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn get(&self, collection: Modality, id: &str) -> Result<Option<VectorRecord>, StoreError> {
        Ok(self.collection(collection).read().await.get(id).cloned())
    }

    async fn count(&self, collection: Modality) -> Result<u64, StoreError> {
        Ok(self.collection(collection).read().await.len() as u64)
    }

    async fn delete_document(&self, collection: Modality, doc_id: &Uuid) -> Result<u64, StoreError> {
        let mut store = self.collection(collection).write().await;
        let before = store.len();
        store.retain(|_, record| record.metadata.doc_id != *doc_id);
        Ok((before - store.len()) as u64)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let text = self.text.read().await;
        let image = self.image.read().await;
        let documents: HashSet<Uuid> = text
            .values()
            .chain(image.values())
            .map(|r| r.metadata.doc_id)
            .collect();

        Ok(StoreStats {
            text_records: text.len() as u64,
            image_records: image.len() as u64,
            documents: documents.len() as u64,
        })
    }
}
