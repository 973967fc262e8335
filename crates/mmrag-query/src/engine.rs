//! Query execution across both collections.

use mmrag_core::{
    EmbedError, Error, Modality, QueryResponse, QueryResult, Result, ResultContent, StoredHit,
    VectorStore,
};
use mmrag_embed::EmbeddingProvider;
use std::sync::Arc;
use tracing::{debug, info};

use crate::attribution::format_source;
use crate::fusion::{merge, normalize_scores, similarity};

/// Read-only retrieval over the text and image collections.
pub struct RetrievalEngine {
    /// Vector store
    store: Arc<dyn VectorStore>,
    /// Embedder for query embedding
    embedder: EmbeddingProvider,
}

impl RetrievalEngine {
    /// Create a new retrieval engine.
    pub fn new(store: Arc<dyn VectorStore>, embedder: EmbeddingProvider) -> Self {
        Self { store, embedder }
    }

    /// Answer a natural-language query with at most `top_k` results.
    ///
    /// The query is embedded twice (text space and image-compatible space),
    /// both collections are searched concurrently, scores are min-max
    /// normalized per collection and the merged list is ranked.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` for blank text or `top_k == 0`; embedding and storage
    /// failures are returned unchanged.
    pub async fn query(&self, query: &str, top_k: usize) -> Result<QueryResponse> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("query text is empty".to_string()));
        }
        if top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be at least 1".to_string()));
        }

        info!("Processing query {:?} with top_k={}", query, top_k);

        let (text_hits, image_hits) = tokio::try_join!(
            self.search(Modality::Text, query, top_k),
            self.search(Modality::Image, query, top_k),
        )?;
        debug!(
            "Text search returned {} hits, image search {}",
            text_hits.len(),
            image_hits.len()
        );

        let merged = merge(
            score(text_hits, Modality::Text),
            score(image_hits, Modality::Image),
            top_k,
        );
        let results: Vec<QueryResult> = merged
            .into_iter()
            .map(|((hit, modality), score)| to_result(hit, modality, score))
            .collect();

        info!("Returning {} merged results", results.len());
        Ok(QueryResponse::new(query, results))
    }

    async fn search(&self, collection: Modality, query: &str, top_k: usize) -> Result<Vec<StoredHit>> {
        let vectors = match collection {
            Modality::Text => self.embedder.embed_text(&[query]).await?,
            Modality::Image => self.embedder.embed_cross_modal_text(&[query]).await?,
        };
        let vector = vectors.into_iter().next().ok_or_else(|| {
            Error::Embedding(EmbedError::Inference("no query embedding returned".to_string()))
        })?;
        Ok(self.store.query(collection, &vector, top_k).await?)
    }
}

/// Pair each hit with its normalized similarity.
fn score(hits: Vec<StoredHit>, modality: Modality) -> Vec<((StoredHit, Modality), f32)> {
    let raw: Vec<f32> = hits.iter().map(|h| similarity(h.distance)).collect();
    hits.into_iter()
        .map(|hit| (hit, modality))
        .zip(normalize_scores(&raw))
        .collect()
}

fn to_result(hit: StoredHit, modality: Modality, score: f32) -> QueryResult {
    let content = match modality {
        Modality::Text => ResultContent::Text {
            text: hit.content.unwrap_or_default(),
        },
        Modality::Image => ResultContent::Image {
            image_path: hit.metadata.image_path.clone(),
            ocr_text: hit.metadata.ocr_text.clone().unwrap_or_default(),
        },
    };
    let source = format_source(&hit.metadata);
    QueryResult {
        id: hit.id,
        score,
        modality,
        content,
        metadata: hit.metadata,
        source,
    }
}
