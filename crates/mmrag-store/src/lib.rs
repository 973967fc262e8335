//! Vector storage layer for mmrag.
//!
//! Implements [`VectorStore`](mmrag_core::VectorStore) with two independent
//! collections, `text` and `image`, each with its own vector width.
//!
//! | Store | Backend | Use |
//! |-------|---------|-----|
//! | [`LanceStore`] | `LanceDB` on disk | Persistent storage (feature `lancedb`) |
//! | [`MemoryStore`] | `HashMap` + brute force cosine | Tests and tooling |
//!
//! Both return hits ascending by cosine distance and replace records that
//! are upserted again under the same id.
//!
//! # Example
//!
//! ```rust,ignore
//! use mmrag_store::LanceStore;
//! use mmrag_core::{Modality, VectorStore};
//!
//! let store = LanceStore::new("data/vectors".into(), 384, 512);
//! store.init().await?;
//! store.upsert(Modality::Text, &records).await?;
//! let hits = store.query(Modality::Text, &query_vector, 5).await?;
//! ```

#[cfg(feature = "lancedb")]
pub mod lancedb;
pub mod memory;
#[cfg(feature = "lancedb")]
pub mod schema;

#[cfg(feature = "lancedb")]
pub use lancedb::LanceStore;
pub use memory::MemoryStore;

use mmrag_core::{Modality, StoreError, VectorRecord};

/// Reject records whose vector width differs from the collection's.
pub(crate) fn check_dimensions(
    collection: Modality,
    expected: usize,
    records: &[VectorRecord],
) -> Result<(), StoreError> {
    match records.iter().find(|r| r.vector.len() != expected) {
        Some(bad) => Err(StoreError::DimensionMismatch {
            collection,
            expected,
            actual: bad.vector.len(),
        }),
        None => Ok(()),
    }
}

/// Validate query arguments.
pub(crate) fn check_query(
    collection: Modality,
    expected: usize,
    vector: &[f32],
    top_k: usize,
) -> Result<(), StoreError> {
    if top_k == 0 {
        return Err(StoreError::Query("top_k must be at least 1".to_string()));
    }
    if vector.len() != expected {
        return Err(StoreError::DimensionMismatch {
            collection,
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
