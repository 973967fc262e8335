//! Multimodal retrieval for mmrag.
//!
//! A query searches the text collection with the text encoder and the image
//! collection with the cross-modal encoder, then ranks both result lists
//! together after per-collection min-max normalization.

pub mod attribution;
pub mod engine;
pub mod fusion;

pub use attribution::format_source;
pub use engine::RetrievalEngine;
pub use fusion::{merge, normalize_scores, similarity};
