//! # mmrag-embed
//!
//! Local embedding generation for mmrag using the Candle ML framework.
//!
//! Two encoders back the [`EmbeddingProvider`]:
//!
//! | Space | Model | Dimension |
//! |-------|-------|-----------|
//! | text | `sentence-transformers/all-MiniLM-L6-v2` | 384 |
//! | image (and cross-modal text) | `openai/clip-vit-base-patch32` | 512 |
//!
//! Models are downloaded from the Hugging Face Hub on first use and kept in
//! memory for the life of the process.
//!
//! ## Cargo Features
//!
//! - `candle` (default): Enables [`BertEmbedder`] and [`ClipEmbedder`]
//! - Without `candle`: Only [`HashEmbedder`] is available
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mmrag_embed::EmbeddingProvider;
//!
//! let provider = EmbeddingProvider::local(None);
//! let text = provider.embed_text(&["What is machine learning?"]).await?;
//! let cross = provider.embed_cross_modal_text(&["What is machine learning?"]).await?;
//! ```

#[cfg(feature = "candle")]
pub mod bert;
#[cfg(feature = "candle")]
pub mod clip;

#[cfg(feature = "candle")]
pub use bert::BertEmbedder;
#[cfg(feature = "candle")]
pub use clip::ClipEmbedder;

pub mod hash;
pub mod provider;

pub use hash::HashEmbedder;
pub use provider::EmbeddingProvider;
