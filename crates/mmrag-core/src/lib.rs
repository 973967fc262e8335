//! # mmrag-core
//!
//! Core types and traits for mmrag, a multimodal retrieval core that ingests
//! text, images and PDFs and answers natural-language queries across both
//! modalities.
//!
//! ## Architecture
//!
//! ```text
//! Upload → Extractor → Fragments → Embedder → VectorStore (text | image)
//!                                                  ↓
//!                              Query → two lookups → normalize → merge
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Document`] | An ingested upload |
//! | [`Fragment`] | A paragraph or image produced by extraction |
//! | [`VectorRecord`] | A vector with its metadata |
//! | [`QueryResult`] | A ranked, attributed result |
//!
//! ## Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Embedder`] | Generate vector embeddings |
//! | [`VectorStore`] | Store and search vector embeddings |
//! | [`FileStore`] | Persist uploaded and rendered files |
//!
//! ## Related Crates
//!
//! - `mmrag-extract`: Text, image and PDF extraction with OCR
//! - `mmrag-embed`: Text and cross-modal encoders with Candle
//! - `mmrag-store`: `LanceDB` and in-memory vector stores
//! - `mmrag-ingest`: Ingestion pipeline
//! - `mmrag-query`: Cross-modal retrieval and score fusion

pub mod error;
pub mod traits;
pub mod types;

pub use error::{EmbedError, Error, ExtractError, Result, StoreError};
pub use traits::*;
pub use types::*;
