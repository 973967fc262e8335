//! Ingestion pipeline for mmrag.
//!
//! An upload goes through:
//! type detection → original stored → extraction → embedding → storage.
//!
//! # Components
//!
//! - [`IngestionPipeline`]: The only writer of the vector store
//! - [`LocalFileStore`]: Keeps originals and rendered pages on disk
//!
//! # Example
//!
//! ```rust,ignore
//! use mmrag_ingest::{IngestionPipeline, LocalFileStore};
//!
//! let pipeline = IngestionPipeline::new(store, files, embedder, extractors);
//! let report = pipeline.ingest(Upload::new("notes.txt", bytes)).await?;
//! println!("{} chunks", report.chunk_count);
//! ```

pub mod files;
pub mod ingest;

pub use files::LocalFileStore;
pub use ingest::{IngestionPipeline, page_key, upload_key};
