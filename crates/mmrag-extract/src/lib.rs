//! # mmrag-extract
//!
//! Content extraction for the mmrag ingestion pipeline. Every extractor
//! turns raw bytes into [`Fragment`](mmrag_core::Fragment)s: text paragraphs
//! and images with positional metadata.
//!
//! ## Supported Formats
//!
//! | Extractor | Formats | Output |
//! |-----------|---------|--------|
//! | [`TextExtractor`] | `.txt`, `text/plain` | One text fragment per paragraph |
//! | [`ImageExtractor`] | `.png`, `.jpg`, `.jpeg` | The image plus OCR text |
//! | [`PdfExtractor`] | `.pdf` | Paragraphs per page, plus every page rendered to PNG with OCR text |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mmrag_extract::{Extractors, OcrConfig, PdfiumRenderer, SourceFile};
//! use std::sync::Arc;
//!
//! let extractors = Extractors::new(OcrConfig::default().build(), Arc::new(PdfiumRenderer::default()), 2.0);
//! let fragments = extractors.extract(SourceFile::Pdf(&bytes)).await?;
//! ```
//!
//! ## OCR
//!
//! OCR runs through the [`OcrEngine`] trait. [`TesseractOcr`] shells out to
//! the `tesseract` binary (override with `TESSERACT_CMD`). Any OCR failure
//! degrades to empty text.
//!
//! ## Cargo Features
//!
//! - `pdfium` (default): [`PdfiumRenderer`] for rendering PDF pages
//! - `test-util`: the [`testing`] fixtures (PDF builder, Pdfium-free page renderer)

pub mod image;
pub mod ocr;
pub mod paragraph;
pub mod pdf;
pub mod render;
pub mod source;
pub mod text;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use image::ImageExtractor;
pub use ocr::{DisabledOcr, OcrConfig, OcrEngine, OcrError, TesseractOcr, recognize_or_empty};
pub use paragraph::split_paragraphs;
pub use pdf::{DEFAULT_RENDER_SCALE, PdfExtractor};
pub use render::PageRenderer;
#[cfg(feature = "pdfium")]
pub use render::PdfiumRenderer;
pub use source::{Extractors, SourceFile};
pub use text::TextExtractor;
