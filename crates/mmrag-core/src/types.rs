//! Core types for mmrag.
//!
//! ## Documents
//! - [`FileType`]: Classification of an upload (text, image, pdf)
//! - [`Upload`]: Raw bytes handed to the ingestion pipeline
//! - [`Document`]: An ingested upload with its identity and storage location
//!
//! ## Extraction
//! - [`Fragment`]: A text paragraph or an image produced by an extractor
//!
//! ## Vectors
//! - [`Modality`]: Which collection a record lives in
//! - [`RecordMetadata`]: Metadata persisted next to each vector
//! - [`VectorRecord`]: A vector ready to be upserted
//! - [`StoredHit`]: A nearest-neighbour hit returned by a store
//!
//! ## Retrieval
//! - [`QueryResult`] / [`QueryResponse`]: Ranked, attributed results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ============================================================================
// Documents
// ============================================================================

/// Kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Text,
    Image,
    Pdf,
}

impl FileType {
    /// Classify an upload by declared content type, falling back to the file extension.
    ///
    /// Returns `None` for anything that is not plain text, PNG/JPEG or PDF.
    #[must_use]
    pub fn detect(content_type: Option<&str>, file_name: &str) -> Option<Self> {
        if let Some(content_type) = content_type {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            match essence.as_str() {
                "text/plain" => return Some(Self::Text),
                "image/png" | "image/jpeg" | "image/jpg" => return Some(Self::Image),
                "application/pdf" => return Some(Self::Pdf),
                _ => {}
            }
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)?;
        match extension.as_str() {
            "txt" => Some(Self::Text),
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Lowercase name used in metadata and attribution.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!("unknown file type: {other}")),
        }
    }
}

/// A file handed to the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name (used for extension detection and storage)
    pub file_name: String,
    /// Declared MIME type, if any
    pub content_type: Option<String>,
    /// Raw file contents
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// An ingested upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Identifier generated at ingestion; re-uploads get a fresh one
    pub doc_id: Uuid,
    pub file_type: FileType,
    /// Where the stored original lives
    pub source_path: PathBuf,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a fresh id and the current timestamp.
    pub fn new(file_type: FileType, source_path: PathBuf) -> Self {
        Self {
            doc_id: Uuid::new_v4(),
            file_type,
            source_path,
            uploaded_at: Utc::now(),
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Unit of extracted content.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// A paragraph of text.
    Text {
        text: String,
        /// Document-wide position, contiguous from 0
        chunk_index: u32,
        /// 0-based page for paginated sources
        page: Option<u32>,
    },
    /// An encoded image (the original upload or a rendered page).
    Image {
        data: Vec<u8>,
        page: Option<u32>,
        /// Empty when OCR is unavailable or found nothing
        ocr_text: String,
    },
}

impl Fragment {
    #[must_use]
    pub fn modality(&self) -> Modality {
        match self {
            Self::Text { .. } => Modality::Text,
            Self::Image { .. } => Modality::Image,
        }
    }

    #[must_use]
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Text { page, .. } | Self::Image { page, .. } => *page,
        }
    }
}

// ============================================================================
// Vectors
// ============================================================================

/// Vector collections. Each has its own fixed dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub const ALL: [Modality; 2] = [Modality::Text, Modality::Image];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record id for a chunk of a plain text file.
#[must_use]
pub fn text_chunk_id(doc_id: &Uuid, chunk_index: u32) -> String {
    format!("txt::{doc_id}::{chunk_index}")
}

/// Record id for a standalone image.
#[must_use]
pub fn image_id(doc_id: &Uuid) -> String {
    format!("img::{doc_id}")
}

/// Record id for a text chunk taken from a PDF page.
#[must_use]
pub fn pdf_text_id(doc_id: &Uuid, page: u32, chunk_index: u32) -> String {
    format!("pdftext::{doc_id}::p{page}::c{chunk_index}")
}

/// Record id for a rendered PDF page. One per (document, page).
#[must_use]
pub fn pdf_page_id(doc_id: &Uuid, page: u32) -> String {
    format!("pdfimg::{doc_id}::p{page}")
}

/// Metadata persisted with every vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub doc_id: Uuid,
    pub file_type: FileType,
    pub source_path: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl RecordMetadata {
    /// Base metadata shared by every record of a document.
    pub fn for_document(doc: &Document) -> Self {
        Self {
            doc_id: doc.doc_id,
            file_type: doc.file_type,
            source_path: doc.source_path.to_string_lossy().into_owned(),
            uploaded_at: doc.uploaded_at,
            chunk_index: None,
            page: None,
            ocr_text: None,
            image_path: None,
        }
    }
}

/// A vector plus everything stored next to it.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
    /// Chunk text for text records
    pub content: Option<String>,
}

/// A nearest-neighbour hit as returned by a vector store.
#[derive(Debug, Clone)]
pub struct StoredHit {
    pub id: String,
    /// Cosine distance, `1 - similarity`
    pub distance: f32,
    pub metadata: RecordMetadata,
    pub content: Option<String>,
}

/// Vector store statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub text_records: u64,
    pub image_records: u64,
    /// Distinct documents across both collections
    pub documents: u64,
}

/// Configuration for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Normalize embeddings to unit length
    pub normalize: bool,
    /// Batch size for processing
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            batch_size: 32,
        }
    }
}

// ============================================================================
// Ingestion
// ============================================================================

/// Summary of a completed ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub doc_id: Uuid,
    pub file_type: FileType,
    pub source_path: PathBuf,
    /// Text records written
    pub chunk_count: usize,
    /// Image records written
    pub image_count: usize,
    /// Total characters of OCR text found
    pub ocr_chars: usize,
}

// ============================================================================
// Retrieval
// ============================================================================

/// Payload of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResultContent {
    Text {
        text: String,
    },
    Image {
        image_path: Option<String>,
        ocr_text: String,
    },
}

/// A ranked, attributed result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    /// Min-max normalized similarity within its collection, in [0, 1]
    pub score: f32,
    pub modality: Modality,
    pub content: ResultContent,
    pub metadata: RecordMetadata,
    /// Human-readable attribution string
    pub source: String,
}

/// Response to a retrieval query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<QueryResult>,
    pub total_results: usize,
}

impl QueryResponse {
    pub fn new(query: impl Into<String>, results: Vec<QueryResult>) -> Self {
        let total_results = results.len();
        Self {
            query: query.into(),
            results,
            total_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== FileType Tests ====================

    #[test]
    fn test_detect_by_content_type() {
        assert_eq!(
            FileType::detect(Some("text/plain"), "blob"),
            Some(FileType::Text)
        );
        assert_eq!(
            FileType::detect(Some("image/png"), "blob"),
            Some(FileType::Image)
        );
        assert_eq!(
            FileType::detect(Some("image/jpg"), "blob"),
            Some(FileType::Image)
        );
        assert_eq!(
            FileType::detect(Some("application/pdf"), "blob"),
            Some(FileType::Pdf)
        );
    }

    #[test]
    fn test_detect_content_type_with_parameters() {
        assert_eq!(
            FileType::detect(Some("Text/Plain; charset=utf-8"), "blob"),
            Some(FileType::Text)
        );
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            FileType::detect(Some("application/octet-stream"), "scan.JPEG"),
            Some(FileType::Image)
        );
        assert_eq!(FileType::detect(None, "notes.txt"), Some(FileType::Text));
        assert_eq!(FileType::detect(None, "paper.pdf"), Some(FileType::Pdf));
    }

    #[test]
    fn test_detect_unsupported() {
        assert_eq!(FileType::detect(None, "archive.zip"), None);
        assert_eq!(FileType::detect(None, "README"), None);
        assert_eq!(FileType::detect(Some("application/zip"), "archive"), None);
    }

    #[test]
    fn test_file_type_serialization() {
        assert_eq!(serde_json::to_string(&FileType::Pdf).unwrap(), "\"pdf\"");
        assert_eq!("image".parse::<FileType>().unwrap(), FileType::Image);
        assert!("audio".parse::<FileType>().is_err());
    }

    // ==================== Record Id Tests ====================

    #[test]
    fn test_record_ids() {
        let doc_id = Uuid::nil();
        assert_eq!(
            text_chunk_id(&doc_id, 3),
            "txt::00000000-0000-0000-0000-000000000000::3"
        );
        assert_eq!(
            image_id(&doc_id),
            "img::00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            pdf_text_id(&doc_id, 1, 4),
            "pdftext::00000000-0000-0000-0000-000000000000::p1::c4"
        );
        assert_eq!(
            pdf_page_id(&doc_id, 2),
            "pdfimg::00000000-0000-0000-0000-000000000000::p2"
        );
    }

    // ==================== Metadata Tests ====================

    #[test]
    fn test_metadata_for_document() {
        let doc = Document::new(FileType::Text, PathBuf::from("/data/uploads/a.txt"));
        let meta = RecordMetadata::for_document(&doc);
        assert_eq!(meta.doc_id, doc.doc_id);
        assert_eq!(meta.source_path, "/data/uploads/a.txt");
        assert!(meta.chunk_index.is_none());
        assert!(meta.page.is_none());
    }

    #[test]
    fn test_metadata_skips_absent_fields() {
        let doc = Document::new(FileType::Text, PathBuf::from("a.txt"));
        let mut meta = RecordMetadata::for_document(&doc);
        meta.chunk_index = Some(0);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["chunk_index"], 0);
        assert!(json.get("page").is_none());
        assert!(json.get("ocr_text").is_none());

        let back: RecordMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    // ==================== Fragment Tests ====================

    #[test]
    fn test_fragment_accessors() {
        let text = Fragment::Text {
            text: "hello".to_string(),
            chunk_index: 0,
            page: Some(2),
        };
        assert_eq!(text.modality(), Modality::Text);
        assert_eq!(text.page(), Some(2));

        let image = Fragment::Image {
            data: vec![1, 2, 3],
            page: None,
            ocr_text: String::new(),
        };
        assert_eq!(image.modality(), Modality::Image);
        assert_eq!(image.page(), None);
    }

    // ==================== Retrieval Tests ====================

    #[test]
    fn test_result_content_serialization() {
        let content = ResultContent::Image {
            image_path: Some("extracted/x/page0.png".to_string()),
            ocr_text: "INVOICE".to_string(),
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["ocr_text"], "INVOICE");
    }

    #[test]
    fn test_query_response_counts_results() {
        let response = QueryResponse::new("anything", Vec::new());
        assert_eq!(response.total_results, 0);
        assert_eq!(response.query, "anything");
    }

    #[test]
    fn test_modality_display() {
        assert_eq!(Modality::Text.to_string(), "text");
        assert_eq!(Modality::ALL, [Modality::Text, Modality::Image]);
    }

    #[test]
    fn test_embedding_config_default() {
        let config = EmbeddingConfig::default();
        assert!(config.normalize);
        assert_eq!(config.batch_size, 32);
    }
}
