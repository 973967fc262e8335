//! Error types for mmrag.

use thiserror::Error;

use crate::types::Modality;

/// Main error type for mmrag operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The upload is neither text, image nor PDF
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Content extraction failed
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// Embedding generation failed
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// Vector store operation failed
    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    /// Query parameters are out of range
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Content extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("empty document: {0}")]
    Empty(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("modality not supported: {0:?}")]
    ModalityNotSupported(Modality),
}

/// Vector store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store initialization failed: {0}")]
    Init(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("delete failed: {0}")]
    Delete(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("dimension mismatch in {collection} collection: expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: Modality,
        expected: usize,
        actual: usize,
    },
}

/// Result type alias for mmrag operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    // ========== ExtractError Tests ==========

    #[test]
    fn test_extract_error_parse_display() {
        let err = ExtractError::Parse("invalid xref table".to_string());
        assert_eq!(err.to_string(), "parse error: invalid xref table");
    }

    #[test]
    fn test_extract_error_empty_display() {
        let err = ExtractError::Empty("no paragraphs".to_string());
        assert_eq!(err.to_string(), "empty document: no paragraphs");
    }

    #[test]
    fn test_extract_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: ExtractError = io_err.into();
        assert!(matches!(err, ExtractError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    // ========== EmbedError Tests ==========

    #[test]
    fn test_embed_error_model_unavailable_display() {
        let err = EmbedError::ModelUnavailable("weights not found".to_string());
        assert_eq!(err.to_string(), "model unavailable: weights not found");
    }

    #[test]
    fn test_embed_error_modality_display() {
        let err = EmbedError::ModalityNotSupported(Modality::Image);
        assert_eq!(err.to_string(), "modality not supported: Image");
    }

    // ========== StoreError Tests ==========

    #[test]
    fn test_store_error_dimension_mismatch_display() {
        let err = StoreError::DimensionMismatch {
            collection: Modality::Text,
            expected: 384,
            actual: 512,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch in text collection: expected 384, got 512"
        );
    }

    // ========== Error Conversion Tests ==========

    #[test]
    fn test_error_from_extract_error() {
        let err: Error = ExtractError::Failed("bad pdf".to_string()).into();
        assert!(matches!(err, Error::Extraction(_)));
        assert_eq!(err.to_string(), "extraction failed: extraction failed: bad pdf");
    }

    #[test]
    fn test_error_from_embed_error() {
        let err: Error = EmbedError::ModelUnavailable("offline".to_string()).into();
        assert!(matches!(err, Error::Embedding(EmbedError::ModelUnavailable(_))));
    }

    #[test]
    fn test_error_from_store_error() {
        let err: Error = StoreError::Insert("disk full".to_string()).into();
        assert_eq!(err.to_string(), "storage failed: insert failed: disk full");
    }

    #[test]
    fn test_error_unsupported_format_display() {
        let err = Error::UnsupportedFormat("archive.zip".to_string());
        assert_eq!(err.to_string(), "unsupported format: archive.zip");
    }

    #[test]
    fn test_error_invalid_query_display() {
        let err = Error::InvalidQuery("top_k must be at least 1".to_string());
        assert_eq!(err.to_string(), "invalid query: top_k must be at least 1");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
