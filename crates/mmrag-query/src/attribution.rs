//! Human-readable source attribution.

use mmrag_core::RecordMetadata;

/// Format where a result came from.
///
/// `Source: {path} | Type: {type}[ | Page: {page}][ | Chunk: {index}] | Uploaded: {timestamp}`
#[must_use]
pub fn format_source(metadata: &RecordMetadata) -> String {
    let mut parts = vec![
        format!("Source: {}", metadata.source_path),
        format!("Type: {}", metadata.file_type),
    ];
    if let Some(page) = metadata.page {
        parts.push(format!("Page: {page}"));
    }
    if let Some(chunk) = metadata.chunk_index {
        parts.push(format!("Chunk: {chunk}"));
    }
    parts.push(format!("Uploaded: {}", metadata.uploaded_at.to_rfc3339()));
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mmrag_core::FileType;
    use uuid::Uuid;

    fn metadata(file_type: FileType) -> RecordMetadata {
        RecordMetadata {
            doc_id: Uuid::nil(),
            file_type,
            source_path: "data/uploads/x/report.pdf".to_string(),
            uploaded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            chunk_index: None,
            page: None,
            ocr_text: None,
            image_path: None,
        }
    }

    #[test]
    fn test_pdf_text_chunk() {
        let mut meta = metadata(FileType::Pdf);
        meta.page = Some(2);
        meta.chunk_index = Some(5);
        assert_eq!(
            format_source(&meta),
            "Source: data/uploads/x/report.pdf | Type: pdf | Page: 2 | Chunk: 5 | Uploaded: 2024-05-01T12:00:00+00:00"
        );
    }

    #[test]
    fn test_page_zero_is_shown() {
        let mut meta = metadata(FileType::Pdf);
        meta.page = Some(0);
        assert!(format_source(&meta).contains(" | Page: 0 | "));
    }

    #[test]
    fn test_standalone_image_omits_page_and_chunk() {
        let source = format_source(&metadata(FileType::Image));
        assert!(source.starts_with("Source: data/uploads/x/report.pdf | Type: image | Uploaded: "));
        assert!(!source.contains("Page"));
        assert!(!source.contains("Chunk"));
    }
}
