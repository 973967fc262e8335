//! Plain text extractor.

use mmrag_core::{ExtractError, Fragment};
use tracing::debug;

use crate::paragraph::split_paragraphs;

/// Extractor for plain text files.
///
/// Produces one [`Fragment::Text`] per paragraph, in source order.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

impl TextExtractor {
    /// Create a new text extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode bytes as UTF-8 (invalid sequences replaced) and split into paragraphs.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Empty`] when no non-empty paragraph remains.
    pub fn extract(&self, data: &[u8]) -> Result<Vec<Fragment>, ExtractError> {
        let text = String::from_utf8_lossy(data);
        let paragraphs = split_paragraphs(&text);
        if paragraphs.is_empty() {
            return Err(ExtractError::Empty(
                "text document has no non-empty paragraphs".to_string(),
            ));
        }

        debug!("Split text into {} paragraphs", paragraphs.len());
        Ok(paragraphs
            .into_iter()
            .zip(0u32..)
            .map(|(text, chunk_index)| Fragment::Text {
                text,
                chunk_index,
                page: None,
            })
            .collect())
    }
}
