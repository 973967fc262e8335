//! PDF content extractor.
//!
//! Text comes from lopdf, page by page. Every page is also rendered to PNG
//! and run through OCR, so scanned pages and figures are searchable through
//! the image collection.

use lopdf::Document;
use mmrag_core::{ExtractError, Fragment};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ocr::{OcrEngine, recognize_or_empty};
use crate::paragraph::split_paragraphs;
use crate::render::PageRenderer;

/// Default page upscale factor for rendering.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Extractor for PDF files.
pub struct PdfExtractor {
    renderer: Arc<dyn PageRenderer>,
    ocr: Arc<dyn OcrEngine>,
    render_scale: f32,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new(renderer: Arc<dyn PageRenderer>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            renderer,
            ocr,
            render_scale: DEFAULT_RENDER_SCALE,
        }
    }

    #[must_use]
    pub fn with_render_scale(mut self, scale: f32) -> Self {
        self.render_scale = scale;
        self
    }

    /// Extract text fragments per page and one rendered image per page.
    ///
    /// Text fragments come first, then page images, both in page order.
    /// `chunk_index` runs across the whole document.
    ///
    /// # Errors
    ///
    /// Fails if the PDF cannot be parsed or rendered. Text extraction
    /// failures on a single page only drop that page's text.
    pub async fn extract(&self, data: &[u8]) -> Result<Vec<Fragment>, ExtractError> {
        let bytes = data.to_vec();
        let page_texts = tokio::task::spawn_blocking(move || extract_page_texts(&bytes))
            .await
            .map_err(|e| ExtractError::Failed(format!("Task join error: {e}")))??;

        let bytes = data.to_vec();
        let renderer = Arc::clone(&self.renderer);
        let scale = self.render_scale;
        let rendered = tokio::task::spawn_blocking(move || renderer.render_pages(&bytes, scale))
            .await
            .map_err(|e| ExtractError::Failed(format!("Render task error: {e}")))??;

        if rendered.len() != page_texts.len() {
            return Err(ExtractError::Failed(format!(
                "rendered {} pages but the document has {}",
                rendered.len(),
                page_texts.len()
            )));
        }

        let mut fragments = Vec::new();
        let mut chunk_index = 0u32;
        for (page, text) in (0u32..).zip(&page_texts) {
            for paragraph in split_paragraphs(text) {
                fragments.push(Fragment::Text {
                    text: paragraph,
                    chunk_index,
                    page: Some(page),
                });
                chunk_index += 1;
            }
        }
        debug!(
            "Extracted {} text chunks from {} pages",
            chunk_index,
            page_texts.len()
        );

        for (page, png) in (0u32..).zip(rendered) {
            let ocr_text = recognize_or_empty(self.ocr.as_ref(), &png).await;
            fragments.push(Fragment::Image {
                data: png,
                page: Some(page),
                ocr_text,
            });
        }

        Ok(fragments)
    }
}

/// Text of every page, index 0 is the first page. Unreadable pages yield "".
fn extract_page_texts(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ExtractError::Parse(format!("failed to parse PDF: {e}")))?;

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                warn!("Failed to extract text from page {}: {}", page_number, e);
                texts.push(String::new());
            }
        }
    }
    Ok(texts)
}
