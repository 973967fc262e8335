//! Routing an upload to its extractor.

use mmrag_core::{ExtractError, FileType, Fragment};
use std::sync::Arc;

use crate::image::ImageExtractor;
use crate::ocr::OcrEngine;
use crate::pdf::PdfExtractor;
use crate::render::PageRenderer;
use crate::text::TextExtractor;

/// Raw bytes of a file whose kind is already known.
#[derive(Debug, Clone, Copy)]
pub enum SourceFile<'a> {
    Text(&'a [u8]),
    Image(&'a [u8]),
    Pdf(&'a [u8]),
}

impl<'a> SourceFile<'a> {
    #[must_use]
    pub fn new(file_type: FileType, data: &'a [u8]) -> Self {
        match file_type {
            FileType::Text => Self::Text(data),
            FileType::Image => Self::Image(data),
            FileType::Pdf => Self::Pdf(data),
        }
    }

    #[must_use]
    pub fn file_type(&self) -> FileType {
        match self {
            Self::Text(_) => FileType::Text,
            Self::Image(_) => FileType::Image,
            Self::Pdf(_) => FileType::Pdf,
        }
    }
}

/// One extractor per [`SourceFile`] variant.
pub struct Extractors {
    text: TextExtractor,
    image: ImageExtractor,
    pdf: PdfExtractor,
}

impl Extractors {
    pub fn new(ocr: Arc<dyn OcrEngine>, renderer: Arc<dyn PageRenderer>, render_scale: f32) -> Self {
        Self {
            text: TextExtractor::new(),
            image: ImageExtractor::new(Arc::clone(&ocr)),
            pdf: PdfExtractor::new(renderer, ocr).with_render_scale(render_scale),
        }
    }

    /// Extract fragments from a file.
    pub async fn extract(&self, source: SourceFile<'_>) -> Result<Vec<Fragment>, ExtractError> {
        match source {
            SourceFile::Text(data) => self.text.extract(data),
            SourceFile::Image(data) => self.image.extract(data).await,
            SourceFile::Pdf(data) => self.pdf.extract(data).await,
        }
    }
}
