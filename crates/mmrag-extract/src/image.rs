//! Image content extractor.

use image::ImageFormat;
use mmrag_core::{ExtractError, Fragment};
use std::sync::Arc;
use tracing::debug;

use crate::ocr::{OcrEngine, recognize_or_empty};

/// Extractor for standalone PNG and JPEG images.
///
/// The original bytes pass through unchanged; OCR text is attached when the
/// engine finds any.
pub struct ImageExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl ImageExtractor {
    /// Create a new image extractor with the given OCR engine.
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    /// Validate the image and run OCR on it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Parse`] if the bytes do not decode as an image.
    pub async fn extract(&self, data: &[u8]) -> Result<Vec<Fragment>, ExtractError> {
        let bytes = data.to_vec();
        let (width, height, mime_type) =
            tokio::task::spawn_blocking(move || decode_image_metadata(&bytes))
                .await
                .map_err(|e| ExtractError::Failed(format!("Task join error: {e}")))??;
        debug!("Decoded {}x{} {} image", width, height, mime_type);

        let ocr_text = recognize_or_empty(self.ocr.as_ref(), data).await;

        Ok(vec![Fragment::Image {
            data: data.to_vec(),
            page: None,
            ocr_text,
        }])
    }
}

/// Decode image to get dimensions and MIME type.
pub(crate) fn decode_image_metadata(bytes: &[u8]) -> Result<(u32, u32, String), ExtractError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractError::Parse(format!("failed to decode image: {e}")))?;

    let mime_type = match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        _ => "application/octet-stream",
    };

    Ok((img.width(), img.height(), mime_type.to_string()))
}
