//! PDF page rendering.

use mmrag_core::ExtractError;

/// Renders every page of a PDF to PNG bytes.
///
/// Implementations are blocking; callers run them on the blocking pool.
pub trait PageRenderer: Send + Sync {
    /// Render all pages in order, upscaled by `scale`.
    fn render_pages(&self, pdf: &[u8], scale: f32) -> Result<Vec<Vec<u8>>, ExtractError>;
}

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRenderer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use super::PageRenderer;
    use image::ImageFormat;
    use mmrag_core::ExtractError;
    use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
    use std::io::Cursor;
    use std::path::PathBuf;
    use tracing::debug;

    /// Page renderer backed by the Pdfium library.
    ///
    /// Binds to the system Pdfium unless a directory holding the platform
    /// library is given.
    #[derive(Debug, Clone, Default)]
    pub struct PdfiumRenderer {
        library_dir: Option<PathBuf>,
    }

    impl PdfiumRenderer {
        #[must_use]
        pub fn new(library_dir: Option<PathBuf>) -> Self {
            Self { library_dir }
        }

        fn bind(&self) -> Result<Pdfium, ExtractError> {
            let bindings = match &self.library_dir {
                Some(dir) => {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                }
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| ExtractError::Failed(format!("pdfium unavailable: {e}")))?;
            Ok(Pdfium::new(bindings))
        }
    }

    impl PageRenderer for PdfiumRenderer {
        fn render_pages(&self, pdf: &[u8], scale: f32) -> Result<Vec<Vec<u8>>, ExtractError> {
            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(|e| ExtractError::Parse(format!("pdfium failed to open PDF: {e}")))?;

            let config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let mut pages = Vec::new();
            for (index, page) in document.pages().iter().enumerate() {
                let image = page
                    .render_with_config(&config)
                    .map_err(|e| ExtractError::Failed(format!("failed to render page {index}: {e}")))?
                    .as_image();

                let mut png = Vec::new();
                image
                    .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                    .map_err(|e| ExtractError::Failed(format!("failed to encode page {index}: {e}")))?;
                debug!("Rendered page {} ({} bytes)", index, png.len());
                pages.push(png);
            }
            Ok(pages)
        }
    }
}
