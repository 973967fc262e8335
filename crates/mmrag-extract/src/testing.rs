//! Fixtures for tests that need real PDF and PNG bytes.
//!
//! Available to this crate's tests and, through the `test-util` feature,
//! to downstream crates' tests.

use image::{ImageBuffer, ImageFormat, Rgb};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use mmrag_core::ExtractError;

use crate::render::PageRenderer;

/// An 8x8 PNG; different `shade`s give different bytes.
pub fn test_png(shade: u8) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(8, 8, |x, y| {
        Rgb([shade, (x * 30) as u8, (y * 30) as u8])
    });
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode test png");
    bytes
}

/// Build a PDF with one page per entry; `None` pages carry no text.
pub fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for text in pages {
        let operations = match text {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
            None => Vec::new(),
        };
        let content = Content { operations };
        let encoded = content.encode().expect("encode page content");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).expect("page count fits i64");
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("serialize test pdf");
    buf
}

/// Renders page `n` as `test_png(n * 40)`, counting pages with lopdf.
///
/// Stands in for Pdfium so tests do not need the shared library.
pub struct PngPageRenderer;

impl PageRenderer for PngPageRenderer {
    fn render_pages(&self, pdf: &[u8], _scale: f32) -> Result<Vec<Vec<u8>>, ExtractError> {
        let doc = Document::load_mem(pdf).map_err(|e| ExtractError::Parse(e.to_string()))?;
        Ok((0..doc.get_pages().len())
            .map(|i| test_png(u8::try_from(i * 40 % 256).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_pdf_page_count() {
        let pdf = build_pdf(&[Some("one"), None, Some("three")]);
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_renderer_gives_distinct_pages() {
        let pages = PngPageRenderer
            .render_pages(&build_pdf(&[None, None]), 2.0)
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_ne!(pages[0], pages[1]);
        assert!(image::load_from_memory(&pages[1]).is_ok());
    }
}
