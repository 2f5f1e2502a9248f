//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use pdfkit_core::render::{pixel_dimensions, RenderBackend};
use pdfkit_core::{PdfKitError, UploadedFile};

/// A PDF of `num_pages` Letter pages; page `n` shows `{prefix}-Page-{n}`.
pub fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for n in 1..=num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("{}-Page-{}", prefix, n).into_bytes(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => num_pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn pdf_upload(name: &str, pages: u32) -> UploadedFile {
    UploadedFile::from_bytes(name, Some("application/pdf"), create_test_pdf(pages, name))
}

/// Page contents in order, decoded lossily.
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
        .collect()
}

/// Renders blank Letter pages; counts pages with lopdf.
pub struct BlankLetterBackend;

#[async_trait]
impl RenderBackend for BlankLetterBackend {
    fn name(&self) -> &str {
        "blank-letter"
    }

    async fn page_count(&self, bytes: &[u8]) -> Result<usize, PdfKitError> {
        Ok(pdfkit_core::get_page_count(bytes)? as usize)
    }

    async fn render_page(
        &self,
        _bytes: &[u8],
        _page_index: usize,
        scale: f64,
    ) -> Result<RgbaImage, PdfKitError> {
        let (width, height) = pixel_dimensions(612.0, 792.0, scale);
        Ok(RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255])))
    }
}
