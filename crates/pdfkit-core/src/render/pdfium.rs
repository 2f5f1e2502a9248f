use super::{pixel_dimensions, RenderBackend};
use crate::error::PdfKitError;
use async_trait::async_trait;
use image::RgbaImage;
use pdfium_render::prelude::*;

/// Renders pages through a PDFium shared library found next to the binary
/// or on the system library path.
pub struct PdfiumBackend {
    pdfium: Pdfium,
}

impl PdfiumBackend {
    pub fn bind() -> Result<Self, PdfKitError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| {
                PdfKitError::DependencyNotReady(format!("PDFium library not available: {}", e))
            })?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    fn load<'a>(&'a self, bytes: &'a [u8]) -> Result<PdfDocument<'a>, PdfKitError> {
        self.pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| PdfKitError::MalformedDocument(e.to_string()))
    }
}

#[async_trait]
impl RenderBackend for PdfiumBackend {
    fn name(&self) -> &str {
        "pdfium"
    }

    async fn page_count(&self, bytes: &[u8]) -> Result<usize, PdfKitError> {
        Ok(self.load(bytes)?.pages().len() as usize)
    }

    async fn render_page(
        &self,
        bytes: &[u8],
        page_index: usize,
        scale: f64,
    ) -> Result<RgbaImage, PdfKitError> {
        let document = self.load(bytes)?;
        let page = document
            .pages()
            .get(page_index as _)
            .map_err(|e| PdfKitError::Render(format!("page {}: {}", page_index + 1, e)))?;

        let (width, height) = pixel_dimensions(page.width().value as f64, page.height().value as f64, scale);
        let config = PdfRenderConfig::new()
            .set_target_width(width as _)
            .set_maximum_height(height as _);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfKitError::Render(format!("page {}: {}", page_index + 1, e)))?;

        let (w, h) = (bitmap.width() as u32, bitmap.height() as u32);
        RgbaImage::from_raw(w, h, bitmap.as_rgba_bytes())
            .ok_or_else(|| PdfKitError::Render("bitmap size does not match its buffer".into()))
    }
}
