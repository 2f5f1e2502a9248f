//! pdf.js render backend
//!
//! The browser build has no PDFium, so pages are drawn by pdf.js onto an
//! offscreen canvas and the RGBA pixels are copied back into Rust.

use async_trait::async_trait;
use image::RgbaImage;
use js_sys::{Reflect, Uint8Array, Uint8ClampedArray};
use pdfkit_core::render::RenderBackend;
use pdfkit_core::PdfKitError;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[wasm_bindgen(module = "/www/js/pdfjs-bridge.js")]
extern "C" {
    #[wasm_bindgen(js_name = initPdfJs, catch)]
    async fn init_pdf_js(worker_src: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_name = countPages, catch)]
    async fn count_pages(data: Uint8Array) -> Result<JsValue, JsValue>;

    /// Resolves to `{ width, height, data }` with `data` in RGBA order.
    #[wasm_bindgen(js_name = renderPageRgba, catch)]
    async fn render_page_rgba(data: Uint8Array, page_num: u32, scale: f64) -> Result<JsValue, JsValue>;
}

/// Stateless handle to the pdf.js bridge. Each call hands the document
/// bytes across, so the backend itself holds no JS objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfJsBackend;

impl PdfJsBackend {
    /// Load pdf.js and point it at its worker script.
    pub async fn load(worker_src: &str) -> Result<Self, PdfKitError> {
        init_pdf_js(worker_src)
            .await
            .map_err(|e| PdfKitError::DependencyNotReady(format!("pdf.js failed to load: {}", describe(&e))))?;
        Ok(Self)
    }
}

#[async_trait(?Send)]
impl RenderBackend for PdfJsBackend {
    fn name(&self) -> &str {
        "pdf.js"
    }

    async fn page_count(&self, bytes: &[u8]) -> Result<usize, PdfKitError> {
        let count = count_pages(Uint8Array::from(bytes))
            .await
            .map_err(|e| PdfKitError::MalformedDocument(describe(&e)))?;
        count
            .as_f64()
            .map(|n| n as usize)
            .ok_or_else(|| PdfKitError::Render("pdf.js returned no page count".into()))
    }

    async fn render_page(
        &self,
        bytes: &[u8],
        page_index: usize,
        scale: f64,
    ) -> Result<RgbaImage, PdfKitError> {
        let page_num = page_index as u32 + 1;
        let rendered = render_page_rgba(Uint8Array::from(bytes), page_num, scale)
            .await
            .map_err(|e| PdfKitError::Render(format!("page {}: {}", page_num, describe(&e))))?;

        let width = dimension(&rendered, "width")?;
        let height = dimension(&rendered, "height")?;
        let data = Reflect::get(&rendered, &JsValue::from_str("data"))
            .ok()
            .and_then(|value| value.dyn_into::<Uint8ClampedArray>().ok())
            .ok_or_else(|| PdfKitError::Render(format!("page {}: missing pixel data", page_num)))?;

        RgbaImage::from_raw(width, height, data.to_vec())
            .ok_or_else(|| PdfKitError::Render("bitmap size does not match its buffer".into()))
    }
}

fn dimension(rendered: &JsValue, key: &str) -> Result<u32, PdfKitError> {
    Reflect::get(rendered, &JsValue::from_str(key))
        .ok()
        .and_then(|value| value.as_f64())
        .map(|n| n as u32)
        .ok_or_else(|| PdfKitError::Render(format!("pdf.js result has no {}", key)))
}

/// Best-effort text for a thrown JS value.
fn describe(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
