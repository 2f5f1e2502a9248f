//! WASM bindings for the PDF tools
//!
//! Files, validation, the processing state machine and every PDF edit stay
//! in Rust. JavaScript picks files, renders the progress bar and hosts
//! pdf.js for page rasterization.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { PdfToolSession, initRenderer } from './pkg/pdfkit_web_wasm.js';
//!
//! await init();
//! initRenderer('/js/pdf.worker.min.js'); // only needed by "to-image"
//!
//! const session = new PdfToolSession('merge');
//! session.setProgressCallback((status, progress, message) => updateUI(status, progress, message));
//! session.addFiles([
//!   { name: fileA.name, type: fileA.type, bytes: bytesA },
//!   { name: fileB.name, type: fileB.type, bytes: bytesB },
//! ]);
//! session.reorderFiles([1, 0]);
//! await session.run({ type: 'merge' }); // downloads b_merged.pdf
//! ```

pub mod download;
// JS values are not Send, so the bridge only exists in the browser build
#[cfg(target_arch = "wasm32")]
pub mod pdfjs;
pub mod session;

use pdfkit_core::render::RenderEngine;
use pdfkit_core::PdfKitError;
use wasm_bindgen::prelude::*;

pub use download::BrowserDownloads;
#[cfg(target_arch = "wasm32")]
pub use pdfjs::PdfJsBackend;
pub use session::PdfToolSession;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Header and trailer check, without a full parse
#[wasm_bindgen(js_name = quickValidate)]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    pdfkit_core::quick_check(bytes).map_err(to_js_error)
}

/// Page count, version and metadata of a PDF, before it joins a session
#[wasm_bindgen(js_name = getPdfInfo)]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = pdfkit_core::inspect(bytes).map_err(to_js_error)?;
    to_js(&info)
}

#[wasm_bindgen(js_name = formatBytes)]
pub fn format_bytes(bytes: usize) -> String {
    pdfkit_core::format_bytes(bytes)
}

/// Load pdf.js and install it as the page renderer. Safe to call more
/// than once; later calls wait for the first one.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = initRenderer)]
pub async fn init_renderer(worker_src: String) -> Result<(), JsValue> {
    use pdfkit_core::render::SharedBackend;
    use std::sync::Arc;

    RenderEngine::global()
        .ensure_ready(|| async move {
            let backend = PdfJsBackend::load(&worker_src).await?;
            Ok(Arc::new(backend) as SharedBackend)
        })
        .await
        .map_err(to_js_error)?;
    Ok(())
}

#[wasm_bindgen(js_name = isRendererReady)]
pub fn is_renderer_ready() -> bool {
    RenderEngine::global().is_ready()
}

pub(crate) fn to_js_error(err: PdfKitError) -> JsValue {
    JsValue::from_str(&err.user_message())
}

pub(crate) fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        assert!(!get_version().is_empty());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
    }

    #[test]
    fn test_renderer_starts_unloaded() {
        assert!(!is_renderer_ready());
    }
}
