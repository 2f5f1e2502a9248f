//! Browser downloads for finished files

use js_sys::{Array, Uint8Array};
use pdfkit_core::{OutputFile, PdfKitError, SaveTarget};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

/// Saves each output through a temporary `<a download>` link.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserDownloads;

impl SaveTarget for BrowserDownloads {
    fn save(&self, file: &OutputFile) -> Result<(), PdfKitError> {
        trigger_download(file).map_err(|e| {
            PdfKitError::Delivery(format!("{}: {}", file.filename, describe(&e)))
        })
    }
}

/// An object URL that is revoked when dropped.
struct ObjectUrl(String);

impl ObjectUrl {
    fn for_file(file: &OutputFile) -> Result<Self, JsValue> {
        let parts = Array::of1(&Uint8Array::from(file.bytes.as_slice()));
        let options = BlobPropertyBag::new();
        options.set_type(file.mime);
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;
        Url::create_object_url_with_blob(&blob).map(Self)
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        let _ = Url::revoke_object_url(&self.0);
    }
}

fn trigger_download(file: &OutputFile) -> Result<(), JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("no document body"))?;

    let url = ObjectUrl::for_file(file)?;
    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(&url.0);
    anchor.set_download(&file.filename);

    body.append_child(&anchor)?;
    anchor.click();
    body.remove_child(&anchor)?;
    Ok(())
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
