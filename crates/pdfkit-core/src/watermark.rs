//! Text watermark
//!
//! Stamps a rotated, semi-transparent Helvetica label on every page. The
//! existing page content is wrapped in `q`/`Q` so its graphics state cannot
//! leak into the stamp.

use crate::document;
use crate::error::PdfKitError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::{Deserialize, Serialize};

const FONT_NAME: &[u8] = b"FWm";
const GRAPHICS_STATE_NAME: &[u8] = b"GSWm";

/// Horizontal offset of the label's origin from the page center, in points.
const CENTER_OFFSET_X: f32 = 100.0;

/// Fixed appearance of the stamp. Only text and opacity vary per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkStyle {
    pub font_size: f32,
    /// Gray level, 0 black to 1 white
    pub gray: f32,
    pub angle_degrees: f32,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            font_size: 24.0,
            gray: 0.5,
            angle_degrees: 45.0,
        }
    }
}

/// Draw `text` on every page at the given opacity.
pub fn watermark_document(
    bytes: &[u8],
    text: &str,
    opacity: f32,
    style: &WatermarkStyle,
) -> Result<Vec<u8>, PdfKitError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PdfKitError::UnsupportedOperation(
            "Watermark text must not be empty".into(),
        ));
    }
    if !opacity.is_finite() {
        return Err(PdfKitError::UnsupportedOperation(
            "Watermark opacity must be a number".into(),
        ));
    }
    let opacity = opacity.clamp(0.0, 1.0);

    let mut doc = document::load(bytes)?;
    let page_ids = document::page_ids(&doc)?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => opacity,
        "CA" => opacity,
    });
    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));

    for page_id in page_ids {
        let [llx, lly, urx, ury] = document::media_box(&doc, page_id);
        let x = llx + (urx - llx) / 2.0 - CENTER_OFFSET_X;
        let y = lly + (ury - lly) / 2.0;

        let stamp = stamp_content(text, x, y, style)?;
        let stamp_id = doc.add_object(Stream::new(dictionary! {}, stamp));

        let mut resources = effective_resources(&doc, page_id);
        add_named_resource(&doc, &mut resources, b"Font", FONT_NAME, font_id);
        add_named_resource(&doc, &mut resources, b"ExtGState", GRAPHICS_STATE_NAME, gs_id);

        let contents = wrapped_contents(&doc, page_id, open_id, stamp_id);
        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfKitError::MalformedDocument(format!("Invalid page object: {}", e)))?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", contents);
    }

    document::save(&mut doc)
}

fn stamp_content(text: &str, x: f32, y: f32, style: &WatermarkStyle) -> Result<Vec<u8>, PdfKitError> {
    let (sin, cos) = style.angle_degrees.to_radians().sin_cos();
    let gray = style.gray;

    let content = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(GRAPHICS_STATE_NAME.to_vec())]),
            Operation::new("rg", vec![gray.into(), gray.into(), gray.into()]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(FONT_NAME.to_vec()), style.font_size.into()],
            ),
            Operation::new(
                "Tm",
                vec![cos.into(), sin.into(), (-sin).into(), cos.into(), x.into(), y.into()],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    content
        .encode()
        .map_err(|e| PdfKitError::OperationError(format!("Failed to encode watermark: {}", e)))
}

/// Helvetica with WinAnsi covers Latin-1; anything else prints as '?'.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// `[open, ...existing, stamp]`, where the stamp starts by closing the
/// `q` opened before the original content.
fn wrapped_contents(doc: &Document, page_id: ObjectId, open_id: ObjectId, stamp_id: ObjectId) -> Object {
    let existing = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .and_then(|page| page.get(b"Contents"))
        .ok()
        .map(|contents| match document::resolve(doc, contents) {
            Object::Array(parts) => parts.clone(),
            _ => vec![contents.clone()],
        })
        .unwrap_or_default();

    let mut parts = Vec::with_capacity(existing.len() + 2);
    parts.push(Object::Reference(open_id));
    parts.extend(existing);
    parts.push(Object::Reference(stamp_id));
    Object::Array(parts)
}

fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match document::inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

fn add_named_resource(doc: &Document, resources: &mut Dictionary, category: &[u8], name: &[u8], id: ObjectId) {
    let mut entries = match resources.get(category).map(|o| document::resolve(doc, o)) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    entries.set(name, Object::Reference(id));
    resources.set(category, Object::Dictionary(entries));
}
