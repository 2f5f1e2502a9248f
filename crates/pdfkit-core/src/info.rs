//! PDF inspection
//!
//! Cheap structural checks and metadata extraction used when files are
//! added to a session.

use crate::document;
use crate::error::PdfKitError;
use lopdf::{Document, Object};
use serde::Serialize;

/// PDF file information extracted during inspection
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    /// Width and height of the first page in points
    pub first_page_size: Option<(f32, f32)>,
}

/// Parse the document and report page count and metadata.
pub fn inspect(bytes: &[u8]) -> Result<PdfInfo, PdfKitError> {
    quick_check(bytes)?;

    let doc = document::load(bytes)?;
    let pages = document::page_ids(&doc)?;
    let (title, author) = extract_metadata(&doc);

    Ok(PdfInfo {
        page_count: pages.len() as u32,
        version: extract_version(bytes),
        encrypted: doc.is_encrypted(),
        size_bytes: bytes.len(),
        title,
        author,
        first_page_size: pages.first().map(|id| document::page_size(&doc, *id)),
    })
}

/// Parse the document and return its page count.
pub fn page_count(bytes: &[u8]) -> Result<u32, PdfKitError> {
    let doc = document::load(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Header and trailer sniffing without a full parse (for large files)
pub fn quick_check(bytes: &[u8]) -> Result<(), PdfKitError> {
    if bytes.len() < 8 {
        return Err(PdfKitError::MalformedDocument(
            "File too small to be a valid PDF".into(),
        ));
    }

    if !bytes.starts_with(b"%PDF-") {
        return Err(PdfKitError::MalformedDocument(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }

    let tail = &bytes[bytes.len().saturating_sub(1024)..];
    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err(PdfKitError::MalformedDocument(
            "PDF appears truncated (missing %%EOF marker)".into(),
        ));
    }

    Ok(())
}

/// Header format: %PDF-1.7
fn extract_version(bytes: &[u8]) -> String {
    bytes
        .get(5..8)
        .filter(|_| bytes.starts_with(b"%PDF-"))
        .and_then(|v| std::str::from_utf8(v).ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "1.4".to_string())
}

fn extract_metadata(doc: &Document) -> (Option<String>, Option<String>) {
    let Ok(info) = doc.trailer.get(b"Info") else {
        return (None, None);
    };
    let Ok(info) = document::resolve(doc, info).as_dict() else {
        return (None, None);
    };

    let text = |key: &[u8]| {
        info.get(key)
            .and_then(Object::as_str)
            .ok()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .filter(|s| !s.is_empty())
    };

    (text(b"Title"), text(b"Author"))
}
