//! Best-effort size reduction
//!
//! Strips descriptive metadata, drops unreachable objects and re-encodes
//! the document with compressed streams. The output is not guaranteed to be
//! smaller than the input.

use crate::document;
use crate::error::PdfKitError;
use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Info dictionary keys removed before saving.
pub const STRIPPED_METADATA: [&str; 6] =
    ["Title", "Author", "Subject", "Keywords", "Producer", "Creator"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionQuality {
    /// Serialization batch size hint. It never changes what is written.
    pub fn objects_per_tick(self) -> usize {
        match self {
            CompressionQuality::Low => 50,
            CompressionQuality::Medium => 100,
            CompressionQuality::High => 200,
        }
    }
}

impl fmt::Display for CompressionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionQuality::Low => "low",
            CompressionQuality::Medium => "medium",
            CompressionQuality::High => "high",
        };
        f.write_str(name)
    }
}

impl FromStr for CompressionQuality {
    type Err = PdfKitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionQuality::Low),
            "medium" => Ok(CompressionQuality::Medium),
            "high" => Ok(CompressionQuality::High),
            other => Err(PdfKitError::UnsupportedOperation(format!(
                "Unknown compression quality: {}",
                other
            ))),
        }
    }
}

/// Re-save `bytes` with metadata stripped and streams compressed.
pub fn compress_document(bytes: &[u8], quality: CompressionQuality) -> Result<Vec<u8>, PdfKitError> {
    let mut doc = document::load(bytes)?;
    document::page_ids(&doc)?;

    strip_metadata(&mut doc);
    doc.prune_objects();
    doc.compress();
    let output = document::save(&mut doc)?;

    info!(
        quality = %quality,
        objects_per_tick = quality.objects_per_tick(),
        original_bytes = bytes.len(),
        compressed_bytes = output.len(),
        reduction_pct = format!("{:.1}", reduction_percent(bytes.len(), output.len())),
        "compressed document"
    );
    Ok(output)
}

/// Percentage saved, negative when the output grew.
pub fn reduction_percent(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - compressed as f64 / original as f64) * 100.0
}

fn strip_metadata(doc: &mut Document) {
    let info_ref = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => return,
    };

    let emptied = match info_ref {
        Some(id) => match doc.get_object_mut(id).and_then(Object::as_dict_mut) {
            Ok(info) => strip_keys(info),
            Err(_) => true,
        },
        None => match doc.trailer.get_mut(b"Info").and_then(Object::as_dict_mut) {
            Ok(info) => strip_keys(info),
            Err(_) => true,
        },
    };

    if emptied {
        doc.trailer.remove(b"Info");
    }
}

/// Returns true when nothing is left in the dictionary.
fn strip_keys(info: &mut Dictionary) -> bool {
    for key in STRIPPED_METADATA {
        info.remove(key.as_bytes());
    }
    info.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pdf::{build_document, create_test_pdf, page_texts};
    use lopdf::{dictionary, StringFormat};

    fn with_info(extra: Option<(&str, &str)>) -> Vec<u8> {
        let mut doc = build_document(2, "C", (612, 792));
        let mut info = dictionary! {
            "Title" => Object::String(b"Secret plan".to_vec(), StringFormat::Literal),
            "Producer" => Object::String(b"Scanner 3000".to_vec(), StringFormat::Literal),
        };
        if let Some((key, value)) = extra {
            info.set(key, Object::String(value.as_bytes().to_vec(), StringFormat::Literal));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn info_dict(bytes: &[u8]) -> Option<Dictionary> {
        let doc = Document::load_mem(bytes).unwrap();
        let info = doc.trailer.get(b"Info").ok()?;
        document::resolve(&doc, info).as_dict().ok().cloned()
    }

    #[test]
    fn test_strips_descriptive_metadata() {
        let output = compress_document(&with_info(None), CompressionQuality::Medium).unwrap();
        assert!(info_dict(&output).is_none());
    }

    #[test]
    fn test_keeps_other_info_keys() {
        let input = with_info(Some(("CreationDate", "D:20240101000000Z")));
        let output = compress_document(&input, CompressionQuality::High).unwrap();

        let info = info_dict(&output).unwrap();
        assert!(info.has(b"CreationDate"));
        assert!(!info.has(b"Title"));
        assert!(!info.has(b"Producer"));
    }

    #[test]
    fn test_preserves_pages() {
        let output = compress_document(&create_test_pdf(3, "C"), CompressionQuality::Low).unwrap();
        let texts = page_texts(&output);
        assert_eq!(texts.len(), 3);
        assert!(texts[2].contains("C-Page-3"));
    }

    #[test]
    fn test_quality_does_not_change_output() {
        let input = create_test_pdf(2, "Q");
        let low = compress_document(&input, CompressionQuality::Low).unwrap();
        let high = compress_document(&input, CompressionQuality::High).unwrap();
        assert_eq!(low.len(), high.len());
    }

    #[test]
    fn test_quality_parse_and_hint() {
        assert_eq!("HIGH".parse::<CompressionQuality>().unwrap(), CompressionQuality::High);
        assert!("ultra".parse::<CompressionQuality>().is_err());
        assert_eq!(CompressionQuality::Low.objects_per_tick(), 50);
        assert_eq!(CompressionQuality::default().objects_per_tick(), 100);
    }

    #[test]
    fn test_reduction_percent() {
        assert_eq!(reduction_percent(200, 150), 25.0);
        assert!(reduction_percent(100, 120) < 0.0);
        assert_eq!(reduction_percent(0, 10), 0.0);
    }
}
