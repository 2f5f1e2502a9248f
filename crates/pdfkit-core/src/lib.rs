//! Client-side PDF tools
//!
//! Merge, split, rotate, watermark, compress and rasterize PDFs behind one
//! validated, single-flight pipeline. Structural edits use lopdf; page
//! rendering goes through a pluggable [`render::RenderBackend`].

pub mod compress;
pub mod config;
pub mod delivery;
mod document;
pub mod error;
pub mod info;
pub mod merge;
pub mod pipeline;
pub mod rasterize;
pub mod render;
pub mod rotate;
pub mod split;
pub mod tool;
pub mod transform;
pub mod validator;
pub mod watermark;

#[cfg(test)]
mod test_pdf;

pub use compress::{compress_document, CompressionQuality};
pub use config::Config;
pub use delivery::{DirectoryTarget, MemoryTarget, OutputFile, SaveTarget, TransformResult};
pub use document::normalize_degrees;
pub use error::{PdfKitError, ValidationError};
pub use info::{inspect, quick_check, PdfInfo};
pub use merge::merge_documents;
pub use pipeline::{Pipeline, ProcessingState, ProcessingStatus};
pub use rasterize::{RasterFormat, RasterOptions};
pub use render::{RenderBackend, RenderEngine};
pub use rotate::rotate_document;
pub use split::{split_by_ranges, PageRange};
pub use tool::{ToolKind, ToolSession, ToolSpec};
pub use transform::{DocumentTransform, LopdfTransform, Operation, OperationKind, TransformRequest};
pub use validator::{FileBatch, UploadedFile, ValidationReport, ValidatorConfig};
pub use watermark::{watermark_document, WatermarkStyle};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfKitError> {
    info::page_count(bytes)
}

/// Parse a range list like "1-3, 5, 8-10" into ranges, in input order.
pub fn parse_page_ranges(input: &str) -> Result<Vec<PageRange>, PdfKitError> {
    let invalid = |msg: String| PdfKitError::UnsupportedOperation(msg);
    let page = |s: &str| -> Result<u32, PdfKitError> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|_| invalid(format!("Invalid page number: {}", s.trim())))?;
        if n == 0 {
            return Err(invalid("Page numbers start at 1".to_string()));
        }
        Ok(n)
    };

    let mut ranges = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let range = match part.split_once('-') {
            // Range like "1-3"
            Some((start, end)) => PageRange::new(page(start)?, page(end)?),
            // Single page like "5"
            None => PageRange::single(page(part)?),
        };
        if range.start > range.end {
            return Err(invalid(format!(
                "Start {} > end {}",
                range.start, range.end
            )));
        }
        ranges.push(range);
    }

    if ranges.is_empty() {
        return Err(invalid("No page ranges given".to_string()));
    }
    Ok(ranges)
}

/// Human-readable size: B, KB or MB.
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
