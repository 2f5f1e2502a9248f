//! PDF Split algorithm
//!
//! Produces one document per requested page range by deleting every page
//! outside the range from a copy of the source.

use crate::document;
use crate::error::PdfKitError;
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn single(page: u32) -> Self {
        Self::new(page, page)
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Clamp both ends into `1..=page_count`.
    ///
    /// A start past the last page is pulled back to the last page, and an
    /// end past the last page is truncated, so `{5, 9}` on a 3-page
    /// document becomes `{3, 3}`.
    pub fn clamp_to(self, page_count: u32) -> Option<PageRange> {
        if page_count == 0 {
            return None;
        }
        let start = self.start.clamp(1, page_count);
        let end = self.end.min(page_count).max(start);
        Some(PageRange::new(start, end))
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Split a PDF into one output per range, in the order given.
pub fn split_by_ranges(bytes: &[u8], ranges: &[PageRange]) -> Result<Vec<Vec<u8>>, PdfKitError> {
    if ranges.is_empty() {
        return Err(PdfKitError::UnsupportedOperation(
            "No page ranges specified".into(),
        ));
    }

    let doc = document::load(bytes)?;
    let page_count = document::page_ids(&doc)?.len() as u32;

    ranges
        .iter()
        .map(|range| {
            let clamped = range.clamp_to(page_count).ok_or_else(|| {
                PdfKitError::MalformedDocument("PDF has no pages".into())
            })?;
            extract_range(&doc, clamped, page_count)
        })
        .collect()
}

/// Keep only the pages inside `range`.
fn extract_range(doc: &Document, range: PageRange, page_count: u32) -> Result<Vec<u8>, PdfKitError> {
    let mut new_doc = doc.clone();

    // Delete in reverse order so earlier page numbers stay valid
    let to_delete: Vec<u32> = (1..=page_count)
        .rev()
        .filter(|p| *p < range.start || *p > range.end)
        .collect();
    for page_num in to_delete {
        new_doc.delete_pages(&[page_num]);
    }

    new_doc.prune_objects();
    new_doc.compress();
    document::save(&mut new_doc)
}
