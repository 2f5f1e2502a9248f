//! Operations and the document transform seam
//!
//! [`Operation`] is the user's request, [`DocumentTransform`] is the
//! library that carries it out. The pipeline only talks to the trait, so
//! tests and other front ends can swap in their own implementation.

use crate::compress::{compress_document, CompressionQuality};
use crate::error::PdfKitError;
use crate::merge::merge_documents;
use crate::rasterize::{rasterize_document, PageProgress, RasterOptions, RasterPage, MAX_DPI};
use crate::render::RenderEngine;
use crate::rotate::{check_quarter_turn, rotate_document};
use crate::split::{split_by_ranges, PageRange};
use crate::validator::FileBatch;
use crate::watermark::{watermark_document, WatermarkStyle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_WATERMARK_OPACITY: f32 = 0.3;

fn default_opacity() -> f32 {
    DEFAULT_WATERMARK_OPACITY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Merge,
    Split,
    Rotate,
    Watermark,
    Compress,
    Rasterize,
}

impl OperationKind {
    /// Appended to the source file stem when naming outputs.
    pub fn output_suffix(self) -> &'static str {
        match self {
            OperationKind::Merge => "_merged",
            OperationKind::Split => "_split",
            OperationKind::Rotate => "_rotated",
            OperationKind::Watermark => "_watermarked",
            OperationKind::Compress => "_compressed",
            OperationKind::Rasterize => "_page",
        }
    }

    pub fn min_files(self) -> usize {
        match self {
            OperationKind::Merge => 2,
            _ => 1,
        }
    }

    pub fn accepts_multiple(self) -> bool {
        self == OperationKind::Merge
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Merge => "merge",
            OperationKind::Split => "split",
            OperationKind::Rotate => "rotate",
            OperationKind::Watermark => "watermark",
            OperationKind::Compress => "compress",
            OperationKind::Rasterize => "rasterize",
        };
        f.write_str(name)
    }
}

/// A transformation and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Merge,
    Split {
        ranges: Vec<PageRange>,
    },
    Rotate {
        degrees: i32,
    },
    Watermark {
        text: String,
        #[serde(default = "default_opacity")]
        opacity: f32,
    },
    Compress {
        #[serde(default)]
        quality: CompressionQuality,
    },
    Rasterize(RasterOptions),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Merge => OperationKind::Merge,
            Operation::Split { .. } => OperationKind::Split,
            Operation::Rotate { .. } => OperationKind::Rotate,
            Operation::Watermark { .. } => OperationKind::Watermark,
            Operation::Compress { .. } => OperationKind::Compress,
            Operation::Rasterize(_) => OperationKind::Rasterize,
        }
    }

    /// Parameter checks that need no document.
    pub fn validate(&self) -> Result<(), PdfKitError> {
        match self {
            Operation::Split { ranges } => {
                if ranges.is_empty() {
                    return Err(PdfKitError::UnsupportedOperation(
                        "Add at least one page range".into(),
                    ));
                }
                if let Some(bad) = ranges.iter().find(|r| r.start > r.end) {
                    return Err(PdfKitError::UnsupportedOperation(format!(
                        "Invalid page range {}-{}: start is after end",
                        bad.start, bad.end
                    )));
                }
            }
            Operation::Watermark { text, opacity } => {
                if text.trim().is_empty() {
                    return Err(PdfKitError::UnsupportedOperation(
                        "Please enter watermark text".into(),
                    ));
                }
                if !opacity.is_finite() {
                    return Err(PdfKitError::UnsupportedOperation(
                        "Watermark opacity must be a number".into(),
                    ));
                }
            }
            Operation::Rasterize(options) => {
                if options.dpi == 0 || options.dpi > MAX_DPI {
                    return Err(PdfKitError::UnsupportedOperation(format!(
                        "Resolution must be between 1 and {} DPI",
                        MAX_DPI
                    )));
                }
            }
            Operation::Rotate { degrees } => check_quarter_turn(*degrees)?,
            Operation::Merge | Operation::Compress { .. } => {}
        }
        Ok(())
    }
}

/// What to run, on which files.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub batch: FileBatch,
    pub operation: Operation,
}

impl TransformRequest {
    pub fn new(batch: FileBatch, operation: Operation) -> Self {
        Self { batch, operation }
    }
}

/// The PDF library behind the pipeline.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait DocumentTransform: Send + Sync {
    /// Fails with `DependencyNotReady` when `kind` needs something that
    /// has not loaded yet.
    fn ready_for(&self, _kind: OperationKind) -> Result<(), PdfKitError> {
        Ok(())
    }

    async fn merge(&self, documents: &[Arc<[u8]>]) -> Result<Vec<u8>, PdfKitError>;

    async fn split(&self, document: &[u8], ranges: &[PageRange]) -> Result<Vec<Vec<u8>>, PdfKitError>;

    async fn rotate(&self, document: &[u8], degrees: i32) -> Result<Vec<u8>, PdfKitError>;

    async fn watermark(&self, document: &[u8], text: &str, opacity: f32) -> Result<Vec<u8>, PdfKitError>;

    async fn compress(&self, document: &[u8], quality: CompressionQuality) -> Result<Vec<u8>, PdfKitError>;

    async fn rasterize(
        &self,
        document: &[u8],
        options: &RasterOptions,
        on_page: PageProgress<'_>,
    ) -> Result<Vec<RasterPage>, PdfKitError>;
}

/// lopdf for structural edits, the render engine for images.
#[derive(Debug, Clone)]
pub struct LopdfTransform {
    engine: RenderEngine,
    watermark_style: WatermarkStyle,
    jpeg_quality: u8,
}

impl LopdfTransform {
    pub fn new(engine: RenderEngine) -> Self {
        Self {
            engine,
            watermark_style: WatermarkStyle::default(),
            jpeg_quality: crate::rasterize::DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_watermark_style(mut self, style: WatermarkStyle) -> Self {
        self.watermark_style = style;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn engine(&self) -> &RenderEngine {
        &self.engine
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl DocumentTransform for LopdfTransform {
    fn ready_for(&self, kind: OperationKind) -> Result<(), PdfKitError> {
        if kind == OperationKind::Rasterize {
            self.engine.backend()?;
        }
        Ok(())
    }

    async fn merge(&self, documents: &[Arc<[u8]>]) -> Result<Vec<u8>, PdfKitError> {
        merge_documents(documents)
    }

    async fn split(&self, document: &[u8], ranges: &[PageRange]) -> Result<Vec<Vec<u8>>, PdfKitError> {
        split_by_ranges(document, ranges)
    }

    async fn rotate(&self, document: &[u8], degrees: i32) -> Result<Vec<u8>, PdfKitError> {
        rotate_document(document, degrees)
    }

    async fn watermark(&self, document: &[u8], text: &str, opacity: f32) -> Result<Vec<u8>, PdfKitError> {
        watermark_document(document, text, opacity, &self.watermark_style)
    }

    async fn compress(&self, document: &[u8], quality: CompressionQuality) -> Result<Vec<u8>, PdfKitError> {
        compress_document(document, quality)
    }

    async fn rasterize(
        &self,
        document: &[u8],
        options: &RasterOptions,
        on_page: PageProgress<'_>,
    ) -> Result<Vec<RasterPage>, PdfKitError> {
        let backend = self.engine.backend()?;
        rasterize_document(backend.as_ref(), document, options, self.jpeg_quality, on_page).await
    }
}
