//! Tool catalog and sessions
//!
//! Each tool is one operation plus the upload rules around it. A
//! [`ToolSession`] holds the files the user picked for that tool and runs
//! the pipeline on them.

use crate::config::Config;
use crate::delivery::{SaveTarget, TransformResult};
use crate::error::{PdfKitError, ValidationError};
use crate::info::{self, PdfInfo};
use crate::pipeline::{Pipeline, ProcessingState};
use crate::split::PageRange;
use crate::transform::{DocumentTransform, Operation, OperationKind, TransformRequest};
use crate::validator::{self, FileBatch, UploadedFile, ValidationReport, ValidatorConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Merge,
    Split,
    Compress,
    Rotate,
    Watermark,
    ToImage,
}

/// Static description of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    pub kind: ToolKind,
    /// URL path segment, e.g. "merge-pdf"
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub operation: OperationKind,
}

pub const TOOLS: [ToolSpec; 6] = [
    ToolSpec {
        kind: ToolKind::Merge,
        slug: "merge-pdf",
        title: "Merge PDF",
        description: "Combine multiple PDF files into one document",
        operation: OperationKind::Merge,
    },
    ToolSpec {
        kind: ToolKind::Split,
        slug: "split-pdf",
        title: "Split PDF",
        description: "Extract pages or split a PDF into multiple files",
        operation: OperationKind::Split,
    },
    ToolSpec {
        kind: ToolKind::Compress,
        slug: "compress-pdf",
        title: "Compress PDF",
        description: "Reduce file size while maintaining quality",
        operation: OperationKind::Compress,
    },
    ToolSpec {
        kind: ToolKind::Rotate,
        slug: "rotate-pdf",
        title: "Rotate PDF",
        description: "Rotate pages in your PDF files",
        operation: OperationKind::Rotate,
    },
    ToolSpec {
        kind: ToolKind::Watermark,
        slug: "watermark-pdf",
        title: "Add Watermark",
        description: "Add text watermarks to your PDFs",
        operation: OperationKind::Watermark,
    },
    ToolSpec {
        kind: ToolKind::ToImage,
        slug: "pdf-to-image",
        title: "PDF to Images",
        description: "Convert PDF pages to image formats like JPG or PNG",
        operation: OperationKind::Rasterize,
    },
];

impl ToolKind {
    pub fn spec(self) -> &'static ToolSpec {
        let index = match self {
            ToolKind::Merge => 0,
            ToolKind::Split => 1,
            ToolKind::Compress => 2,
            ToolKind::Rotate => 3,
            ToolKind::Watermark => 4,
            ToolKind::ToImage => 5,
        };
        &TOOLS[index]
    }

    /// Accepts the slug ("merge-pdf") or the short name ("merge").
    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.trim().to_ascii_lowercase();
        TOOLS
            .iter()
            .find(|t| t.slug == slug || t.operation.to_string() == slug || kebab(t.kind) == slug)
            .map(|t| t.kind)
    }
}

fn kebab(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Merge => "merge",
        ToolKind::Split => "split",
        ToolKind::Compress => "compress",
        ToolKind::Rotate => "rotate",
        ToolKind::Watermark => "watermark",
        ToolKind::ToImage => "to-image",
    }
}

impl ToolSpec {
    pub fn multiple(&self) -> bool {
        self.operation.accepts_multiple()
    }

    /// Most files the session may hold at once.
    pub fn max_files(&self, config: &Config) -> usize {
        if self.multiple() {
            config.limits.merge_max_files
        } else {
            1
        }
    }

    pub fn validator_config(&self, config: &Config) -> ValidatorConfig {
        ValidatorConfig {
            accept: config.limits.accept.clone(),
            multiple: self.multiple(),
            max_files: if self.multiple() {
                config.limits.merge_max_files
            } else {
                config.limits.max_files
            },
            max_size_bytes: 0,
        }
        .with_max_size_mb(config.limits.max_size_mb)
    }
}

/// Files picked for one tool, plus the pipeline that processes them.
pub struct ToolSession {
    spec: &'static ToolSpec,
    validator: ValidatorConfig,
    max_files: usize,
    max_dpi: u32,
    files: FileBatch,
    suggested_range: Option<PageRange>,
    pipeline: Arc<Pipeline>,
}

impl ToolSession {
    pub fn new(kind: ToolKind, config: &Config, transform: Arc<dyn DocumentTransform>) -> Self {
        let spec = kind.spec();
        Self {
            spec,
            validator: spec.validator_config(config),
            max_files: spec.max_files(config),
            max_dpi: config.raster.max_dpi,
            files: Vec::new(),
            suggested_range: None,
            pipeline: Arc::new(Pipeline::new(transform)),
        }
    }

    pub fn spec(&self) -> &'static ToolSpec {
        self.spec
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn state(&self) -> ProcessingState {
        self.pipeline.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.pipeline.subscribe()
    }

    /// `{1, page_count}` of the current file, for split tools.
    pub fn suggested_range(&self) -> Option<PageRange> {
        self.suggested_range
    }

    /// Validate `files` and add the accepted ones. Merge appends, every
    /// other tool replaces its single file. A rejected report leaves the
    /// session unchanged.
    pub fn add_files(&mut self, files: Vec<UploadedFile>) -> Result<ValidationReport, PdfKitError> {
        self.ensure_idle()?;

        let mut report = validator::validate(&files, &self.validator);
        if report.is_rejected() || report.accepted.is_empty() {
            return Ok(report);
        }

        if self.spec.multiple() {
            let total = self.files.len() + report.accepted.len();
            if total > self.max_files {
                report.reject(ValidationError::TooManyFiles {
                    count: total,
                    max: self.max_files,
                });
                return Ok(report);
            }
            self.files.extend(report.accepted.iter().cloned());
        } else {
            self.files = report.accepted.clone();
            self.refresh_suggested_range();
        }

        debug!(tool = self.spec.slug, files = self.files.len(), "files added");
        Ok(report)
    }

    pub fn remove_file(&mut self, index: usize) -> Result<UploadedFile, PdfKitError> {
        self.ensure_idle()?;
        if index >= self.files.len() {
            return Err(PdfKitError::InvalidState(format!(
                "File index {} out of bounds",
                index
            )));
        }

        let removed = self.files.remove(index);
        if self.files.is_empty() {
            self.suggested_range = None;
            self.pipeline.reset()?;
        }
        Ok(removed)
    }

    /// Permute the batch; `order[i]` is the current index of the file that
    /// should end up at position `i`.
    pub fn reorder(&mut self, order: &[usize]) -> Result<(), PdfKitError> {
        self.ensure_idle()?;
        if !self.spec.multiple() {
            return Err(PdfKitError::UnsupportedOperation(
                "Reorder only available when merging".into(),
            ));
        }
        if order.len() != self.files.len() {
            return Err(PdfKitError::InvalidState(
                "Invalid order: wrong number of indices".into(),
            ));
        }

        let mut seen = vec![false; self.files.len()];
        for &idx in order {
            if idx >= self.files.len() {
                return Err(PdfKitError::InvalidState(
                    "Invalid order: index out of bounds".into(),
                ));
            }
            if seen[idx] {
                return Err(PdfKitError::InvalidState(
                    "Invalid order: duplicate index".into(),
                ));
            }
            seen[idx] = true;
        }

        self.files = order.iter().map(|&idx| self.files[idx].clone()).collect();
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), PdfKitError> {
        self.ensure_idle()?;
        self.files.clear();
        self.suggested_range = None;
        self.pipeline.reset()
    }

    /// Inspect the file at `index`.
    pub fn file_info(&self, index: usize) -> Result<PdfInfo, PdfKitError> {
        let file = self.files.get(index).ok_or_else(|| {
            PdfKitError::InvalidState(format!("File index {} out of bounds", index))
        })?;
        info::inspect(&file.content()?)
    }

    /// Run this tool's operation on the current files.
    pub async fn run(
        &self,
        operation: Operation,
        target: &dyn SaveTarget,
    ) -> Result<TransformResult, PdfKitError> {
        let request = self.request(operation)?;
        self.pipeline.run(request, target).await
    }

    /// Check `operation` against this tool and snapshot the current files.
    /// Together with [`ToolSession::pipeline`] this lets a caller run
    /// without holding a borrow of the session.
    pub fn request(&self, operation: Operation) -> Result<TransformRequest, PdfKitError> {
        if operation.kind() != self.spec.operation {
            return Err(PdfKitError::UnsupportedOperation(format!(
                "{} cannot run a {} operation",
                self.spec.title,
                operation.kind()
            )));
        }
        if let Operation::Rasterize(options) = &operation {
            if options.dpi > self.max_dpi {
                return Err(PdfKitError::UnsupportedOperation(format!(
                    "Resolution may not exceed {} DPI",
                    self.max_dpi
                )));
            }
        }
        Ok(TransformRequest::new(self.files.clone(), operation))
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    fn ensure_idle(&self) -> Result<(), PdfKitError> {
        if self.pipeline.state().is_processing() {
            return Err(PdfKitError::Busy);
        }
        Ok(())
    }

    fn refresh_suggested_range(&mut self) {
        if self.spec.operation != OperationKind::Split {
            return;
        }
        self.suggested_range = self.files.first().and_then(|file| {
            match file.content().and_then(|bytes| info::page_count(&bytes)) {
                Ok(0) => None,
                Ok(pages) => Some(PageRange::new(1, pages)),
                Err(err) => {
                    warn!(file = file.name(), error = %err, "could not count pages");
                    None
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::MemoryTarget;
    use crate::pipeline::ProcessingStatus;
    use crate::render::RenderEngine;
    use crate::test_pdf::create_test_pdf;
    use crate::transform::LopdfTransform;
    use pretty_assertions::assert_eq;

    fn new_session(kind: ToolKind) -> ToolSession {
        let transform = Arc::new(LopdfTransform::new(RenderEngine::new()));
        ToolSession::new(kind, &Config::default(), transform)
    }

    fn pdf_file(name: &str, pages: u32) -> UploadedFile {
        UploadedFile::from_bytes(name, Some("application/pdf"), create_test_pdf(pages, name))
    }

    fn names(session: &ToolSession) -> Vec<&str> {
        session.files().iter().map(|f| f.name()).collect()
    }

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(ToolKind::from_slug("merge-pdf"), Some(ToolKind::Merge));
        assert_eq!(ToolKind::from_slug("to-image"), Some(ToolKind::ToImage));
        assert_eq!(ToolKind::from_slug("rasterize"), Some(ToolKind::ToImage));
        assert_eq!(ToolKind::from_slug("nope"), None);
        for tool in TOOLS {
            assert_eq!(tool.kind.spec(), &tool);
        }
    }

    #[test]
    fn test_merge_appends_files() {
        let mut session = new_session(ToolKind::Merge);
        session.add_files(vec![pdf_file("a.pdf", 1)]).unwrap();
        session.add_files(vec![pdf_file("b.pdf", 1), pdf_file("c.pdf", 1)]).unwrap();
        assert_eq!(names(&session), vec!["a.pdf", "b.pdf", "c.pdf"]);
    }

    #[test]
    fn test_merge_total_is_capped() {
        let mut session = new_session(ToolKind::Merge);
        let first: Vec<_> = (0..15).map(|i| pdf_file(&format!("{i}.pdf"), 1)).collect();
        session.add_files(first).unwrap();

        let more: Vec<_> = (0..6).map(|i| pdf_file(&format!("x{i}.pdf"), 1)).collect();
        let report = session.add_files(more).unwrap();
        assert!(report.is_rejected());
        assert_eq!(
            report.fatal(),
            Some(&ValidationError::TooManyFiles { count: 21, max: 20 })
        );
        assert_eq!(session.files().len(), 15);
    }

    #[test]
    fn test_single_file_tool_replaces_and_seeds_range() {
        let mut session = new_session(ToolKind::Split);
        session.add_files(vec![pdf_file("a.pdf", 3)]).unwrap();
        session.add_files(vec![pdf_file("b.pdf", 7)]).unwrap();

        assert_eq!(names(&session), vec!["b.pdf"]);
        assert_eq!(session.suggested_range(), Some(PageRange::new(1, 7)));
        assert_eq!(session.file_info(0).unwrap().page_count, 7);
    }

    #[test]
    fn test_single_file_tool_rejects_two_files() {
        let mut session = new_session(ToolKind::Rotate);
        let report = session
            .add_files(vec![pdf_file("a.pdf", 1), pdf_file("b.pdf", 1)])
            .unwrap();
        assert!(report.is_rejected());
        assert!(session.files().is_empty());
    }

    #[test]
    fn test_reorder() {
        let mut session = new_session(ToolKind::Merge);
        session
            .add_files(vec![pdf_file("a.pdf", 1), pdf_file("b.pdf", 1), pdf_file("c.pdf", 1)])
            .unwrap();

        session.reorder(&[2, 0, 1]).unwrap();
        assert_eq!(names(&session), vec!["c.pdf", "a.pdf", "b.pdf"]);

        assert!(session.reorder(&[0, 0, 1]).is_err());
        assert!(session.reorder(&[0, 1]).is_err());
        assert!(session.reorder(&[0, 1, 5]).is_err());
    }

    #[test]
    fn test_reorder_only_for_merge() {
        let mut session = new_session(ToolKind::Compress);
        session.add_files(vec![pdf_file("a.pdf", 1)]).unwrap();
        assert!(matches!(
            session.reorder(&[0]),
            Err(PdfKitError::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_removing_last_file_resets_state() {
        let mut session = new_session(ToolKind::Rotate);
        session.add_files(vec![pdf_file("a.pdf", 2)]).unwrap();
        session
            .run(Operation::Rotate { degrees: 90 }, &MemoryTarget::new())
            .await
            .unwrap();
        assert_eq!(session.state().status, ProcessingStatus::Success);

        session.remove_file(0).unwrap();
        assert_eq!(session.state().status, ProcessingStatus::Idle);
        assert!(session.remove_file(0).is_err());
    }

    #[tokio::test]
    async fn test_run_rejects_foreign_operation() {
        let mut session = new_session(ToolKind::Compress);
        session.add_files(vec![pdf_file("a.pdf", 1)]).unwrap();
        let result = session
            .run(Operation::Rotate { degrees: 90 }, &MemoryTarget::new())
            .await;
        assert!(matches!(result, Err(PdfKitError::UnsupportedOperation(_))));
    }

    #[tokio::test]
    async fn test_detached_run_sees_snapshot() {
        let mut session = new_session(ToolKind::Merge);
        session
            .add_files(vec![pdf_file("a.pdf", 1), pdf_file("b.pdf", 1)])
            .unwrap();
        let request = session.request(Operation::Merge).unwrap();
        let pipeline = session.pipeline();

        // Later edits do not leak into the snapshot
        session.add_files(vec![pdf_file("c.pdf", 1)]).unwrap();

        let target = MemoryTarget::new();
        pipeline.run(request, &target).await.unwrap();
        assert_eq!(target.filenames(), vec!["a_merged.pdf"]);
        assert_eq!(session.state().status, ProcessingStatus::Success);
    }

    #[test]
    fn test_request_checks_dpi_limit() {
        let session = new_session(ToolKind::ToImage);
        let options = crate::RasterOptions {
            dpi: 1200,
            ..Default::default()
        };
        assert!(session.request(Operation::Rasterize(options)).is_err());
    }
}
