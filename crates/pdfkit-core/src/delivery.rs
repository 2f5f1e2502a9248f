//! Output naming and delivery
//!
//! Every transform result is named after the first input file and handed to
//! a [`SaveTarget`]: a directory for the CLI, the browser's download
//! mechanism for the web app, or memory for tests.

use crate::error::PdfKitError;
use crate::transform::OperationKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

pub const PDF_MIME: &str = "application/pdf";

/// One named output buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub operation: OperationKind,
    pub files: Vec<OutputFile>,
}

impl TransformResult {
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.bytes.len()).sum()
    }
}

/// Drop a trailing ".pdf" (any case) from a file name.
pub fn file_stem(source_name: &str) -> &str {
    let len = source_name.len();
    if len >= 4 && source_name.is_char_boundary(len - 4) && source_name[len - 4..].eq_ignore_ascii_case(".pdf") {
        &source_name[..len - 4]
    } else {
        source_name
    }
}

/// `report.pdf` + `_compressed` -> `report_compressed.pdf`; with an index,
/// `report_split_2.pdf`.
pub fn derive_filename(source_name: &str, suffix: &str, index: Option<usize>, extension: &str) -> String {
    let stem = file_stem(source_name);
    match index {
        Some(i) => format!("{}{}_{}.{}", stem, suffix, i, extension),
        None => format!("{}{}.{}", stem, suffix, extension),
    }
}

/// Name PDF outputs. A single output carries no index.
pub fn name_pdf_outputs(kind: OperationKind, source_name: &str, buffers: Vec<Vec<u8>>) -> Vec<OutputFile> {
    let numbered = buffers.len() > 1;
    buffers
        .into_iter()
        .enumerate()
        .map(|(i, bytes)| OutputFile {
            filename: derive_filename(
                source_name,
                kind.output_suffix(),
                numbered.then_some(i + 1),
                "pdf",
            ),
            mime: PDF_MIME,
            bytes,
        })
        .collect()
}

/// Where finished files go.
pub trait SaveTarget: Send + Sync {
    fn save(&self, file: &OutputFile) -> Result<(), PdfKitError>;
}

/// Save every file in order, stopping at the first failure. Files saved
/// before the failure are not rolled back.
pub fn deliver(result: &TransformResult, target: &dyn SaveTarget) -> Result<(), PdfKitError> {
    for file in &result.files {
        target.save(file)?;
        info!(filename = %file.filename, bytes = file.bytes.len(), "delivered output");
    }
    Ok(())
}

/// Writes outputs into a directory, overwriting same-named files.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file: &OutputFile) -> PathBuf {
        self.dir.join(&file.filename)
    }
}

impl SaveTarget for DirectoryTarget {
    fn save(&self, file: &OutputFile) -> Result<(), PdfKitError> {
        let path = self.path_for(file);
        std::fs::write(&path, &file.bytes)
            .map_err(|e| PdfKitError::Delivery(format!("{}: {}", path.display(), e)))
    }
}

/// Collects outputs in memory.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    files: Mutex<Vec<OutputFile>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.lock().iter().map(|f| f.filename.clone()).collect()
    }

    pub fn take(&self) -> Vec<OutputFile> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<OutputFile>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SaveTarget for MemoryTarget {
    fn save(&self, file: &OutputFile) -> Result<(), PdfKitError> {
        self.lock().push(file.clone());
        Ok(())
    }
}
