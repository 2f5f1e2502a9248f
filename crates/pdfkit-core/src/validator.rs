//! Upload validation
//!
//! Checks a candidate batch against the accept filter, the file-count limit
//! and the size limit before anything is parsed. Checks run in a fixed
//! order and the first fatal rule rejects the whole batch.

use crate::error::{PdfKitError, ValidationError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

const MEGABYTE: u64 = 1024 * 1024;

#[derive(Clone)]
enum FileSource {
    Memory,
    Disk(PathBuf),
}

/// A user-supplied file: name, declared size and type, and lazily read bytes.
///
/// Clones share the content cache, so bytes are read at most once.
#[derive(Clone)]
pub struct UploadedFile {
    name: String,
    size: u64,
    mime: Option<String>,
    source: FileSource,
    content: Arc<OnceLock<Arc<[u8]>>>,
}

/// Ordered list of uploaded files.
pub type FileBatch = Vec<UploadedFile>;

impl UploadedFile {
    pub fn from_bytes(name: impl Into<String>, mime: Option<&str>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let content = OnceLock::new();
        let size = bytes.len() as u64;
        let _ = content.set(bytes);

        Self {
            name: name.into(),
            size,
            mime: mime.filter(|m| !m.is_empty()).map(str::to_string),
            source: FileSource::Memory,
            content: Arc::new(content),
        }
    }

    /// Describe a file on disk without reading it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PdfKitError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_from_name(&name).map(str::to_string);

        Ok(Self {
            name,
            size: metadata.len(),
            mime,
            source: FileSource::Disk(path.to_path_buf()),
            content: Arc::new(OnceLock::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    /// Lowercased extension including the dot, e.g. ".pdf".
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_ascii_lowercase()))
    }

    /// File bytes, read from disk on first access.
    pub fn content(&self) -> Result<Arc<[u8]>, PdfKitError> {
        if let Some(bytes) = self.content.get() {
            return Ok(bytes.clone());
        }
        let bytes: Arc<[u8]> = match &self.source {
            FileSource::Disk(path) => std::fs::read(path)?.into(),
            FileSource::Memory => {
                return Err(PdfKitError::InvalidState(format!(
                    "no content available for {}",
                    self.name
                )))
            }
        };
        Ok(self.content.get_or_init(|| bytes).clone())
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime", &self.mime)
            .field("loaded", &self.content.get().is_some())
            .finish()
    }
}

fn mime_from_name(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Limits applied to one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    /// Extensions (".pdf") or media types ("application/pdf")
    pub accept: Vec<String>,
    pub multiple: bool,
    pub max_files: usize,
    pub max_size_bytes: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            accept: vec![".pdf".to_string()],
            multiple: false,
            max_files: 10,
            max_size_bytes: 50 * MEGABYTE,
        }
    }
}

impl ValidatorConfig {
    pub fn with_max_size_mb(mut self, megabytes: u64) -> Self {
        self.max_size_bytes = megabytes * MEGABYTE;
        self
    }

    /// Parse an HTML-style accept list such as ".pdf, application/pdf".
    pub fn parse_accept(accept: &str) -> Vec<String> {
        accept
            .split(',')
            .map(|token| token.trim().to_ascii_lowercase())
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// Exact match on extension or media type. A ".pdf" filter also
    /// admits files declared as application/pdf.
    pub fn accepts(&self, file: &UploadedFile) -> bool {
        if self.accept.is_empty() {
            return true;
        }
        let extension = file.extension();
        let mime = file.mime().map(str::to_ascii_lowercase);

        self.accept.iter().any(|token| {
            if token.starts_with('.') {
                extension.as_deref() == Some(token.as_str())
                    || (token == ".pdf" && mime.as_deref() == Some("application/pdf"))
            } else {
                mime.as_deref() == Some(token.as_str())
            }
        })
    }
}

/// Outcome of validating one batch.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub accepted: FileBatch,
    pub violations: Vec<ValidationError>,
}

impl ValidationReport {
    /// True when a fatal rule fired and nothing may be added.
    pub fn is_rejected(&self) -> bool {
        self.fatal().is_some()
    }

    pub fn fatal(&self) -> Option<&ValidationError> {
        self.violations.iter().find(|v| v.is_fatal())
    }

    /// Turn a new violation into a whole-batch rejection.
    pub fn reject(&mut self, violation: ValidationError) {
        self.accepted.clear();
        self.violations.push(violation);
    }

    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            accepted: self.accepted.iter().map(|f| f.name().to_string()).collect(),
            messages: self.violations.iter().map(ToString::to_string).collect(),
            rejected: self.is_rejected(),
        }
    }
}

/// Serializable view of a [`ValidationReport`] for UI layers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationSummary {
    pub accepted: Vec<String>,
    pub messages: Vec<String>,
    pub rejected: bool,
}

/// Validate a candidate batch. Pure: the same input always yields the same
/// report.
pub fn validate(files: &[UploadedFile], config: &ValidatorConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    let (matching, mismatched): (Vec<&UploadedFile>, Vec<&UploadedFile>) =
        files.iter().partition(|f| config.accepts(f));
    if !mismatched.is_empty() {
        report.violations.push(ValidationError::TypeMismatch {
            rejected: mismatched.iter().map(|f| f.name().to_string()).collect(),
            accept: config.accept.join(", "),
        });
    }

    if config.multiple && matching.len() > config.max_files {
        report.reject(ValidationError::TooManyFiles {
            count: matching.len(),
            max: config.max_files,
        });
        return report;
    }

    let oversized: Vec<String> = matching
        .iter()
        .filter(|f| f.size() > config.max_size_bytes)
        .map(|f| f.name().to_string())
        .collect();
    if !oversized.is_empty() {
        report.reject(ValidationError::OversizedFile {
            names: oversized,
            max_bytes: config.max_size_bytes,
        });
        return report;
    }

    if !config.multiple && matching.len() > 1 {
        report.reject(ValidationError::MultipleNotAllowed {
            count: matching.len(),
        });
        return report;
    }

    report.accepted = matching.into_iter().cloned().collect();
    report
}
