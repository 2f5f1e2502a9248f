use thiserror::Error;

/// Batch-level rejection reasons surfaced before any processing starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No files selected")]
    EmptyBatch,

    #[error("Some files were rejected, only {accept} files are supported: {}", rejected.join(", "))]
    TypeMismatch {
        rejected: Vec<String>,
        accept: String,
    },

    #[error("Please upload a maximum of {max} files at once (got {count})")]
    TooManyFiles { count: usize, max: usize },

    #[error("Some files exceed the maximum size of {}: {}", crate::format_bytes(*max_bytes as usize), names.join(", "))]
    OversizedFile { names: Vec<String>, max_bytes: u64 },

    #[error("Please upload only one file (got {count})")]
    MultipleNotAllowed { count: usize },

    #[error("{operation} needs at least {min} files (got {count})")]
    TooFewFiles {
        operation: String,
        min: usize,
        count: usize,
    },
}

impl ValidationError {
    /// Type mismatches drop the offending files but let the rest through.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ValidationError::TypeMismatch { .. })
    }
}

#[derive(Error, Debug)]
pub enum PdfKitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to parse PDF: {0}")]
    MalformedDocument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Dependency not ready: {0}")]
    DependencyNotReady(String),

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfKitError {
    /// Only a renderer that is still loading is worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PdfKitError::DependencyNotReady(_))
    }

    /// Message shown next to the progress indicator.
    pub fn user_message(&self) -> String {
        match self {
            PdfKitError::MalformedDocument(_) => {
                "The file could not be read as a PDF document.".to_string()
            }
            PdfKitError::DependencyNotReady(_) => {
                "The PDF renderer is still loading. Please try again in a moment.".to_string()
            }
            PdfKitError::Busy => "Please wait for the current operation to finish.".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_dependency_not_ready_is_retryable() {
        assert!(PdfKitError::DependencyNotReady("pdf.js".into()).is_retryable());
        assert!(!PdfKitError::MalformedDocument("bad xref".into()).is_retryable());
        assert!(!PdfKitError::Busy.is_retryable());
    }

    #[test]
    fn test_type_mismatch_is_not_fatal() {
        let err = ValidationError::TypeMismatch {
            rejected: vec!["notes.txt".into()],
            accept: ".pdf".into(),
        };
        assert!(!err.is_fatal());
        assert!(ValidationError::MultipleNotAllowed { count: 2 }.is_fatal());
    }

    #[test]
    fn test_validation_error_converts() {
        let err: PdfKitError = ValidationError::EmptyBatch.into();
        assert!(matches!(err, PdfKitError::Validation(ValidationError::EmptyBatch)));
        assert_eq!(err.user_message(), "No files selected");
    }
}
