//! Transform pipeline
//!
//! Runs one operation at a time. State lives in a `watch` channel so any
//! number of observers (progress bars, CLI loggers) can follow along:
//!
//! ```text
//! Idle -> Processing -> Success | Error
//! ```
//!
//! Rejected requests never leave the current state; a second run while one
//! is in flight is refused with `Busy`.

use crate::delivery::{self, derive_filename, name_pdf_outputs, OutputFile, SaveTarget, TransformResult};
use crate::error::{PdfKitError, ValidationError};
use crate::rasterize::RasterPage;
use crate::transform::{DocumentTransform, Operation, OperationKind, TransformRequest};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Progress checkpoints, in percent.
pub mod progress {
    pub const ACCEPTED: u8 = 10;
    pub const STARTED: u8 = 30;
    pub const RETURNED: u8 = 70;
    pub const DONE: u8 = 100;
    /// Share of the bar spread across rasterized pages, starting at `STARTED`.
    pub const RASTER_SPAN: u8 = 60;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Idle,
    Processing,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingState {
    pub status: ProcessingStatus,
    /// 0..=100, never decreases within a run
    pub progress: u8,
    pub message: Option<String>,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            status: ProcessingStatus::Idle,
            progress: 0,
            message: None,
        }
    }
}

impl ProcessingState {
    pub fn is_processing(&self) -> bool {
        self.status == ProcessingStatus::Processing
    }
}

/// Progress after `done` of `total` pages have been rasterized.
pub fn raster_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return progress::STARTED;
    }
    let share = done.min(total) * progress::RASTER_SPAN as usize / total;
    progress::STARTED + share as u8
}

pub struct Pipeline {
    transform: Arc<dyn DocumentTransform>,
    state: watch::Sender<ProcessingState>,
}

impl Pipeline {
    pub fn new(transform: Arc<dyn DocumentTransform>) -> Self {
        let (state, _) = watch::channel(ProcessingState::default());
        Self { transform, state }
    }

    pub fn state(&self) -> ProcessingState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.state.subscribe()
    }

    /// Back to Idle. Refused while an operation is running.
    pub fn reset(&self) -> Result<(), PdfKitError> {
        let reset = self.state.send_if_modified(|state| {
            if state.is_processing() {
                return false;
            }
            *state = ProcessingState::default();
            true
        });
        if reset {
            Ok(())
        } else {
            Err(PdfKitError::Busy)
        }
    }

    /// Validate, transform and deliver.
    ///
    /// Precondition failures (empty batch, bad parameters, renderer still
    /// loading) leave the status untouched and only set the message. Once
    /// accepted, the run ends in Success or Error.
    ///
    /// Success is only published after every output has been saved. A save
    /// failure ends the run in Error, but outputs saved before it stay
    /// where the target put them.
    #[instrument(skip_all, fields(operation = %request.operation.kind(), files = request.batch.len()))]
    pub async fn run(
        &self,
        request: TransformRequest,
        target: &dyn SaveTarget,
    ) -> Result<TransformResult, PdfKitError> {
        if self.state.borrow().is_processing() {
            warn!("rejected: another operation is running");
            return Err(PdfKitError::Busy);
        }

        if let Err(err) = self.check_preconditions(&request) {
            warn!(error = %err, "rejected before processing");
            self.note(err.user_message());
            return Err(err);
        }

        let entered = self.state.send_if_modified(|state| {
            if state.is_processing() {
                return false;
            }
            *state = ProcessingState {
                status: ProcessingStatus::Processing,
                progress: progress::ACCEPTED,
                message: Some("Processing...".to_string()),
            };
            true
        });
        if !entered {
            return Err(PdfKitError::Busy);
        }

        match self.execute(&request, target).await {
            Ok(result) => {
                info!(outputs = result.files.len(), bytes = result.total_bytes(), "operation complete");
                let message = match result.files.len() {
                    1 => format!("{} is ready", result.files[0].filename),
                    n => format!("{} files are ready", n),
                };
                self.state.send_modify(|state| {
                    *state = ProcessingState {
                        status: ProcessingStatus::Success,
                        progress: progress::DONE,
                        message: Some(message),
                    };
                });
                Ok(result)
            }
            Err(err) => {
                error!(error = %err, "operation failed");
                self.state.send_modify(|state| {
                    state.status = ProcessingStatus::Error;
                    state.message = Some(err.user_message());
                });
                Err(err)
            }
        }
    }

    fn check_preconditions(&self, request: &TransformRequest) -> Result<(), PdfKitError> {
        let kind = request.operation.kind();
        let count = request.batch.len();

        if count == 0 {
            return Err(ValidationError::EmptyBatch.into());
        }
        if count < kind.min_files() {
            return Err(ValidationError::TooFewFiles {
                operation: kind.to_string(),
                min: kind.min_files(),
                count,
            }
            .into());
        }
        if !kind.accepts_multiple() && count > 1 {
            return Err(ValidationError::MultipleNotAllowed { count }.into());
        }

        request.operation.validate()?;
        self.transform.ready_for(kind)
    }

    async fn execute(
        &self,
        request: &TransformRequest,
        target: &dyn SaveTarget,
    ) -> Result<TransformResult, PdfKitError> {
        let source_name = request.batch[0].name().to_string();
        let inputs = request
            .batch
            .iter()
            .map(|file| file.content())
            .collect::<Result<Vec<_>, _>>()?;
        let first = &inputs[0];
        let kind = request.operation.kind();

        self.advance(progress::STARTED);
        let files = match &request.operation {
            Operation::Merge => {
                let merged = self.transform.merge(&inputs).await?;
                name_pdf_outputs(kind, &source_name, vec![merged])
            }
            Operation::Split { ranges } => {
                let parts = self.transform.split(first, ranges).await?;
                name_pdf_outputs(kind, &source_name, parts)
            }
            Operation::Rotate { degrees } => {
                let rotated = self.transform.rotate(first, *degrees).await?;
                name_pdf_outputs(kind, &source_name, vec![rotated])
            }
            Operation::Watermark { text, opacity } => {
                let stamped = self.transform.watermark(first, text, *opacity).await?;
                name_pdf_outputs(kind, &source_name, vec![stamped])
            }
            Operation::Compress { quality } => {
                let compressed = self.transform.compress(first, *quality).await?;
                name_pdf_outputs(kind, &source_name, vec![compressed])
            }
            Operation::Rasterize(options) => {
                let on_page = |done: usize, total: usize| self.advance(raster_progress(done, total));
                let pages = self.transform.rasterize(first, options, &on_page).await?;
                name_raster_outputs(&source_name, options.format.extension(), options.format.mime(), pages)
            }
        };
        self.advance(progress::RETURNED);

        let result = TransformResult {
            operation: kind,
            files,
        };
        delivery::deliver(&result, target)?;
        Ok(result)
    }

    /// Raise progress, never lower it.
    fn advance(&self, value: u8) {
        self.state.send_if_modified(|state| {
            if !state.is_processing() || value <= state.progress {
                return false;
            }
            state.progress = value.min(progress::DONE);
            true
        });
    }

    fn note(&self, message: String) {
        self.state.send_if_modified(|state| {
            if state.is_processing() {
                return false;
            }
            state.message = Some(message);
            true
        });
    }
}

fn name_raster_outputs(source_name: &str, extension: &str, mime: &'static str, pages: Vec<RasterPage>) -> Vec<OutputFile> {
    pages
        .into_iter()
        .map(|page| OutputFile {
            filename: derive_filename(
                source_name,
                OperationKind::Rasterize.output_suffix(),
                Some(page.page_number as usize),
                extension,
            ),
            mime,
            bytes: page.bytes,
        })
        .collect()
}
