//! Stateful tool session
//!
//! Holds the picked files in Rust memory and drives the processing
//! pipeline. JavaScript only forwards files and listens for progress.

use crate::download::BrowserDownloads;
use crate::{to_js, to_js_error};
use pdfkit_core::render::RenderEngine;
use pdfkit_core::validator::ValidationSummary;
use pdfkit_core::{
    Config, LopdfTransform, Operation, PdfKitError, ProcessingState, ProcessingStatus, ToolKind,
    ToolSession, UploadedFile,
};
use js_sys::{Reflect, Uint8Array};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

/// One tool page: its files, its progress and its run button.
#[wasm_bindgen]
pub struct PdfToolSession {
    inner: ToolSession,
    /// Bumped on every `setProgressCallback` so older listeners stop.
    listener: Rc<Cell<u32>>,
}

#[wasm_bindgen]
impl PdfToolSession {
    /// Create a session for a tool slug such as "merge-pdf" or "to-image".
    #[wasm_bindgen(constructor)]
    pub fn new(tool: &str) -> Result<PdfToolSession, JsValue> {
        Self::with_config(tool, &Config::default()).map_err(to_js_error)
    }

    /// Same as the constructor, with limits and defaults read from TOML.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn from_toml(tool: &str, config_toml: &str) -> Result<PdfToolSession, JsValue> {
        let config: Config = config_toml.parse().map_err(to_js_error)?;
        Self::with_config(tool, &config).map_err(to_js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn title(&self) -> String {
        self.inner.spec().title.to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn multiple(&self) -> bool {
        self.inner.spec().multiple()
    }

    /// Validate and add one file. Returns `{ accepted, messages, rejected }`;
    /// a rejected upload is reported, not thrown.
    #[wasm_bindgen(js_name = addFile)]
    pub fn add_file(&mut self, name: &str, mime: Option<String>, bytes: Vec<u8>) -> Result<JsValue, JsValue> {
        let file = UploadedFile::from_bytes(name, mime.as_deref(), bytes);
        let summary = self.add_files_internal(vec![file]).map_err(to_js_error)?;
        to_js(&summary)
    }

    /// Validate a whole drop at once, so per-submission rules (file count,
    /// one file for single-file tools) see every file. Each entry is
    /// `{ name, type, bytes }` with `bytes` a `Uint8Array`.
    #[wasm_bindgen(js_name = addFiles)]
    pub fn add_files(&mut self, files: js_sys::Array) -> Result<JsValue, JsValue> {
        let files = files
            .iter()
            .map(|entry| dropped_file(&entry))
            .collect::<Result<Vec<_>, _>>()?;
        let summary = self.add_files_internal(files).map_err(to_js_error)?;
        to_js(&summary)
    }

    #[wasm_bindgen(js_name = removeFile)]
    pub fn remove_file(&mut self, index: usize) -> Result<(), JsValue> {
        self.inner.remove_file(index).map(|_| ()).map_err(to_js_error)
    }

    /// `order` lists current indices in their new order.
    #[wasm_bindgen(js_name = reorderFiles)]
    pub fn reorder_files(&mut self, order: &[usize]) -> Result<(), JsValue> {
        self.inner.reorder(order).map_err(to_js_error)
    }

    pub fn clear(&mut self) -> Result<(), JsValue> {
        self.inner.clear().map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = fileNames)]
    pub fn file_names(&self) -> Vec<String> {
        self.file_names_internal()
    }

    #[wasm_bindgen(js_name = fileInfo)]
    pub fn file_info(&self, index: usize) -> Result<JsValue, JsValue> {
        let info = self.inner.file_info(index).map_err(to_js_error)?;
        to_js(&info)
    }

    /// `{ start, end }` covering the whole document, for the split form.
    #[wasm_bindgen(js_name = suggestedRange)]
    pub fn suggested_range(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.suggested_range())
    }

    /// `{ status, progress, message }`
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.state())
    }

    /// Callback signature: (status: string, progress: number, message: string | null) => void
    ///
    /// Fires once with the current state, then on every change.
    #[wasm_bindgen(js_name = setProgressCallback)]
    pub fn set_progress_callback(&mut self, callback: js_sys::Function) {
        let generation = self.listener.get().wrapping_add(1);
        self.listener.set(generation);

        let listener = Rc::clone(&self.listener);
        let mut state = self.inner.subscribe();
        spawn_local(async move {
            while listener.get() == generation {
                let snapshot = state.borrow_and_update().clone();
                report_progress(&callback, &snapshot);
                if state.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    /// Run the tool and download the results. `operation` is a tagged
    /// object such as `{ type: "rotate", degrees: 90 }`. Resolves to the
    /// downloaded file names.
    pub fn run(&self, operation: JsValue) -> Result<js_sys::Promise, JsValue> {
        let operation: Operation = serde_wasm_bindgen::from_value(operation)
            .map_err(|e| JsValue::from_str(&format!("Invalid operation: {}", e)))?;
        let request = self.inner.request(operation).map_err(to_js_error)?;
        let pipeline = self.inner.pipeline();

        Ok(future_to_promise(async move {
            let result = pipeline
                .run(request, &BrowserDownloads)
                .await
                .map_err(to_js_error)?;
            let names: Vec<String> = result.files.into_iter().map(|f| f.filename).collect();
            to_js(&names)
        }))
    }
}

impl PdfToolSession {
    fn with_config(tool: &str, config: &Config) -> Result<Self, PdfKitError> {
        let kind = ToolKind::from_slug(tool)
            .ok_or_else(|| PdfKitError::UnsupportedOperation(format!("Unknown tool: {}", tool)))?;
        let transform = LopdfTransform::new(RenderEngine::global().clone())
            .with_watermark_style(config.watermark.style())
            .with_jpeg_quality(config.raster.jpeg_quality);

        Ok(Self {
            inner: ToolSession::new(kind, config, Arc::new(transform)),
            listener: Rc::new(Cell::new(0)),
        })
    }

    fn add_files_internal(&mut self, files: Vec<UploadedFile>) -> Result<ValidationSummary, PdfKitError> {
        let report = self.inner.add_files(files)?;
        Ok(report.summary())
    }

    fn file_names_internal(&self) -> Vec<String> {
        self.inner.files().iter().map(|f| f.name().to_string()).collect()
    }
}

fn dropped_file(entry: &JsValue) -> Result<UploadedFile, JsValue> {
    let field = |key: &str| Reflect::get(entry, &JsValue::from_str(key));
    let name = field("name")?
        .as_string()
        .ok_or_else(|| JsValue::from_str("Each file needs a name"))?;
    let mime = field("type")?.as_string().filter(|m| !m.is_empty());
    let bytes = field("bytes")?
        .dyn_into::<Uint8Array>()
        .map_err(|_| JsValue::from_str(&format!("{}: bytes must be a Uint8Array", name)))?;
    Ok(UploadedFile::from_bytes(name, mime.as_deref(), bytes.to_vec()))
}

fn status_name(status: ProcessingStatus) -> &'static str {
    match status {
        ProcessingStatus::Idle => "idle",
        ProcessingStatus::Processing => "processing",
        ProcessingStatus::Success => "success",
        ProcessingStatus::Error => "error",
    }
}

fn report_progress(callback: &js_sys::Function, state: &ProcessingState) {
    let message = state
        .message
        .as_deref()
        .map(JsValue::from_str)
        .unwrap_or(JsValue::NULL);
    let _ = callback.call3(
        &JsValue::NULL,
        &JsValue::from_str(status_name(state.status)),
        &JsValue::from(state.progress),
        &message,
    );
}
