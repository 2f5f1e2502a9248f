//! Page rendering
//!
//! Rasterizing pages needs a real PDF renderer (PDFium natively, pdf.js in
//! the browser). Renderers sit behind [`RenderBackend`] and are installed
//! once into a [`RenderEngine`], which may finish loading after the rest of
//! the application is up.

#[cfg(feature = "pdfium")]
mod pdfium;

#[cfg(feature = "pdfium")]
pub use self::pdfium::PdfiumBackend;

use crate::error::PdfKitError;
use async_trait::async_trait;
use image::RgbaImage;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::info;

/// PDF user space unit: 72 points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Products within this distance of a whole pixel count as that pixel.
const PIXEL_EPSILON: f64 = 1e-6;

/// Render scale for a target resolution.
pub fn scale_for_dpi(dpi: u32) -> f64 {
    f64::from(dpi) / POINTS_PER_INCH
}

/// Pixel size of a page rendered at `scale`, floored and at least 1x1.
pub fn pixel_dimensions(width_pts: f64, height_pts: f64, scale: f64) -> (u32, u32) {
    let px = |pts: f64| (pts * scale + PIXEL_EPSILON).floor().max(1.0) as u32;
    (px(width_pts), px(height_pts))
}

/// A renderer able to turn one page of a PDF into RGBA pixels.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait RenderBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn page_count(&self, bytes: &[u8]) -> Result<usize, PdfKitError>;

    /// Render the page at `page_index` (0-based) at `scale` pixels per point.
    async fn render_page(
        &self,
        bytes: &[u8],
        page_index: usize,
        scale: f64,
    ) -> Result<RgbaImage, PdfKitError>;
}

pub type SharedBackend = Arc<dyn RenderBackend>;

/// Lazily initialized holder for the render backend.
///
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct RenderEngine {
    backend: Arc<OnceCell<SharedBackend>>,
}

impl RenderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide engine.
    pub fn global() -> &'static RenderEngine {
        static GLOBAL: OnceLock<RenderEngine> = OnceLock::new();
        GLOBAL.get_or_init(RenderEngine::new)
    }

    pub fn is_ready(&self) -> bool {
        self.backend.initialized()
    }

    /// The installed backend, or `DependencyNotReady` while loading.
    pub fn backend(&self) -> Result<SharedBackend, PdfKitError> {
        self.backend.get().cloned().ok_or_else(|| {
            PdfKitError::DependencyNotReady("PDF renderer has not finished loading".into())
        })
    }

    /// Run `init` at most once. Concurrent callers wait for the same
    /// initialization; a failed attempt leaves the slot empty for a retry.
    pub async fn ensure_ready<F, Fut>(&self, init: F) -> Result<SharedBackend, PdfKitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SharedBackend, PdfKitError>>,
    {
        let backend = self
            .backend
            .get_or_try_init(|| async {
                let backend = init().await?;
                info!(backend = backend.name(), "render backend ready");
                Ok::<_, PdfKitError>(backend)
            })
            .await?;
        Ok(backend.clone())
    }

    /// Install an already constructed backend. Keeps the existing one if
    /// the engine is already initialized.
    pub async fn install(&self, backend: SharedBackend) -> SharedBackend {
        self.backend
            .get_or_init(|| async move { backend })
            .await
            .clone()
    }
}

impl fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("backend", &self.backend.get().map(|b| b.name().to_string()))
            .finish()
    }
}

/// The native backend compiled into this build.
pub fn default_backend() -> Result<SharedBackend, PdfKitError> {
    #[cfg(feature = "pdfium")]
    {
        Ok(Arc::new(PdfiumBackend::bind()?))
    }
    #[cfg(not(feature = "pdfium"))]
    {
        Err(PdfKitError::DependencyNotReady(
            "no native PDF renderer in this build (enable the `pdfium` feature)".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct BlankBackend;

    #[async_trait]
    impl RenderBackend for BlankBackend {
        fn name(&self) -> &str {
            "blank"
        }

        async fn page_count(&self, _bytes: &[u8]) -> Result<usize, PdfKitError> {
            Ok(1)
        }

        async fn render_page(
            &self,
            _bytes: &[u8],
            _page_index: usize,
            scale: f64,
        ) -> Result<RgbaImage, PdfKitError> {
            let (w, h) = pixel_dimensions(612.0, 792.0, scale);
            Ok(RgbaImage::new(w, h))
        }
    }

    #[test]
    fn test_pixel_dimensions_at_150_dpi() {
        assert_eq!(pixel_dimensions(612.0, 792.0, scale_for_dpi(150)), (1275, 1650));
        assert_eq!(pixel_dimensions(612.0, 792.0, scale_for_dpi(72)), (612, 792));
    }

    #[test]
    fn test_pixel_dimensions_common_resolutions() {
        for dpi in [96, 150, 200, 300, 600] {
            let (w, h) = pixel_dimensions(612.0, 792.0, scale_for_dpi(dpi));
            assert_eq!((w, h), (612 * dpi / 72, 792 * dpi / 72), "letter at {} dpi", dpi);
        }
        // A4 at 150 DPI: 1239.58 x 1754.16
        assert_eq!(pixel_dimensions(595.0, 842.0, scale_for_dpi(150)), (1239, 1754));
    }

    #[test]
    fn test_pixel_dimensions_never_zero() {
        assert_eq!(pixel_dimensions(0.2, 0.0, 1.0), (1, 1));
    }

    #[tokio::test]
    async fn test_backend_not_ready_until_installed() {
        let engine = RenderEngine::new();
        assert!(!engine.is_ready());
        assert!(matches!(
            engine.backend(),
            Err(PdfKitError::DependencyNotReady(_))
        ));

        engine.install(Arc::new(BlankBackend)).await;
        assert!(engine.is_ready());
        assert_eq!(engine.backend().unwrap().name(), "blank");
    }

    #[tokio::test]
    async fn test_initializer_runs_once() {
        let engine = RenderEngine::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            engine
                .ensure_ready(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(BlankBackend) as SharedBackend)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_init_can_be_retried() {
        let engine = RenderEngine::new();
        let failed = engine
            .ensure_ready(|| async {
                Err(PdfKitError::DependencyNotReady("still downloading".into()))
            })
            .await;
        let Err(err) = failed else {
            panic!("init should have failed");
        };
        assert!(err.is_retryable());
        assert!(!engine.is_ready());

        engine
            .ensure_ready(|| async { Ok(Arc::new(BlankBackend) as SharedBackend) })
            .await
            .unwrap();
        assert!(engine.is_ready());
    }

    #[tokio::test]
    async fn test_clones_share_backend() {
        let engine = RenderEngine::new();
        let clone = engine.clone();
        engine.install(Arc::new(BlankBackend)).await;
        assert!(clone.is_ready());
    }
}
