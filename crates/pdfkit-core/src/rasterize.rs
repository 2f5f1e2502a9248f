//! PDF to images
//!
//! Renders pages one at a time through the installed [`RenderBackend`] and
//! encodes each as JPEG or PNG.

use crate::error::PdfKitError;
use crate::render::{scale_for_dpi, RenderBackend};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_DPI: u32 = 150;
pub const MAX_DPI: u32 = 600;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    #[default]
    #[serde(alias = "jpeg")]
    Jpg,
    Png,
}

impl RasterFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Jpg => "jpg",
            RasterFormat::Png => "png",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            RasterFormat::Jpg => "image/jpeg",
            RasterFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for RasterFormat {
    type Err = PdfKitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(RasterFormat::Jpg),
            "png" => Ok(RasterFormat::Png),
            other => Err(PdfKitError::UnsupportedOperation(format!(
                "Unknown image format: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterOptions {
    #[serde(default)]
    pub format: RasterFormat,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_dpi() -> u32 {
    DEFAULT_DPI
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            format: RasterFormat::default(),
            dpi: DEFAULT_DPI,
        }
    }
}

/// One encoded page image.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 1-based page number
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Called after each page with `(pages_done, total_pages)`.
pub type PageProgress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Render and encode every page, in order.
pub async fn rasterize_document(
    backend: &dyn RenderBackend,
    bytes: &[u8],
    options: &RasterOptions,
    jpeg_quality: u8,
    on_page: PageProgress<'_>,
) -> Result<Vec<RasterPage>, PdfKitError> {
    if options.dpi == 0 {
        return Err(PdfKitError::UnsupportedOperation(
            "Resolution must be at least 1 DPI".into(),
        ));
    }

    let total = backend.page_count(bytes).await?;
    if total == 0 {
        return Err(PdfKitError::MalformedDocument("PDF has no pages".into()));
    }

    let scale = scale_for_dpi(options.dpi);
    let mut pages = Vec::with_capacity(total);
    for index in 0..total {
        let image = backend.render_page(bytes, index, scale).await?;
        let encoded = encode_image(&image, options.format, jpeg_quality)?;
        debug!(
            page = index + 1,
            width = image.width(),
            height = image.height(),
            bytes = encoded.len(),
            "rendered page"
        );

        pages.push(RasterPage {
            page_number: index as u32 + 1,
            width: image.width(),
            height: image.height(),
            bytes: encoded,
        });
        on_page(index + 1, total);
    }

    Ok(pages)
}

/// Encode RGBA pixels. JPEG drops the alpha channel.
pub fn encode_image(
    image: &RgbaImage,
    format: RasterFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, PdfKitError> {
    let mut buffer = Vec::new();
    let result = match format {
        RasterFormat::Png => PngEncoder::new(&mut buffer).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        ),
        RasterFormat::Jpg => {
            let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
        }
    };
    result.map_err(|e| PdfKitError::Encode(e.to_string()))?;
    Ok(buffer)
}
