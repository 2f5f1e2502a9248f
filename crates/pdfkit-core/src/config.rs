//! Configuration parsing
//!
//! Upload limits, rasterization defaults and watermark appearance, loaded
//! from TOML. Every section and field is optional and falls back to the
//! defaults below.
//!
//! ```toml
//! [limits]
//! max_files = 10
//! merge_max_files = 20
//! max_size_mb = 50
//! accept = [".pdf"]
//!
//! [raster]
//! default_dpi = 150
//! jpeg_quality = 85
//! max_dpi = 600
//!
//! [watermark]
//! font_size = 24.0
//! gray = 0.5
//! angle_degrees = 45.0
//! default_opacity = 0.3
//! ```

use crate::error::PdfKitError;
use crate::rasterize::{DEFAULT_DPI, DEFAULT_JPEG_QUALITY, MAX_DPI};
use crate::transform::DEFAULT_WATERMARK_OPACITY;
use crate::validator::ValidatorConfig;
use crate::watermark::WatermarkStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: LimitsConfig,
    pub raster: RasterConfig,
    pub watermark: WatermarkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum files per upload for single-file tools' drop zones
    pub max_files: usize,
    /// Maximum files a merge session may hold in total
    pub merge_max_files: usize,
    /// Per-file size limit in megabytes
    pub max_size_mb: u64,
    /// Accepted extensions or media types
    pub accept: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let defaults = ValidatorConfig::default();
        Self {
            max_files: defaults.max_files,
            merge_max_files: 20,
            max_size_mb: 50,
            accept: defaults.accept,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub default_dpi: u32,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    pub max_dpi: u32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            default_dpi: DEFAULT_DPI,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_dpi: MAX_DPI,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub font_size: f32,
    pub gray: f32,
    pub angle_degrees: f32,
    pub default_opacity: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        let style = WatermarkStyle::default();
        Self {
            font_size: style.font_size,
            gray: style.gray,
            angle_degrees: style.angle_degrees,
            default_opacity: DEFAULT_WATERMARK_OPACITY,
        }
    }
}

impl WatermarkConfig {
    pub fn style(&self) -> WatermarkStyle {
        WatermarkStyle {
            font_size: self.font_size,
            gray: self.gray,
            angle_degrees: self.angle_degrees,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `PdfKitError::Config` if the file cannot be read, the TOML
    /// is malformed or a value is out of range.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pdfkit_core::config::Config;
    ///
    /// # fn example() -> Result<(), pdfkit_core::PdfKitError> {
    /// let config = Config::from_file("pdfkit.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PdfKitError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PdfKitError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        content.parse()
    }

    /// Reject values no tool can work with.
    pub fn validate(&self) -> Result<(), PdfKitError> {
        if self.limits.max_files == 0 || self.limits.merge_max_files < 2 {
            return Err(PdfKitError::Config(
                "limits.max_files must be at least 1 and limits.merge_max_files at least 2".into(),
            ));
        }
        if self.limits.max_size_mb == 0 {
            return Err(PdfKitError::Config("limits.max_size_mb must be positive".into()));
        }
        if !(1..=100).contains(&self.raster.jpeg_quality) {
            return Err(PdfKitError::Config(
                "raster.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.raster.default_dpi == 0 || self.raster.default_dpi > self.raster.max_dpi {
            return Err(PdfKitError::Config(format!(
                "raster.default_dpi must be between 1 and {}",
                self.raster.max_dpi
            )));
        }
        if self.raster.max_dpi > MAX_DPI {
            return Err(PdfKitError::Config(format!(
                "raster.max_dpi may not exceed {}",
                MAX_DPI
            )));
        }
        if !(0.0..=1.0).contains(&self.watermark.default_opacity)
            || !(0.0..=1.0).contains(&self.watermark.gray)
        {
            return Err(PdfKitError::Config(
                "watermark.default_opacity and watermark.gray must be between 0 and 1".into(),
            ));
        }
        if self.watermark.font_size <= 0.0 {
            return Err(PdfKitError::Config("watermark.font_size must be positive".into()));
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = PdfKitError;

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use pdfkit_core::config::Config;
    ///
    /// let config: Config = "[raster]\ndefault_dpi = 300".parse().unwrap();
    /// assert_eq!(config.raster.default_dpi, 300);
    /// assert_eq!(config.limits.max_size_mb, 50);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(s).map_err(|e| PdfKitError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
