//! Command-line arguments

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pdfkit_core::{
    parse_page_ranges, CompressionQuality, Config, Operation, RasterFormat, RasterOptions, ToolKind,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pdfkit")]
#[command(version, about = "Merge, split, rotate, watermark, compress and rasterize PDFs")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory for output files
    #[arg(short, long, global = true, default_value = ".")]
    pub out_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Combine PDFs into one, in the order given
    Merge {
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
    },
    /// Extract page ranges into separate PDFs
    Split {
        file: PathBuf,
        /// Page ranges such as "1-3, 5"
        #[arg(short, long)]
        ranges: String,
    },
    /// Rotate every page
    Rotate {
        file: PathBuf,
        /// Clockwise degrees; negative values rotate counter-clockwise
        #[arg(short, long, allow_hyphen_values = true)]
        degrees: i32,
    },
    /// Stamp a text watermark on every page
    Watermark {
        file: PathBuf,
        #[arg(short, long)]
        text: String,
        /// 0.0 to 1.0 (defaults to the configured opacity)
        #[arg(long)]
        opacity: Option<f32>,
    },
    /// Strip metadata and recompress streams
    Compress {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = QualityArg::Medium)]
        quality: QualityArg,
    },
    /// Render each page to an image
    ToImages {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = FormatArg::Jpg)]
        format: FormatArg,
        /// Resolution (defaults to the configured DPI)
        #[arg(long)]
        dpi: Option<u32>,
    },
    /// Print page count and metadata
    Info {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualityArg {
    Low,
    Medium,
    High,
}

impl From<QualityArg> for CompressionQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => CompressionQuality::Low,
            QualityArg::Medium => CompressionQuality::Medium,
            QualityArg::High => CompressionQuality::High,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Jpg,
    Png,
}

impl From<FormatArg> for RasterFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpg => RasterFormat::Jpg,
            FormatArg::Png => RasterFormat::Png,
        }
    }
}

/// A tool invocation resolved against the configuration.
#[derive(Debug, PartialEq)]
pub struct ToolJob {
    pub tool: ToolKind,
    pub operation: Operation,
    pub inputs: Vec<PathBuf>,
}

impl Command {
    /// `None` for commands that do not run a tool.
    pub fn into_job(self, config: &Config) -> Result<Option<ToolJob>> {
        let (tool, operation, inputs) = match self {
            Command::Merge { files } => (ToolKind::Merge, Operation::Merge, files),
            Command::Split { file, ranges } => (
                ToolKind::Split,
                Operation::Split {
                    ranges: parse_page_ranges(&ranges)?,
                },
                vec![file],
            ),
            Command::Rotate { file, degrees } => {
                if degrees % 90 != 0 {
                    bail!("rotation must be a multiple of 90 degrees, got {}", degrees);
                }
                (ToolKind::Rotate, Operation::Rotate { degrees }, vec![file])
            }
            Command::Watermark {
                file,
                text,
                opacity,
            } => (
                ToolKind::Watermark,
                Operation::Watermark {
                    text,
                    opacity: opacity.unwrap_or(config.watermark.default_opacity),
                },
                vec![file],
            ),
            Command::Compress { file, quality } => (
                ToolKind::Compress,
                Operation::Compress {
                    quality: quality.into(),
                },
                vec![file],
            ),
            Command::ToImages { file, format, dpi } => (
                ToolKind::ToImage,
                Operation::Rasterize(RasterOptions {
                    format: format.into(),
                    dpi: dpi.unwrap_or(config.raster.default_dpi),
                }),
                vec![file],
            ),
            Command::Info { .. } => return Ok(None),
        };

        Ok(Some(ToolJob {
            tool,
            operation,
            inputs,
        }))
    }
}
