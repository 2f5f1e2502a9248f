//! pdfkit command-line tool
//!
//! Runs one PDF tool per invocation and writes its outputs to a directory.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command, ToolJob};
use pdfkit_core::render::{self, RenderEngine};
use pdfkit_core::tool::ToolSession;
use pdfkit_core::{format_bytes, inspect, Config, DirectoryTarget, LopdfTransform, ProcessingStatus, ToolKind, UploadedFile};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries output paths
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Command::Info { files } = &cli.command {
        return print_info(files);
    }

    let Some(job) = cli.command.into_job(&config)? else {
        return Ok(());
    };
    run_job(job, &config, cli.out_dir).await
}

async fn run_job(job: ToolJob, config: &Config, out_dir: PathBuf) -> Result<()> {
    let engine = RenderEngine::global();
    if job.tool == ToolKind::ToImage {
        engine
            .ensure_ready(|| async { render::default_backend() })
            .await
            .context("No page renderer available")?;
    }

    let transform = LopdfTransform::new(engine.clone())
        .with_watermark_style(config.watermark.style())
        .with_jpeg_quality(config.raster.jpeg_quality);
    let mut session = ToolSession::new(job.tool, config, Arc::new(transform));
    tracing::info!(tool = session.spec().title, inputs = job.inputs.len(), "starting");

    let files = job
        .inputs
        .iter()
        .map(|path| {
            UploadedFile::from_path(path).with_context(|| format!("Cannot open {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let report = session.add_files(files)?;
    for message in &report.summary().messages {
        tracing::warn!("{}", message);
    }
    if let Some(violation) = report.fatal() {
        bail!("{}", violation);
    }

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Cannot create output directory {}", out_dir.display()))?;
    let target = DirectoryTarget::new(&out_dir);

    let reporter = tokio::spawn(report_progress(session.subscribe()));
    let result = session.run(job.operation, &target).await;
    reporter.abort();

    let result = result.with_context(|| format!("{} failed", session.spec().title))?;
    for file in &result.files {
        println!("{}", target.path_for(file).display());
    }
    tracing::info!(
        outputs = result.files.len(),
        size = %format_bytes(result.total_bytes()),
        "done"
    );
    Ok(())
}

/// Log each progress change until the run finishes.
async fn report_progress(mut state: watch::Receiver<pdfkit_core::ProcessingState>) {
    while state.changed().await.is_ok() {
        let current = state.borrow_and_update().clone();
        tracing::info!(
            status = ?current.status,
            progress = current.progress,
            message = current.message.as_deref().unwrap_or(""),
            "progress"
        );
        if matches!(current.status, ProcessingStatus::Success | ProcessingStatus::Error) {
            break;
        }
    }
}

fn print_info(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
        let info = inspect(&bytes).with_context(|| format!("{} is not a readable PDF", path.display()))?;

        println!("{}", path.display());
        println!("  pages:     {}", info.page_count);
        println!("  version:   {}", info.version);
        println!("  size:      {}", format_bytes(info.size_bytes));
        if let Some((width, height)) = info.first_page_size {
            println!("  page size: {:.0} x {:.0} pt", width, height);
        }
        if info.encrypted {
            println!("  encrypted: yes");
        }
        if let Some(title) = &info.title {
            println!("  title:     {}", title);
        }
        if let Some(author) = &info.author {
            println!("  author:    {}", author);
        }
    }
    Ok(())
}
