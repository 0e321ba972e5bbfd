use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{HttpBackend, WorkflowController};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod shell;
mod workflow;

use config::{load_settings, normalize_backend_url, DEFAULT_SETTINGS_FILE};
use workflow::RunOptions;

#[derive(Parser, Debug)]
#[command(name = "geoflow")]
#[command(about = "Upload, reproject, preview and download geospatial files")]
struct Cli {
    /// Settings file, read when present
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Base url of the processing backend
    #[arg(long)]
    backend_url: Option<String>,

    /// Where previews and results are written
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload, process, preview and download in one go
    Run {
        /// Files making up one dataset (e.g. .shp with .shx and .prj)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        skip_preview: bool,

        #[arg(long)]
        skip_download: bool,
    },
    /// Drive the workflow one step at a time from stdin
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config)?;
    if let Some(backend_url) = cli.backend_url {
        settings.backend_url = normalize_backend_url(&backend_url);
    }
    if let Some(output_dir) = cli.output_dir {
        settings.output_dir = output_dir;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let backend = HttpBackend::new(&settings.backend_url)?;
    info!(backend_url = backend.base_url(), output_dir = %settings.output_dir.display(), "geoflow starting");
    let controller = WorkflowController::new(Arc::new(backend));

    match cli.command {
        Command::Run {
            files,
            skip_preview,
            skip_download,
        } => {
            workflow::run_once(
                &controller,
                &files,
                &settings.output_dir,
                RunOptions {
                    skip_preview,
                    skip_download,
                },
            )
            .await
        }
        Command::Shell => shell::run(&controller, &settings.output_dir).await,
    }
}
