//! Helpers shared by the one-shot and interactive front ends.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use client_core::{
    DownloadLink, FileSelection, PreviewFrame, WorkflowController, WorkflowEvent,
};
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_preview: bool,
    pub skip_download: bool,
}

/// Prints every pending notification; returns how many were shown.
pub fn print_alerts(rx: &mut broadcast::Receiver<WorkflowEvent>) -> usize {
    let mut shown = 0;
    loop {
        match rx.try_recv() {
            Ok(WorkflowEvent::Alert(text)) => {
                println!("{text}");
                shown += 1;
            }
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "notification receiver lagged");
            }
            Err(_) => break,
        }
    }
    shown
}

pub fn warn_missing_sidecars(selection: &FileSelection) {
    let missing = selection.missing_shapefile_sidecars();
    if !missing.is_empty() {
        warn!(
            missing = ?missing,
            "shapefile selected without required sidecar files; the backend will reject it"
        );
    }
}

pub async fn save_preview(
    controller: &WorkflowController,
    frame: &PreviewFrame,
    output_dir: &Path,
) -> Result<PathBuf> {
    let blob = controller
        .object_urls()
        .resolve(&frame.object_url)
        .await
        .ok_or_else(|| anyhow!("preview {} is no longer available", frame.object_url))?;
    let path = output_dir.join(format!("preview.{}", blob.extension()));
    write_output(&path, &blob.bytes).await?;
    Ok(path)
}

pub async fn save_artifact(
    controller: &WorkflowController,
    link: &DownloadLink,
    output_dir: &Path,
) -> Result<PathBuf> {
    let artifact = controller
        .backend()
        .fetch_artifact(link)
        .await
        .with_context(|| format!("failed to download {}", link.url))?;
    let path = output_dir.join(&artifact.filename);
    write_output(&path, &artifact.bytes).await?;
    Ok(path)
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))
}

/// Upload, process, preview and download in one pass.
pub async fn run_once(
    controller: &WorkflowController,
    files: &[PathBuf],
    output_dir: &Path,
    options: RunOptions,
) -> Result<()> {
    let mut alerts = controller.subscribe_events();

    let selection = FileSelection::from_paths(files).await?;
    warn_missing_sidecars(&selection);
    let uploaded = controller.upload(selection).await;
    print_alerts(&mut alerts);
    let session = uploaded.context("upload step failed")?;
    if let Some((file_id, filename)) = session.active() {
        println!("uploaded {filename} as {file_id}");
    }

    let processed = controller.process().await;
    print_alerts(&mut alerts);
    let outcome = processed.context("process step failed")?;
    println!("download link: {}", outcome.download_link.href);

    if !options.skip_preview {
        let previewed = controller.preview().await;
        print_alerts(&mut alerts);
        let frame = previewed.context("preview step failed")?;
        let path = save_preview(controller, &frame, output_dir).await?;
        println!("preview saved to {}", path.display());
    }

    if !options.skip_download {
        let link = controller.download().await;
        print_alerts(&mut alerts);
        let link = link.context("download step failed")?;
        let path = save_artifact(controller, &link, output_dir).await?;
        println!("result saved to {}", path.display());
    }

    Ok(())
}
