//! Append-only download history log.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dlm_core::TransferEvent;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// First line of a new history file.
pub const HISTORY_HEADER: &str = "--- Download History ---";

/// History line for a started transfer.
#[must_use]
pub fn started_line(url: &str) -> String {
    format!("[STARTED] Started download: {url}")
}

/// History line for a terminal event.
#[must_use]
pub fn event_line(event: &TransferEvent) -> String {
    match event {
        TransferEvent::Succeeded { url, .. } => format!("[SUCCESS] Download finished: {url}"),
        TransferEvent::Failed { url, message, .. } => {
            format!("[FAILED] Download failed: {url} - {message}")
        }
        TransferEvent::Cancelled { url, .. } => format!("[CANCELLED] Download cancelled: {url}"),
    }
}

/// Text log of started and finished downloads.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    /// Opens the log, creating it with a header if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
        }
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::write(&path, format!("{HISTORY_HEADER}\n"))
                .await
                .with_context(|| format!("Failed to create history file '{}'", path.display()))?;
        }
        Ok(Self { path })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line.
    pub async fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open history file '{}'", self.path.display()))?;
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .with_context(|| format!("Failed to write history file '{}'", self.path.display()))?;
        Ok(())
    }

    /// Entries recorded by earlier runs, without the header.
    pub async fn entries(&self) -> Result<Vec<String>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read history file '{}'", self.path.display()))?;
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty() && *line != HISTORY_HEADER)
            .map(str::to_string)
            .collect())
    }

    /// Appends a line, logging instead of failing.
    pub async fn record(&self, line: &str) {
        if let Err(e) = self.append(line).await {
            warn!(error = %e, "history write failed");
        }
    }
}
