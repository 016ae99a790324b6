//! The seam between a session and the two ways of moving bytes.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::error::TransferError;
use super::progress::ProgressModel;

/// Which strategy a session was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Resumable HTTP streaming.
    Http,
    /// Delegation to the external extraction tool.
    External,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::External => "external",
        })
    }
}

/// Inputs for one strategy invocation.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source URL.
    pub url: String,
    /// Destination file (HTTP) or output directory (external tool).
    pub destination: PathBuf,
    /// Byte offset to resume from; 0 for a fresh transfer.
    pub resume_offset: u64,
}

/// How a strategy invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All data transferred.
    Succeeded,
    /// The attempt failed; carries a human-readable message.
    Failed(String),
    /// Stopped because of a pause or cancel request.
    Cancelled,
}

impl TransferOutcome {
    /// Converts a strategy result into an outcome.
    ///
    /// [`TransferError::Cancelled`] maps to [`TransferOutcome::Cancelled`];
    /// every other error becomes a failure message.
    #[must_use]
    pub fn from_result(result: Result<(), TransferError>) -> Self {
        match result {
            Ok(()) => Self::Succeeded,
            Err(TransferError::Cancelled) => Self::Cancelled,
            Err(error) => Self::Failed(error.to_string()),
        }
    }
}

/// A way of fetching one URL into local storage.
///
/// Implementations write progress into `progress`, race every blocking wait
/// against `cancel`, and release files and child processes before returning.
#[async_trait]
pub trait TransferStrategy: Send + Sync + fmt::Debug {
    /// The strategy kind.
    fn kind(&self) -> StrategyKind;

    /// Whether a paused invocation can continue from its byte offset.
    fn supports_resume(&self) -> bool;

    /// Runs one invocation to completion, failure, or cancellation.
    async fn run(
        &self,
        request: &TransferRequest,
        progress: &ProgressModel,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError>;
}
