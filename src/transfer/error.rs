//! Error types for the transfer module.
//!
//! [`TransferError`] covers everything a strategy invocation can fail with.
//! Strategies never let one escape: the session converts it into a
//! [`TransferOutcome`](super::TransferOutcome) at the strategy boundary.
//! [`SessionError`] and [`RegistryError`] report rejected control requests.

use std::path::PathBuf;

use thiserror::Error;

use super::progress::TransferStatus;
use super::registry::SessionId;

/// Errors that can end a single strategy invocation.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The external extraction tool is not installed or not on `PATH`.
    #[error("{tool} not found")]
    ToolNotFound {
        /// Program name that was looked up.
        tool: String,
    },

    /// Server answered with something other than 200 or 206.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A 206 answer whose `Content-Range` starts neither at the resume offset nor at zero.
    #[error("server sent bytes from {actual} for {url}, expected {expected}")]
    RangeMismatch {
        /// The URL being downloaded.
        url: String,
        /// Offset that was requested.
        expected: u64,
        /// First byte position the server sent.
        actual: u64,
    },

    /// Connection or body stream failure.
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL being downloaded.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// File system error while writing the destination or talking to a child process.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL cannot be requested.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The extraction tool exited with a nonzero status.
    #[error("{tool} failed: {message}")]
    ProcessExit {
        /// Program that failed.
        tool: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Diagnostic output captured after the last progress line.
        message: String,
    },

    /// The invocation was stopped by a pause or cancel request. Not a failure.
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a tool-not-found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }
}

/// A control request that the session's current state does not allow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The requested action is not valid from the current status.
    #[error("cannot {action} a transfer that is {from}")]
    InvalidTransition {
        /// Status the session was in.
        from: TransferStatus,
        /// The rejected action.
        action: &'static str,
    },
}

/// Errors returned by [`TransferRegistry`](super::TransferRegistry) control methods.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No live session carries this id (never existed, or already terminal).
    #[error("no active transfer with id {0}")]
    UnknownSession(SessionId),

    /// The session rejected the request.
    #[error(transparent)]
    Session(#[from] SessionError),
}
