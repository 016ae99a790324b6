//! dlm Core Library
//!
//! This library provides the transfer engine behind the `dlm` download
//! manager: concurrent, pausable, resumable downloads with live progress.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Engine configuration and defaults
//! - [`transfer`] - Transfer strategies, sessions, and the session registry
//!
//! Plain URLs are streamed over HTTP with byte-range resume. URLs on known
//! video hosts are delegated to an external extraction tool (`yt-dlp`) whose
//! progress output is normalized into the same progress model.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::EngineConfig;
pub use transfer::{
    ExternalTransfer, HttpTransfer, ProgressModel, ProgressSnapshot, RegistryError, SessionError,
    SessionId, StrategyKind, TransferError, TransferEvent, TransferOutcome, TransferRegistry,
    TransferSession, TransferStatus, parse_rate_to_bytes, parse_size_to_bytes,
};
