//! Observable progress state for one transfer.
//!
//! A [`ProgressModel`] is owned by exactly one session and written only by
//! that session's active strategy invocation. Presentation code subscribes
//! through a [`tokio::sync::watch`] receiver and only ever reads
//! [`ProgressSnapshot`] values.
//!
//! The model enforces its own invariants on every write:
//! - `total_size` never shrinks once known
//! - `bytes_downloaded` never exceeds a known `total_size` (a longer body
//!   grows the total instead)
//! - `bytes_downloaded` only moves backwards through [`ProgressModel::restart_at`]

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;

/// Lifecycle status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Created, not started.
    #[default]
    Idle,
    /// A strategy invocation is running.
    Downloading,
    /// Stopped by the user; can be resumed.
    Paused,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped by the user; partial data deleted.
    Cancelled,
}

impl TransferStatus {
    /// Returns true for Succeeded, Failed, and Cancelled.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a transfer's progress.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProgressSnapshot {
    /// Bytes written so far (including any resumed prefix).
    pub bytes_downloaded: u64,
    /// Expected total in bytes, 0 when unknown.
    pub total_size: u64,
    /// Smoothed transfer rate in bytes per second.
    pub speed: f64,
    /// Current lifecycle status.
    pub status: TransferStatus,
    /// File being written, when known.
    pub destination: Option<PathBuf>,
    /// Remaining-time token reported by the extraction tool.
    pub eta: Option<String>,
}

impl ProgressSnapshot {
    /// Completion ratio in `0.0..=1.0`, or `None` when the total is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> Option<f64> {
        (self.total_size > 0).then(|| self.bytes_downloaded as f64 / self.total_size as f64)
    }
}

/// Single-writer progress state with change notification.
#[derive(Debug)]
pub struct ProgressModel {
    tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressModel {
    /// Creates an idle model with nothing downloaded.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self { tx }
    }

    /// Returns a receiver that observes every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TransferStatus {
        self.tx.borrow().status
    }

    /// Bytes downloaded so far.
    #[must_use]
    pub fn bytes_downloaded(&self) -> u64 {
        self.tx.borrow().bytes_downloaded
    }

    pub(crate) fn set_status(&self, status: TransferStatus) {
        self.tx.send_modify(|p| p.status = status);
    }

    /// Starts a new invocation at `offset`: bytes are seeded, speed and ETA cleared.
    ///
    /// This is the only way `bytes_downloaded` may decrease.
    pub(crate) fn restart_at(&self, offset: u64) {
        self.tx.send_modify(|p| {
            p.bytes_downloaded = offset;
            p.speed = 0.0;
            p.eta = None;
            if p.total_size > 0 && offset > p.total_size {
                p.total_size = offset;
            }
        });
    }

    /// Records a total size. Smaller values than an already known total are ignored.
    pub(crate) fn set_total(&self, total: u64) {
        if total == 0 {
            return;
        }
        self.tx.send_if_modified(|p| {
            let total = total.max(p.bytes_downloaded);
            if total > p.total_size {
                p.total_size = total;
                true
            } else {
                false
            }
        });
    }

    /// Adds `len` freshly written bytes.
    pub(crate) fn advance(&self, len: u64) {
        self.tx.send_modify(|p| {
            p.bytes_downloaded = p.bytes_downloaded.saturating_add(len);
            if p.total_size > 0 && p.bytes_downloaded > p.total_size {
                p.total_size = p.bytes_downloaded;
            }
        });
    }

    /// Applies an absolute progress report (external tool), keeping the invariants.
    pub(crate) fn report(&self, bytes: u64, total: u64, speed: f64, eta: Option<String>) {
        self.tx.send_modify(|p| {
            p.total_size = p.total_size.max(total);
            p.bytes_downloaded = p.bytes_downloaded.max(bytes);
            if p.total_size > 0 && p.bytes_downloaded > p.total_size {
                p.bytes_downloaded = p.total_size;
            }
            p.speed = speed.max(0.0);
            p.eta = eta;
        });
    }

    pub(crate) fn set_speed(&self, speed: f64) {
        self.tx.send_modify(|p| p.speed = speed.max(0.0));
    }

    pub(crate) fn set_destination(&self, destination: PathBuf) {
        self.tx.send_modify(|p| p.destination = Some(destination));
    }
}

/// Computes transfer speed over wall-clock windows of at least `interval`.
///
/// Samples are taken when [`observe`](Self::observe) is called and the window
/// has elapsed, so they are not aligned to chunk boundaries.
#[derive(Debug, Clone)]
pub struct SpeedSampler {
    interval: Duration,
    last_at: Instant,
    last_bytes: u64,
}

impl SpeedSampler {
    /// Starts a sampler at `now` with `bytes` already counted.
    #[must_use]
    pub fn new(interval: Duration, now: Instant, bytes: u64) -> Self {
        Self {
            interval,
            last_at: now,
            last_bytes: bytes,
        }
    }

    /// Returns a new speed if at least one interval has passed since the last sample.
    ///
    /// Never divides by a zero interval and never returns a negative speed.
    #[allow(clippy::cast_precision_loss)]
    pub fn observe(&mut self, now: Instant, bytes: u64) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.last_at);
        if elapsed.is_zero() || elapsed < self.interval {
            return None;
        }
        let delta = bytes.saturating_sub(self.last_bytes);
        self.last_at = now;
        self.last_bytes = bytes;
        Some(delta as f64 / elapsed.as_secs_f64())
    }
}
