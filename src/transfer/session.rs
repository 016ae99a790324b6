//! One transfer and its state machine.
//!
//! ```text
//! Idle ──start──▶ Downloading ──▶ Succeeded | Failed
//!                  │      ▲
//!              pause│      │resume
//!                  ▼      │
//!                  Paused ─┘
//!
//! cancel: Idle | Downloading | Paused ──▶ Cancelled (partial data deleted)
//! ```
//!
//! Every control operation takes the session's async mutex and holds it
//! until the in-flight invocation has returned, so at most one strategy
//! invocation per session ever exists.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::SessionError;
use super::progress::{ProgressModel, ProgressSnapshot, TransferStatus};
use super::registry::{SessionId, TransferEvent};
use super::strategy::{StrategyKind, TransferOutcome, TransferRequest, TransferStrategy};

/// Receives the terminal event of a session.
///
/// Called at most once per session, from whichever task observed the
/// terminal transition. Implementations must not block.
pub trait LifecycleListener: Send + Sync {
    /// The session reached Succeeded, Failed, or Cancelled.
    fn on_terminal(&self, event: TransferEvent);
}

#[derive(Debug)]
struct Invocation {
    cancel: CancellationToken,
    handle: JoinHandle<TransferOutcome>,
}

#[derive(Debug, Default)]
struct ControlState {
    resume_offset: u64,
    active: Option<Invocation>,
}

/// A single URL being transferred.
pub struct TransferSession {
    id: SessionId,
    url: String,
    target: PathBuf,
    strategy: Arc<dyn TransferStrategy>,
    progress: Arc<ProgressModel>,
    control: Mutex<ControlState>,
    listener: Arc<dyn LifecycleListener>,
}

impl std::fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferSession")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("target", &self.target)
            .field("kind", &self.strategy.kind())
            .field("status", &self.progress.status())
            .finish_non_exhaustive()
    }
}

impl TransferSession {
    /// Creates an idle session.
    ///
    /// `target` is the destination file for HTTP transfers and the output
    /// directory for the extraction tool.
    #[must_use]
    pub fn new(
        id: SessionId,
        url: impl Into<String>,
        target: impl Into<PathBuf>,
        strategy: Arc<dyn TransferStrategy>,
        listener: Arc<dyn LifecycleListener>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            target: target.into(),
            strategy,
            progress: Arc::new(ProgressModel::new()),
            control: Mutex::new(ControlState::default()),
            listener,
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Destination file or output directory.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Strategy the session was created with.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TransferStatus {
        self.progress.status()
    }

    /// Current progress.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Observes progress changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Idle → Downloading from offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is idle.
    #[instrument(skip(self), fields(id = %self.id, url = %self.url))]
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut control = self.control.lock().await;
        self.require(TransferStatus::Idle, "start")?;
        self.launch(&mut control, 0);
        info!(kind = %self.strategy.kind(), "transfer started");
        Ok(())
    }

    /// Downloading → Paused, keeping partial data.
    ///
    /// Waits for the running invocation to stop. If it finished on its own
    /// before the request took effect, its outcome stands.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is
    /// downloading, including when the invocation reached a terminal state
    /// before it could be stopped.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn pause(&self) -> Result<(), SessionError> {
        let mut control = self.control.lock().await;
        self.require(TransferStatus::Downloading, "pause")?;

        let outcome = self.stop(&mut control).await;
        if outcome != TransferOutcome::Cancelled {
            debug!(?outcome, "transfer finished before pause took effect");
            return Err(SessionError::InvalidTransition {
                from: self.progress.status(),
                action: "pause",
            });
        }

        control.resume_offset = if self.strategy.supports_resume() {
            self.progress.bytes_downloaded()
        } else {
            0
        };
        self.progress.set_speed(0.0);
        self.progress.set_status(TransferStatus::Paused);
        info!(resume_offset = control.resume_offset, "transfer paused");
        Ok(())
    }

    /// Paused → Downloading from the recorded resume offset.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is paused.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn resume(&self) -> Result<(), SessionError> {
        let mut control = self.control.lock().await;
        self.require(TransferStatus::Paused, "resume")?;
        let offset = control.resume_offset;
        self.launch(&mut control, offset);
        info!(resume_offset = offset, "transfer resumed");
        Ok(())
    }

    /// Any non-terminal state → Cancelled, deleting partial data.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] if the session already ended,
    /// or ended on its own while the cancel was waiting for it.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn cancel(&self) -> Result<(), SessionError> {
        let mut control = self.control.lock().await;
        let status = self.progress.status();
        if status.is_terminal() {
            return Err(SessionError::InvalidTransition {
                from: status,
                action: "cancel",
            });
        }

        if status == TransferStatus::Downloading {
            let outcome = self.stop(&mut control).await;
            if outcome != TransferOutcome::Cancelled {
                debug!(?outcome, "transfer finished before cancel took effect");
                return Err(SessionError::InvalidTransition {
                    from: self.progress.status(),
                    action: "cancel",
                });
            }
        }

        for path in self.partial_files() {
            remove_partial_file(&path).await;
        }
        control.resume_offset = 0;
        self.progress.set_speed(0.0);
        self.progress.set_status(TransferStatus::Cancelled);
        info!("transfer cancelled");
        self.listener.on_terminal(TransferEvent::Cancelled {
            id: self.id,
            url: self.url.clone(),
        });
        Ok(())
    }

    fn require(&self, expected: TransferStatus, action: &'static str) -> Result<(), SessionError> {
        let from = self.progress.status();
        if from == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition { from, action })
        }
    }

    fn launch(&self, control: &mut ControlState, offset: u64) {
        let cancel = CancellationToken::new();
        let request = TransferRequest {
            url: self.url.clone(),
            destination: self.target.clone(),
            resume_offset: offset,
        };
        self.progress.restart_at(offset);
        self.progress.set_status(TransferStatus::Downloading);

        let handle = tokio::spawn(drive(
            self.id,
            Arc::clone(&self.strategy),
            Arc::clone(&self.progress),
            Arc::clone(&self.listener),
            request,
            cancel.clone(),
        ));
        control.active = Some(Invocation { cancel, handle });
    }

    /// Signals the active invocation and waits for it to return.
    async fn stop(&self, control: &mut ControlState) -> TransferOutcome {
        let Some(invocation) = control.active.take() else {
            return TransferOutcome::Cancelled;
        };
        invocation.cancel.cancel();
        match invocation.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("transfer task ended abnormally: {e}");
                warn!(error = %e, "transfer task ended abnormally");
                self.progress.set_status(TransferStatus::Failed);
                self.listener.on_terminal(TransferEvent::Failed {
                    id: self.id,
                    url: self.url.clone(),
                    message: message.clone(),
                });
                TransferOutcome::Failed(message)
            }
        }
    }

    /// Files a cancel must remove.
    fn partial_files(&self) -> Vec<PathBuf> {
        let announced = self.progress.snapshot().destination;
        match self.strategy.kind() {
            StrategyKind::Http => vec![announced.unwrap_or_else(|| self.target.clone())],
            StrategyKind::External => announced
                .map(|path| vec![part_file(&path), path])
                .unwrap_or_default(),
        }
    }
}

/// Runs one invocation and reports natural completion.
///
/// A cancelled invocation reports nothing; the controller that cancelled it
/// decides what happens next.
async fn drive(
    id: SessionId,
    strategy: Arc<dyn TransferStrategy>,
    progress: Arc<ProgressModel>,
    listener: Arc<dyn LifecycleListener>,
    request: TransferRequest,
    cancel: CancellationToken,
) -> TransferOutcome {
    let outcome = TransferOutcome::from_result(strategy.run(&request, &progress, &cancel).await);
    match &outcome {
        TransferOutcome::Succeeded => {
            progress.set_speed(0.0);
            progress.set_status(TransferStatus::Succeeded);
            info!(%id, url = %request.url, "transfer succeeded");
            listener.on_terminal(TransferEvent::Succeeded {
                id,
                url: request.url.clone(),
            });
        }
        TransferOutcome::Failed(message) => {
            progress.set_speed(0.0);
            progress.set_status(TransferStatus::Failed);
            warn!(%id, url = %request.url, error = %message, "transfer failed");
            listener.on_terminal(TransferEvent::Failed {
                id,
                url: request.url.clone(),
                message: message.clone(),
            });
        }
        TransferOutcome::Cancelled => debug!(%id, "invocation stopped"),
    }
    outcome
}

/// `<path>.part`, the extraction tool's in-progress file.
fn part_file(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

async fn remove_partial_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}
