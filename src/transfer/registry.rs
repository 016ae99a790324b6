//! Live session map and lifecycle event fan-out.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::error::RegistryError;
use super::external::ExternalTransfer;
use super::http::HttpTransfer;
use super::progress::ProgressSnapshot;
use super::session::{LifecycleListener, TransferSession};
use super::strategy::{StrategyKind, TransferStrategy};
use super::target::{destination_for, is_streaming_video_url};
use crate::config::EngineConfig;

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Opaque identifier of a session, unique within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wraps a raw id.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Terminal lifecycle event of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    /// All data transferred.
    Succeeded {
        /// Session id.
        id: SessionId,
        /// Source URL.
        url: String,
    },
    /// The transfer failed.
    Failed {
        /// Session id.
        id: SessionId,
        /// Source URL.
        url: String,
        /// Human-readable reason.
        message: String,
    },
    /// The user cancelled the transfer and its partial data was deleted.
    Cancelled {
        /// Session id.
        id: SessionId,
        /// Source URL.
        url: String,
    },
}

impl TransferEvent {
    /// Session the event belongs to.
    #[must_use]
    pub fn id(&self) -> SessionId {
        match self {
            Self::Succeeded { id, .. } | Self::Failed { id, .. } | Self::Cancelled { id, .. } => *id,
        }
    }

    /// URL of the transfer.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Succeeded { url, .. } | Self::Failed { url, .. } | Self::Cancelled { url, .. } => {
                url
            }
        }
    }
}

/// Row of [`TransferRegistry::snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Session id.
    pub id: SessionId,
    /// Source URL.
    pub url: String,
    /// Strategy in use.
    pub kind: StrategyKind,
    /// Current progress.
    pub progress: ProgressSnapshot,
}

struct Shared {
    sessions: DashMap<SessionId, Arc<TransferSession>>,
    events: broadcast::Sender<TransferEvent>,
}

impl LifecycleListener for Shared {
    fn on_terminal(&self, event: TransferEvent) {
        self.sessions.remove(&event.id());
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Creates sessions, routes control requests, and broadcasts terminal events.
///
/// Sessions are removed as soon as they reach a terminal state; there is no
/// limit on how many run at once.
pub struct TransferRegistry {
    config: EngineConfig,
    http: Arc<HttpTransfer>,
    external: Arc<ExternalTransfer>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl fmt::Debug for TransferRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRegistry")
            .field("downloads_dir", &self.config.downloads_dir)
            .field("live_sessions", &self.shared.sessions.len())
            .finish_non_exhaustive()
    }
}

impl TransferRegistry {
    /// Creates a registry with the default HTTP and extraction-tool strategies.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (see [`HttpTransfer::new`]).
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let http = HttpTransfer::new(&config);
        let external = ExternalTransfer::new(&config);
        Self::with_strategies(config, http, external)
    }

    /// Creates a registry with explicitly configured strategies.
    #[must_use]
    pub fn with_strategies(
        config: EngineConfig,
        http: HttpTransfer,
        external: ExternalTransfer,
    ) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            http: Arc::new(http),
            external: Arc::new(external),
            shared: Arc::new(Shared {
                sessions: DashMap::new(),
                events,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Engine configuration in use.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns true if the extraction tool can currently be found.
    #[must_use]
    pub fn external_tool_available(&self) -> bool {
        self.external.is_available()
    }

    /// Creates a session for `url` and starts it.
    ///
    /// Streaming-video URLs go to the extraction tool; everything else is
    /// fetched over HTTP into the downloads directory.
    pub async fn start(&self, url: impl Into<String>) -> SessionId {
        let url = url.into().trim().to_string();
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let (strategy, target): (Arc<dyn TransferStrategy>, _) =
            if is_streaming_video_url(&url, &self.config.video_domains) {
                (
                    Arc::clone(&self.external) as Arc<dyn TransferStrategy>,
                    self.config.downloads_dir.clone(),
                )
            } else {
                (
                    Arc::clone(&self.http) as Arc<dyn TransferStrategy>,
                    destination_for(&url, &self.config.downloads_dir),
                )
            };

        let session = Arc::new(TransferSession::new(
            id,
            url.clone(),
            target,
            strategy,
            Arc::clone(&self.shared) as Arc<dyn LifecycleListener>,
        ));
        info!(%id, %url, kind = %session.kind(), target = %session.target().display(), "session created");

        // Inserted before starting so a fast terminal event finds the entry to remove.
        self.shared.sessions.insert(id, Arc::clone(&session));
        if let Err(e) = session.start().await {
            warn!(%id, error = %e, "session refused to start");
        }
        id
    }

    /// Pauses a downloading session.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownSession`] for ids that are not live, or the
    /// session's transition error.
    pub async fn pause(&self, id: SessionId) -> Result<(), RegistryError> {
        self.session(id)?.pause().await?;
        Ok(())
    }

    /// Resumes a paused session.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownSession`] for ids that are not live, or the
    /// session's transition error.
    pub async fn resume(&self, id: SessionId) -> Result<(), RegistryError> {
        self.session(id)?.resume().await?;
        Ok(())
    }

    /// Cancels a session and deletes its partial data.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownSession`] for ids that are not live, or the
    /// session's transition error.
    pub async fn cancel(&self, id: SessionId) -> Result<(), RegistryError> {
        self.session(id)?.cancel().await?;
        Ok(())
    }

    /// Cancels every live session. Used on shutdown.
    pub async fn cancel_all(&self) {
        let sessions: Vec<_> = self
            .shared
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for session in sessions {
            if let Err(e) = session.cancel().await {
                debug!(id = %session.id(), error = %e, "session already finished");
            }
        }
    }

    /// Subscribes to terminal events of all sessions.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.shared.events.subscribe()
    }

    /// Observes one session's progress.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownSession`] for ids that are not live.
    pub fn progress(&self, id: SessionId) -> Result<watch::Receiver<ProgressSnapshot>, RegistryError> {
        Ok(self.session(id)?.subscribe())
    }

    /// Lists live sessions ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut rows: Vec<SessionInfo> = self
            .shared
            .sessions
            .iter()
            .map(|entry| {
                let session = entry.value();
                SessionInfo {
                    id: session.id(),
                    url: session.url().to_string(),
                    kind: session.kind(),
                    progress: session.snapshot(),
                }
            })
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.sessions.len()
    }

    /// Returns true when no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.sessions.is_empty()
    }

    fn session(&self, id: SessionId) -> Result<Arc<TransferSession>, RegistryError> {
        self.shared
            .sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistryError::UnknownSession(id))
    }
}
