//! Transfer engine.
//!
//! # Architecture
//!
//! ```text
//! TransferRegistry ──start(url)──▶ TransferSession ──▶ TransferStrategy
//!        ▲                              │                 ├─ HttpTransfer
//!        └──── TransferEvent ◀──────────┘                 └─ ExternalTransfer
//!                                       │
//!                                 ProgressModel ──watch──▶ UI
//! ```
//!
//! - [`TransferRegistry`] owns the live sessions and broadcasts their
//!   terminal events.
//! - [`TransferSession`] runs the pause/resume/cancel state machine and
//!   holds at most one strategy invocation at a time.
//! - [`HttpTransfer`] streams a URL to disk and resumes with `Range`.
//! - [`ExternalTransfer`] delegates streaming-video URLs to an extraction
//!   tool and parses its progress output.

mod error;
mod external;
mod http;
mod progress;
mod registry;
mod session;
mod size;
mod strategy;
mod target;

pub use error::{RegistryError, SessionError, TransferError};
pub use external::{ExternalTransfer, ToolProgress, locate_tool, parse_progress_line};
pub use http::HttpTransfer;
pub use progress::{ProgressModel, ProgressSnapshot, SpeedSampler, TransferStatus};
pub use registry::{SessionId, SessionInfo, TransferEvent, TransferRegistry};
pub use session::{LifecycleListener, TransferSession};
pub use size::{parse_rate_to_bytes, parse_size_to_bytes};
pub use strategy::{StrategyKind, TransferOutcome, TransferRequest, TransferStrategy};
pub use target::{FALLBACK_FILENAME, destination_for, filename_from_url, is_streaming_video_url};
