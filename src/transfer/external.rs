//! External extraction tool strategy.
//!
//! [`ExternalTransfer`] runs the extraction tool (`yt-dlp` by default) as a
//! child process and translates its diagnostic output into progress updates.
//!
//! # Process handling
//!
//! - The tool is looked up on `PATH` before every run; a missing tool fails
//!   with [`TransferError::ToolNotFound`] without launching anything.
//! - stderr is parsed line by line while stdout is drained and discarded, so
//!   the child never blocks on a full pipe.
//! - On cancellation the child gets SIGTERM, a grace period, then SIGKILL,
//!   and is always reaped before the invocation returns.
//!
//! The tool cannot continue a partial download, so every invocation starts
//! from zero.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::TransferError;
use super::progress::ProgressModel;
use super::size::{parse_rate_to_bytes, parse_size_to_bytes};
use super::strategy::{StrategyKind, TransferRequest, TransferStrategy};
use crate::config::{EngineConfig, TERMINATE_GRACE};

/// Progress line, e.g. `[download]  10.3% of 12.34MiB at 1.23MiB/s ETA 00:08`.
#[allow(clippy::expect_used)]
static PROGRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s(\d+(?:\.\d+)?)%\s+of\s+~?\s*(\S+)\s+at\s+(\S+)/s\s+ETA\s+(\S+)")
        .expect("progress regex is valid") // Static pattern, safe to panic
});

/// Output file announcements: `Destination: <path>` or `Merging formats into "<path>"`.
#[allow(clippy::expect_used)]
static DESTINATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:Destination:\s+(.+)$|Merging formats into\s+"(.+)"$)"#)
        .expect("destination regex is valid") // Static pattern, safe to panic
});

/// Most diagnostic lines kept for a failure message.
const MAX_TAIL_LINES: usize = 20;

/// Message used when the tool fails without printing anything useful.
const UNKNOWN_FAILURE: &str = "unknown error";

/// One parsed progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolProgress {
    /// Percent complete, `0.0..=100.0`.
    pub percent: f64,
    /// Total size in bytes (0 if unknown).
    pub total: u64,
    /// Rate in bytes per second.
    pub speed: u64,
    /// ETA token as printed by the tool.
    pub eta: String,
}

impl ToolProgress {
    /// Bytes done, `round(percent / 100 * total)`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn bytes_downloaded(&self) -> u64 {
        (self.percent.clamp(0.0, 100.0) / 100.0 * self.total as f64).round() as u64
    }
}

/// Parses a tool progress line; returns `None` for banners, warnings, and errors.
#[must_use]
pub fn parse_progress_line(line: &str) -> Option<ToolProgress> {
    let caps = PROGRESS_PATTERN.captures(line)?;
    let percent = caps.get(1)?.as_str().parse::<f64>().ok()?;
    Some(ToolProgress {
        percent,
        total: parse_size_to_bytes(caps.get(2)?.as_str()),
        speed: parse_rate_to_bytes(caps.get(3)?.as_str()),
        eta: caps.get(4)?.as_str().to_string(),
    })
}

fn parse_destination_line(line: &str) -> Option<PathBuf> {
    let caps = DESTINATION_PATTERN.captures(line)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| PathBuf::from(m.as_str().trim()))
}

/// Diagnostic lines printed since the last progress line.
#[derive(Debug, Default)]
struct DiagnosticTail {
    lines: Vec<String>,
}

impl DiagnosticTail {
    fn clear(&mut self) {
        self.lines.clear();
    }

    fn push(&mut self, line: &str) {
        if self.lines.len() == MAX_TAIL_LINES {
            self.lines.remove(0);
        }
        self.lines.push(line.to_string());
    }

    fn failure_message(&self) -> String {
        let joined = self.lines.join("\n");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            UNKNOWN_FAILURE.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Applies one diagnostic line to the progress model and failure tail.
fn observe_line(line: &str, progress: &ProgressModel, tail: &mut DiagnosticTail) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    if let Some(update) = parse_progress_line(line) {
        tail.clear();
        #[allow(clippy::cast_precision_loss)]
        progress.report(
            update.bytes_downloaded(),
            update.total,
            update.speed as f64,
            Some(update.eta),
        );
        return;
    }
    if let Some(destination) = parse_destination_line(line) {
        debug!(destination = %destination.display(), "tool announced destination");
        progress.set_destination(destination);
    }
    tail.push(line);
}

/// Strategy delegating streaming-video URLs to an extraction tool.
#[derive(Debug, Clone)]
pub struct ExternalTransfer {
    tool: String,
    output_template: String,
    terminate_grace: Duration,
}

impl ExternalTransfer {
    /// Creates the strategy from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tool: config.tool.clone(),
            output_template: config.output_template.clone(),
            terminate_grace: TERMINATE_GRACE,
        }
    }

    /// Overrides how long a terminated tool may take to exit before it is killed.
    #[must_use]
    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    /// Returns true if the tool can currently be found.
    #[must_use]
    pub fn is_available(&self) -> bool {
        locate_tool(&self.tool).is_some()
    }

    fn command(&self, program: &Path, url: &str, output_dir: &Path) -> Command {
        let mut command = Command::new(program);
        command
            .arg("--progress")
            .arg("--newline")
            .arg("--output")
            .arg(output_dir.join(&self.output_template))
            .arg("--restrict-filenames")
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Stops the child: SIGTERM, bounded wait, then kill. Always reaps it.
    async fn terminate(&self, child: &mut Child) {
        send_terminate(child);
        match tokio::time::timeout(self.terminate_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(?status, "tool exited after terminate"),
            Ok(Err(e)) => warn!(error = %e, "failed waiting for terminated tool"),
            Err(_) => {
                warn!(
                    grace_ms = self.terminate_grace.as_millis(),
                    "tool ignored terminate signal, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill tool");
                }
            }
        }
    }
}

#[async_trait]
impl TransferStrategy for ExternalTransfer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::External
    }

    fn supports_resume(&self) -> bool {
        false
    }

    #[instrument(skip(self, progress, cancel), fields(url = %request.url, tool = %self.tool))]
    async fn run(
        &self,
        request: &TransferRequest,
        progress: &ProgressModel,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let program =
            locate_tool(&self.tool).ok_or_else(|| TransferError::tool_not_found(&self.tool))?;
        progress.restart_at(0);

        let output_dir = request.destination.as_path();
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| TransferError::io(output_dir, e))?;

        let mut child = self
            .command(&program, &request.url, output_dir)
            .spawn()
            .map_err(|e| TransferError::io(&program, e))?;
        debug!(program = %program.display(), pid = ?child.id(), "tool started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut tail = DiagnosticTail::default();

        let pump = async {
            tokio::join!(
                read_diagnostics(stderr, progress, &mut tail),
                drain(stdout)
            )
        };
        let drained = tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            _ = pump => true,
        };
        if !drained {
            self.terminate(&mut child).await;
            return Err(TransferError::Cancelled);
        }

        let waited = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            self.terminate(&mut child).await;
            return Err(TransferError::Cancelled);
        };
        let status = status.map_err(|e| TransferError::io(&program, e))?;

        if status.success() {
            info!("tool finished");
            Ok(())
        } else {
            let message = tail.failure_message();
            warn!(code = ?status.code(), message = %message, "tool failed");
            Err(TransferError::ProcessExit {
                tool: self.tool.clone(),
                code: status.code(),
                message,
            })
        }
    }
}

/// Reads stderr to EOF, splitting on both `\n` and `\r`.
async fn read_diagnostics<R>(stream: Option<R>, progress: &ProgressModel, tail: &mut DiagnosticTail)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                for segment in text.split('\r') {
                    observe_line(segment, progress, tail);
                }
            }
            Err(e) => {
                warn!(error = %e, "failed reading tool diagnostics");
                break;
            }
        }
    }
}

async fn drain<R>(stream: Option<R>)
where
    R: AsyncRead + Unpin,
{
    if let Some(mut stream) = stream
        && let Err(e) = tokio::io::copy(&mut stream, &mut tokio::io::sink()).await
    {
        debug!(error = %e, "stopped draining tool stdout");
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(pid, error = %e, "SIGTERM failed, killing tool");
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Finds the tool: a path is used as-is, a bare name is searched on `PATH`.
#[must_use]
pub fn locate_tool(tool: &str) -> Option<PathBuf> {
    let candidate = Path::new(tool);
    if tool.is_empty() {
        return None;
    }
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        executable_names(tool)
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| is_executable(path))
    })
}

#[cfg(windows)]
fn executable_names(tool: &str) -> Vec<String> {
    vec![tool.to_string(), format!("{tool}.exe")]
}

#[cfg(not(windows))]
fn executable_names(tool: &str) -> Vec<String> {
    vec![tool.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
