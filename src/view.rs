//! Progress bars fed from session watch channels.

use std::time::Duration;

use dlm_core::{ProgressSnapshot, SessionId, TransferStatus};
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::watch;

const BAR_TEMPLATE: &str =
    "{prefix:>5} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {wide_msg}";
const SPINNER_TEMPLATE: &str = "{prefix:>5} {spinner} {bytes} {wide_msg}";

/// Renders one bar per tracked session.
#[derive(Debug)]
pub struct ProgressView {
    multi: MultiProgress,
    enabled: bool,
}

impl ProgressView {
    /// Creates the view; a disabled view draws nothing and prints plain lines.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        let multi = if enabled {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self { multi, enabled }
    }

    /// Prints a line above the bars.
    pub fn println(&self, message: &str) {
        if self.enabled {
            if self.multi.println(message).is_err() {
                eprintln!("{message}");
            }
        } else {
            eprintln!("{message}");
        }
    }

    /// Follows a session's progress until it reaches a terminal state.
    pub fn track(
        &self,
        id: SessionId,
        label: &str,
        mut progress: watch::Receiver<ProgressSnapshot>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(spinner_style());
        bar.set_prefix(format!("#{id}"));
        bar.enable_steady_tick(Duration::from_millis(200));
        let label = label.to_string();

        Some(tokio::spawn(async move {
            loop {
                let snapshot = progress.borrow_and_update().clone();
                render(&bar, &label, &snapshot);
                if snapshot.status.is_terminal() || progress.changed().await.is_err() {
                    break;
                }
            }
            bar.finish_and_clear();
        }))
    }
}

fn render(bar: &ProgressBar, label: &str, snapshot: &ProgressSnapshot) {
    if snapshot.total_size > 0 && bar.length() != Some(snapshot.total_size) {
        if bar.length() == Some(0) {
            bar.set_style(bar_style());
        }
        bar.set_length(snapshot.total_size);
    } else if snapshot.total_size == 0 && bar.length() != Some(0) {
        bar.set_style(spinner_style());
        bar.set_length(0);
    }
    bar.set_position(snapshot.bytes_downloaded);

    let name = snapshot
        .destination
        .as_deref()
        .and_then(|path| path.file_name())
        .map_or_else(|| label.to_string(), |name| name.to_string_lossy().into_owned());
    bar.set_message(format!("{} {name}", status_message(snapshot)));
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Short status text: speed and ETA while downloading, otherwise the status.
#[must_use]
pub fn status_message(snapshot: &ProgressSnapshot) -> String {
    match snapshot.status {
        TransferStatus::Downloading => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let speed = HumanBytes(snapshot.speed.max(0.0) as u64);
            match &snapshot.eta {
                Some(eta) => format!("{speed}/s ETA {eta}"),
                None => format!("{speed}/s"),
            }
        }
        other => other.to_string(),
    }
}

/// Completion as `NN.N%`, or `--` when the total is unknown.
#[must_use]
pub fn percent_label(snapshot: &ProgressSnapshot) -> String {
    snapshot
        .fraction()
        .map_or_else(|| "--".to_string(), |f| format!("{:.1}%", f * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_while_downloading() {
        let snapshot = ProgressSnapshot {
            status: TransferStatus::Downloading,
            speed: 2048.0,
            eta: Some("00:08".to_string()),
            ..ProgressSnapshot::default()
        };
        assert_eq!(status_message(&snapshot), "2.00 KiB/s ETA 00:08");
    }

    #[test]
    fn test_status_message_when_paused() {
        let snapshot = ProgressSnapshot {
            status: TransferStatus::Paused,
            ..ProgressSnapshot::default()
        };
        assert_eq!(status_message(&snapshot), "paused");
    }

    #[test]
    fn test_percent_label() {
        let snapshot = ProgressSnapshot {
            bytes_downloaded: 250,
            total_size: 1000,
            ..ProgressSnapshot::default()
        };
        assert_eq!(percent_label(&snapshot), "25.0%");
        assert_eq!(percent_label(&ProgressSnapshot::default()), "--");
    }

    #[tokio::test]
    async fn test_disabled_view_tracks_nothing() {
        let view = ProgressView::new(false);
        let (_tx, rx) = watch::channel(ProgressSnapshot::default());
        assert!(view.track(SessionId::from_raw(1), "a.iso", rx).is_none());
    }
}
