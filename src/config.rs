//! Engine configuration.
//!
//! [`EngineConfig`] carries everything the transfer engine needs to know
//! about its environment: where files go, which extraction tool to run, and
//! which hosts count as streaming-video sources. The CLI builds one from its
//! config file and flags; tests build one pointed at a temp directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default directory downloads are written to.
pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";

/// Default external extraction tool.
pub const DEFAULT_TOOL: &str = "yt-dlp";

/// Default output template handed to the extraction tool.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Hosts whose URLs are handed to the extraction tool.
pub const DEFAULT_VIDEO_DOMAINS: &[&str] = &["youtube.com", "youtu.be"];

/// Minimum interval between two speed samples.
pub const DEFAULT_SPEED_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Time a terminated extraction tool gets to exit before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Configuration shared by every session created from one registry.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory HTTP downloads and tool output are written to.
    pub downloads_dir: PathBuf,
    /// Program name or path of the extraction tool.
    pub tool: String,
    /// Output template evaluated by the extraction tool.
    pub output_template: String,
    /// Host suffixes routed to the extraction tool.
    pub video_domains: Vec<String>,
    /// Minimum time between two speed recomputations.
    pub speed_sample_interval: Duration,
    /// Optional TCP connect timeout. `None` waits as long as the OS does.
    pub connect_timeout: Option<Duration>,
    /// User-Agent sent with HTTP requests.
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from(DEFAULT_DOWNLOADS_DIR),
            tool: DEFAULT_TOOL.to_string(),
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            video_domains: DEFAULT_VIDEO_DOMAINS
                .iter()
                .map(ToString::to_string)
                .collect(),
            speed_sample_interval: DEFAULT_SPEED_SAMPLE_INTERVAL,
            connect_timeout: None,
            user_agent: default_user_agent(),
        }
    }
}

impl EngineConfig {
    /// Returns a default config writing into `downloads_dir`.
    #[must_use]
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
            ..Self::default()
        }
    }

    /// Overrides the extraction tool program.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Overrides the tool output template.
    #[must_use]
    pub fn with_output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = template.into();
        self
    }

    /// Replaces the list of video domains.
    #[must_use]
    pub fn with_video_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.video_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the speed sampling interval.
    #[must_use]
    pub fn with_speed_sample_interval(mut self, interval: Duration) -> Self {
        self.speed_sample_interval = interval;
        self
    }

    /// Sets a connect timeout for HTTP transfers.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the downloads directory.
    #[must_use]
    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }
}

/// User-Agent identifying this tool and version.
#[must_use]
pub fn default_user_agent() -> String {
    format!("dlm/{}", env!("CARGO_PKG_VERSION"))
}
