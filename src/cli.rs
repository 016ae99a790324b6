//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Concurrent download manager with pause, resume, and cancel.
///
/// Each URL starts downloading immediately. Plain file URLs are fetched over
/// HTTP with byte-range resume; video-site URLs are handed to yt-dlp. While
/// running, commands are read from stdin (`help` lists them).
#[derive(Parser, Debug)]
#[command(name = "dlm")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to start downloading right away
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory downloads are written to (default: ./downloads)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Extraction tool used for video-site URLs (default: yt-dlp)
    #[arg(long, value_name = "PROGRAM")]
    pub tool: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// History log file (default: download_history.log)
    #[arg(long, value_name = "FILE", conflicts_with = "no_history")]
    pub history_file: Option<PathBuf>,

    /// Do not write the history log
    #[arg(long)]
    pub no_history: bool,

    /// Print lifecycle events as JSON lines instead of progress bars
    #[arg(long)]
    pub json: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}
