//! CLI entry point for the dlm download manager.

use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dlm_core::{EngineConfig, SessionId, TransferEvent, TransferRegistry, TransferStatus};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod console;
mod history;
mod view;

use app_config::{DEFAULT_HISTORY_FILE, VerbositySetting};
use cli::Args;
use console::{Command, HELP, parse_command};
use history::{HISTORY_HEADER, HistoryLog, event_line, started_line};
use view::{ProgressView, percent_label};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded = app_config::load_config(args.config.as_deref())?;
    let file_config = loaded.file_config();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file_config
                .verbosity
                .map_or("info", VerbositySetting::filter),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(
        ?args,
        config_path = ?loaded.path,
        config_verbosity = file_config.verbosity.map(VerbositySetting::as_str),
        "CLI arguments parsed"
    );

    let mut engine = file_config.apply_to(EngineConfig::default());
    if let Some(dir) = &args.output_dir {
        engine.downloads_dir.clone_from(dir);
    }
    if let Some(tool) = &args.tool {
        engine = engine.with_tool(tool.as_str());
    }
    tokio::fs::create_dir_all(&engine.downloads_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create downloads directory '{}'",
                engine.downloads_dir.display()
            )
        })?;

    let history = if args.no_history {
        None
    } else {
        let path = args
            .history_file
            .clone()
            .or_else(|| file_config.history_file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE));
        let history = HistoryLog::open(path).await?;
        debug!(path = %history.path().display(), "history log open");
        Some(history)
    };

    let registry = TransferRegistry::new(engine);
    if !registry.external_tool_available() {
        warn!(
            tool = %registry.config().tool,
            "extraction tool not found; video downloads will not be available"
        );
    }
    info!(downloads_dir = %registry.config().downloads_dir.display(), "dlm starting");

    let show_bars = !args.json && !args.no_progress && !args.quiet && io::stderr().is_terminal();
    let app = App {
        events: registry.subscribe(),
        registry,
        view: ProgressView::new(show_bars),
        history,
        json: args.json,
        show_history: !args.json && !args.quiet,
        failures: 0,
    };
    app.run(&args.urls).await
}

/// Whether the command loop keeps going.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct App {
    registry: TransferRegistry,
    events: broadcast::Receiver<TransferEvent>,
    view: ProgressView,
    history: Option<HistoryLog>,
    json: bool,
    show_history: bool,
    failures: usize,
}

impl App {
    async fn run(mut self, urls: &[String]) -> Result<ExitCode> {
        if self.show_history {
            self.show_previous_history().await;
        }
        for url in urls {
            self.add(url).await;
        }

        let mut lines = spawn_stdin_reader();
        let mut stdin_open = true;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            if !stdin_open && !self.has_running_sessions() {
                debug!("input closed and no transfers running");
                break;
            }
            tokio::select! {
                line = lines.recv(), if stdin_open => match line {
                    Some(line) => {
                        if self.handle_line(&line).await == Flow::Quit {
                            break;
                        }
                    }
                    None => stdin_open = false,
                },
                event = self.events.recv() => match event {
                    Ok(event) => self.report(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed lifecycle events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = &mut ctrl_c => {
                    info!("interrupted, cancelling transfers");
                    break;
                }
            }
        }

        self.registry.cancel_all().await;
        while let Ok(event) = self.events.try_recv() {
            self.report(&event).await;
        }

        info!(failed = self.failures, "dlm finished");
        Ok(if self.failures == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }

    fn has_running_sessions(&self) -> bool {
        self.registry
            .snapshot()
            .iter()
            .any(|row| matches!(row.progress.status, TransferStatus::Idle | TransferStatus::Downloading))
    }

    async fn handle_line(&self, line: &str) -> Flow {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                self.say(&format!("error: {e}"));
                return Flow::Continue;
            }
        };
        debug!(?command, "console command");

        match command {
            Command::Add(url) => self.add(&url).await,
            Command::Pause(id) => self.control(id, "paused", self.registry.pause(id).await),
            Command::Resume(id) => self.control(id, "resumed", self.registry.resume(id).await),
            Command::Cancel(id) => {
                // the cancelled event itself is reported from the event loop
                if let Err(e) = self.registry.cancel(id).await {
                    self.say(&format!("error: {e}"));
                }
            }
            Command::List => self.list(),
            Command::Help => self.say(HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    async fn add(&self, url: &str) {
        let id = self.registry.start(url).await;
        if let Some(history) = &self.history {
            history.record(&started_line(url)).await;
        }
        if self.json {
            print_json(&json!({ "event": "started", "id": id, "url": url }));
        } else {
            self.say(&format!("[{id}] started {url}"));
        }
        if let Ok(progress) = self.registry.progress(id) {
            self.view.track(id, url, progress);
        }
    }

    fn control(&self, id: SessionId, done: &str, result: Result<(), dlm_core::RegistryError>) {
        match result {
            Ok(()) => self.say(&format!("[{id}] {done}")),
            Err(e) => self.say(&format!("error: {e}")),
        }
    }

    fn list(&self) {
        let rows = self.registry.snapshot();
        if self.json {
            print_json(&json!({ "event": "list", "transfers": rows }));
            return;
        }
        if rows.is_empty() {
            self.say("no active transfers");
            return;
        }
        for row in rows {
            self.say(&format!(
                "[{}] {:<11} {:>6} {:<8} {}",
                row.id,
                row.progress.status,
                percent_label(&row.progress),
                row.kind,
                row.url
            ));
        }
    }

    async fn report(&mut self, event: &TransferEvent) {
        if matches!(event, TransferEvent::Failed { .. }) {
            self.failures += 1;
        }
        if let Some(history) = &self.history {
            history.record(&event_line(event)).await;
        }
        if self.json {
            print_json(event);
        } else {
            self.say(&format!("[{}] {}", event.id(), event_line(event)));
        }
    }

    async fn show_previous_history(&self) {
        let Some(history) = &self.history else {
            return;
        };
        match history.entries().await {
            Ok(entries) if entries.is_empty() => {}
            Ok(entries) => {
                self.say(HISTORY_HEADER);
                for entry in &entries {
                    self.say(entry);
                }
            }
            Err(e) => warn!(error = %e, "could not read history"),
        }
    }

    fn say(&self, message: &str) {
        self.view.println(message);
    }
}

/// Reads stdin lines on a plain thread so a pending read never blocks runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to serialize JSON output"),
    }
}
