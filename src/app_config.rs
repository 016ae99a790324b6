//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use dlm_core::EngineConfig;

/// Default history log file name.
pub const DEFAULT_HISTORY_FILE: &str = "download_history.log";

/// TOML-backed file configuration for dlm defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Directory downloads are written to.
    pub downloads_dir: Option<PathBuf>,
    /// Extraction tool program name or path.
    pub tool: Option<String>,
    /// Output template passed to the extraction tool.
    pub output_template: Option<String>,
    /// Hosts routed to the extraction tool.
    pub video_domains: Option<Vec<String>>,
    /// Minimum interval between speed samples in milliseconds.
    pub speed_interval_ms: Option<u64>,
    /// Optional HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// History log path.
    pub history_file: Option<PathBuf>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(interval) = self.speed_interval_ms
            && !(50..=60_000).contains(&interval)
        {
            bail!(
                "Invalid config value for `speed_interval_ms`: {interval}. Expected range: 50..=60000"
            );
        }

        if let Some(timeout) = self.connect_timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            bail!(
                "Invalid config value for `connect_timeout_secs`: {timeout}. Expected range: 1..=3600"
            );
        }

        if let Some(tool) = &self.tool
            && tool.trim().is_empty()
        {
            bail!("Invalid config value for `tool`: must not be empty");
        }

        if let Some(domains) = &self.video_domains
            && domains.is_empty()
        {
            bail!("Invalid config value for `video_domains`: expected at least one domain");
        }

        Ok(())
    }

    /// Applies the file values on top of the engine defaults.
    #[must_use]
    pub fn apply_to(&self, mut engine: EngineConfig) -> EngineConfig {
        if let Some(dir) = &self.downloads_dir {
            engine.downloads_dir.clone_from(dir);
        }
        if let Some(tool) = &self.tool {
            engine = engine.with_tool(tool.as_str());
        }
        if let Some(template) = &self.output_template {
            engine = engine.with_output_template(template.as_str());
        }
        if let Some(domains) = &self.video_domains {
            engine = engine.with_video_domains(domains.iter().cloned());
        }
        if let Some(interval) = self.speed_interval_ms {
            engine = engine.with_speed_sample_interval(Duration::from_millis(interval));
        }
        if let Some(timeout) = self.connect_timeout_secs {
            engine = engine.with_connect_timeout(Some(Duration::from_secs(timeout)));
        }
        engine
    }
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }

    /// Tracing filter directive for this setting.
    #[must_use]
    pub fn filter(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// The parsed config, or defaults when no file was loaded.
    #[must_use]
    pub fn file_config(&self) -> FileConfig {
        self.config.clone().unwrap_or_default()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/dlm/config.toml`
/// 2. `$HOME/.config/dlm/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("dlm").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("dlm")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` (must exist) or the default path (optional).
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;

        match key {
            "downloads_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `downloads_dir` value on line {line_no}"))?;
                cfg.downloads_dir = Some(PathBuf::from(parsed));
            }
            "tool" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `tool` value on line {line_no}"))?;
                cfg.tool = Some(parsed);
            }
            "output_template" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `output_template` value on line {line_no}")
                })?;
                cfg.output_template = Some(parsed);
            }
            "video_domains" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `video_domains` value on line {line_no}"))?;
                cfg.video_domains = Some(
                    parsed
                        .split(',')
                        .map(str::trim)
                        .filter(|domain| !domain.is_empty())
                        .map(str::to_ascii_lowercase)
                        .collect(),
                );
            }
            "speed_interval_ms" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `speed_interval_ms` value on line {line_no}")
                })?;
                cfg.speed_interval_ms = Some(parsed);
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_no}")
                })?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "history_file" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `history_file` value on line {line_no}"))?;
                cfg.history_file = Some(PathBuf::from(parsed));
            }
            "verbosity" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `verbosity` value on line {line_no}"))?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
