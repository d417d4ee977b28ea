/// `load_config` module: merges command line flags, an optional YAML file and the
/// environment into the [`AppConfig`] a sync needs.
///
/// Precedence for every setting is flag, then file, then built-in default. The SiYuan
/// API token is never read from the file; it comes from `SIYUAN_TOKEN` (a `.env` file
/// in the working directory is honoured).
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{bail, Result};
use serde::Deserialize;
use siyuan_anki_core::config::SyncConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::anki::DEFAULT_ANKI_PORT;
use crate::siyuan::DEFAULT_SIYUAN_PORT;

pub const TOKEN_ENV: &str = "SIYUAN_TOKEN";

/// Optional settings file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub model: Option<String>,
    pub ref_marker: Option<String>,
    pub passage_types: Option<Vec<String>>,
    pub parent_types: Option<Vec<String>>,
    pub preserve_decks: Option<String>,
    pub notify_timeout_ms: Option<u64>,
    pub required_processes: Option<Vec<String>>,
    pub siyuan_port: Option<u16>,
    pub anki_port: Option<u16>,
    pub interval_secs: Option<u64>,
}

/// The values the `sync` subcommand was given on the command line.
#[derive(Debug, Clone, Default)]
pub struct SyncArgs {
    pub path: PathBuf,
    pub interval: Option<u64>,
    pub siyuan_port: Option<u16>,
    pub anki_port: Option<u16>,
    pub model: Option<String>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub siyuan_url: String,
    pub anki_url: String,
    pub siyuan_token: Option<String>,
    /// `None` runs once.
    pub interval: Option<Duration>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    if config_content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Builds the full configuration for the `sync` subcommand.
pub fn resolve(args: &SyncArgs) -> Result<AppConfig> {
    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let mut sync = SyncConfig::new(&args.path);
    if let Some(model) = args.model.clone().or(file.model) {
        sync.model = model;
    }
    if let Some(marker) = file.ref_marker {
        sync.ref_marker = marker;
    }
    if let Some(types) = file.passage_types {
        sync.passage_types = types;
    }
    if let Some(types) = file.parent_types {
        sync.parent_types = types;
    }
    if let Some(pattern) = file.preserve_decks {
        sync.preserve_decks = pattern;
    }
    if let Some(timeout) = file.notify_timeout_ms {
        sync.notify_timeout_ms = timeout;
    }
    if let Some(processes) = file.required_processes {
        sync.required_processes = processes;
    }

    let interval = match args.interval.or(file.interval_secs) {
        Some(0) => bail!("interval must be at least one second"),
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };

    let siyuan_port = args
        .siyuan_port
        .or(file.siyuan_port)
        .unwrap_or(DEFAULT_SIYUAN_PORT);
    let anki_port = args.anki_port.or(file.anki_port).unwrap_or(DEFAULT_ANKI_PORT);

    let siyuan_token = std::env::var(TOKEN_ENV)
        .ok()
        .filter(|token| !token.trim().is_empty());

    Ok(AppConfig {
        sync,
        siyuan_url: format!("http://localhost:{siyuan_port}"),
        anki_url: format!("http://localhost:{anki_port}"),
        siyuan_token,
        interval,
    })
}
