use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "SiYuanModel";
pub const DEFAULT_REF_MARKER: &str = "card";
pub const DEFAULT_PRESERVE_DECKS: &str = "default";
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 5000;

/// Block types that can serve as a passage's parent context: list, list item,
/// block-quote, super block.
pub fn default_parent_types() -> Vec<String> {
    ["l", "i", "b", "s"].iter().map(|t| t.to_string()).collect()
}

pub fn default_required_processes() -> Vec<String> {
    vec!["anki".to_string(), "siyuan".to_string()]
}

/// Everything one sync run needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// SiYuan workspace directory (contains `temp/siyuan.db` and `data/assets`).
    pub data_dir: PathBuf,
    pub model: String,
    /// Substring of a reference's content that flags its block for syncing.
    pub ref_marker: String,
    /// Restricts flagged blocks to these types; empty means any type.
    pub passage_types: Vec<String>,
    pub parent_types: Vec<String>,
    /// Empty decks whose name matches this (case-insensitive, anchored at start) are kept.
    pub preserve_decks: String,
    pub notify_timeout_ms: u64,
    pub required_processes: Vec<String>,
}

impl SyncConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        SyncConfig {
            data_dir: data_dir.into(),
            model: DEFAULT_MODEL.to_string(),
            ref_marker: DEFAULT_REF_MARKER.to_string(),
            passage_types: Vec::new(),
            parent_types: default_parent_types(),
            preserve_decks: DEFAULT_PRESERVE_DECKS.to_string(),
            notify_timeout_ms: DEFAULT_NOTIFY_TIMEOUT_MS,
            required_processes: default_required_processes(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("temp").join("siyuan.db")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("data").join("assets")
    }

    pub fn trace_loaded(&self) {
        info!(
            data_dir = %self.data_dir.display(),
            model = %self.model,
            ref_marker = %self.ref_marker,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
