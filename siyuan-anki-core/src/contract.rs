//! # contract: data model and collaborator interfaces
//!
//! Plain records exchanged between the engine stages ([`BlockRow`], [`Passage`],
//! [`Card`], [`NoteInfo`]) and the traits through which the engine reaches the
//! outside world:
//!
//! - [`BlockStore`]: read-only queries over the SiYuan database
//! - [`AnkiApi`]: the AnkiConnect endpoint (snapshot reads and batched writes)
//! - [`SourceApp`]: the SiYuan local API (notebook names, notifications)
//! - [`ProcessProbe`]: OS process list lookup
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`; the mocks are exported behind the
//! default `test-export-mocks` feature so integration tests and the CLI crate can
//! drive a full run without a live Anki or SiYuan.

use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use serde_json::Value;

use crate::batch::Action;
use crate::error::SyncResult;

/// One row of the SiYuan `blocks` table, restricted to the columns the engine reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRow {
    pub id: String,
    pub parent_id: String,
    pub box_id: String,
    pub hpath: String,
    pub markdown: String,
    pub hash: String,
    pub updated: String,
    pub block_type: String,
}

/// A SiYuan notebook ("box"): its id and display name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Notebook {
    pub id: String,
    pub name: String,
}

/// A flagged block together with its parent context, ready to back an Anki note.
///
/// Parent fields are empty strings when the block has no parent of an eligible type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Passage {
    pub id: String,
    pub parent_id: String,
    pub box_id: String,
    pub hpath: String,
    pub markdown: String,
    pub hash: String,
    pub updated: String,
    pub parent_markdown: String,
    pub parent_hash: String,
    pub parent_updated: String,
    pub deck: String,
}

impl Passage {
    /// Joins a flagged block with its (optional) eligible parent row and derives the deck.
    pub fn assemble(block: BlockRow, parent: Option<&BlockRow>, notebook_name: &str) -> Self {
        let deck = crate::deck::resolve_deck(notebook_name, &block.hpath);
        let (parent_markdown, parent_hash, parent_updated) = match parent {
            Some(p) => (p.markdown.clone(), p.hash.clone(), p.updated.clone()),
            None => (String::new(), String::new(), String::new()),
        };
        Passage {
            id: block.id,
            parent_id: block.parent_id,
            box_id: block.box_id,
            hpath: block.hpath,
            markdown: block.markdown,
            hash: block.hash,
            updated: block.updated,
            parent_markdown,
            parent_hash,
            parent_updated,
            deck,
        }
    }
}

/// A single field of an Anki note as returned by `notesInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NoteField {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub order: u32,
}

/// Raw `notesInfo` entry. Notes deleted between `findNotes` and `notesInfo` come
/// back as empty objects and deserialize with `note_id == 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NoteInfo {
    #[serde(rename = "noteId", default)]
    pub note_id: i64,
    #[serde(rename = "modelName", default)]
    pub model_name: String,
    #[serde(default)]
    pub fields: HashMap<String, NoteField>,
    #[serde(default)]
    pub cards: Vec<i64>,
}

impl NoteInfo {
    fn field(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|f| f.value.clone())
            .unwrap_or_default()
    }
}

/// The destination-side mirror of a [`Passage`]: an Anki note whose custom fields
/// carry the passage identity and fingerprints from the last sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Card {
    pub note_id: i64,
    pub id: String,
    pub parent_id: String,
    pub hpath: String,
    pub hash: String,
    pub updated: String,
    pub parent_updated: String,
    pub parent_hash: String,
    pub deck: String,
    /// Anki card ids belonging to this note.
    pub faces: Vec<i64>,
}

impl From<NoteInfo> for Card {
    fn from(info: NoteInfo) -> Self {
        Card {
            note_id: info.note_id,
            id: info.field("id"),
            parent_id: info.field("parent_id"),
            hpath: info.field("hpath"),
            hash: info.field("hash"),
            updated: info.field("updated"),
            parent_updated: info.field("parent_updated"),
            parent_hash: info.field("parent_hash"),
            deck: info.field("deck"),
            faces: info.cards,
        }
    }
}

/// Read-only access to the SiYuan block database.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait BlockStore {
    /// Ids of blocks carrying a reference whose content contains `marker`.
    fn flagged_block_ids(&self, marker: &str) -> SyncResult<Vec<String>>;

    /// Rows for the given ids. An empty `types` slice means no type restriction.
    fn blocks_by_ids(&self, ids: &[String], types: &[String]) -> SyncResult<Vec<BlockRow>>;

    /// Parent rows for the given ids whose structural type is in `types`.
    fn parent_blocks(&self, ids: &[String], types: &[String]) -> SyncResult<Vec<BlockRow>>;
}

/// The AnkiConnect endpoint.
///
/// Snapshot reads return typed values; [`AnkiApi::submit`] posts an already-built
/// batched [`Action`] and returns its raw `result` for per-item inspection.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AnkiApi: Send + Sync {
    async fn model_names(&self) -> SyncResult<Vec<String>>;

    async fn model_field_names(&self, model: &str) -> SyncResult<Vec<String>>;

    async fn create_model(&self, definition: Value) -> SyncResult<()>;

    async fn deck_names(&self) -> SyncResult<Vec<String>>;

    async fn find_notes(&self, query: &str) -> SyncResult<Vec<i64>>;

    async fn notes_info(&self, note_ids: &[i64]) -> SyncResult<Vec<NoteInfo>>;

    /// Number of cards in each deck (subdecks included), in input order.
    async fn count_cards(&self, decks: &[String]) -> SyncResult<Vec<usize>>;

    async fn delete_decks(&self, decks: &[String]) -> SyncResult<()>;

    async fn submit(&self, action: &Action) -> SyncResult<Value>;
}

/// The SiYuan local HTTP API.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceApp: Send + Sync {
    async fn list_notebooks(&self) -> SyncResult<Vec<Notebook>>;

    async fn push_message(&self, msg: &str, timeout_ms: u64) -> SyncResult<()>;
}

/// Looks up running processes by case-insensitive name substring.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ProcessProbe {
    fn is_running(&self, name: &str) -> bool;
}
