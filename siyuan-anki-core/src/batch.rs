//! Command batch builder.
//!
//! Every mutation the engine wants to make is expressed as an AnkiConnect
//! [`Action`] (`{action, version, params}`). Each stage produces at most one batched
//! action per [`CommandKind`] and the stages are folded into a [`CommandBatch`]
//! value which is handed to the executor. No stage mutates shared state.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::{json, Value};

use crate::contract::Passage;
use crate::matcher::Candidate;
use crate::transform;

pub const API_VERSION: u8 = 6;

/// A single AnkiConnect request object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub action: String,
    pub version: u8,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Action {
    pub fn new(action: &str, params: Value) -> Self {
        Action {
            action: action.to_string(),
            version: API_VERSION,
            params,
        }
    }

    /// An action without parameters, e.g. `deckNames`.
    pub fn bare(action: &str) -> Self {
        Self::new(action, Value::Null)
    }

    /// Wraps sub-actions into one `multi` request.
    pub fn multi(actions: Vec<Action>) -> Self {
        Self::new("multi", json!({ "actions": actions }))
    }

    /// Sub-actions of a `multi` request; empty for any other action.
    pub fn sub_actions(&self) -> Vec<&Value> {
        if self.action != "multi" {
            return Vec::new();
        }
        self.params
            .get("actions")
            .and_then(Value::as_array)
            .map(|a| a.iter().collect())
            .unwrap_or_default()
    }
}

/// The mutation kinds, declared in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    CreateDeck,
    AddNotes,
    UpdateNoteFields,
    StoreMediaFile,
    ChangeDeck,
    DeleteNotes,
}

impl CommandKind {
    /// Decks first so notes can be created or moved into them.
    pub const SUBMIT_ORDER: [CommandKind; 6] = [
        CommandKind::CreateDeck,
        CommandKind::AddNotes,
        CommandKind::UpdateNoteFields,
        CommandKind::StoreMediaFile,
        CommandKind::ChangeDeck,
        CommandKind::DeleteNotes,
    ];

    pub fn action_name(&self) -> &'static str {
        match self {
            CommandKind::CreateDeck => "createDeck",
            CommandKind::AddNotes => "addNotes",
            CommandKind::UpdateNoteFields => "updateNoteFields",
            CommandKind::StoreMediaFile => "storeMediaFile",
            CommandKind::ChangeDeck => "changeDeck",
            CommandKind::DeleteNotes => "deleteNotes",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.action_name())
    }
}

/// At most one batched action per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBatch {
    actions: BTreeMap<CommandKind, Action>,
}

impl CommandBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the stage output for `kind`; `None` leaves the batch unchanged.
    pub fn with(mut self, kind: CommandKind, action: Option<Action>) -> Self {
        if let Some(action) = action {
            self.actions.insert(kind, action);
        }
        self
    }

    pub fn get(&self, kind: CommandKind) -> Option<&Action> {
        self.actions.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Actions in [`CommandKind::SUBMIT_ORDER`].
    pub fn in_submit_order(&self) -> impl Iterator<Item = (CommandKind, &Action)> {
        CommandKind::SUBMIT_ORDER
            .into_iter()
            .filter_map(move |kind| self.actions.get(&kind).map(|a| (kind, a)))
    }
}

/// Field values written to an Anki note, keyed by the model's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteFields {
    pub front: String,
    pub back: String,
    pub id: String,
    pub parent_id: String,
    pub hpath: String,
    pub hash: String,
    pub updated: String,
    pub parent_updated: String,
    pub parent_hash: String,
    pub deck: String,
}

impl NoteFields {
    /// Renders both faces and copies the passage identity and fingerprints.
    pub fn render(passage: &Passage) -> Self {
        NoteFields {
            front: transform::render_front(&passage.markdown, &passage.id),
            back: transform::render_back(&passage.parent_markdown),
            id: passage.id.clone(),
            parent_id: passage.parent_id.clone(),
            hpath: passage.hpath.clone(),
            hash: passage.hash.clone(),
            updated: passage.updated.clone(),
            parent_updated: passage.parent_updated.clone(),
            parent_hash: passage.parent_hash.clone(),
            deck: passage.deck.clone(),
        }
    }

    fn into_value(self) -> Value {
        json!(self)
    }

    /// Every field except the two rendered faces.
    fn metadata_value(passage: &Passage) -> Value {
        json!({
            "id": passage.id,
            "parent_id": passage.parent_id,
            "hpath": passage.hpath,
            "hash": passage.hash,
            "updated": passage.updated,
            "parent_updated": passage.parent_updated,
            "parent_hash": passage.parent_hash,
            "deck": passage.deck,
        })
    }
}

/// `createDeck` for every deck not yet present, deduplicated against itself and
/// against the destination's deck list at snapshot time.
pub fn create_decks<'a, I>(wanted: I, existing: &HashSet<String>) -> Option<Action>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let actions: Vec<Action> = wanted
        .into_iter()
        .filter(|deck| !existing.contains(*deck) && seen.insert(*deck))
        .map(|deck| Action::new("createDeck", json!({ "deck": deck })))
        .collect();
    if actions.is_empty() {
        None
    } else {
        Some(Action::multi(actions))
    }
}

/// One `addNotes` request carrying every new note.
pub fn add_notes(passages: &[&Passage], model: &str) -> Option<Action> {
    if passages.is_empty() {
        return None;
    }
    let notes: Vec<Value> = passages
        .iter()
        .map(|p| {
            json!({
                "deckName": p.deck,
                "modelName": model,
                "fields": NoteFields::render(p).into_value(),
            })
        })
        .collect();
    Some(Action::new("addNotes", json!({ "notes": notes })))
}

/// `updateNoteFields` for every dirty candidate.
///
/// Content changes re-render every field. A candidate whose only difference is the
/// deck keeps its faces and gets every identity and metadata field rewritten, so the
/// stored deck and path match again and the next run sees it clean.
pub fn update_note_fields(dirty: &[Candidate<'_>]) -> Option<Action> {
    if dirty.is_empty() {
        return None;
    }
    let actions = dirty
        .iter()
        .map(|c| {
            let fields = if c.is_content_dirty() {
                NoteFields::render(c.passage).into_value()
            } else {
                NoteFields::metadata_value(c.passage)
            };
            Action::new(
                "updateNoteFields",
                json!({ "note": { "id": c.card.note_id, "fields": fields } }),
            )
        })
        .collect();
    Some(Action::multi(actions))
}

/// One `deleteNotes` request for every orphaned note.
pub fn delete_notes(note_ids: &[i64]) -> Option<Action> {
    if note_ids.is_empty() {
        return None;
    }
    Some(Action::new("deleteNotes", json!({ "notes": note_ids })))
}
