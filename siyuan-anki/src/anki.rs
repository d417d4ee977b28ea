#![doc = "AnkiConnect client: implements the core `AnkiApi` trait over HTTP."]
//
//! # AnkiConnect Integration (CLI <-> Core)
//!
//! Every request is a `POST` of `{action, version, params}` to the AnkiConnect
//! endpoint (default `http://localhost:8765`). Every response is an envelope
//! `{result, error}`; a non-null `error` becomes [`SyncError::Rejected`], anything
//! that prevents reading the envelope becomes [`SyncError::Transport`].
//!
//! The planning and execution logic lives in `siyuan-anki-core`; this module only
//! moves JSON.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use siyuan_anki_core::batch::Action;
use siyuan_anki_core::contract::{AnkiApi, NoteInfo};
use siyuan_anki_core::error::{SyncError, SyncResult};

pub const DEFAULT_ANKI_PORT: u16 = 8765;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Splits an AnkiConnect envelope into its result or a rejection.
fn open_envelope(action: &str, body: Value) -> SyncResult<Value> {
    let envelope: Envelope = serde_json::from_value(body)
        .map_err(|e| SyncError::Transport(format!("{action}: malformed response: {e}")))?;
    match envelope.error {
        Some(message) => Err(SyncError::rejected(action, message)),
        None => Ok(envelope.result),
    }
}

/// Sub-results of a `multi` request. Sub-actions sent with a version come back
/// wrapped in their own envelope; unwrap those.
fn multi_results(action: &str, result: Value) -> SyncResult<Vec<Value>> {
    let Value::Array(entries) = result else {
        return Err(SyncError::Transport(format!(
            "{action}: expected an array of sub-results"
        )));
    };
    entries
        .into_iter()
        .map(|entry| {
            let wrapped = entry
                .as_object()
                .is_some_and(|map| map.contains_key("result") || map.contains_key("error"));
            if wrapped {
                open_envelope(action, entry)
            } else {
                Ok(entry)
            }
        })
        .collect()
}

pub struct AnkiConnectClient {
    http: reqwest::Client,
    endpoint: String,
}

impl AnkiConnectClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        tracing::info!(endpoint = %endpoint, "Initialized AnkiConnect client");
        AnkiConnectClient {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    async fn invoke(&self, action: &Action) -> SyncResult<Value> {
        tracing::debug!(action = %action.action, "AnkiConnect request");
        let response = self
            .http
            .post(&self.endpoint)
            .json(action)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(action = %action.action, error = %e, "AnkiConnect unreachable");
                SyncError::Transport(format!("{}: {e}", action.action))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::error!(action = %action.action, %status, "AnkiConnect answered with non-200 status");
            return Err(SyncError::Transport(format!(
                "{}: HTTP status {status}",
                action.action
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Transport(format!("{}: {e}", action.action)))?;
        open_envelope(&action.action, body)
    }

    async fn call<T: DeserializeOwned>(&self, action: Action) -> SyncResult<T> {
        let result = self.invoke(&action).await?;
        serde_json::from_value(result).map_err(|e| {
            SyncError::Transport(format!("{}: unexpected result shape: {e}", action.action))
        })
    }
}

#[async_trait]
impl AnkiApi for AnkiConnectClient {
    async fn model_names(&self) -> SyncResult<Vec<String>> {
        self.call(Action::bare("modelNames")).await
    }

    async fn model_field_names(&self, model: &str) -> SyncResult<Vec<String>> {
        self.call(Action::new("modelFieldNames", json!({ "modelName": model })))
            .await
    }

    async fn create_model(&self, definition: Value) -> SyncResult<()> {
        self.invoke(&Action::new("createModel", definition)).await?;
        Ok(())
    }

    async fn deck_names(&self) -> SyncResult<Vec<String>> {
        self.call(Action::bare("deckNames")).await
    }

    async fn find_notes(&self, query: &str) -> SyncResult<Vec<i64>> {
        self.call(Action::new("findNotes", json!({ "query": query })))
            .await
    }

    async fn notes_info(&self, note_ids: &[i64]) -> SyncResult<Vec<NoteInfo>> {
        self.call(Action::new("notesInfo", json!({ "notes": note_ids })))
            .await
    }

    async fn count_cards(&self, decks: &[String]) -> SyncResult<Vec<usize>> {
        let queries = decks
            .iter()
            .map(|deck| Action::new("findCards", json!({ "query": format!("\"deck:{deck}\"") })))
            .collect();
        let multi = Action::multi(queries);
        let result = self.invoke(&multi).await?;
        let counts = multi_results(&multi.action, result)?
            .iter()
            .map(|cards| cards.as_array().map(Vec::len).unwrap_or(0))
            .collect();
        Ok(counts)
    }

    async fn delete_decks(&self, decks: &[String]) -> SyncResult<()> {
        self.invoke(&Action::new(
            "deleteDecks",
            json!({ "decks": decks, "cardsToo": true }),
        ))
        .await?;
        Ok(())
    }

    async fn submit(&self, action: &Action) -> SyncResult<Value> {
        self.invoke(action).await
    }
}
