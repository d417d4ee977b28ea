//! SiYuan local API client: notebook names and toast notifications.
//!
//! SiYuan answers every call with `{code, msg, data}`; a non-zero `code` is
//! reported as [`SyncError::Source`]. When the workspace has an API token set, it is
//! sent as `Authorization: Token <token>`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use siyuan_anki_core::contract::{Notebook, SourceApp};
use siyuan_anki_core::error::{SyncError, SyncResult};

pub const DEFAULT_SIYUAN_PORT: u16 = 6806;

#[derive(Debug, Deserialize)]
struct Reply {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct NotebookList {
    #[serde(default)]
    notebooks: Vec<Notebook>,
}

fn open_reply(path: &str, body: Value) -> SyncResult<Value> {
    let reply: Reply = serde_json::from_value(body)
        .map_err(|e| SyncError::Transport(format!("{path}: malformed response: {e}")))?;
    if reply.code != 0 {
        return Err(SyncError::Source(format!(
            "{path}: code {}: {}",
            reply.code, reply.msg
        )));
    }
    Ok(reply.data)
}

pub struct SiYuanClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl SiYuanClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into();
        tracing::info!(
            base_url = %base_url,
            token_set = token.is_some(),
            "Initialized SiYuan client"
        );
        SiYuanClient {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    async fn post(&self, path: &str, body: Value) -> SyncResult<Value> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {token}"));
        }
        let response = request.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "SiYuan API unreachable");
            SyncError::Transport(format!("{path}: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transport(format!("{path}: HTTP status {status}")));
        }
        let reply: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Transport(format!("{path}: {e}")))?;
        open_reply(path, reply)
    }
}

#[async_trait]
impl SourceApp for SiYuanClient {
    async fn list_notebooks(&self) -> SyncResult<Vec<Notebook>> {
        let data = self.post("/api/notebook/lsNotebooks", json!({})).await?;
        let list: NotebookList = serde_json::from_value(data)
            .map_err(|e| SyncError::Transport(format!("lsNotebooks: {e}")))?;
        Ok(list.notebooks)
    }

    async fn push_message(&self, msg: &str, timeout_ms: u64) -> SyncResult<()> {
        self.post(
            "/api/notification/pushMsg",
            json!({ "msg": msg, "timeout": timeout_ms }),
        )
        .await?;
        Ok(())
    }
}
