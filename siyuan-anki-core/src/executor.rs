//! Mutation executor and empty-deck cleanup.
//!
//! Kinds are submitted one at a time in [`CommandKind::SUBMIT_ORDER`]. The first kind
//! that fails is logged and stops the submission; kinds already applied stay applied.
//! Nothing here raises a write failure to the caller: the outcome is returned as an
//! [`ExecutionReport`].

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::batch::{CommandBatch, CommandKind};
use crate::contract::AnkiApi;
use crate::error::SyncResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Kinds the destination accepted, in submission order.
    pub submitted: Vec<CommandKind>,
    /// The kind that was rejected and why.
    pub failed: Option<(CommandKind, String)>,
    /// Kinds present in the batch but never sent because an earlier kind failed.
    pub skipped: Vec<CommandKind>,
    /// Individual sub-commands that failed inside an accepted kind.
    pub item_failures: usize,
}

impl ExecutionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

pub async fn execute<A>(api: &A, batch: &CommandBatch) -> ExecutionReport
where
    A: AnkiApi + ?Sized,
{
    let mut report = ExecutionReport::default();
    for (kind, action) in batch.in_submit_order() {
        if report.failed.is_some() {
            report.skipped.push(kind);
            continue;
        }
        debug!(%kind, "[SYNC][EXEC] Invoking");
        match api.submit(action).await {
            Ok(result) => {
                let failures = item_failures(kind, &result);
                if failures > 0 {
                    warn!(%kind, failures, result = %result, "[SYNC][EXEC] Some sub-commands failed");
                } else {
                    info!(%kind, "[SYNC][EXEC] Accepted");
                }
                report.item_failures += failures;
                report.submitted.push(kind);
            }
            Err(e) => {
                error!(%kind, error = %e, "[SYNC][EXEC][ERROR] Rejected, skipping remaining kinds");
                report.failed = Some((kind, e.to_string()));
            }
        }
    }
    report
}

/// Counts failed entries in the result of an accepted request.
///
/// `addNotes` answers with one note id per note and `null` for each note it could not
/// add; `multi` answers with one `{result, error}` object per sub-action.
fn item_failures(kind: CommandKind, result: &Value) -> usize {
    let Some(entries) = result.as_array() else {
        return 0;
    };
    match kind {
        CommandKind::AddNotes => entries.iter().filter(|v| v.is_null()).count(),
        CommandKind::DeleteNotes => 0,
        _ => entries
            .iter()
            .filter(|v| v.get("error").is_some_and(|e| !e.is_null()))
            .count(),
    }
}

/// Case-insensitive pattern anchored at the start of the deck name.
pub fn preserve_pattern(pattern: &str) -> SyncResult<Regex> {
    Ok(RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()?)
}

/// Deletes every deck that holds no cards and is not protected by `preserve`.
/// Returns the names of the deleted decks.
pub async fn remove_empty_decks<A>(api: &A, preserve: &Regex) -> SyncResult<Vec<String>>
where
    A: AnkiApi + ?Sized,
{
    let decks = api.deck_names().await?;
    if decks.is_empty() {
        return Ok(Vec::new());
    }
    let counts = api.count_cards(&decks).await?;
    let empty: Vec<String> = decks
        .into_iter()
        .zip(counts)
        .filter(|(deck, count)| *count == 0 && !preserve.is_match(deck))
        .map(|(deck, _)| deck)
        .collect();
    if empty.is_empty() {
        debug!("[SYNC][CLEANUP] No empty decks to remove");
        return Ok(empty);
    }
    match api.delete_decks(&empty).await {
        Ok(()) => {
            info!(decks = ?empty, "[SYNC][CLEANUP] Removed empty decks");
            Ok(empty)
        }
        Err(e) => {
            error!(decks = ?empty, error = %e, "[SYNC][CLEANUP][ERROR] Failed to remove empty decks");
            Ok(Vec::new())
        }
    }
}
