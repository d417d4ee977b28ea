//! High-level pipeline: one reconciliation run from SiYuan into Anki.
//!
//! A run reads both sides fresh, computes the difference, submits one batched action
//! per mutation kind and then tidies up:
//!   - checks that Anki and SiYuan are running (nothing is touched otherwise)
//!   - bootstraps the note model if it is missing
//!   - loads flagged passages with their parent context and derives their decks
//!   - loads the notes of the model from Anki
//!   - plans the [`CommandBatch`] (decks, new notes, field updates, media, moves, deletions)
//!   - executes it, removes decks left empty, and pushes a summary to SiYuan
//!
//! # Error Handling
//! Every read before execution propagates its error and aborts the run. Write failures
//! are recorded in [`SyncReport::execution`]; the run still completes. A failed read
//! during deck cleanup is returned only after the summary has been pushed to SiYuan.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Pure planning step: [`plan`]

use std::collections::{HashMap, HashSet};

use tracing::{error, info, warn};

use crate::batch::{self, CommandBatch, CommandKind};
use crate::config::SyncConfig;
use crate::contract::{AnkiApi, BlockStore, Card, Notebook, Passage, ProcessProbe, SourceApp};
use crate::deck;
use crate::error::{SyncError, SyncResult};
use crate::executor::{self, ExecutionReport};
use crate::matcher;
use crate::media;
use crate::model;

/// What one run decided and what happened when it was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    /// Candidates whose own or parent body changed.
    pub updated: usize,
    /// Candidates whose deck changed.
    pub moved: usize,
    pub deleted: usize,
    pub execution: ExecutionReport,
    pub removed_decks: Vec<String>,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "num of create: {}\nnum of update: {}\nnum of delete: {}",
            self.created, self.updated, self.deleted
        )
    }
}

/// The batch for one run plus the set sizes that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub batch: CommandBatch,
    pub created: usize,
    pub updated: usize,
    pub moved: usize,
    pub deleted: usize,
}

pub async fn synchronise<S, A, N, P>(
    config: &SyncConfig,
    store: &S,
    anki: &A,
    source_app: &N,
    probe: &P,
) -> SyncResult<SyncReport>
where
    S: BlockStore + ?Sized,
    A: AnkiApi + ?Sized,
    N: SourceApp + ?Sized,
    P: ProcessProbe + ?Sized,
{
    info!("[SYNC] Starting synchronisation run");

    for name in &config.required_processes {
        if !probe.is_running(name) {
            warn!(process = %name, "[SYNC] Required process not running, nothing synced");
            return Err(SyncError::EnvironmentUnavailable(name.clone()));
        }
    }

    let notebooks = source_app.list_notebooks().await?;
    info!(notebooks = notebooks.len(), "[SYNC] Listed SiYuan notebooks");

    model::ensure_model(anki, &config.model).await?;

    let existing_decks: HashSet<String> = anki.deck_names().await?.into_iter().collect();

    let passages = load_passages(store, config, &notebooks)?;
    let cards = load_cards(anki, &config.model).await?;
    info!(
        passages = passages.len(),
        cards = cards.len(),
        "[SYNC] Loaded source and destination snapshots"
    );

    let preserve = executor::preserve_pattern(&config.preserve_decks)?;
    let planned = plan(&passages, &cards, &existing_decks, config);
    info!(
        create = planned.created,
        update = planned.updated,
        moved = planned.moved,
        delete = planned.deleted,
        kinds = planned.batch.len(),
        "[SYNC] Planned command batch"
    );

    let execution = executor::execute(anki, &planned.batch).await;

    let cleanup = executor::remove_empty_decks(anki, &preserve).await;
    let (removed_decks, cleanup_error) = match cleanup {
        Ok(removed) => (removed, None),
        Err(e) => {
            error!(error = %e, "[SYNC][CLEANUP][ERROR] Could not read decks for cleanup");
            (Vec::new(), Some(e))
        }
    };

    let report = SyncReport {
        created: planned.created,
        updated: planned.updated,
        moved: planned.moved,
        deleted: planned.deleted,
        execution,
        removed_decks,
    };

    let message = format!("Anki sync finished\n{}", report.summary());
    if let Err(e) = source_app
        .push_message(&message, config.notify_timeout_ms)
        .await
    {
        warn!(error = %e, "[SYNC] Failed to push finish notification to SiYuan");
    }

    if let Some(e) = cleanup_error {
        return Err(e);
    }

    info!(
        complete = report.execution.is_complete(),
        "[SYNC] Synchronisation run finished"
    );
    Ok(report)
}

/// Flagged blocks joined with their eligible parents, decks resolved.
pub fn load_passages<S>(
    store: &S,
    config: &SyncConfig,
    notebooks: &[Notebook],
) -> SyncResult<Vec<Passage>>
where
    S: BlockStore + ?Sized,
{
    let ids = store.flagged_block_ids(&config.ref_marker)?;
    if ids.is_empty() {
        warn!(marker = %config.ref_marker, "[SYNC] No flagged blocks in SiYuan");
        return Ok(Vec::new());
    }
    let blocks = store.blocks_by_ids(&ids, &config.passage_types)?;

    let mut seen = HashSet::new();
    let parent_ids: Vec<String> = blocks
        .iter()
        .filter(|b| !b.parent_id.is_empty() && seen.insert(b.parent_id.as_str()))
        .map(|b| b.parent_id.clone())
        .collect();
    let parents: HashMap<String, _> = if parent_ids.is_empty() {
        HashMap::new()
    } else {
        store
            .parent_blocks(&parent_ids, &config.parent_types)?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect()
    };

    let names: HashMap<&str, &str> = notebooks
        .iter()
        .map(|n| (n.id.as_str(), n.name.as_str()))
        .collect();

    let passages = blocks
        .into_iter()
        .map(|block| {
            let notebook = match names.get(block.box_id.as_str()) {
                Some(name) => name.to_string(),
                None => {
                    warn!(box_id = %block.box_id, block = %block.id, "[SYNC] Unknown notebook, using its id as deck root");
                    block.box_id.clone()
                }
            };
            let parent = parents.get(&block.parent_id);
            Passage::assemble(block, parent, &notebook)
        })
        .collect();
    Ok(passages)
}

/// Every note of `model` currently in Anki.
pub async fn load_cards<A>(anki: &A, model: &str) -> SyncResult<Vec<Card>>
where
    A: AnkiApi + ?Sized,
{
    let note_ids = anki.find_notes(&format!("\"note:{model}\"")).await?;
    if note_ids.is_empty() {
        return Ok(Vec::new());
    }
    let infos = anki.notes_info(&note_ids).await.map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] notesInfo failed");
        e
    })?;
    Ok(infos
        .into_iter()
        .filter(|n| n.note_id != 0)
        .map(Card::from)
        .collect())
}

/// Computes the batch for one run from the two snapshots. Pure.
pub fn plan(
    passages: &[Passage],
    cards: &[Card],
    existing_decks: &HashSet<String>,
    config: &SyncConfig,
) -> SyncPlan {
    let sets = matcher::reconcile(passages, cards);
    let dirty = sets.dirty();
    let drift = sets.deck_drift();
    let content_dirty = sets.content_dirty().len();

    let wanted_decks = sets
        .to_create
        .iter()
        .map(|p| p.deck.as_str())
        .chain(drift.iter().map(|c| c.passage.deck.as_str()));

    let uploads = media::collect_uploads(
        sets.to_create
            .iter()
            .copied()
            .chain(dirty.iter().map(|c| c.passage)),
        &config.assets_dir(),
    );

    let note_ids: Vec<i64> = sets.to_delete.iter().map(|c| c.note_id).collect();

    let batch = CommandBatch::new()
        .with(
            CommandKind::CreateDeck,
            batch::create_decks(wanted_decks, existing_decks),
        )
        .with(
            CommandKind::AddNotes,
            batch::add_notes(&sets.to_create, &config.model),
        )
        .with(
            CommandKind::UpdateNoteFields,
            batch::update_note_fields(&dirty),
        )
        .with(
            CommandKind::StoreMediaFile,
            media::store_media_action(&uploads),
        )
        .with(CommandKind::ChangeDeck, deck::change_deck_action(&drift))
        .with(CommandKind::DeleteNotes, batch::delete_notes(&note_ids));

    SyncPlan {
        batch,
        created: sets.to_create.len(),
        updated: content_dirty,
        moved: drift.len(),
        deleted: sets.to_delete.len(),
    }
}
