use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};

use siyuan_anki_core::batch::{CommandBatch, CommandKind};
use siyuan_anki_core::config::SyncConfig;
use siyuan_anki_core::contract::{BlockRow, Card, NoteField, NoteInfo, Passage};
use siyuan_anki_core::model::NOTE_FIELDS;
use siyuan_anki_core::synchronise::plan;

const ASSET: &str = "image-20230101120000-abcdefg.png";

fn passage(id: &str, hash: &str, deck: &str) -> Passage {
    Passage {
        id: id.to_string(),
        parent_id: "p".to_string(),
        box_id: "box".to_string(),
        hpath: "/Doc".to_string(),
        markdown: format!("body {id}"),
        hash: hash.to_string(),
        updated: "20230101120000".to_string(),
        deck: deck.to_string(),
        ..Default::default()
    }
}

fn mirror(p: &Passage, note_id: i64, faces: Vec<i64>) -> Card {
    Card {
        note_id,
        id: p.id.clone(),
        parent_id: p.parent_id.clone(),
        hpath: p.hpath.clone(),
        hash: p.hash.clone(),
        updated: p.updated.clone(),
        parent_updated: p.parent_updated.clone(),
        parent_hash: p.parent_hash.clone(),
        deck: p.deck.clone(),
        faces,
    }
}

fn decks(names: &[&str]) -> HashSet<String> {
    names.iter().map(|d| d.to_string()).collect()
}

#[test]
fn test_new_passage_in_new_deck() {
    let config = SyncConfig::new("/ws");
    let passages = vec![passage("a", "h", "Notes::Doc")];
    let planned = plan(&passages, &[], &decks(&["Default"]), &config);

    assert_eq!(planned.created, 1);
    let create = planned
        .batch
        .get(CommandKind::CreateDeck)
        .expect("deck should be created");
    assert_eq!(create.sub_actions()[0]["params"], json!({ "deck": "Notes::Doc" }));

    let add = planned.batch.get(CommandKind::AddNotes).expect("addNotes");
    let note = &add.params["notes"][0];
    assert_eq!(note["deckName"], "Notes::Doc");
    assert_eq!(note["modelName"], "SiYuanModel");
    assert_eq!(note["fields"]["id"], "a");
    assert_eq!(note["fields"]["hash"], "h");
    assert_eq!(note["fields"]["deck"], "Notes::Doc");
    assert_eq!(note["fields"]["back"], "");
    assert!(note["fields"]["front"]
        .as_str()
        .unwrap()
        .contains("siyuan://blocks/a"));
}

#[test]
fn test_existing_deck_is_not_recreated_and_duplicates_collapse() {
    let config = SyncConfig::new("/ws");
    let passages = vec![
        passage("a", "h", "Notes::Doc"),
        passage("b", "h", "Notes::Doc"),
        passage("c", "h", "Notes::Other"),
    ];
    let planned = plan(&passages, &[], &decks(&["Notes::Other"]), &config);
    let create = planned.batch.get(CommandKind::CreateDeck).unwrap();
    assert_eq!(create.sub_actions().len(), 1);
    assert_eq!(create.sub_actions()[0]["params"]["deck"], "Notes::Doc");
}

#[test]
fn test_converged_state_plans_nothing() {
    let config = SyncConfig::new("/ws");
    let passages = vec![passage("a", "h", "Notes::Doc")];
    let cards = vec![mirror(&passages[0], 1, vec![11])];
    let planned = plan(&passages, &cards, &decks(&["Notes::Doc"]), &config);
    assert!(planned.batch.is_empty());
    assert_eq!(
        (planned.created, planned.updated, planned.moved, planned.deleted),
        (0, 0, 0, 0)
    );
}

#[test]
fn test_edit_rewrites_all_fields() {
    let config = SyncConfig::new("/ws");
    let old = passage("a", "h1", "Notes::Doc");
    let cards = vec![mirror(&old, 9, vec![90])];
    let passages = vec![passage("a", "h2", "Notes::Doc")];
    let planned = plan(&passages, &cards, &decks(&["Notes::Doc"]), &config);

    assert_eq!(planned.updated, 1);
    let update = planned.batch.get(CommandKind::UpdateNoteFields).unwrap();
    let sub = update.sub_actions()[0];
    assert_eq!(sub["action"], "updateNoteFields");
    assert_eq!(sub["params"]["note"]["id"], 9);
    assert_eq!(sub["params"]["note"]["fields"]["hash"], "h2");
    assert!(planned.batch.get(CommandKind::ChangeDeck).is_none());
}

#[test]
fn test_deck_move_updates_deck_field_and_moves_oldest_card() {
    let config = SyncConfig::new("/ws");
    let mut old = passage("a", "h", "Notes::Old");
    old.hpath = "/Old".to_string();
    let cards = vec![mirror(&old, 3, vec![31, 30])];
    let mut moved = passage("a", "h", "Notes::New");
    moved.hpath = "/New".to_string();
    moved.updated = "20240101120000".to_string();
    let passages = vec![moved];
    let planned = plan(&passages, &cards, &decks(&["Notes::Old"]), &config);

    assert_eq!(planned.updated, 0);
    assert_eq!(planned.moved, 1);

    let create = planned.batch.get(CommandKind::CreateDeck).unwrap();
    assert_eq!(create.sub_actions()[0]["params"]["deck"], "Notes::New");

    let update = planned.batch.get(CommandKind::UpdateNoteFields).unwrap();
    assert_eq!(
        update.sub_actions()[0]["params"]["note"]["fields"],
        json!({
            "id": "a",
            "parent_id": "p",
            "hpath": "/New",
            "hash": "h",
            "updated": "20240101120000",
            "parent_updated": "",
            "parent_hash": "",
            "deck": "Notes::New",
        })
    );

    let change = planned.batch.get(CommandKind::ChangeDeck).unwrap();
    assert_eq!(
        change.sub_actions()[0]["params"],
        json!({ "cards": [30], "deck": "Notes::New" })
    );
}

#[test]
fn test_orphans_are_deleted_by_note_id() {
    let config = SyncConfig::new("/ws");
    let gone = passage("gone", "h", "Notes::Doc");
    let cards = vec![mirror(&gone, 42, vec![420])];
    let planned = plan(&[], &cards, &decks(&[]), &config);
    assert_eq!(planned.deleted, 1);
    let delete = planned.batch.get(CommandKind::DeleteNotes).unwrap();
    assert_eq!(delete.action, "deleteNotes");
    assert_eq!(delete.params, json!({ "notes": [42] }));
}

#[test]
fn test_media_is_uploaded_from_assets_dir() {
    let config = SyncConfig::new("/ws");
    let mut p = passage("a", "h", "Notes::Doc");
    p.markdown = format!("![x](assets/{ASSET})");
    let passages = vec![p];
    let planned = plan(&passages, &[], &decks(&["Notes::Doc"]), &config);

    let media = planned.batch.get(CommandKind::StoreMediaFile).unwrap();
    let sub = media.sub_actions()[0];
    assert_eq!(sub["action"], "storeMediaFile");
    assert_eq!(sub["params"]["filename"], ASSET);
    let expected = config.assets_dir().join(ASSET);
    assert_eq!(sub["params"]["path"], expected.to_string_lossy().into_owned());
}

#[test]
fn test_media_is_uploaded_from_parent_body() {
    let config = SyncConfig::new("/ws");
    let mut p = passage("a", "h", "Notes::Doc");
    p.parent_markdown = format!("- ![diagram](assets/{ASSET})");
    p.parent_hash = "ph".to_string();
    let passages = vec![p];
    let planned = plan(&passages, &[], &decks(&["Notes::Doc"]), &config);

    let media = planned.batch.get(CommandKind::StoreMediaFile).unwrap();
    let subs = media.sub_actions();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["params"]["filename"], ASSET);

    let add = planned.batch.get(CommandKind::AddNotes).unwrap();
    let back = add.params["notes"][0]["fields"]["back"].as_str().unwrap();
    assert!(back.contains(ASSET), "back should reference the bare file name: {back}");
    assert!(!back.contains("assets/"));
}

#[test]
fn test_batch_runs_in_submit_order() {
    let config = SyncConfig::new("/ws");
    let moved_old = passage("moved", "h", "Notes::Old");
    let gone = passage("gone", "h", "Notes::Doc");
    let cards = vec![mirror(&moved_old, 1, vec![10]), mirror(&gone, 2, vec![20])];
    let mut fresh = passage("fresh", "h", "Notes::Fresh");
    fresh.markdown = format!("(assets/{ASSET})");
    let passages = vec![fresh, passage("moved", "h", "Notes::New")];
    let planned = plan(&passages, &cards, &decks(&[]), &config);

    let kinds: Vec<CommandKind> = planned.batch.in_submit_order().map(|(k, _)| k).collect();
    assert_eq!(kinds, CommandKind::SUBMIT_ORDER.to_vec());
}

#[test]
fn test_create_scenario_renders_math_and_derives_deck() {
    let config = SyncConfig::new("/ws");
    let block = BlockRow {
        id: "X".to_string(),
        box_id: "box".to_string(),
        hpath: "/A/B".to_string(),
        markdown: "hello $x$".to_string(),
        hash: "hx".to_string(),
        block_type: "p".to_string(),
        ..Default::default()
    };
    let passages = vec![Passage::assemble(block, None, "DocName")];
    let planned = plan(&passages, &[], &decks(&[]), &config);

    let add = planned.batch.get(CommandKind::AddNotes).unwrap();
    let note = &add.params["notes"][0];
    assert_eq!(note["deckName"], "DocName::A::B");
    let front = note["fields"]["front"].as_str().unwrap();
    assert!(front.contains("\\(x\\)"), "math should be rewritten: {front}");
    assert!(!front.contains('$'));
    assert!(planned.batch.get(CommandKind::UpdateNoteFields).is_none());
    assert!(planned.batch.get(CommandKind::DeleteNotes).is_none());
}

/// Anki-side note carrying the stored fields of `p`.
fn stored_note(p: &Passage, note_id: i64, faces: Vec<i64>) -> NoteInfo {
    let mut note = NoteInfo {
        note_id,
        model_name: "SiYuanModel".to_string(),
        cards: faces,
        ..Default::default()
    };
    let card = mirror(p, note_id, Vec::new());
    let values = [
        ("id", card.id),
        ("parent_id", card.parent_id),
        ("hpath", card.hpath),
        ("hash", card.hash),
        ("updated", card.updated),
        ("parent_updated", card.parent_updated),
        ("parent_hash", card.parent_hash),
        ("deck", card.deck),
    ];
    for (name, value) in values {
        set_field(&mut note.fields, name, &Value::String(value));
    }
    note
}

fn set_field(fields: &mut HashMap<String, NoteField>, name: &str, value: &Value) {
    let order = NOTE_FIELDS
        .iter()
        .position(|f| *f == name)
        .unwrap_or(NOTE_FIELDS.len()) as u32;
    fields.insert(
        name.to_string(),
        NoteField {
            value: value.as_str().unwrap_or_default().to_string(),
            order,
        },
    );
}

/// Applies the field-bearing actions of a planned batch to an in-memory collection.
fn apply(batch: &CommandBatch, notes: &mut Vec<NoteInfo>, decks: &mut HashSet<String>) {
    if let Some(create) = batch.get(CommandKind::CreateDeck) {
        for sub in create.sub_actions() {
            decks.insert(sub["params"]["deck"].as_str().unwrap().to_string());
        }
    }
    if let Some(add) = batch.get(CommandKind::AddNotes) {
        for new_note in add.params["notes"].as_array().unwrap() {
            let note_id = 1000 + notes.len() as i64;
            let mut note = NoteInfo {
                note_id,
                model_name: new_note["modelName"].as_str().unwrap().to_string(),
                cards: vec![note_id * 10],
                ..Default::default()
            };
            for (name, value) in new_note["fields"].as_object().unwrap() {
                set_field(&mut note.fields, name, value);
            }
            notes.push(note);
        }
    }
    if let Some(update) = batch.get(CommandKind::UpdateNoteFields) {
        for sub in update.sub_actions() {
            let target = &sub["params"]["note"];
            let note = notes
                .iter_mut()
                .find(|n| n.note_id == target["id"].as_i64().unwrap())
                .unwrap();
            for (name, value) in target["fields"].as_object().unwrap() {
                set_field(&mut note.fields, name, value);
            }
        }
    }
    if let Some(delete) = batch.get(CommandKind::DeleteNotes) {
        let gone: Vec<i64> = delete.params["notes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|id| id.as_i64().unwrap())
            .collect();
        notes.retain(|n| !gone.contains(&n.note_id));
    }
}

#[test]
fn test_applied_plan_converges_on_next_run() {
    let config = SyncConfig::new("/ws");

    let edited_before = passage("edited", "h1", "Notes::Doc");
    let mut parent_before = passage("parent", "h", "Notes::Doc");
    parent_before.parent_hash = "ph1".to_string();
    let mut moved_before = passage("moved", "h", "Notes::Old");
    moved_before.hpath = "/Old".to_string();
    let gone = passage("gone", "h", "Notes::Doc");

    let mut notes = vec![
        stored_note(&edited_before, 1, vec![10]),
        stored_note(&parent_before, 2, vec![20]),
        stored_note(&moved_before, 3, vec![31, 30]),
        stored_note(&gone, 4, vec![40]),
    ];
    let mut existing = decks(&["Default", "Notes::Doc", "Notes::Old"]);

    let mut parent_after = passage("parent", "h", "Notes::Doc");
    parent_after.parent_hash = "ph2".to_string();
    parent_after.parent_markdown = "- new context".to_string();
    let mut moved_after = passage("moved", "h", "Notes::New");
    moved_after.hpath = "/New".to_string();
    let passages = vec![
        passage("fresh", "h", "Notes::Fresh"),
        passage("edited", "h2", "Notes::Doc"),
        parent_after,
        moved_after,
    ];

    let cards: Vec<Card> = notes.iter().cloned().map(Card::from).collect();
    let first = plan(&passages, &cards, &existing, &config);
    assert_eq!(
        (first.created, first.updated, first.moved, first.deleted),
        (1, 2, 1, 1)
    );

    apply(&first.batch, &mut notes, &mut existing);

    let cards: Vec<Card> = notes.iter().cloned().map(Card::from).collect();
    let second = plan(&passages, &cards, &existing, &config);
    assert!(second.batch.is_empty(), "expected convergence, got {:?}", second.batch);
    assert_eq!(
        (second.created, second.updated, second.moved, second.deleted),
        (0, 0, 0, 0)
    );
    let moved = cards.iter().find(|c| c.id == "moved").unwrap();
    assert_eq!(moved.hpath, "/New");
}
