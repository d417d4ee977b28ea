use std::collections::HashSet;

use siyuan_anki_core::contract::{Card, Passage};
use siyuan_anki_core::matcher::reconcile;

fn passage(id: &str, hash: &str, deck: &str) -> Passage {
    Passage {
        id: id.to_string(),
        parent_id: format!("parent-{id}"),
        box_id: "box".to_string(),
        hpath: "/Doc".to_string(),
        markdown: format!("body of {id}"),
        hash: hash.to_string(),
        updated: "20230101120000".to_string(),
        parent_markdown: "parent body".to_string(),
        parent_hash: "ph".to_string(),
        parent_updated: "20230101110000".to_string(),
        deck: deck.to_string(),
    }
}

/// The card a previous run would have written for `p`.
fn mirror(p: &Passage, note_id: i64) -> Card {
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
        faces: vec![note_id * 10],
    }
}

#[test]
fn test_new_passage_is_created() {
    let passages = vec![passage("a", "h1", "Notes::Doc")];
    let sets = reconcile(&passages, &[]);
    assert_eq!(sets.to_create.len(), 1);
    assert_eq!(sets.to_create[0].id, "a");
    assert!(sets.to_delete.is_empty());
    assert!(sets.candidates.is_empty());
}

#[test]
fn test_orphaned_card_is_deleted() {
    let gone = passage("gone", "h", "Notes::Doc");
    let cards = vec![mirror(&gone, 7)];
    let sets = reconcile(&[], &cards);
    assert!(sets.to_create.is_empty());
    assert_eq!(sets.to_delete.len(), 1);
    assert_eq!(sets.to_delete[0].note_id, 7);
}

#[test]
fn test_mirrored_state_is_converged() {
    let passages = vec![
        passage("a", "h1", "Notes::Doc"),
        passage("b", "h2", "Notes::Other"),
    ];
    let cards: Vec<Card> = passages
        .iter()
        .enumerate()
        .map(|(i, p)| mirror(p, i as i64 + 1))
        .collect();
    let sets = reconcile(&passages, &cards);
    assert!(sets.is_converged());
    assert_eq!(sets.clean().len(), 2);
}

#[test]
fn test_own_hash_change_is_content_dirty() {
    let old = passage("a", "h1", "Notes::Doc");
    let cards = vec![mirror(&old, 1)];
    let passages = vec![passage("a", "h2", "Notes::Doc")];
    let sets = reconcile(&passages, &cards);
    assert_eq!(sets.content_dirty().len(), 1);
    assert!(sets.deck_drift().is_empty());
}

#[test]
fn test_parent_hash_change_is_content_dirty() {
    let p = passage("a", "h1", "Notes::Doc");
    let cards = vec![mirror(&p, 1)];
    let mut changed = p.clone();
    changed.parent_hash = "ph-new".to_string();
    let passages = vec![changed];
    let sets = reconcile(&passages, &cards);
    assert_eq!(sets.content_dirty().len(), 1);
}

#[test]
fn test_timestamp_alone_does_not_dirty() {
    let p = passage("a", "h1", "Notes::Doc");
    let cards = vec![mirror(&p, 1)];
    let mut touched = p.clone();
    touched.updated = "20990101000000".to_string();
    let passages = vec![touched];
    let sets = reconcile(&passages, &cards);
    assert!(sets.is_converged());
}

#[test]
fn test_deck_change_alone_is_drift_not_content() {
    let p = passage("a", "h1", "Notes::Old");
    let cards = vec![mirror(&p, 1)];
    let passages = vec![passage("a", "h1", "Notes::New")];
    let sets = reconcile(&passages, &cards);
    assert!(sets.content_dirty().is_empty());
    assert_eq!(sets.deck_drift().len(), 1);
    assert_eq!(sets.dirty().len(), 1);
}

#[test]
fn test_identity_is_case_sensitive() {
    let upper = passage("ABC", "h", "Notes::Doc");
    let cards = vec![mirror(&upper, 1)];
    let passages = vec![passage("abc", "h", "Notes::Doc")];
    let sets = reconcile(&passages, &cards);
    assert_eq!(sets.to_create.len(), 1);
    assert_eq!(sets.to_delete.len(), 1);
}

#[test]
fn test_partition_is_total_and_disjoint() {
    let kept = passage("kept", "h", "Notes::Doc");
    let edited = passage("edited", "h", "Notes::Doc");
    let gone = passage("gone", "h", "Notes::Doc");
    let cards = vec![mirror(&kept, 1), mirror(&edited, 2), mirror(&gone, 3)];
    let passages = vec![
        kept.clone(),
        passage("edited", "h-new", "Notes::Doc"),
        passage("fresh", "h", "Notes::Doc"),
    ];
    let sets = reconcile(&passages, &cards);

    let mut seen_passages: HashSet<&str> = HashSet::new();
    for p in &sets.to_create {
        assert!(seen_passages.insert(p.id.as_str()));
    }
    for c in &sets.candidates {
        assert!(seen_passages.insert(c.passage.id.as_str()));
    }
    assert_eq!(seen_passages.len(), passages.len());

    let mut seen_notes: HashSet<i64> = HashSet::new();
    for c in &sets.to_delete {
        assert!(seen_notes.insert(c.note_id));
    }
    for c in &sets.candidates {
        assert!(seen_notes.insert(c.card.note_id));
    }
    assert_eq!(seen_notes.len(), cards.len());

    assert_eq!(sets.to_create[0].id, "fresh");
    assert_eq!(sets.to_delete[0].id, "gone");
    assert_eq!(sets.content_dirty().len(), 1);
    assert_eq!(sets.clean().len(), 1);
}

#[test]
fn test_empty_source_deletes_every_card() {
    let a = passage("a", "h", "Notes::Doc");
    let b = passage("b", "h", "Notes::Doc");
    let cards = vec![mirror(&a, 1), mirror(&b, 2)];
    let sets = reconcile(&[], &cards);
    assert_eq!(sets.to_delete.len(), 2);
}
