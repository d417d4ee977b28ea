//! Identity matching between passages and cards.
//!
//! Identity is the passage id stored in the note's `id` field, compared as an opaque
//! case-sensitive string. There is no fallback matching on content: if SiYuan
//! regenerates a block id, the old note is deleted and a new one created.

use std::collections::{HashMap, HashSet};

use crate::contract::{Card, Passage};

/// A passage and the card that mirrors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub passage: &'a Passage,
    pub card: &'a Card,
}

impl<'a> Candidate<'a> {
    /// Own body or parent body changed since the card was written.
    pub fn is_content_dirty(&self) -> bool {
        self.card.hash != self.passage.hash || self.card.parent_hash != self.passage.parent_hash
    }

    pub fn has_deck_drift(&self) -> bool {
        self.card.deck != self.passage.deck
    }

    pub fn is_dirty(&self) -> bool {
        self.is_content_dirty() || self.has_deck_drift()
    }
}

/// Partition of passages and cards for one run.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationSets<'a> {
    pub to_create: Vec<&'a Passage>,
    pub to_delete: Vec<&'a Card>,
    pub candidates: Vec<Candidate<'a>>,
}

impl<'a> ReconciliationSets<'a> {
    /// Candidates whose card needs any field rewritten.
    pub fn dirty(&self) -> Vec<Candidate<'a>> {
        self.candidates.iter().copied().filter(Candidate::is_dirty).collect()
    }

    pub fn content_dirty(&self) -> Vec<Candidate<'a>> {
        self.candidates
            .iter()
            .copied()
            .filter(Candidate::is_content_dirty)
            .collect()
    }

    pub fn deck_drift(&self) -> Vec<Candidate<'a>> {
        self.candidates
            .iter()
            .copied()
            .filter(Candidate::has_deck_drift)
            .collect()
    }

    pub fn clean(&self) -> Vec<Candidate<'a>> {
        self.candidates
            .iter()
            .copied()
            .filter(|c| !c.is_dirty())
            .collect()
    }

    /// Nothing to create, delete or rewrite.
    pub fn is_converged(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty() && self.dirty().is_empty()
    }
}

/// Splits the source snapshot and destination snapshot into create, delete and
/// candidate sets. Record order of the inputs is preserved in every output set.
pub fn reconcile<'a>(passages: &'a [Passage], cards: &'a [Card]) -> ReconciliationSets<'a> {
    let by_id: HashMap<&str, &Passage> = passages.iter().map(|p| (p.id.as_str(), p)).collect();
    let card_ids: HashSet<&str> = cards.iter().map(|c| c.id.as_str()).collect();

    let mut sets = ReconciliationSets::default();
    for card in cards {
        match by_id.get(card.id.as_str()) {
            Some(&passage) => sets.candidates.push(Candidate { passage, card }),
            None => sets.to_delete.push(card),
        }
    }
    sets.to_create = passages
        .iter()
        .filter(|p| !card_ids.contains(p.id.as_str()))
        .collect();
    sets
}
