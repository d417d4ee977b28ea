//! Deck naming and deck moves.

use std::collections::HashMap;

use serde_json::json;

use crate::batch::Action;
use crate::matcher::Candidate;

/// Anki's deck hierarchy separator.
pub const DECK_SEPARATOR: &str = "::";

/// Deck for a passage: notebook name followed by the document's hpath, with every
/// `/` turned into `::`. `("Notes", "/A/B")` gives `Notes::A::B`.
pub fn resolve_deck(notebook_name: &str, hpath: &str) -> String {
    format!("{notebook_name}{hpath}").replace('/', DECK_SEPARATOR)
}

/// `changeDeck` sub-actions for every candidate whose deck changed.
///
/// Only the oldest card (lowest card id) of each note is moved. Cards are grouped by
/// target deck, one sub-action per deck, in order of first appearance.
pub fn change_deck_action(drift: &[Candidate<'_>]) -> Option<Action> {
    let mut groups: Vec<(&str, Vec<i64>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for candidate in drift.iter().filter(|c| c.has_deck_drift()) {
        let Some(oldest) = candidate.card.faces.iter().min().copied() else {
            continue;
        };
        let deck = candidate.passage.deck.as_str();
        let slot = *index.entry(deck).or_insert_with(|| {
            groups.push((deck, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(oldest);
    }

    if groups.is_empty() {
        return None;
    }
    let actions = groups
        .into_iter()
        .map(|(deck, cards)| Action::new("changeDeck", json!({ "cards": cards, "deck": deck })))
        .collect();
    Some(Action::multi(actions))
}
