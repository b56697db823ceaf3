//! Deck names derived from tags

use std::collections::{BTreeMap, HashMap};

use crate::prompts::Prompt;

/// Tags of the form `anki/deck/<path>` place a prompt in a subdeck
pub const DECK_TAG_PREFIX: &str = "anki/deck/";

/// Separator between deck levels in Anki
pub const DECK_SEPARATOR: &str = "::";

/// Subdeck path designated by a single tag, if it is a deck tag with at
/// least one non-empty segment
fn subdeck_from_tag(tag: &str) -> Option<String> {
    let path = tag.strip_prefix(DECK_TAG_PREFIX)?;
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join(DECK_SEPARATOR))
    }
}

/// Deck a prompt with `tags` belongs to.
///
/// When several deck tags are present, the lexicographically smallest one wins
/// so the result never depends on tag order.
pub fn deck_for<S: AsRef<str>>(base_deck: &str, tags: &[S]) -> String {
    let winner = tags
        .iter()
        .map(AsRef::as_ref)
        .filter(|tag| subdeck_from_tag(tag).is_some())
        .min();

    match winner.and_then(subdeck_from_tag) {
        Some(subdeck) => format!("{}{}{}", base_deck, DECK_SEPARATOR, subdeck),
        None => base_deck.to_string(),
    }
}

/// Anki treats deck names case-insensitively, so `Medicine` and `medicine`
/// are the same deck.
pub fn same_deck(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Whether `deck` is `base_deck` or one of its subdecks
pub fn is_managed(base_deck: &str, deck: &str) -> bool {
    let deck = deck.to_lowercase();
    let base = base_deck.to_lowercase();
    deck == base || deck.starts_with(&format!("{}{}", base, DECK_SEPARATOR))
}

/// Partition prompts by deck. Decks are ordered by name.
///
/// Deck names differing only in case are merged under the spelling seen
/// first.
pub fn group_by_deck(base_deck: &str, prompts: &[Prompt]) -> BTreeMap<String, Vec<Prompt>> {
    let mut spellings: HashMap<String, String> = HashMap::new();
    let mut decks: BTreeMap<String, Vec<Prompt>> = BTreeMap::new();

    for prompt in prompts {
        let deck = deck_for(base_deck, prompt.tags());
        let name = spellings
            .entry(deck.to_lowercase())
            .or_insert(deck)
            .clone();
        decks.entry(name).or_default().push(prompt.clone());
    }

    decks
}
