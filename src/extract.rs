use std::collections::BTreeSet;

use crate::cards::DeckMap;
use crate::flatten::FlatRecord;

// Mainboard card fields in the flattened Moxfield payload. Keys look like
// `boards.mainboard.cards.<KEY>.quantity` or
// `boards.mainboard.cards.<KEY>.card.name`.
const CARD_PREFIXES: &[&str] = &["boards.mainboard.cards."];
const CARD_SUFFIXES: &[&str] = &[
    ".quantity",
    ".card.name",
    ".card.set",
    ".card.cn",
    ".card.scryfall_id",
];

/// Reassembles per-card records from a flattened payload. A card that only
/// ever shows a subset of the recognized fields still gets an entry; the
/// renderer substitutes defaults for whatever is missing.
pub fn extract_cards(flat: &FlatRecord) -> DeckMap {
    let mut deck = DeckMap::new();

    for (key, value) in flat {
        if !CARD_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
            || !CARD_SUFFIXES.iter().any(|suffix| key.ends_with(suffix))
        {
            continue;
        }
        let parts: Vec<&str> = key.split('.').collect();
        // the card key is the segment right after the `cards` prefix
        let Some(card_key) = parts.get(3) else { continue };
        let Some(attribute) = parts.last() else { continue };

        let card = deck.entry(card_key.to_string()).or_default();
        match *attribute {
            // negative, fractional or oversized quantities do not survive; the
            // default 0 applies
            "quantity" => card.quantity = value.as_u64().and_then(|n| u32::try_from(n).ok()),
            "name" => card.name = value.as_str().map(str::to_string),
            "set" => card.set = value.as_str().map(str::to_string),
            "cn" => card.cn = value.as_str().map(str::to_string),
            "scryfall_id" => card.scryfall_id = value.as_str().map(str::to_string),
            _ => {}
        }
    }

    deck
}

/// Attaches the known tag list to every card whose identity resolves through
/// `lookup`. A `None` from the lookup leaves the card untagged, which stays
/// distinguishable from an explicit empty tag list downstream.
pub fn add_tags<F>(deck: &mut DeckMap, lookup: F)
where
    F: Fn(&str) -> Option<BTreeSet<String>>,
{
    for card in deck.values_mut() {
        let Some(oracle_id) = &card.oracle_id else { continue };
        if let Some(tags) = lookup(oracle_id) {
            card.tags = Some(tags);
        }
    }
}
