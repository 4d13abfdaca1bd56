use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::hierarchy::{matching_tags, TagTree};

/// A deck keyed by the opaque per-card key from the deck service. Two copies
/// of the same printing in different slots keep distinct keys.
pub type DeckMap = BTreeMap<String, CardRecord>;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub quantity: Option<u32>,
    pub name: Option<String>,
    pub set: Option<String>,
    pub cn: Option<String>,
    pub scryfall_id: Option<String>,
    pub oracle_id: Option<String>,
    /// `None` means the tag lookup never resolved for this card; `Some` with
    /// an empty set means the card is known to carry no tags.
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub selected: BTreeSet<String>,
}

/// Every tag seen on at least one card of the deck.
pub fn unique_tags(deck: &DeckMap) -> BTreeSet<String> {
    deck.values()
        .filter_map(|card| card.tags.as_ref())
        .flatten()
        .cloned()
        .collect()
}

/// Stores on each tagged card the subset of checked tags that cover it,
/// expanding checked umbrella tags through the hierarchy. Untagged cards
/// (absent tag set) are left alone.
pub fn apply_selection(deck: &mut DeckMap, checked: &BTreeSet<String>, tree: &TagTree) {
    for card in deck.values_mut() {
        if let Some(tags) = &card.tags {
            card.selected = matching_tags(checked, tree, tags);
        }
    }
}

/// One line per card, ordered case-insensitively by name:
/// `<quantity> <name> (<SET>) <cn> <#tag ...>`. Missing fields fall back to
/// `0` and the empty string.
pub fn build_deck_string(deck: &DeckMap) -> String {
    deck.values()
        .sorted_by_key(|card| card.name.as_deref().unwrap_or("").to_lowercase())
        .map(|card| {
            let tags = card.selected.iter().map(|tag| format!("#{tag}")).join(" ");
            format!(
                "{} {} ({}) {} {}",
                card.quantity.unwrap_or(0),
                card.name.as_deref().unwrap_or(""),
                card.set.as_deref().unwrap_or("").to_uppercase(),
                card.cn.as_deref().unwrap_or(""),
                tags,
            )
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bolt() -> CardRecord {
        CardRecord {
            quantity: Some(2),
            name: Some("Lightning Bolt".to_string()),
            set: Some("lea".to_string()),
            cn: Some("161".to_string()),
            tags: Some(BTreeSet::from(["Removal".to_string()])),
            selected: BTreeSet::from(["Removal".to_string()]),
            ..CardRecord::default()
        }
    }

    #[test]
    fn renders_quantity_name_set_cn_tags() {
        let deck = DeckMap::from([("k1".to_string(), bolt())]);
        assert_eq!(build_deck_string(&deck), "2 Lightning Bolt (LEA) 161 #Removal");
    }

    #[test]
    fn missing_fields_render_as_defaults() {
        let deck = DeckMap::from([("k1".to_string(), CardRecord::default())]);
        // empty cn and tag slots keep their separating spaces
        assert_eq!(build_deck_string(&deck), "0  ()  ");
    }

    #[test]
    fn lines_ordered_case_insensitively() {
        let mut aetherize = bolt();
        aetherize.name = Some("aetherize".to_string());
        let mut zap = bolt();
        zap.name = Some("Zap".to_string());
        let deck = DeckMap::from([
            ("a".to_string(), zap),
            ("b".to_string(), aetherize),
            ("c".to_string(), bolt()),
        ]);

        let rendered = build_deck_string(&deck);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].contains("aetherize"));
        assert!(lines[1].contains("Lightning Bolt"));
        assert!(lines[2].contains("Zap"));
    }

    #[test]
    fn unique_tags_skips_untagged_cards() {
        let mut untagged = bolt();
        untagged.tags = None;
        let mut empty = bolt();
        empty.tags = Some(BTreeSet::new());
        let deck = DeckMap::from([
            ("a".to_string(), bolt()),
            ("b".to_string(), untagged),
            ("c".to_string(), empty),
        ]);

        assert_eq!(unique_tags(&deck), BTreeSet::from(["Removal".to_string()]));
    }
}
