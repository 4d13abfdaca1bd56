use std::collections::{BTreeMap, BTreeSet};

use mdt::cards::{apply_selection, build_deck_string, unique_tags};
use mdt::extract::{add_tags, extract_cards};
use mdt::flatten::flatten;
use mdt::hierarchy::{build_hierarchy, filter_hierarchy, FragmentRow};
use mdt::process_payload;

fn row(anchor: &str, depth: usize) -> FragmentRow {
    FragmentRow {
        anchor: Some(anchor.to_string()),
        depth,
    }
}

fn fixture_payload() -> serde_json::Value {
    serde_json::from_str(include_str!("../test_files/deck.json")).unwrap()
}

// scryfall-id -> oracle-id, standing in for the per-card identity lookup
fn oracle_ids() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("sf-bolt", "oracle-bolt"),
        ("sf-path", "oracle-path"),
        ("sf-mtn", "oracle-mtn"),
    ])
}

fn card_tags() -> BTreeMap<String, BTreeSet<String>> {
    BTreeMap::from([
        (
            "oracle-bolt".to_string(),
            BTreeSet::from(["Destroy".to_string()]),
        ),
        (
            "oracle-path".to_string(),
            BTreeSet::from(["Exile".to_string()]),
        ),
        // known to have zero tags, as opposed to unknown
        ("oracle-mtn".to_string(), BTreeSet::new()),
    ])
}

#[test]
fn deck_renders_with_umbrella_tags() {
    let mut deck = process_payload(&fixture_payload()).unwrap();
    assert_eq!(deck.len(), 3, "sideboard cards must not leak in");

    let identities = oracle_ids();
    for card in deck.values_mut() {
        card.oracle_id = card
            .scryfall_id
            .as_deref()
            .and_then(|id| identities.get(id))
            .map(|oracle| oracle.to_string());
    }
    let lookup_table = card_tags();
    add_tags(&mut deck, |oracle_id| lookup_table.get(oracle_id).cloned());

    // one source nests Exile under Removal, another lists it as a root
    let fragments = vec![
        vec![row("Removal", 1), row("Exile", 2), row("Destroy", 2)],
        vec![row("Exile", 1)],
        vec![row("Ramp", 1), row("Land Ramp", 2)],
    ];
    let tree = build_hierarchy(&fragments);
    assert!(!tree.contains_key("Exile"), "dedup keeps the deeper Exile");

    let all_tags = unique_tags(&deck);
    assert_eq!(
        all_tags,
        BTreeSet::from(["Destroy".to_string(), "Exile".to_string()])
    );

    let deck_tree = filter_hierarchy(&tree, &all_tags);
    assert!(deck_tree.contains_key("Removal"));
    assert!(!deck_tree.contains_key("Ramp"));

    // the user checks the umbrella tag only
    let checked = BTreeSet::from(["Removal".to_string()]);
    apply_selection(&mut deck, &checked, &tree);

    assert_eq!(
        build_deck_string(&deck),
        "2 Lightning Bolt (LEA) 161 #Removal\n\
         1 Mountain (LEA) 300 \n\
         1 Path to Exile (CON) 15 #Removal"
    );
}

#[test]
fn quantities_are_non_negative_and_keys_come_from_the_mainboard() {
    let flat = flatten(&fixture_payload()).unwrap();
    let deck = extract_cards(&flat);

    let mainboard_keys: BTreeSet<&str> = flat
        .keys()
        .filter_map(|key| key.strip_prefix("boards.mainboard.cards."))
        .filter_map(|rest| rest.split('.').next())
        .collect();
    for (key, card) in &deck {
        assert!(mainboard_keys.contains(key.as_str()));
        // quantities parse into an unsigned count or not at all
        assert!(card.quantity.is_some());
    }
    assert_eq!(deck["slotA"].quantity, Some(2));
}

#[test]
fn selection_of_stale_tag_degrades_to_nothing() {
    let mut deck = process_payload(&fixture_payload()).unwrap();
    for card in deck.values_mut() {
        card.tags = Some(BTreeSet::from(["Destroy".to_string()]));
    }

    let tree = build_hierarchy(&[vec![row("Removal", 1), row("Destroy", 2)]]);
    // "Burn" was renamed upstream and no longer exists in the hierarchy
    let checked = BTreeSet::from(["Burn".to_string()]);
    apply_selection(&mut deck, &checked, &tree);

    assert!(deck.values().all(|card| card.selected.is_empty()));
}
