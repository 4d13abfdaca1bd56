use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use thiserror::Error as ThisError;
use tracing::info;

pub mod cache;
pub mod cards;
pub mod extract;
pub mod fetch;
pub mod flatten;
pub mod hierarchy;
pub mod scrape;

use cache::DeckCache;
use cards::DeckMap;
use fetch::Fetcher;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Top-level input the pipeline rejects outright. Everything milder is
    /// tolerated as a degraded result instead.
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("not a recognizable deck id or URL: {0}")]
    InvalidDeckRef(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Flattens a raw deck payload and assembles the per-card records. Pure;
/// no tags are attached yet.
pub fn process_payload(payload: &Value) -> Result<DeckMap, Error> {
    let flat = flatten::flatten(payload)?;
    Ok(extract::extract_cards(&flat))
}

/// Loads a deck through the cache: on a miss, fetches the payload, extracts
/// the cards, resolves oracle identities and attaches tags from `card_tags`,
/// then stores the processed deck for next time.
pub fn load_deck(
    fetcher: &Fetcher,
    cache: &DeckCache,
    card_tags: &BTreeMap<String, BTreeSet<String>>,
    deck_ref: &str,
) -> Result<DeckMap, Error> {
    if let Some(deck) = cache.load(deck_ref)? {
        info!(%deck_ref, "using cached deck");
        return Ok(deck);
    }

    let payload = fetcher.fetch_deck(deck_ref)?;
    let mut deck = process_payload(&payload)?;
    info!(cards = deck.len(), "resolving oracle identities");
    fetcher.add_oracle_ids(&mut deck);
    extract::add_tags(&mut deck, |oracle_id| card_tags.get(oracle_id).cloned());
    cache.store(deck_ref, &deck)?;
    Ok(deck)
}
