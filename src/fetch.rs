use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cards::DeckMap;
use crate::Error;

const USER_AGENT: &str = "MTG-Deck-Tagger-V1";
const MOXFIELD_DECK_URL: &str = "https://api2.moxfield.com/v3/decks/all/";
const SCRYFALL_CARD_URL: &str = "https://api.scryfall.com/cards/";
const SCRYFALL_TAGS_URL: &str = "https://api.scryfall.com/private/tags/oracle";
const TAGGER_TREE_URL: &str = "https://tagger.scryfall.com/tags/card/";

/// Outbound request pacing. Passed in by the caller so the limit has an
/// owner instead of living in a process-wide constant.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    per_second: u32,
}

impl RateLimit {
    pub fn per_second(requests: u32) -> RateLimit {
        RateLimit {
            per_second: requests.max(1),
        }
    }

    fn pause(&self) {
        thread::sleep(Duration::from_secs_f64(1.0 / f64::from(self.per_second)));
    }
}

impl Default for RateLimit {
    fn default() -> RateLimit {
        RateLimit::per_second(10)
    }
}

/// Blocking client for the deck, card and tagging services. All calls are
/// sequential; per-card lookups sleep between requests per the configured
/// rate limit.
pub struct Fetcher {
    client: Client,
    limit: RateLimit,
}

impl Fetcher {
    pub fn new(limit: RateLimit) -> Result<Fetcher, Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Fetcher { client, limit })
    }

    /// Fetches the raw nested deck payload. `deck_ref` may be a bare deck id
    /// or a full deck URL.
    pub fn fetch_deck(&self, deck_ref: &str) -> Result<Value, Error> {
        let deck_id = deck_id_from(deck_ref)?;
        debug!(%deck_id, "fetching decklist");
        let response = self
            .client
            .get(format!("{MOXFIELD_DECK_URL}{deck_id}"))
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    /// Resolves a printing to its oracle identity. A failed lookup degrades
    /// to `None` so one bad card cannot sink the whole deck.
    pub fn oracle_id(&self, scryfall_id: &str) -> Option<String> {
        let result: Result<Value, reqwest::Error> = self
            .client
            .get(format!("{SCRYFALL_CARD_URL}{scryfall_id}"))
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json());
        self.limit.pause();

        match result {
            Ok(body) => body
                .get("oracle_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(err) => {
                warn!(%scryfall_id, "oracle id lookup failed: {err}");
                None
            }
        }
    }

    /// Fills in the oracle identity for every card that has a printing id.
    /// Cards whose lookup fails stay without one (and end up untagged).
    pub fn add_oracle_ids(&self, deck: &mut DeckMap) {
        for (card_key, card) in deck.iter_mut() {
            let Some(scryfall_id) = &card.scryfall_id else { continue };
            match self.oracle_id(scryfall_id) {
                Some(oracle_id) => card.oracle_id = Some(oracle_id),
                None => debug!(%card_key, "card left without oracle id"),
            }
        }
    }

    /// Downloads the tagging service's label listing and inverts it into an
    /// oracle-id to tag-list map.
    pub fn card_tags(&self) -> Result<BTreeMap<String, BTreeSet<String>>, Error> {
        let body: Value = self
            .client
            .get(SCRYFALL_TAGS_URL)
            .send()?
            .error_for_status()?
            .json()?;
        let entries = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Malformed("tag listing has no data array".to_string()))?;

        let mut by_oracle: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in entries {
            let Some(label) = entry.get("label").and_then(Value::as_str) else { continue };
            let Some(ids) = entry.get("oracle_ids").and_then(Value::as_array) else { continue };
            for oracle_id in ids.iter().filter_map(Value::as_str) {
                by_oracle
                    .entry(oracle_id.to_string())
                    .or_default()
                    .insert(label.to_string());
            }
        }
        Ok(by_oracle)
    }

    /// Fetches one tag's hierarchy page from the tagging service.
    pub fn tag_page(&self, tag: &str) -> Result<String, Error> {
        let page = self
            .client
            .get(format!("{TAGGER_TREE_URL}{tag}/tree"))
            .send()?
            .error_for_status()?
            .text()?;
        self.limit.pause();
        Ok(page)
    }
}

/// Accepts a bare deck id or a full deck URL and returns the id.
pub fn deck_id_from(deck_ref: &str) -> Result<String, Error> {
    static DECK_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"decks/([A-Za-z0-9_-]+)").unwrap());

    if deck_ref.contains("moxfield.com") {
        DECK_ID
            .captures(deck_ref)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| Error::InvalidDeckRef(deck_ref.to_string()))
    } else {
        Ok(deck_ref.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_id_passes_through() {
        assert_eq!(deck_id_from("0IDl8PGifEmggQsiVlzQuw").unwrap(), "0IDl8PGifEmggQsiVlzQuw");
    }

    #[test]
    fn id_is_extracted_from_full_url() {
        let id = deck_id_from("https://moxfield.com/decks/0IDl8PGifEmggQsiVlzQuw").unwrap();
        assert_eq!(id, "0IDl8PGifEmggQsiVlzQuw");
    }

    #[test]
    fn url_without_deck_id_is_rejected() {
        assert!(deck_id_from("https://moxfield.com/users/someone").is_err());
    }
}
