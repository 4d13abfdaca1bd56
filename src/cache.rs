use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cards::DeckMap;
use crate::Error;

/// On-disk cache of processed decks, one JSON file per deck id.
pub struct DeckCache {
    dir: PathBuf,
}

impl DeckCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<DeckCache, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(DeckCache { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, deck_ref: &str) -> PathBuf {
        // the last URL segment doubles as the deck id
        let deck_id = deck_ref.rsplit('/').next().unwrap_or(deck_ref);
        self.dir.join(format!("processed_deck_{deck_id}.json"))
    }

    pub fn load(&self, deck_ref: &str) -> Result<Option<DeckMap>, Error> {
        let path = self.path_for(deck_ref);
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "cache hit");
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn store(&self, deck_ref: &str, deck: &DeckMap) -> Result<(), Error> {
        let path = self.path_for(deck_ref);
        fs::write(path, serde_json::to_vec_pretty(deck)?)?;
        Ok(())
    }
}
