//! Durable user-curated favorite symbol set
//!
//! Favorites are the only piece of coin state not sourced from a provider:
//! they must survive every list refresh and every process restart. Symbols
//! are normalized to uppercase on the way in.

use crate::{constants::FAVORITES_FILE, error::CacheError};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

/// Persisted set of favorite symbols
pub struct FavoritesStore {
    path: PathBuf,
    symbols: BTreeSet<String>,
}

impl FavoritesStore {
    /// Opens the store under a data directory, loading any persisted set.
    /// A missing or corrupt file starts the set empty.
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        let path = data_dir.into().join(FAVORITES_FILE);
        let symbols = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeSet<String>>(&content) {
                Ok(set) => set.into_iter().map(|s| s.to_uppercase()).collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding corrupt favorites file");
                    BTreeSet::new()
                }
            },
            Err(_) => BTreeSet::new(),
        };

        Self { path, symbols }
    }

    /// True if the symbol is a favorite
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(&symbol.to_uppercase())
    }

    /// Adds the symbol if absent, removes it if present, then persists.
    /// Returns the symbol's new favorite state.
    pub fn toggle(&mut self, symbol: &str) -> Result<bool, CacheError> {
        let symbol = symbol.to_uppercase();
        let now_favorite = if self.symbols.remove(&symbol) {
            false
        } else {
            self.symbols.insert(symbol.clone());
            true
        };

        self.persist()?;
        tracing::debug!(symbol = %symbol, favorite = now_favorite, "Favorite toggled");
        Ok(now_favorite)
    }

    /// The current favorite symbols, sorted
    pub fn symbols(&self) -> &BTreeSet<String> {
        &self.symbols
    }

    fn persist(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&self.symbols)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
