//! Durable last-known-good snapshot storage
//!
//! Two independent slots (coin list, global stats) persisted as JSON files
//! under a data directory. A snapshot seeds the UI at cold start before the
//! first network round trip and serves as the fallback of last resort when a
//! fetch chain is fully exhausted. A corrupt or missing file reads as `None`,
//! never as an error.

use crate::{
    constants::{COIN_SNAPSHOT_FILE, GLOBAL_SNAPSHOT_FILE},
    error::CacheError,
    types::{CoinRecord, GlobalStats},
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A persisted value together with the time it was written
///
/// Freshness policy is left to callers; nothing here refuses old data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub value: T,
    pub saved_at: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    /// Wraps a value stamped with the current time
    pub fn new(value: T) -> Self {
        Self {
            value,
            saved_at: Utc::now(),
        }
    }

    /// Time elapsed since the snapshot was written
    pub fn age(&self) -> std::time::Duration {
        let secs = Utc::now()
            .signed_duration_since(self.saved_at)
            .num_seconds()
            .max(0);
        std::time::Duration::from_secs(secs as u64)
    }
}

/// Disk-backed store for the coin list and global stats snapshots
pub struct MarketDataCache {
    data_dir: PathBuf,
}

impl MarketDataCache {
    /// Creates a cache rooted at a data directory. The directory is created
    /// on the first save, not here.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn coin_path(&self) -> PathBuf {
        self.data_dir.join(COIN_SNAPSHOT_FILE)
    }

    fn global_path(&self) -> PathBuf {
        self.data_dir.join(GLOBAL_SNAPSHOT_FILE)
    }

    /// Loads the last persisted coin list, or `None` if absent or corrupt
    pub fn load_coins(&self) -> Option<Snapshot<Vec<CoinRecord>>> {
        load_slot(&self.coin_path())
    }

    /// Loads the last persisted global stats, or `None` if absent or corrupt
    pub fn load_global(&self) -> Option<Snapshot<GlobalStats>> {
        load_slot(&self.global_path())
    }

    /// Persists the coin list, replacing the previous snapshot atomically
    pub fn save_coins(&self, coins: &[CoinRecord]) -> Result<(), CacheError> {
        save_slot(&self.coin_path(), &Snapshot::new(coins.to_vec()))
    }

    /// Persists global stats, replacing the previous snapshot atomically
    pub fn save_global(&self, stats: &GlobalStats) -> Result<(), CacheError> {
        save_slot(&self.global_path(), &Snapshot::new(stats.clone()))
    }
}

fn load_slot<T: DeserializeOwned>(path: &Path) -> Option<Snapshot<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return None,
    };

    match serde_json::from_str(&content) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Discarding corrupt cache snapshot"
            );
            None
        }
    }
}

/// Writes to a sibling temp file and renames over the target so readers
/// never observe a half-written snapshot.
fn save_slot<T: Serialize>(path: &Path, snapshot: &Snapshot<T>) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;

    tracing::debug!(path = %path.display(), "Cache snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_coins() -> Vec<CoinRecord> {
        vec![
            CoinRecord::new("BTC", "Bitcoin", 50_000.0, 1.2, 0.1, 1e9, 1e12),
            CoinRecord::new("ETH", "Ethereum", 3_000.0, -0.5, 0.2, 5e8, 4e11),
        ]
    }

    #[test]
    fn save_and_load_coins_round_trip() {
        let dir = tempdir().unwrap();
        let cache = MarketDataCache::new(dir.path());

        cache.save_coins(&sample_coins()).unwrap();

        let snapshot = cache.load_coins().unwrap();
        assert_eq!(snapshot.value, sample_coins());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let cache = MarketDataCache::new(dir.path());

        assert!(cache.load_coins().is_none());
        assert!(cache.load_global().is_none());
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let cache = MarketDataCache::new(dir.path());
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path().join(COIN_SNAPSHOT_FILE), "{ not json").unwrap();

        assert!(cache.load_coins().is_none());
    }

    #[test]
    fn slots_are_independent() {
        let dir = tempdir().unwrap();
        let cache = MarketDataCache::new(dir.path());

        cache.save_coins(&sample_coins()).unwrap();
        assert!(cache.load_coins().is_some());
        assert!(cache.load_global().is_none());

        let mut stats = GlobalStats::default();
        stats.market_cap_by_currency.insert("usd".into(), 2e12);
        cache.save_global(&stats).unwrap();

        assert_eq!(cache.load_global().unwrap().value, stats);
        assert!(cache.load_coins().is_some());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempdir().unwrap();
        let cache = MarketDataCache::new(dir.path());

        cache.save_coins(&sample_coins()).unwrap();
        let one = vec![CoinRecord::new("SOL", "Solana", 150.0, 3.0, 0.4, 2e8, 7e10)];
        cache.save_coins(&one).unwrap();

        assert_eq!(cache.load_coins().unwrap().value, one);
    }

    #[test]
    fn snapshot_age_is_near_zero_when_fresh() {
        let snapshot = Snapshot::new(42u32);
        assert!(snapshot.age() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn save_creates_data_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("data").join("market");
        let cache = MarketDataCache::new(&nested);

        cache.save_coins(&sample_coins()).unwrap();
        assert!(nested.join(COIN_SNAPSHOT_FILE).exists());
    }
}
