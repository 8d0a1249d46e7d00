//! # Market Data SDK
//!
//! Data acquisition and reconciliation layer for cryptocurrency market
//! views: per-capability provider fallback chains (CoinGecko, CoinPaprika,
//! Binance, Coinbase), a disk-backed last-known-good snapshot cache,
//! auto-refresh scheduling, per-symbol price polling with backoff, order
//! book polling, and a concurrent multi-feed news aggregator.
//!
//! ## Usage
//!
//! ```no_run
//! use market_data_sdk::{AutoRefreshScheduler, MarketDataService};
//! use std::{path::PathBuf, sync::Arc};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(MarketDataService::new(PathBuf::from("./data"))?);
//!
//! // Show cached data immediately, then refresh from the network
//! service.seed_from_cache().await;
//! service.refresh_coins().await?;
//!
//! // Keep the view fresh in the background
//! let scheduler = AutoRefreshScheduler::start(Arc::clone(&service));
//!
//! // React to published state
//! let mut coins = service.subscribe_coins();
//! coins.changed().await?;
//! for coin in coins.borrow().iter() {
//!     println!("{}: ${:.2}", coin.symbol, coin.price);
//! }
//! # Ok(())
//! # }
//! ```

pub mod book_poller;
pub mod cache;
pub mod chain;
pub mod constants;
pub mod error;
pub mod favorites;
pub mod market;
pub mod news;
pub mod price_poller;
pub mod providers;
pub mod reconciler;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use book_poller::{OrderBookPoller, OrderBookSource};
pub use cache::{MarketDataCache, Snapshot};
pub use chain::{FallbackChain, Trigger};
pub use error::{CacheError, FetchError, ProviderError};
pub use favorites::FavoritesStore;
pub use market::MarketDataService;
pub use news::{FeedAggregator, FeedSource};
pub use price_poller::{PricePoller, SpotPriceSource};
pub use scheduler::AutoRefreshScheduler;
pub use types::{
    Candle, CoinRecord, GlobalStats, MarketEvent, NewsArticle, OrderBookSnapshot, PriceSample,
    Segment, SortDirection, SortField, ViewState,
};
