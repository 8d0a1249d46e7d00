//! Domain types for the market data layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One coin in the canonical market list
///
/// The list is unique by `symbol`; the `favorite` flag is the only field
/// that is not sourced from a provider and is re-applied after every
/// wholesale replacement of the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinRecord {
    /// Canonical key, stored uppercase
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Current price in the quote currency
    pub price: f64,
    /// 24h change percentage
    pub change_24h: f64,
    /// 1h change percentage
    pub change_1h: f64,
    /// 24h traded volume
    pub volume: f64,
    /// Market capitalization
    pub market_cap: f64,
    /// 7-day price series for the trend sparkline, may be empty
    pub sparkline_7d: Vec<f64>,
    /// Logo URL, if the provider supplies one
    pub image_url: Option<String>,
    /// User favorite flag, survives every refresh
    #[serde(default)]
    pub favorite: bool,
}

impl CoinRecord {
    /// Creates a record with the symbol normalized to uppercase
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: &str,
        name: &str,
        price: f64,
        change_24h: f64,
        change_1h: f64,
        volume: f64,
        market_cap: f64,
    ) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            name: name.to_string(),
            price,
            change_24h,
            change_1h,
            volume,
            market_cap,
            sparkline_7d: Vec::new(),
            image_url: None,
            favorite: false,
        }
    }
}

/// Aggregate market-wide statistics
///
/// Replaced wholesale on each successful fetch, cached independently of the
/// coin list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Total market cap keyed by quote currency (lowercase, e.g. "usd")
    pub market_cap_by_currency: std::collections::HashMap<String, f64>,
    /// Total 24h volume keyed by quote currency
    pub volume_by_currency: std::collections::HashMap<String, f64>,
    /// Market dominance percentage keyed by uppercase symbol
    pub dominance_by_symbol: std::collections::HashMap<String, f64>,
    /// 24h aggregate market cap change percentage
    pub change_24h: f64,
}

impl GlobalStats {
    /// Total market cap in USD, if reported
    pub fn market_cap_usd(&self) -> Option<f64> {
        self.market_cap_by_currency.get("usd").copied()
    }

    /// Total 24h volume in USD, if reported
    pub fn volume_usd(&self) -> Option<f64> {
        self.volume_by_currency.get("usd").copied()
    }

    /// Dominance percentage for one symbol
    pub fn dominance(&self, symbol: &str) -> Option<f64> {
        self.dominance_by_symbol.get(&symbol.to_uppercase()).copied()
    }
}

/// A single live price observation for one symbol. Only the most recent
/// sample is retained anywhere; no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Uppercase symbol
    pub symbol: String,
    /// Price in the quote currency
    pub price: f64,
    /// Provider the sample came from
    pub source: String,
    /// Observation timestamp
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    /// Creates a sample stamped with the current time
    pub fn new(symbol: &str, price: f64, source: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            price,
            source: source.to_string(),
            observed_at: Utc::now(),
        }
    }
}

/// One OHLC candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds since the epoch
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One price level of an order book side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

/// A full bid/ask depth snapshot, entirely replaced on each poll tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Uppercase symbol the snapshot is for
    pub symbol: String,
    /// Bids, best (highest) price first
    pub bids: Vec<BookLevel>,
    /// Asks, best (lowest) price first
    pub asks: Vec<BookLevel>,
    /// Provider the snapshot came from
    pub source: String,
    /// Snapshot timestamp
    pub fetched_at: Option<DateTime<Utc>>,
}

/// One news article assembled from a parsed feed item
///
/// Identity is the canonical URL. Ephemeral; lives only in the aggregator's
/// in-memory page cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    /// Canonical URL (identity)
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Feed the article came from
    pub source: String,
}

/// Coarse named filter over the coin list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    #[default]
    All,
    Favorites,
    /// 24h change > 0
    Gainers,
    /// 24h change < 0
    Losers,
}

/// Sortable coin list column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Symbol,
    Price,
    Change24h,
    Volume,
    #[default]
    MarketCap,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// The opposite direction
    pub fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// The active segment, search text, and sort state of the coin list view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub segment: Segment,
    pub search: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            segment: Segment::All,
            search: String::new(),
            sort_field: SortField::MarketCap,
            sort_direction: SortDirection::Descending,
        }
    }
}

impl ViewState {
    /// True in the untouched state that gets the pinned-symbol ordering:
    /// empty search, segment All, sorted by market cap descending.
    pub fn is_default(&self) -> bool {
        self.segment == Segment::All
            && self.search.is_empty()
            && self.sort_field == SortField::MarketCap
            && self.sort_direction == SortDirection::Descending
    }

    /// Applies a header click: the active field flips direction, a new
    /// field becomes active ascending.
    pub fn toggle_sort(&mut self, field: SortField) {
        if self.sort_field == field {
            self.sort_direction = self.sort_direction.flipped();
        } else {
            self.sort_field = field;
            self.sort_direction = SortDirection::Ascending;
        }
    }
}

/// Notifications emitted by the market data service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketEvent {
    /// The canonical coin list was replaced
    CoinsRefreshed {
        id: Uuid,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Global stats were replaced
    GlobalRefreshed { id: Uuid, timestamp: DateTime<Utc> },

    /// A fetch chain was exhausted for a feature
    FeatureFailed {
        id: Uuid,
        feature: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The live price poller published a new sample
    PriceUpdated {
        id: Uuid,
        symbol: String,
        price: f64,
        timestamp: DateTime<Utc>,
    },
}

impl MarketEvent {
    pub fn coins_refreshed(count: usize) -> Self {
        Self::CoinsRefreshed {
            id: Uuid::new_v4(),
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn global_refreshed() -> Self {
        Self::GlobalRefreshed {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    pub fn feature_failed(feature: &str, error_message: impl Into<String>) -> Self {
        Self::FeatureFailed {
            id: Uuid::new_v4(),
            feature: feature.to_string(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn price_updated(symbol: &str, price: f64) -> Self {
        Self::PriceUpdated {
            id: Uuid::new_v4(),
            symbol: symbol.to_uppercase(),
            price,
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketEvent::CoinsRefreshed { count, .. } => {
                write!(f, "Coin list refreshed ({count} coins)")
            }
            MarketEvent::GlobalRefreshed { .. } => write!(f, "Global stats refreshed"),
            MarketEvent::FeatureFailed {
                feature,
                error_message,
                ..
            } => write!(f, "{feature} failed: {error_message}"),
            MarketEvent::PriceUpdated { symbol, price, .. } => {
                write!(f, "{symbol} = {price}")
            }
        }
    }
}
