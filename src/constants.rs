//! Constants for the market data layer
//!
//! All tuning knobs are centralized here. No runtime configuration file is
//! used - the layer operates with these compile-time constants.

/// How often the coin list is refreshed (in seconds)
pub const COIN_REFRESH_INTERVAL_SECS: u64 = 60;

/// How often global market stats are refreshed (in seconds)
pub const GLOBAL_REFRESH_INTERVAL_SECS: u64 = 180;

/// Base polling interval for the live price poller (in seconds)
pub const PRICE_POLL_BASE_SECS: u64 = 5;

/// Maximum backoff interval for the live price poller (in seconds)
pub const PRICE_POLL_MAX_BACKOFF_SECS: u64 = 60;

/// Fixed polling interval for the order book poller (in seconds)
pub const BOOK_POLL_INTERVAL_SECS: u64 = 5;

/// Per-provider-call timeout inside a fallback chain (in seconds)
pub const PROVIDER_CALL_TIMEOUT_SECS: u64 = 12;

/// HTTP client request timeout (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Number of market-list pages fetched concurrently from the primary provider
pub const MARKET_LIST_PAGES: u32 = 3;

/// Coins per market-list page (fixed by the provider contract)
pub const MARKET_LIST_PAGE_SIZE: u32 = 100;

/// Major symbols pinned to the front of the list in the default view state,
/// in this order.
pub const PINNED_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "USDT", "BNB", "SOL", "XRP", "USDC", "ADA", "DOGE", "TRX",
];

/// Case-insensitive name substrings identifying wrapped/bridged/synthetic
/// listings that are filtered out of the canonical list.
pub const NAME_BLACKLIST: &[&str] = &[
    "wrapped", "bridged", "wormhole", "binance-peg", "staked", "restaked",
];

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinPaprika API base URL
pub const COINPAPRIKA_API_URL: &str = "https://api.coinpaprika.com/v1";

/// Binance API base URL
pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// Binance US mirror, used when the primary host answers with a
/// region-restricted status
pub const BINANCE_US_API_URL: &str = "https://api.binance.us";

/// Coinbase API base URL
pub const COINBASE_API_URL: &str = "https://api.coinbase.com";

/// Coinbase Exchange (order book) API base URL
pub const COINBASE_EXCHANGE_API_URL: &str = "https://api.exchange.coinbase.com";

/// Normalized kline interval used when the requested interval is rejected
pub const FALLBACK_CANDLE_INTERVAL: &str = "1d";

/// Kline limit paired with the normalized interval
pub const FALLBACK_CANDLE_LIMIT: u32 = 365;

/// Order book depth requested per snapshot
pub const BOOK_DEPTH: u32 = 20;

/// Items taken per source in news preview mode
pub const NEWS_PREVIEW_PER_SOURCE: usize = 5;

/// Maximum merged items retained in news full mode
pub const NEWS_MAX_ITEMS: usize = 100;

/// Articles per news page
pub const NEWS_PAGE_SIZE: usize = 20;

/// Fast sources fetched in news preview mode
pub const NEWS_PREVIEW_SOURCES: &[(&str, &str)] = &[
    ("CoinDesk", "https://www.coindesk.com/arc/outboundfeeds/rss/"),
    ("Cointelegraph", "https://cointelegraph.com/rss"),
];

/// Full source set fetched in news full mode (superset of preview sources)
pub const NEWS_FULL_SOURCES: &[(&str, &str)] = &[
    ("CoinDesk", "https://www.coindesk.com/arc/outboundfeeds/rss/"),
    ("Cointelegraph", "https://cointelegraph.com/rss"),
    ("Decrypt", "https://decrypt.co/feed"),
    ("CryptoSlate", "https://cryptoslate.com/feed/"),
    ("Bitcoin Magazine", "https://bitcoinmagazine.com/feed"),
    ("NewsBTC", "https://www.newsbtc.com/feed/"),
];

/// Storage file name for the persisted coin list snapshot
pub const COIN_SNAPSHOT_FILE: &str = "coin_list_snapshot.json";

/// Storage file name for the persisted global stats snapshot
pub const GLOBAL_SNAPSHOT_FILE: &str = "global_stats_snapshot.json";

/// Storage file name for the persisted favorite symbol set
pub const FAVORITES_FILE: &str = "favorites.json";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "market-data-sdk/0.1.0";

/// Static symbol -> CoinGecko id lookup used by the simple-price fallback.
/// Symbols outside this table are reported as unsupported rather than
/// guessed at.
pub const COINGECKO_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("USDT", "tether"),
    ("BNB", "binancecoin"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("USDC", "usd-coin"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("TRX", "tron"),
    ("AVAX", "avalanche-2"),
    ("DOT", "polkadot"),
    ("LINK", "chainlink"),
    ("MATIC", "matic-network"),
    ("LTC", "litecoin"),
    ("ATOM", "cosmos"),
    ("UNI", "uniswap"),
    ("XLM", "stellar"),
    ("NEAR", "near"),
    ("APT", "aptos"),
];

/// Looks up the CoinGecko id for a symbol, case-insensitively.
pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let upper = symbol.to_uppercase();
    COINGECKO_IDS
        .iter()
        .find(|(sym, _)| *sym == upper)
        .map(|(_, id)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coingecko_id_is_case_insensitive() {
        assert_eq!(coingecko_id("btc"), Some("bitcoin"));
        assert_eq!(coingecko_id("BTC"), Some("bitcoin"));
    }

    #[test]
    fn coingecko_id_unknown_symbol_is_none() {
        assert_eq!(coingecko_id("NOTACOIN"), None);
    }

    #[test]
    fn preview_sources_are_subset_of_full_sources() {
        for (name, url) in NEWS_PREVIEW_SOURCES {
            assert!(NEWS_FULL_SOURCES.iter().any(|(n, u)| n == name && u == url));
        }
    }
}
