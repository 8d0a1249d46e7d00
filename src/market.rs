//! Market data service
//!
//! The explicitly constructed hub of the data layer: owns the HTTP client,
//! the concrete providers, the snapshot cache, the favorites store, and the
//! published view of the market. Components that need market data take a
//! reference to this service rather than reaching for a global.
//!
//! Continuous outputs are exposed as watch channels; one-shot fetches
//! (spot price, candles, order book) return results directly and are driven
//! by the pollers.

use crate::{
    cache::MarketDataCache,
    chain::{FallbackChain, Trigger},
    constants::{FALLBACK_CANDLE_INTERVAL, FALLBACK_CANDLE_LIMIT, MARKET_LIST_PAGES},
    error::{CacheError, FetchError},
    favorites::FavoritesStore,
    providers::{
        build_client, BinanceProvider, CoinPaprikaProvider, CoinbaseProvider, CoinGeckoProvider,
    },
    reconciler,
    types::{
        Candle, CoinRecord, GlobalStats, MarketEvent, OrderBookSnapshot, PriceSample, Segment,
        SortField, ViewState,
    },
};
use crate::error::ProviderError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, watch, RwLock};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Central market data service
pub struct MarketDataService {
    coingecko: CoinGeckoProvider,
    coinpaprika: CoinPaprikaProvider,
    binance: BinanceProvider,
    binance_us: BinanceProvider,
    coinbase: CoinbaseProvider,

    cache: MarketDataCache,
    favorites: RwLock<FavoritesStore>,

    /// Last successfully fetched (or cache-seeded) raw list, pre-reconcile
    raw_coins: RwLock<Vec<CoinRecord>>,
    view: RwLock<ViewState>,

    coins_tx: watch::Sender<Vec<CoinRecord>>,
    global_tx: watch::Sender<Option<GlobalStats>>,
    events_tx: broadcast::Sender<MarketEvent>,

    coins_error: AtomicBool,
    global_error: AtomicBool,
}

impl MarketDataService {
    /// Creates the service, seeding published state from the snapshot cache
    /// so the UI has data before the first network round trip completes.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, ProviderError> {
        let client = build_client()?;
        Ok(Self::with_providers(
            data_dir,
            CoinGeckoProvider::new(client.clone()),
            CoinPaprikaProvider::new(client.clone()),
            BinanceProvider::new(client.clone()),
            BinanceProvider::us_mirror(client.clone()),
            CoinbaseProvider::new(client),
        ))
    }

    /// Creates the service from pre-built providers. Primarily for tests,
    /// which point providers at a local or unroutable endpoint.
    pub fn with_providers(
        data_dir: impl Into<PathBuf>,
        coingecko: CoinGeckoProvider,
        coinpaprika: CoinPaprikaProvider,
        binance: BinanceProvider,
        binance_us: BinanceProvider,
        coinbase: CoinbaseProvider,
    ) -> Self {
        let data_dir = data_dir.into();

        Self {
            coingecko,
            coinpaprika,
            binance,
            binance_us,
            coinbase,
            cache: MarketDataCache::new(&data_dir),
            favorites: RwLock::new(FavoritesStore::open(&data_dir)),
            raw_coins: RwLock::new(Vec::new()),
            view: RwLock::new(ViewState::default()),
            coins_tx: watch::channel(Vec::new()).0,
            global_tx: watch::channel(None).0,
            events_tx: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            coins_error: AtomicBool::new(false),
            global_error: AtomicBool::new(false),
        }
    }

    /// Loads cached snapshots into the published state. Call once at
    /// startup, before the scheduler starts.
    pub async fn seed_from_cache(&self) {
        if let Some(snapshot) = self.cache.load_coins() {
            tracing::info!(
                count = snapshot.value.len(),
                age_secs = snapshot.age().as_secs(),
                "Seeding coin list from cache"
            );
            *self.raw_coins.write().await = snapshot.value;
            self.republish_coins().await;
        }

        if let Some(snapshot) = self.cache.load_global() {
            tracing::info!(
                age_secs = snapshot.age().as_secs(),
                "Seeding global stats from cache"
            );
            self.global_tx.send_replace(Some(snapshot.value));
        }
    }

    // --- refresh chains -------------------------------------------------

    /// Runs the market list chain: paged CoinGecko fan-out, then the
    /// CoinPaprika aggregator. Success is written through to the cache and
    /// reconciled into the published list; exhaustion raises the error flag
    /// and leaves the published list untouched.
    pub async fn refresh_coins(&self) -> Result<(), FetchError> {
        let chain = FallbackChain::new("coin_list")
            .step("coingecko", || self.coingecko.fetch_markets(MARKET_LIST_PAGES))
            .step("coinpaprika", || self.coinpaprika.fetch_markets());

        match chain.run().await {
            Ok(coins) => {
                self.apply_coins(coins).await;
                Ok(())
            }
            Err(e) => {
                self.coins_error.store(true, Ordering::SeqCst);
                let _ = self
                    .events_tx
                    .send(MarketEvent::feature_failed("coin_list", e.to_string()));
                Err(e)
            }
        }
    }

    /// Runs the global stats chain: CoinGecko, then CoinPaprika
    pub async fn refresh_global(&self) -> Result<(), FetchError> {
        let chain = FallbackChain::new("global_stats")
            .step("coingecko", || self.coingecko.fetch_global())
            .step("coinpaprika", || self.coinpaprika.fetch_global());

        match chain.run().await {
            Ok(stats) => {
                self.apply_global(stats);
                Ok(())
            }
            Err(e) => {
                self.global_error.store(true, Ordering::SeqCst);
                let _ = self
                    .events_tx
                    .send(MarketEvent::feature_failed("global_stats", e.to_string()));
                Err(e)
            }
        }
    }

    /// Runs the spot price chain for one symbol: Coinbase, then Binance,
    /// then the Binance US mirror (only after a region-restricted answer),
    /// then the CoinGecko simple-price endpoint.
    pub async fn fetch_spot_price(&self, symbol: &str) -> Result<PriceSample, FetchError> {
        let symbol = symbol.to_uppercase();

        let chain = FallbackChain::new("spot_price")
            .step("coinbase", {
                let symbol = symbol.clone();
                move || {
                    let symbol = symbol.clone();
                    async move {
                        let price = self.coinbase.fetch_spot_price(&symbol).await?;
                        Ok(PriceSample::new(&symbol, price, "coinbase"))
                    }
                }
            })
            .step("binance", {
                let symbol = symbol.clone();
                move || {
                    let symbol = symbol.clone();
                    async move {
                        let price = self.binance.fetch_spot_price(&symbol).await?;
                        Ok(PriceSample::new(&symbol, price, "binance"))
                    }
                }
            })
            .step_if("binance_us", Trigger::IfRegionRestricted, {
                let symbol = symbol.clone();
                move || {
                    let symbol = symbol.clone();
                    async move {
                        let price = self.binance_us.fetch_spot_price(&symbol).await?;
                        Ok(PriceSample::new(&symbol, price, "binance_us"))
                    }
                }
            })
            .step("coingecko", {
                let symbol = symbol.clone();
                move || {
                    let symbol = symbol.clone();
                    async move {
                        let price = self.coingecko.fetch_simple_price(&symbol).await?;
                        Ok(PriceSample::new(&symbol, price, "coingecko"))
                    }
                }
            });

        let sample = chain.run().await?;
        let _ = self
            .events_tx
            .send(MarketEvent::price_updated(&sample.symbol, sample.price));
        Ok(sample)
    }

    /// Runs the candle chain: Binance, the US mirror on region restriction,
    /// then Binance again with the normalized daily interval when the
    /// requested interval is rejected.
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        let symbol = symbol.to_uppercase();
        let interval = interval.to_string();

        let chain = FallbackChain::new("candles")
            .step("binance", {
                let symbol = symbol.clone();
                let interval = interval.clone();
                move || {
                    let symbol = symbol.clone();
                    let interval = interval.clone();
                    async move { self.binance.fetch_klines(&symbol, &interval, limit).await }
                }
            })
            .step_if("binance_us", Trigger::IfRegionRestricted, {
                let symbol = symbol.clone();
                let interval = interval.clone();
                move || {
                    let symbol = symbol.clone();
                    let interval = interval.clone();
                    async move { self.binance_us.fetch_klines(&symbol, &interval, limit).await }
                }
            })
            .step_if("binance_normalized", Trigger::IfUnsupportedParameter, {
                let symbol = symbol.clone();
                move || {
                    let symbol = symbol.clone();
                    async move {
                        self.binance
                            .fetch_klines(&symbol, FALLBACK_CANDLE_INTERVAL, FALLBACK_CANDLE_LIMIT)
                            .await
                    }
                }
            });

        chain.run().await
    }

    /// Runs the order book chain: Coinbase native pair, then Binance USDT
    /// pair on any Coinbase failure.
    pub async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot, FetchError> {
        let symbol = symbol.to_uppercase();

        let chain = FallbackChain::new("order_book")
            .step("coinbase", {
                let symbol = symbol.clone();
                move || {
                    let symbol = symbol.clone();
                    async move { self.coinbase.fetch_book(&symbol).await }
                }
            })
            .step("binance", {
                let symbol = symbol.clone();
                move || {
                    let symbol = symbol.clone();
                    async move { self.binance.fetch_depth(&symbol).await }
                }
            });

        chain.run().await
    }

    // --- view state -----------------------------------------------------

    /// Changes the active segment and republishes
    pub async fn set_segment(&self, segment: Segment) {
        self.view.write().await.segment = segment;
        self.republish_coins().await;
    }

    /// Changes the search text and republishes
    pub async fn set_search(&self, search: impl Into<String>) {
        self.view.write().await.search = search.into();
        self.republish_coins().await;
    }

    /// Applies a sort header click and republishes
    pub async fn toggle_sort(&self, field: SortField) {
        self.view.write().await.toggle_sort(field);
        self.republish_coins().await;
    }

    /// Toggles a favorite, persists the set, and republishes.
    /// Returns the symbol's new favorite state.
    pub async fn toggle_favorite(&self, symbol: &str) -> Result<bool, CacheError> {
        let now_favorite = self.favorites.write().await.toggle(symbol)?;
        self.republish_coins().await;
        Ok(now_favorite)
    }

    /// The current view state
    pub async fn view_state(&self) -> ViewState {
        self.view.read().await.clone()
    }

    // --- published outputs ----------------------------------------------

    /// Subscribes to the canonical reconciled coin list
    pub fn subscribe_coins(&self) -> watch::Receiver<Vec<CoinRecord>> {
        self.coins_tx.subscribe()
    }

    /// Subscribes to global stats (None until the first success or seed)
    pub fn subscribe_global(&self) -> watch::Receiver<Option<GlobalStats>> {
        self.global_tx.subscribe()
    }

    /// Subscribes to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<MarketEvent> {
        self.events_tx.subscribe()
    }

    /// The currently published coin list
    pub fn current_coins(&self) -> Vec<CoinRecord> {
        self.coins_tx.borrow().clone()
    }

    /// True after the coin list chain was last exhausted; cleared on the
    /// next success
    pub fn coins_error(&self) -> bool {
        self.coins_error.load(Ordering::SeqCst)
    }

    /// True after the global stats chain was last exhausted
    pub fn global_error(&self) -> bool {
        self.global_error.load(Ordering::SeqCst)
    }

    // --- internals ------------------------------------------------------

    /// Write-through on coin list chain success: persist, replace the raw
    /// list wholesale, reconcile, publish, clear the error flag
    async fn apply_coins(&self, coins: Vec<CoinRecord>) {
        if let Err(e) = self.cache.save_coins(&coins) {
            self.log_cache_failure("coin list", &e);
        }
        let count = coins.len();
        *self.raw_coins.write().await = coins;
        self.republish_coins().await;
        self.coins_error.store(false, Ordering::SeqCst);
        let _ = self.events_tx.send(MarketEvent::coins_refreshed(count));
    }

    /// Write-through on global stats chain success
    fn apply_global(&self, stats: GlobalStats) {
        if let Err(e) = self.cache.save_global(&stats) {
            self.log_cache_failure("global stats", &e);
        }
        self.global_tx.send_replace(Some(stats));
        self.global_error.store(false, Ordering::SeqCst);
        let _ = self.events_tx.send(MarketEvent::global_refreshed());
    }

    /// Re-runs the reconciler over the raw list with the current favorites
    /// and view state, and publishes the result
    async fn republish_coins(&self) {
        let raw = self.raw_coins.read().await.clone();
        let view = self.view.read().await.clone();
        let favorites = self.favorites.read().await;
        let reconciled = reconciler::reconcile(raw, favorites.symbols(), &view);
        drop(favorites);

        self.coins_tx.send_replace(reconciled);
    }

    fn log_cache_failure(&self, slot: &str, error: &CacheError) {
        tracing::warn!(slot, error = %error, "Failed to persist snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortDirection;
    use tempfile::tempdir;

    fn coin(symbol: &str, name: &str, market_cap: f64, change_24h: f64) -> CoinRecord {
        let mut c = CoinRecord::new(symbol, name, 1.0, change_24h, 0.0, 10.0, market_cap);
        c.price = market_cap / 1e6;
        c
    }

    fn seeded_service(dir: &std::path::Path) -> MarketDataService {
        let cache = MarketDataCache::new(dir);
        cache
            .save_coins(&[
                coin("ETH", "Ethereum", 4e11, 2.0),
                coin("BTC", "Bitcoin", 1e12, -1.0),
                coin("RANDOM", "Randomcoin", 5e12, 0.5),
            ])
            .unwrap();
        MarketDataService::new(dir).unwrap()
    }

    #[tokio::test]
    async fn cold_start_seeds_published_list_from_cache() {
        let dir = tempdir().unwrap();
        let service = seeded_service(dir.path());

        assert!(service.current_coins().is_empty());
        service.seed_from_cache().await;

        let coins = service.current_coins();
        let symbols: Vec<&str> = coins.iter().map(|c| c.symbol.as_str()).collect();
        // Default view: pinned majors first, remainder by market cap
        assert_eq!(symbols, vec!["BTC", "ETH", "RANDOM"]);
    }

    #[tokio::test]
    async fn seed_without_cache_publishes_nothing() {
        let dir = tempdir().unwrap();
        let service = MarketDataService::new(dir.path()).unwrap();
        service.seed_from_cache().await;

        assert!(service.current_coins().is_empty());
        assert!(service.subscribe_global().borrow().is_none());
    }

    #[tokio::test]
    async fn toggle_favorite_republishes_with_flag_set() {
        let dir = tempdir().unwrap();
        let service = seeded_service(dir.path());
        service.seed_from_cache().await;

        assert!(service.toggle_favorite("eth").await.unwrap());

        let coins = service.current_coins();
        let eth = coins.iter().find(|c| c.symbol == "ETH").unwrap();
        assert!(eth.favorite);

        assert!(!service.toggle_favorite("ETH").await.unwrap());
        let coins = service.current_coins();
        let eth = coins.iter().find(|c| c.symbol == "ETH").unwrap();
        assert!(!eth.favorite);
    }

    #[tokio::test]
    async fn segment_and_search_filter_published_list() {
        let dir = tempdir().unwrap();
        let service = seeded_service(dir.path());
        service.seed_from_cache().await;

        service.set_segment(Segment::Gainers).await;
        let symbols: Vec<String> = service
            .current_coins()
            .iter()
            .map(|c| c.symbol.clone())
            .collect();
        assert_eq!(symbols, vec!["ETH", "RANDOM"]);

        service.set_search("random").await;
        let symbols: Vec<String> = service
            .current_coins()
            .iter()
            .map(|c| c.symbol.clone())
            .collect();
        assert_eq!(symbols, vec!["RANDOM"]);
    }

    #[tokio::test]
    async fn toggle_sort_reorders_published_list() {
        let dir = tempdir().unwrap();
        let service = seeded_service(dir.path());
        service.seed_from_cache().await;

        service.toggle_sort(SortField::Symbol).await;
        let view = service.view_state().await;
        assert_eq!(view.sort_field, SortField::Symbol);
        assert_eq!(view.sort_direction, SortDirection::Ascending);

        let symbols: Vec<String> = service
            .current_coins()
            .iter()
            .map(|c| c.symbol.clone())
            .collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "RANDOM"]);

        service.toggle_sort(SortField::Symbol).await;
        let symbols: Vec<String> = service
            .current_coins()
            .iter()
            .map(|c| c.symbol.clone())
            .collect();
        assert_eq!(symbols, vec!["RANDOM", "ETH", "BTC"]);
    }

    /// Service whose every provider points at an unroutable local endpoint,
    /// so each chain step fails with a connection error.
    fn unreachable_service(dir: &std::path::Path) -> MarketDataService {
        let client = build_client().unwrap();
        let dead = "http://127.0.0.1:9";
        MarketDataService::with_providers(
            dir,
            CoinGeckoProvider::with_base_url(client.clone(), dead),
            CoinPaprikaProvider::with_base_url(client.clone(), dead),
            BinanceProvider::with_base_url(client.clone(), dead),
            BinanceProvider::with_base_url(client.clone(), dead),
            CoinbaseProvider::with_base_urls(client, dead, dead),
        )
    }

    /// Minimal HTTP server answering every request with one canned response
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn failed_primary_falls_through_and_secondary_is_published_and_cached() {
        let dir = tempdir().unwrap();
        let tickers = r#"[{
            "id": "btc-bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "quotes": { "USD": {
                "price": 50000.0,
                "percent_change_1h": 0.1,
                "percent_change_24h": 2.0,
                "volume_24h": 1000.0,
                "market_cap": 1000000000000.0
            } }
        }]"#;
        let paprika = serve("200 OK", tickers).await;

        let client = build_client().unwrap();
        let dead = "http://127.0.0.1:9";
        let service = MarketDataService::with_providers(
            dir.path(),
            CoinGeckoProvider::with_base_url(client.clone(), dead),
            CoinPaprikaProvider::with_base_url(client.clone(), &paprika),
            BinanceProvider::with_base_url(client.clone(), dead),
            BinanceProvider::with_base_url(client.clone(), dead),
            CoinbaseProvider::with_base_urls(client, dead, dead),
        );

        service.refresh_coins().await.unwrap();

        let coins = service.current_coins();
        assert_eq!(coins.len(), 1);
        assert_eq!(coins[0].symbol, "BTC");
        assert_eq!(coins[0].price, 50_000.0);
        assert!(!service.coins_error());

        // The secondary's payload is also what got written through to disk
        let cached = MarketDataCache::new(dir.path()).load_coins().unwrap();
        assert_eq!(cached.value.len(), 1);
        assert_eq!(cached.value[0].symbol, "BTC");
        assert_eq!(cached.value[0].price, 50_000.0);
    }

    #[tokio::test]
    async fn exhausted_coin_chain_sets_flag_and_keeps_published_state() {
        let dir = tempdir().unwrap();
        let cache = MarketDataCache::new(dir.path());
        cache
            .save_coins(&[coin("BTC", "Bitcoin", 1e12, 1.0)])
            .unwrap();

        let service = unreachable_service(dir.path());
        service.seed_from_cache().await;
        let before = service.current_coins();
        assert_eq!(before.len(), 1);
        assert!(!service.coins_error());

        let result = service.refresh_coins().await;
        assert!(result.is_err());
        assert!(service.coins_error());
        // Cache-seeded data stays on screen
        assert_eq!(service.current_coins(), before);
    }

    #[tokio::test]
    async fn successful_fetch_writes_through_to_cache() {
        let dir = tempdir().unwrap();
        let service = MarketDataService::new(dir.path()).unwrap();

        let fetched = vec![coin("SOL", "Solana", 7e10, 3.0)];
        service.apply_coins(fetched.clone()).await;

        // Published immediately
        assert_eq!(service.current_coins(), {
            let mut expected = fetched.clone();
            expected[0].favorite = false;
            expected
        });
        assert!(!service.coins_error());

        // And durable: a fresh cache instance reads it back
        let reread = MarketDataCache::new(dir.path()).load_coins().unwrap();
        assert_eq!(reread.value, fetched);
    }

    #[tokio::test]
    async fn exhausted_chain_emits_feature_failed_event() {
        let dir = tempdir().unwrap();
        let service = unreachable_service(dir.path());
        let mut events = service.subscribe_events();

        let _ = service.refresh_global().await;
        assert!(service.global_error());

        let event = events.recv().await.unwrap();
        assert!(matches!(event, MarketEvent::FeatureFailed { .. }));
    }

    #[tokio::test]
    async fn spot_price_for_unmapped_symbol_reports_unsupported_asset() {
        let dir = tempdir().unwrap();
        let service = unreachable_service(dir.path());

        let err = service.fetch_spot_price("NOTACOIN").await.unwrap_err();
        let FetchError::ChainExhausted { causes, .. } = err;

        // The exchanges fail on the network; the aggregator step refuses
        // the symbol outright instead of guessing an id
        let (step, cause) = causes.last().unwrap();
        assert_eq!(step, "coingecko");
        assert!(matches!(cause, ProviderError::UnsupportedAsset(s) if s == "NOTACOIN"));
        // The region mirror never ran: no region-restricted answer occurred
        assert!(!causes.iter().any(|(name, _)| name == "binance_us"));
    }

    #[tokio::test]
    async fn watch_subscribers_observe_republished_list() {
        let dir = tempdir().unwrap();
        let service = seeded_service(dir.path());
        let mut rx = service.subscribe_coins();

        service.seed_from_cache().await;

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 3);
    }
}
