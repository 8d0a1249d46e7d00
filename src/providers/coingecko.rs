//! CoinGecko provider: paged market list, global stats, simple-price fallback

use crate::{
    constants::{self, COINGECKO_API_URL},
    error::ProviderError,
    providers::triage_status,
    types::{CoinRecord, GlobalStats},
};
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

/// One entry of the `/coins/markets` response
#[derive(Debug, Deserialize)]
struct MarketsItem {
    symbol: String,
    name: String,
    current_price: Option<f64>,
    price_change_percentage_24h_in_currency: Option<f64>,
    price_change_percentage_1h_in_currency: Option<f64>,
    total_volume: Option<f64>,
    market_cap: Option<f64>,
    sparkline_in_7d: Option<SparklineIn7d>,
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SparklineIn7d {
    price: Vec<f64>,
}

/// The `/global` response wrapper
#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    total_market_cap: HashMap<String, f64>,
    total_volume: HashMap<String, f64>,
    market_cap_percentage: HashMap<String, f64>,
    market_cap_change_percentage_24h_usd: f64,
}

/// The `/simple/price` response: id -> { currency -> price }
#[derive(Debug, Deserialize)]
struct SimplePriceResponse(HashMap<String, HashMap<String, f64>>);

/// CoinGecko market data provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: COINGECKO_API_URL.to_string(),
        }
    }

    /// Overrides the API base URL (used by tests against a local server)
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetches `pages` market-list pages concurrently and concatenates them
    /// in page order. Duplicates across page boundaries are left for the
    /// reconciler to resolve.
    pub async fn fetch_markets(&self, pages: u32) -> Result<Vec<CoinRecord>, ProviderError> {
        let page_futures = (1..=pages).map(|page| self.fetch_markets_page(page));
        let pages = try_join_all(page_futures).await?;
        Ok(pages.into_iter().flatten().collect())
    }

    async fn fetch_markets_page(&self, page: u32) -> Result<Vec<CoinRecord>, ProviderError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page={}&sparkline=true&price_change_percentage=1h,24h",
            self.base_url,
            constants::MARKET_LIST_PAGE_SIZE,
            page
        );
        tracing::debug!(page, "Fetching CoinGecko markets page");

        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let items: Vec<MarketsItem> = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("CoinGecko markets: {e}")))?;

        Ok(items.into_iter().map(coin_from_markets_item).collect())
    }

    /// Fetches aggregate market statistics
    pub async fn fetch_global(&self) -> Result<GlobalStats, ProviderError> {
        let url = format!("{}/global", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let global: GlobalResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("CoinGecko global: {e}")))?;

        Ok(stats_from_global(global.data))
    }

    /// Fetches a single spot price through `/simple/price`, keyed by the
    /// static symbol table. Symbols outside the table are reported as
    /// unsupported instead of being mapped to a guess.
    pub async fn fetch_simple_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        let id = constants::coingecko_id(symbol)
            .ok_or_else(|| ProviderError::UnsupportedAsset(symbol.to_uppercase()))?;

        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, id
        );
        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let prices: SimplePriceResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("CoinGecko simple price: {e}")))?;

        prices
            .0
            .get(id)
            .and_then(|by_currency| by_currency.get("usd"))
            .copied()
            .ok_or_else(|| ProviderError::decode(format!("No usd price for {id}")))
    }
}

fn coin_from_markets_item(item: MarketsItem) -> CoinRecord {
    let mut coin = CoinRecord::new(
        &item.symbol,
        &item.name,
        item.current_price.unwrap_or(0.0),
        item.price_change_percentage_24h_in_currency.unwrap_or(0.0),
        item.price_change_percentage_1h_in_currency.unwrap_or(0.0),
        item.total_volume.unwrap_or(0.0),
        item.market_cap.unwrap_or(0.0),
    );
    coin.sparkline_7d = item.sparkline_in_7d.map(|s| s.price).unwrap_or_default();
    coin.image_url = item.image;
    coin
}

fn stats_from_global(data: GlobalData) -> GlobalStats {
    GlobalStats {
        market_cap_by_currency: data.total_market_cap,
        volume_by_currency: data.total_volume,
        dominance_by_symbol: data
            .market_cap_percentage
            .into_iter()
            .map(|(sym, pct)| (sym.to_uppercase(), pct))
            .collect(),
        change_24h: data.market_cap_change_percentage_24h_usd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markets_item_maps_to_coin_record() {
        let json = r#"{
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 50000.0,
            "price_change_percentage_24h_in_currency": 1.5,
            "price_change_percentage_1h_in_currency": -0.2,
            "total_volume": 30000000000.0,
            "market_cap": 1000000000000.0,
            "sparkline_in_7d": { "price": [49000.0, 49500.0, 50000.0] },
            "image": "https://example.com/btc.png"
        }"#;

        let item: MarketsItem = serde_json::from_str(json).unwrap();
        let coin = coin_from_markets_item(item);

        assert_eq!(coin.symbol, "BTC");
        assert_eq!(coin.name, "Bitcoin");
        assert_eq!(coin.price, 50_000.0);
        assert_eq!(coin.change_24h, 1.5);
        assert_eq!(coin.change_1h, -0.2);
        assert_eq!(coin.sparkline_7d.len(), 3);
        assert_eq!(coin.image_url.as_deref(), Some("https://example.com/btc.png"));
        assert!(!coin.favorite);
    }

    #[test]
    fn markets_item_missing_fields_default_to_zero() {
        let json = r#"{ "symbol": "new", "name": "Newcoin" }"#;
        let item: MarketsItem = serde_json::from_str(json).unwrap();
        let coin = coin_from_markets_item(item);

        assert_eq!(coin.price, 0.0);
        assert!(coin.sparkline_7d.is_empty());
        assert!(coin.image_url.is_none());
    }

    #[test]
    fn global_response_maps_to_stats() {
        let json = r#"{
            "data": {
                "total_market_cap": { "usd": 2500000000000.0, "eur": 2300000000000.0 },
                "total_volume": { "usd": 90000000000.0 },
                "market_cap_percentage": { "btc": 52.1, "eth": 16.9 },
                "market_cap_change_percentage_24h_usd": -1.3
            }
        }"#;

        let global: GlobalResponse = serde_json::from_str(json).unwrap();
        let stats = stats_from_global(global.data);

        assert_eq!(stats.market_cap_usd(), Some(2.5e12));
        assert_eq!(stats.dominance("BTC"), Some(52.1));
        assert_eq!(stats.change_24h, -1.3);
    }
}
