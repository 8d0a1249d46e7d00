//! CoinPaprika provider: secondary aggregator for the market list and
//! global stats chains

use crate::{
    constants::{COINPAPRIKA_API_URL, MARKET_LIST_PAGES, MARKET_LIST_PAGE_SIZE},
    error::ProviderError,
    providers::triage_status,
    types::{CoinRecord, GlobalStats},
};
use reqwest::Client;
use serde::Deserialize;

/// One entry of the `/tickers` response
#[derive(Debug, Deserialize)]
struct TickerItem {
    symbol: String,
    name: String,
    quotes: Quotes,
}

#[derive(Debug, Deserialize)]
struct Quotes {
    #[serde(rename = "USD")]
    usd: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: Option<f64>,
    percent_change_1h: Option<f64>,
    percent_change_24h: Option<f64>,
    volume_24h: Option<f64>,
    market_cap: Option<f64>,
}

/// `/global` response
#[derive(Debug, Deserialize)]
struct GlobalResponse {
    market_cap_usd: f64,
    volume_24h_usd: f64,
    bitcoin_dominance_percentage: f64,
    market_cap_change_24h: f64,
}

/// CoinPaprika aggregator provider
pub struct CoinPaprikaProvider {
    client: Client,
    base_url: String,
}

impl CoinPaprikaProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: COINPAPRIKA_API_URL.to_string(),
        }
    }

    /// Overrides the API base URL (used by tests against a local server)
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetches the market list in one request and truncates it to the same
    /// size the paged primary would return
    pub async fn fetch_markets(&self) -> Result<Vec<CoinRecord>, ProviderError> {
        let limit = (MARKET_LIST_PAGES * MARKET_LIST_PAGE_SIZE) as usize;
        let url = format!("{}/tickers?quotes=USD&limit={}", self.base_url, limit);

        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let items: Vec<TickerItem> = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("CoinPaprika tickers: {e}")))?;

        Ok(items
            .into_iter()
            .take(limit)
            .map(coin_from_ticker)
            .collect())
    }

    /// Fetches aggregate market statistics. CoinPaprika only reports USD
    /// totals and Bitcoin dominance, so the maps carry a single entry each.
    pub async fn fetch_global(&self) -> Result<GlobalStats, ProviderError> {
        let url = format!("{}/global", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let global: GlobalResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("CoinPaprika global: {e}")))?;

        Ok(stats_from_global(global))
    }
}

fn coin_from_ticker(item: TickerItem) -> CoinRecord {
    CoinRecord::new(
        &item.symbol,
        &item.name,
        item.quotes.usd.price.unwrap_or(0.0),
        item.quotes.usd.percent_change_24h.unwrap_or(0.0),
        item.quotes.usd.percent_change_1h.unwrap_or(0.0),
        item.quotes.usd.volume_24h.unwrap_or(0.0),
        item.quotes.usd.market_cap.unwrap_or(0.0),
    )
}

fn stats_from_global(global: GlobalResponse) -> GlobalStats {
    let mut stats = GlobalStats {
        change_24h: global.market_cap_change_24h,
        ..GlobalStats::default()
    };
    stats
        .market_cap_by_currency
        .insert("usd".to_string(), global.market_cap_usd);
    stats
        .volume_by_currency
        .insert("usd".to_string(), global.volume_24h_usd);
    stats
        .dominance_by_symbol
        .insert("BTC".to_string(), global.bitcoin_dominance_percentage);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_item_maps_to_coin_record() {
        let json = r#"{
            "id": "btc-bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "quotes": {
                "USD": {
                    "price": 50000.0,
                    "percent_change_1h": 0.3,
                    "percent_change_24h": 2.1,
                    "volume_24h": 25000000000.0,
                    "market_cap": 1000000000000.0
                }
            }
        }"#;

        let item: TickerItem = serde_json::from_str(json).unwrap();
        let coin = coin_from_ticker(item);

        assert_eq!(coin.symbol, "BTC");
        assert_eq!(coin.change_24h, 2.1);
        assert_eq!(coin.market_cap, 1e12);
        // The secondary aggregator carries no sparkline or image
        assert!(coin.sparkline_7d.is_empty());
        assert!(coin.image_url.is_none());
    }

    #[test]
    fn global_response_maps_to_stats() {
        let json = r#"{
            "market_cap_usd": 2500000000000.0,
            "volume_24h_usd": 90000000000.0,
            "bitcoin_dominance_percentage": 52.5,
            "market_cap_change_24h": 1.8
        }"#;

        let global: GlobalResponse = serde_json::from_str(json).unwrap();
        let stats = stats_from_global(global);

        assert_eq!(stats.market_cap_usd(), Some(2.5e12));
        assert_eq!(stats.dominance("BTC"), Some(52.5));
        assert_eq!(stats.change_24h, 1.8);
    }
}
