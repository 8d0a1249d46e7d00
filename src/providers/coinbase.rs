//! Coinbase provider: spot price and order book
//!
//! Coinbase uses its native dashed pair format (`BTC-USD`), unlike the
//! USDT-pair format Binance expects.

use crate::{
    constants::{COINBASE_API_URL, COINBASE_EXCHANGE_API_URL},
    error::ProviderError,
    providers::triage_status,
    types::{BookLevel, OrderBookSnapshot},
};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

/// `/v2/prices/{pair}/spot` response
#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotData,
}

#[derive(Debug, Deserialize)]
struct SpotData {
    amount: String,
}

/// `/products/{pair}/book?level=2` response. Levels arrive as
/// `[price, size, num_orders]`; only the first two matter here.
#[derive(Debug, Deserialize)]
struct BookResponse {
    bids: Vec<Vec<serde_json::Value>>,
    asks: Vec<Vec<serde_json::Value>>,
}

/// Coinbase market data provider
pub struct CoinbaseProvider {
    client: Client,
    api_url: String,
    exchange_url: String,
}

impl CoinbaseProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_url: COINBASE_API_URL.to_string(),
            exchange_url: COINBASE_EXCHANGE_API_URL.to_string(),
        }
    }

    /// Overrides both API base URLs (used by tests against a local server)
    pub fn with_base_urls(
        client: Client,
        api_url: impl Into<String>,
        exchange_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            exchange_url: exchange_url.into(),
        }
    }

    /// Native pair format, e.g. BTC -> BTC-USD
    fn pair(symbol: &str) -> String {
        format!("{}-USD", symbol.to_uppercase())
    }

    /// Fetches the current spot price for a symbol
    pub async fn fetch_spot_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        let url = format!("{}/v2/prices/{}/spot", self.api_url, Self::pair(symbol));
        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let spot: SpotResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("Coinbase spot: {e}")))?;

        spot.data
            .amount
            .parse::<f64>()
            .map_err(|e| ProviderError::decode(format!("Coinbase price '{}': {e}", spot.data.amount)))
    }

    /// Fetches a level-2 order book snapshot for a symbol
    pub async fn fetch_book(&self, symbol: &str) -> Result<OrderBookSnapshot, ProviderError> {
        let url = format!(
            "{}/products/{}/book?level=2",
            self.exchange_url,
            Self::pair(symbol)
        );
        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let book: BookResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("Coinbase book: {e}")))?;

        Ok(OrderBookSnapshot {
            symbol: symbol.to_uppercase(),
            bids: parse_levels(&book.bids)?,
            asks: parse_levels(&book.asks)?,
            source: "coinbase".to_string(),
            fetched_at: Some(Utc::now()),
        })
    }
}

fn parse_levels(raw: &[Vec<serde_json::Value>]) -> Result<Vec<BookLevel>, ProviderError> {
    raw.iter()
        .map(|row| {
            let price = row
                .first()
                .and_then(level_number)
                .ok_or_else(|| ProviderError::decode("Book level missing price"))?;
            let quantity = row
                .get(1)
                .and_then(level_number)
                .ok_or_else(|| ProviderError::decode("Book level missing size"))?;
            Ok(BookLevel { price, quantity })
        })
        .collect()
}

/// Coinbase encodes level numbers as strings, but tolerate raw numbers too
fn level_number(value: &serde_json::Value) -> Option<f64> {
    value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| value.as_f64())
}
