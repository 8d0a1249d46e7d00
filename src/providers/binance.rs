//! Binance provider: spot price, klines, and order book depth
//!
//! The same implementation serves the primary host and the US mirror; the
//! mirror constructor only swaps the base URL. A 451 from the primary host
//! is surfaced as `RegionRestricted` so the chain can route to the mirror.
//! The klines endpoint rejects intervals it does not support with a 400
//! whose body names the interval; that is mapped to `UnsupportedParameter`
//! so the chain can retry with normalized parameters.

use crate::{
    constants::{BINANCE_API_URL, BINANCE_US_API_URL, BOOK_DEPTH},
    error::ProviderError,
    providers::triage_status,
    types::{BookLevel, Candle, OrderBookSnapshot},
};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

/// `/api/v3/ticker/price` response
#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// `/api/v3/depth` response; levels arrive as `["price", "qty"]` pairs
#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

/// Binance market data provider
pub struct BinanceProvider {
    client: Client,
    base_url: String,
    name: &'static str,
}

impl BinanceProvider {
    /// Primary host
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: BINANCE_API_URL.to_string(),
            name: "binance",
        }
    }

    /// Regional mirror used after a region-restricted response
    pub fn us_mirror(client: Client) -> Self {
        Self {
            client,
            base_url: BINANCE_US_API_URL.to_string(),
            name: "binance_us",
        }
    }

    /// Overrides the API base URL (used by tests against a local server)
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            name: "binance",
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Binance quotes against the USDT pair, e.g. BTC -> BTCUSDT
    fn pair(symbol: &str) -> String {
        format!("{}USDT", symbol.to_uppercase())
    }

    /// Fetches the current spot price for a symbol
    pub async fn fetch_spot_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url,
            Self::pair(symbol)
        );
        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let ticker: TickerPrice = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("Binance ticker: {e}")))?;

        ticker
            .price
            .parse::<f64>()
            .map_err(|e| ProviderError::decode(format!("Binance price '{}': {e}", ticker.price)))
    }

    /// Fetches klines for a symbol at a given interval
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ProviderError> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            Self::pair(symbol),
            interval,
            limit
        );
        let response = self.client.get(&url).send().await?;

        // 400 with an interval complaint means the interval itself was
        // rejected, which the chain handles by normalizing parameters
        if response.status().as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            if body.to_lowercase().contains("invalid interval") {
                return Err(ProviderError::UnsupportedParameter(interval.to_string()));
            }
            return Err(ProviderError::api(400, body));
        }

        let response = triage_status(response).await?;
        let text = response.text().await?;
        let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("Binance klines: {e}")))?;

        rows.iter().map(|row| parse_kline_row(row)).collect()
    }

    /// Fetches a full depth snapshot for a symbol
    pub async fn fetch_depth(&self, symbol: &str) -> Result<OrderBookSnapshot, ProviderError> {
        let url = format!(
            "{}/api/v3/depth?symbol={}&limit={}",
            self.base_url,
            Self::pair(symbol),
            BOOK_DEPTH
        );
        let response = self.client.get(&url).send().await?;
        let response = triage_status(response).await?;

        let text = response.text().await?;
        let depth: DepthResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::decode(format!("Binance depth: {e}")))?;

        Ok(OrderBookSnapshot {
            symbol: symbol.to_uppercase(),
            bids: parse_levels(&depth.bids)?,
            asks: parse_levels(&depth.asks)?,
            source: self.name.to_string(),
            fetched_at: Some(Utc::now()),
        })
    }
}

/// One kline row is `[openTimeMs, open, high, low, close, volume, ...]`
/// with the numeric fields encoded as strings.
fn parse_kline_row(row: &[serde_json::Value]) -> Result<Candle, ProviderError> {
    if row.len() < 6 {
        return Err(ProviderError::decode(format!(
            "Kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let open_time_ms = row[0]
        .as_i64()
        .ok_or_else(|| ProviderError::decode("Kline open time is not an integer"))?;

    let field = |index: usize, name: &str| -> Result<f64, ProviderError> {
        row[index]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| ProviderError::decode(format!("Kline {name} is not a numeric string")))
    };

    Ok(Candle {
        open_time_ms,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}

fn parse_levels(raw: &[[String; 2]]) -> Result<Vec<BookLevel>, ProviderError> {
    raw.iter()
        .map(|[price, qty]| {
            let price = price
                .parse::<f64>()
                .map_err(|e| ProviderError::decode(format!("Book price '{price}': {e}")))?;
            let quantity = qty
                .parse::<f64>()
                .map_err(|e| ProviderError::decode(format!("Book quantity '{qty}': {e}")))?;
            Ok(BookLevel { price, quantity })
        })
        .collect()
}
