//! Concrete HTTP providers
//!
//! Each provider decodes its responses against a strongly typed schema in a
//! single step; a schema mismatch surfaces as one `Decode` error for that
//! provider and falls through the chain.

pub mod binance;
pub mod coinbase;
pub mod coingecko;
pub mod coinpaprika;

pub use binance::BinanceProvider;
pub use coinbase::CoinbaseProvider;
pub use coingecko::CoinGeckoProvider;
pub use coinpaprika::CoinPaprikaProvider;

use crate::constants::{REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::error::ProviderError;
use reqwest::{Client, Response};
use std::time::Duration;

/// Builds the shared HTTP client used by every provider
pub fn build_client() -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(ProviderError::Network)
}

/// Maps non-success statuses to the error taxonomy before any decode:
/// 429 is rate limiting, 451 routes to a regional mirror, anything else
/// non-2xx is a terminal provider error.
pub(crate) async fn triage_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    match status.as_u16() {
        429 => Err(ProviderError::RateLimited),
        451 => Err(ProviderError::RegionRestricted),
        _ if !status.is_success() => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::api(status.as_u16(), body))
        }
        _ => Ok(response),
    }
}
