//! Error types for the market data layer

use thiserror::Error;

/// Errors produced by a single provider call
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed (connection, TLS, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The call did not complete within the per-call timeout
    #[error("Request timeout")]
    Timeout,

    /// The provider refused the request for this region (HTTP 451)
    #[error("Region restricted")]
    RegionRestricted,

    /// The provider rejected a request parameter (e.g. an unsupported
    /// kline interval)
    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),

    /// The response arrived but did not decode against the expected schema
    #[error("Decode error: {0}")]
    Decode(String),

    /// Any other non-success HTTP response
    #[error("Provider API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The symbol is not known to this provider
    #[error("Unsupported symbol: {0}")]
    UnsupportedAsset(String),
}

impl ProviderError {
    /// Creates a Decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates an Api error from a status code and body
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// True when the error indicates a region-restricted response, which
    /// routes the chain to a regional mirror.
    pub fn is_region_restricted(&self) -> bool {
        matches!(self, Self::RegionRestricted)
    }

    /// True when the error indicates a rejected request parameter, which
    /// routes the chain to a normalized-parameter retry.
    pub fn is_unsupported_parameter(&self) -> bool {
        matches!(self, Self::UnsupportedParameter(_))
    }
}

/// Errors produced by a whole fallback chain
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every provider in the chain failed. Carries each attempted step's
    /// name together with its failure cause.
    #[error("All providers failed for {capability}: {}", format_causes(.causes))]
    ChainExhausted {
        capability: &'static str,
        causes: Vec<(String, ProviderError)>,
    },
}

impl FetchError {
    /// Creates a ChainExhausted error
    pub fn exhausted(capability: &'static str, causes: Vec<(String, ProviderError)>) -> Self {
        Self::ChainExhausted { capability, causes }
    }
}

fn format_causes(causes: &[(String, ProviderError)]) -> String {
    causes
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors produced by the durable snapshot stores
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem read/write failed
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be serialized for writing
    #[error("Cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_exhausted_lists_every_cause() {
        let err = FetchError::exhausted(
            "spot_price",
            vec![
                ("coinbase".to_string(), ProviderError::Timeout),
                ("binance".to_string(), ProviderError::RegionRestricted),
            ],
        );
        let msg = err.to_string();
        assert!(msg.contains("spot_price"));
        assert!(msg.contains("coinbase"));
        assert!(msg.contains("binance"));
        assert!(msg.contains("Region restricted"));
    }

    #[test]
    fn region_restricted_predicate() {
        assert!(ProviderError::RegionRestricted.is_region_restricted());
        assert!(!ProviderError::Timeout.is_region_restricted());
    }
}
