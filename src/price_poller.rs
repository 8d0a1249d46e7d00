//! Continuous live-price polling for the symbol being viewed
//!
//! One symbol is polled at a time. A successful tick publishes the sample
//! and resets the delay to the base interval; a failed tick publishes
//! nothing and doubles the delay up to a cap. The loop never terminates on
//! failure; it runs until stopped or restarted for another symbol.

use crate::{
    constants::{PRICE_POLL_BASE_SECS, PRICE_POLL_MAX_BACKOFF_SECS},
    error::FetchError,
    market::MarketDataService,
    types::PriceSample,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Source of spot prices, normally the market data service. Split out so
/// the poller can be driven by a fake in tests.
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    async fn spot_price(&self, symbol: &str) -> Result<PriceSample, FetchError>;
}

#[async_trait]
impl SpotPriceSource for MarketDataService {
    async fn spot_price(&self, symbol: &str) -> Result<PriceSample, FetchError> {
        self.fetch_spot_price(symbol).await
    }
}

/// Per-symbol polling loop with exponential backoff
pub struct PricePoller {
    source: Arc<dyn SpotPriceSource>,
    base_interval: Duration,
    max_backoff: Duration,
    price_tx: watch::Sender<Option<PriceSample>>,
    /// Restart counter; a loop may only publish while its epoch is current
    epoch: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    symbol: Option<String>,
}

impl PricePoller {
    /// Creates an idle poller with the default intervals
    pub fn new(source: Arc<dyn SpotPriceSource>) -> Self {
        Self::with_intervals(
            source,
            Duration::from_secs(PRICE_POLL_BASE_SECS),
            Duration::from_secs(PRICE_POLL_MAX_BACKOFF_SECS),
        )
    }

    /// Creates an idle poller with explicit base and cap intervals
    pub fn with_intervals(
        source: Arc<dyn SpotPriceSource>,
        base_interval: Duration,
        max_backoff: Duration,
    ) -> Self {
        Self {
            source,
            base_interval,
            max_backoff,
            price_tx: watch::channel(None).0,
            epoch: Arc::new(AtomicU64::new(0)),
            task: None,
            symbol: None,
        }
    }

    /// Subscribes to the latest published sample. `None` until the first
    /// success for the current symbol.
    pub fn subscribe(&self) -> watch::Receiver<Option<PriceSample>> {
        self.price_tx.subscribe()
    }

    /// The symbol currently being polled, if any
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// Starts polling a symbol. If already polling (same or different
    /// symbol), the old loop is discarded and a fresh one starts cleanly:
    /// no stale sample from the previous symbol is ever left published.
    pub fn start(&mut self, symbol: &str) {
        self.stop();
        let symbol = symbol.to_uppercase();

        let epoch = self.epoch.clone();
        let my_epoch = epoch.load(Ordering::SeqCst) + 1;
        // The epoch advances and the slot clears under the channel's own
        // lock, so a superseded loop that already finished its fetch can
        // never land a stale sample after this point.
        self.price_tx.send_modify(|slot| {
            epoch.store(my_epoch, Ordering::SeqCst);
            *slot = None;
        });

        let source = self.source.clone();
        let price_tx = self.price_tx.clone();
        let base = self.base_interval;
        let cap = self.max_backoff;
        let loop_symbol = symbol.clone();

        self.task = Some(tokio::spawn(async move {
            tracing::info!(symbol = %loop_symbol, "Price poller started");
            let mut delay = base;

            loop {
                match source.spot_price(&loop_symbol).await {
                    Ok(sample) => {
                        let current = price_tx.send_if_modified(|slot| {
                            if epoch.load(Ordering::SeqCst) != my_epoch {
                                return false;
                            }
                            *slot = Some(sample);
                            true
                        });
                        if !current {
                            return;
                        }
                        delay = base;
                    }
                    Err(e) => {
                        tracing::warn!(
                            symbol = %loop_symbol,
                            error = %e,
                            backoff_secs = delay.as_secs_f64(),
                            "Price poll failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        delay = next_backoff(delay, cap);
                        continue;
                    }
                }

                tokio::time::sleep(delay).await;
            }
        }));
        self.symbol = Some(symbol);
    }

    /// Stops polling, discarding any in-flight call
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!(symbol = ?self.symbol, "Price poller stopped");
        }
        self.symbol = None;
    }

    /// True while a polling loop is active
    pub fn is_polling(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for PricePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Doubles the failure delay, saturating at the cap
fn next_backoff(current: Duration, cap: Duration) -> Duration {
    (current * 2).min(cap)
}
