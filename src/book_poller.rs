//! Fixed-interval order book refresh for the symbol being viewed
//!
//! Each tick replaces the entire snapshot; there is no diffing against the
//! previous book. Failures are logged and the loop simply tries again next
//! tick.

use crate::{
    constants::BOOK_POLL_INTERVAL_SECS,
    error::FetchError,
    market::MarketDataService,
    types::OrderBookSnapshot,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Source of order book snapshots, normally the market data service
#[async_trait]
pub trait OrderBookSource: Send + Sync {
    async fn order_book(&self, symbol: &str) -> Result<OrderBookSnapshot, FetchError>;
}

#[async_trait]
impl OrderBookSource for MarketDataService {
    async fn order_book(&self, symbol: &str) -> Result<OrderBookSnapshot, FetchError> {
        self.fetch_order_book(symbol).await
    }
}

/// Fixed-interval depth polling loop
pub struct OrderBookPoller {
    source: Arc<dyn OrderBookSource>,
    interval: Duration,
    book_tx: watch::Sender<Option<OrderBookSnapshot>>,
    /// Restart counter; a loop may only publish while its epoch is current
    epoch: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    symbol: Option<String>,
}

impl OrderBookPoller {
    /// Creates an idle poller with the default interval
    pub fn new(source: Arc<dyn OrderBookSource>) -> Self {
        Self::with_interval(source, Duration::from_secs(BOOK_POLL_INTERVAL_SECS))
    }

    /// Creates an idle poller with an explicit interval
    pub fn with_interval(source: Arc<dyn OrderBookSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            book_tx: watch::channel(None).0,
            epoch: Arc::new(AtomicU64::new(0)),
            task: None,
            symbol: None,
        }
    }

    /// Subscribes to the latest snapshot. `None` until the first success
    /// for the current symbol.
    pub fn subscribe(&self) -> watch::Receiver<Option<OrderBookSnapshot>> {
        self.book_tx.subscribe()
    }

    /// The symbol currently being polled, if any
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// Starts polling a symbol, restarting cleanly if already running
    pub fn start(&mut self, symbol: &str) {
        self.stop();
        let symbol = symbol.to_uppercase();

        let epoch = self.epoch.clone();
        let my_epoch = epoch.load(Ordering::SeqCst) + 1;
        // Epoch advance and slot clear happen under the channel's own lock,
        // so a superseded loop can never land a stale snapshot afterwards
        self.book_tx.send_modify(|slot| {
            epoch.store(my_epoch, Ordering::SeqCst);
            *slot = None;
        });

        let source = self.source.clone();
        let book_tx = self.book_tx.clone();
        let interval = self.interval;
        let loop_symbol = symbol.clone();

        self.task = Some(tokio::spawn(async move {
            tracing::info!(symbol = %loop_symbol, "Order book poller started");

            loop {
                match source.order_book(&loop_symbol).await {
                    Ok(snapshot) => {
                        let current = book_tx.send_if_modified(|slot| {
                            if epoch.load(Ordering::SeqCst) != my_epoch {
                                return false;
                            }
                            *slot = Some(snapshot);
                            true
                        });
                        if !current {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            symbol = %loop_symbol,
                            error = %e,
                            "Order book poll failed"
                        );
                    }
                }

                tokio::time::sleep(interval).await;
            }
        }));
        self.symbol = Some(symbol);
    }

    /// Stops polling, discarding any in-flight call
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!(symbol = ?self.symbol, "Order book poller stopped");
        }
        self.symbol = None;
    }

    /// True while a polling loop is active
    pub fn is_polling(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for OrderBookPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
