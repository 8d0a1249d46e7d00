//! Periodic refresh loops for the coin list and global stats
//!
//! Two independently cancellable tasks, one per capability, each with its
//! own period. A refresh runs to completion inside its loop task before the
//! next tick is awaited, so cycles can never overlap and a slow provider
//! never stacks up concurrent refreshes. Refresh failures are already
//! absorbed and flagged by the service; the loops run until stopped.

use crate::constants::{COIN_REFRESH_INTERVAL_SECS, GLOBAL_REFRESH_INTERVAL_SECS};
use crate::market::MarketDataService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Driver for the two periodic refresh loops
pub struct AutoRefreshScheduler {
    coins_task: Option<JoinHandle<()>>,
    global_task: Option<JoinHandle<()>>,
}

impl AutoRefreshScheduler {
    /// Starts both loops with the default periods
    pub fn start(service: Arc<MarketDataService>) -> Self {
        Self::start_with_periods(
            service,
            Duration::from_secs(COIN_REFRESH_INTERVAL_SECS),
            Duration::from_secs(GLOBAL_REFRESH_INTERVAL_SECS),
        )
    }

    /// Starts both loops with explicit periods
    pub fn start_with_periods(
        service: Arc<MarketDataService>,
        coin_period: Duration,
        global_period: Duration,
    ) -> Self {
        let coins_task = {
            let service = service.clone();
            spawn_refresh_loop("coin_list", coin_period, move || {
                let service = service.clone();
                async move {
                    let _ = service.refresh_coins().await;
                }
            })
        };

        let global_task = spawn_refresh_loop("global_stats", global_period, move || {
            let service = service.clone();
            async move {
                let _ = service.refresh_global().await;
            }
        });

        Self {
            coins_task: Some(coins_task),
            global_task: Some(global_task),
        }
    }

    /// Stops both loops. An in-flight refresh is abandoned at its next
    /// await point; nothing is published or persisted after this returns.
    pub fn stop(&mut self) {
        if let Some(task) = self.coins_task.take() {
            task.abort();
        }
        if let Some(task) = self.global_task.take() {
            task.abort();
        }
        tracing::info!("Auto refresh scheduler stopped");
    }

    /// True while both loops are still running
    pub fn is_running(&self) -> bool {
        self.coins_task.is_some() && self.global_task.is_some()
    }
}

impl Drop for AutoRefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns one periodic loop: wait a period, run the refresh to completion,
/// repeat. The refresh runs inline in the loop task, so aborting the task
/// also abandons an in-flight refresh.
fn spawn_refresh_loop<F, Fut>(name: &'static str, period: Duration, refresh: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tracing::info!(loop_name = name, period_secs = period.as_secs_f64(), "Refresh loop started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately; the first tick is consumed so the
        // loop sleeps a full period before its first refresh
        ticker.tick().await;

        loop {
            ticker.tick().await;
            refresh().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loop_fires_repeatedly_until_aborted() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = spawn_refresh_loop("test", Duration::from_millis(20), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(110)).await;
        task.abort();
        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 2, "expected at least 2 ticks, got {fired}");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), fired, "loop kept firing after abort");
    }

    #[tokio::test]
    async fn first_refresh_waits_a_full_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = spawn_refresh_loop("test", Duration::from_millis(80), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        task.abort();
    }

    #[tokio::test]
    async fn slow_refresh_is_not_stacked() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        // Each refresh takes far longer than the period
        let task = spawn_refresh_loop("test", Duration::from_millis(15), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        task.abort();

        // The second refresh cannot start before the first completes
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abort_abandons_in_flight_refresh() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let started_in_loop = started.clone();
        let finished_in_loop = finished.clone();

        let task = spawn_refresh_loop("test", Duration::from_millis(10), move || {
            let started = started_in_loop.clone();
            let finished = finished_in_loop.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Let the first refresh get in flight, then abort mid-refresh
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        task.abort();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            finished.load(Ordering::SeqCst),
            0,
            "refresh ran to completion after abort"
        );
    }
}
