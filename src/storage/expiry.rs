//! Background Expiry Sweeper
//!
//! Lazy expiry (checking on access) reclaims entries that clients still
//! ask for, but an entry that expires and is never requested again would
//! sit in memory forever. This module runs a background tokio task that
//! periodically sweeps the engine for such entries.
//!
//! ## Design
//!
//! The sweeper:
//! 1. Sleeps for the current interval
//! 2. Wakes up and asks the engine to reclaim expired entries
//! 3. Adjusts the interval based on how much it found
//! 4. Logs what it reclaimed
//!
//! ## Adaptive Frequency
//!
//! If a large fraction of entries is expiring, the sweeper halves its
//! interval; if almost nothing expires, it backs off to save CPU.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Base interval between sweeps
    pub base_interval: Duration,

    /// Minimum interval between sweeps
    pub min_interval: Duration,

    /// Maximum interval between sweeps
    pub max_interval: Duration,

    /// If this fraction of entries expired, speed up sweeping
    pub speedup_threshold: f64,

    /// If this fraction of entries expired, slow down sweeping
    pub slowdown_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(200),
            min_interval: Duration::from_millis(20),
            max_interval: Duration::from_secs(2),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// Dropping the handle stops the sweeper task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the sweeper as a background task over the given engine.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let entries_before = engine.len();
        let expired = engine.cleanup_expired();

        if entries_before > 0 {
            let expiry_rate = expired as f64 / entries_before as f64;

            if expiry_rate > config.speedup_threshold {
                current_interval = (current_interval / 2).max(config.min_interval);
                debug!(
                    expired = expired,
                    rate = %format!("{:.2}%", expiry_rate * 100.0),
                    new_interval_ms = current_interval.as_millis(),
                    "High expiry rate, speeding up sweeper"
                );
            } else if expiry_rate < config.slowdown_threshold && expired == 0 {
                current_interval = (current_interval * 2).min(config.max_interval);
                trace!(
                    new_interval_ms = current_interval.as_millis(),
                    "Low expiry rate, slowing down sweeper"
                );
            }
        }

        if expired > 0 {
            debug!(
                expired = expired,
                entries_remaining = engine.len(),
                "Expired entries reclaimed"
            );
        }
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn sweeper_reclaims_expired_entries() {
        let engine = Arc::new(StorageEngine::new());

        for i in 0..10 {
            engine.set(
                Bytes::from(format!("short{}", i)),
                Bytes::from("value"),
                0,
                1,
            );
        }
        engine.set(Bytes::from("persistent"), Bytes::from("value"), 0, 0);
        assert_eq!(engine.len(), 11);

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);

        // Entries expire after 1s; give the sweeper time to see that.
        tokio::time::sleep(Duration::from_millis(1300)).await;

        assert_eq!(engine.len(), 1);
        assert!(engine.exists(b"persistent"));
    }

    #[tokio::test]
    async fn sweeper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new());

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);
            tokio::time::sleep(Duration::from_millis(30)).await;
            // Sweeper is dropped here
        }

        engine.set(Bytes::from("key"), Bytes::from("value"), 0, 1);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        // The sweeper is gone, but lazy expiry still hides the entry.
        assert!(engine.get(b"key").is_none());
    }
}
