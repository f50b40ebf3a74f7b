//! Off-path query logging.
//!
//! Repository calls report their label and latency here. Events go through a
//! fixed-capacity channel to one background task; when the channel is full
//! the event is dropped and counted, so a slow log sink can never stall a
//! query.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    pub label: &'static str,
    pub elapsed: Duration,
    pub failed: bool,
}

#[derive(Debug, Clone, Copy)]
struct Thresholds {
    debug: bool,
    slow_query: Duration,
}

#[derive(Clone)]
pub struct QueryLogger {
    tx: Option<mpsc::Sender<QueryEvent>>,
    thresholds: Thresholds,
    dropped: Arc<AtomicU64>,
}

impl QueryLogger {
    /// Logger whose events go nowhere.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            thresholds: Thresholds {
                debug: false,
                slow_query: Duration::MAX,
            },
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build the logger and spawn its drain task on the current runtime.
    pub fn spawn(config: &DatabaseConfig) -> Self {
        let (logger, rx) = Self::channel(config.query_log_buffer, config.debug, config.slow_query);
        tokio::spawn(drain(rx, logger.thresholds));
        logger
    }

    /// Logger plus the receiving end, for callers that drain it themselves.
    pub fn channel(
        capacity: usize,
        debug: bool,
        slow_query: Duration,
    ) -> (Self, mpsc::Receiver<QueryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let logger = Self {
            tx: Some(tx),
            thresholds: Thresholds { debug, slow_query },
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (logger, rx)
    }

    pub fn record(&self, label: &'static str, elapsed: Duration, failed: bool) {
        let Some(tx) = &self.tx else {
            return;
        };
        let interesting =
            failed || self.thresholds.debug || elapsed >= self.thresholds.slow_query;
        if !interesting {
            return;
        }

        let event = QueryEvent {
            label,
            elapsed,
            failed,
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Events discarded because the buffer was full (or the drain task is gone).
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn drain(mut rx: mpsc::Receiver<QueryEvent>, thresholds: Thresholds) {
    while let Some(event) = rx.recv().await {
        let elapsed_ms = event.elapsed.as_millis() as u64;
        if event.failed {
            warn!(query = event.label, elapsed_ms, "query failed");
        } else if event.elapsed >= thresholds.slow_query {
            warn!(query = event.label, elapsed_ms, "slow query");
        } else {
            debug!(query = event.label, elapsed_ms, "query");
        }
    }
}
