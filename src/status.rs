//! Background service availability monitoring.
//!
//! Remote study services go to sleep and wake up slowly, so the CLI keeps an
//! eye on them: [`StatusMonitor::check_once`] probes once and records the
//! outcome, [`StatusMonitor::watch`] repeats the probe on a fixed interval
//! until cancelled. The latest [`ServerStatus`] is shared behind a lock so
//! any task can read it without racing the prober.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::StudyService;

/// How often [`StatusMonitor::watch`] probes by default.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(4);

/// Latest known availability of the study service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Whether the last probe reached the service.
    pub available: bool,
    /// Human-readable outcome of the last probe.
    pub message: String,
    /// Round-trip time of the last probe, in milliseconds.
    pub latency_ms: Option<u64>,
    /// When the last probe ran. `None` until the first check.
    pub last_checked: Option<DateTime<Utc>>,
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self {
            available: false,
            message: "service status unknown".to_string(),
            latency_ms: None,
            last_checked: None,
        }
    }
}

impl ServerStatus {
    /// Whether no probe has run yet.
    pub fn is_unknown(&self) -> bool {
        self.last_checked.is_none()
    }
}

/// Periodically probes the study service and publishes the result.
#[derive(Clone)]
pub struct StatusMonitor {
    service: Arc<dyn StudyService>,
    check_interval: Duration,
    status: Arc<Mutex<ServerStatus>>,
}

impl StatusMonitor {
    /// Create a monitor over `service` with the default interval.
    #[must_use]
    pub fn new(service: Arc<dyn StudyService>) -> Self {
        Self {
            service,
            check_interval: DEFAULT_CHECK_INTERVAL,
            status: Arc::new(Mutex::new(ServerStatus::default())),
        }
    }

    /// Set the probing interval used by [`StatusMonitor::watch`].
    #[must_use]
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// The most recently recorded status.
    pub async fn current(&self) -> ServerStatus {
        self.status.lock().await.clone()
    }

    /// Probe the service once, record the outcome, and return it.
    pub async fn check_once(&self) -> ServerStatus {
        let health = self.service.ping().await;
        let status = ServerStatus {
            available: health.available,
            message: health.message,
            latency_ms: Some(u64::try_from(health.latency.as_millis()).unwrap_or(u64::MAX)),
            last_checked: Some(Utc::now()),
        };
        debug!(available = status.available, message = %status.message, "status check");
        *self.status.lock().await = status.clone();
        status
    }

    /// Probe on a fixed interval until `cancellation` fires.
    ///
    /// The first probe runs immediately. Clones of this monitor observe
    /// every update through [`StatusMonitor::current`].
    pub async fn watch(&self, cancellation: CancellationToken) {
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    self.check_once().await;
                }
            }
        }
    }
}
