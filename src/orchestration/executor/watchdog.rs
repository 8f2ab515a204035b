//! # Watchdog Supervision
//!
//! Heartbeat table checked by a dedicated supervisor task. Every module task
//! registers one channel with a timeout and feeds it on each loop iteration.
//! A channel that is not fed within its timeout means its task is stuck; the
//! supervisor then takes the fatal path.
//!
//! The table has a fixed number of channels, like a hardware task watchdog.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::fatal::{FatalCause, FatalErrorPath};

/// Watchdog registration and feeding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchdogError {
    #[error("No free watchdog channel for '{name}': all {capacity} channels in use")]
    CapacityExhausted { name: String, capacity: usize },

    #[error("Watchdog channel '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error("Watchdog timeout for '{name}' must be greater than zero")]
    InvalidTimeout { name: String },

    #[error("Watchdog channel '{name}' is no longer registered")]
    NotRegistered { name: String },

    #[error("Watchdog channel '{name}' was not fed within {timeout:?}")]
    Expired { name: String, timeout: Duration },
}

/// Result type for watchdog operations
pub type WatchdogResult<T> = Result<T, WatchdogError>;

#[derive(Debug, Clone)]
struct HeartbeatEntry {
    name: String,
    timeout: Duration,
    last_fed: Instant,
    feed_count: u64,
    expired: bool,
}

/// Point-in-time view of one watchdog channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatStatus {
    pub name: String,
    pub timeout: Duration,
    pub since_last_feed: Duration,
    pub feed_count: u64,
    pub expired: bool,
}

impl HeartbeatEntry {
    fn status(&self, now: Instant) -> HeartbeatStatus {
        HeartbeatStatus {
            name: self.name.clone(),
            timeout: self.timeout,
            since_last_feed: now.saturating_duration_since(self.last_fed),
            feed_count: self.feed_count,
            expired: self.expired,
        }
    }
}

struct WatchdogInner {
    channels: Mutex<HashMap<u64, HeartbeatEntry>>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Shared heartbeat table
#[derive(Clone)]
pub struct Watchdog {
    inner: Arc<WatchdogInner>,
}

impl Watchdog {
    /// Create a new watchdog with room for `capacity` channels
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(WatchdogInner {
                channels: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity,
            }),
        }
    }

    /// Register a channel; the returned handle feeds it and releases it on drop
    pub fn register(
        &self,
        name: impl Into<String>,
        timeout: Duration,
    ) -> WatchdogResult<HeartbeatHandle> {
        let name = name.into();
        if timeout.is_zero() {
            return Err(WatchdogError::InvalidTimeout { name });
        }

        let mut channels = self.inner.channels.lock();
        if channels.values().any(|entry| entry.name == name) {
            return Err(WatchdogError::AlreadyRegistered { name });
        }
        if channels.len() >= self.inner.capacity {
            return Err(WatchdogError::CapacityExhausted {
                name,
                capacity: self.inner.capacity,
            });
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        channels.insert(
            id,
            HeartbeatEntry {
                name: name.clone(),
                timeout,
                last_fed: Instant::now(),
                feed_count: 0,
                expired: false,
            },
        );

        info!(channel = %name, ?timeout, "🐕 Watchdog channel registered");

        Ok(HeartbeatHandle {
            id,
            name,
            watchdog: self.clone(),
        })
    }

    /// Mark and return channels whose deadline has passed since the last check
    pub fn check(&self) -> Vec<HeartbeatStatus> {
        let now = Instant::now();
        let mut channels = self.inner.channels.lock();
        channels
            .values_mut()
            .filter(|entry| !entry.expired && now.saturating_duration_since(entry.last_fed) > entry.timeout)
            .map(|entry| {
                entry.expired = true;
                entry.status(now)
            })
            .collect()
    }

    /// Status of the channel registered under `name`
    pub fn status(&self, name: &str) -> Option<HeartbeatStatus> {
        let now = Instant::now();
        self.inner
            .channels
            .lock()
            .values()
            .find(|entry| entry.name == name)
            .map(|entry| entry.status(now))
    }

    /// Status of every registered channel, sorted by name
    pub fn snapshot(&self) -> Vec<HeartbeatStatus> {
        let now = Instant::now();
        let mut statuses: Vec<_> = self
            .inner
            .channels
            .lock()
            .values()
            .map(|entry| entry.status(now))
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Number of registered channels
    pub fn registered(&self) -> usize {
        self.inner.channels.lock().len()
    }

    /// Spawn the supervisor task checking deadlines every `check_interval`
    pub fn spawn_supervisor(&self, check_interval: Duration, fatal: FatalErrorPath) -> JoinHandle<()> {
        let watchdog = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(?check_interval, "🐕 Watchdog supervisor started");

            loop {
                ticker.tick().await;

                if let Some(expired) = watchdog.check().into_iter().next() {
                    error!(
                        channel = %expired.name,
                        timeout = ?expired.timeout,
                        since_last_feed = ?expired.since_last_feed,
                        "🚨 Watchdog expired"
                    );
                    let reason = WatchdogError::Expired {
                        name: expired.name.clone(),
                        timeout: expired.timeout,
                    }
                    .to_string();
                    match fatal
                        .escalate(&expired.name, FatalCause::WatchdogExpired, reason)
                        .await
                    {}
                }
            }
        })
    }

    fn feed(&self, id: u64, name: &str) -> WatchdogResult<()> {
        let mut channels = self.inner.channels.lock();
        let entry = channels
            .get_mut(&id)
            .ok_or_else(|| WatchdogError::NotRegistered {
                name: name.to_string(),
            })?;
        entry.last_fed = Instant::now();
        entry.feed_count += 1;
        Ok(())
    }

    fn release(&self, id: u64) {
        self.inner.channels.lock().remove(&id);
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("capacity", &self.inner.capacity)
            .field("registered", &self.registered())
            .finish()
    }
}

/// Feeding handle for one watchdog channel
#[derive(Debug)]
pub struct HeartbeatHandle {
    id: u64,
    name: String,
    watchdog: Watchdog,
}

impl HeartbeatHandle {
    /// Reset this channel's deadline
    pub fn feed(&self) -> WatchdogResult<()> {
        self.watchdog.feed(self.id, &self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.watchdog.release(self.id);
    }
}
