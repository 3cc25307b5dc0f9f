//! Refresh Coordinator Background Task
//!
//! Periodically picks one dashboard component and pushes an automatic
//! update for it to every live subscriber. Each wake-up:
//!
//! 1. Re-reads the auto-update configuration; exits if it was disabled
//! 2. Skips the cycle when nobody is subscribed
//! 3. Evicts the oldest subscribers above `max_clients`
//! 4. Revalidates the data cache against its sources
//! 5. Selects a component (random or round-robin) and publishes
//!
//! At most one coordinator loop runs at a time. The loop stops when the
//! `enabled` flag is found false on wake, or when a shutdown is signalled.
//!
//! # Usage
//!
//! ```ignore
//! let coordinator = Arc::new(RefreshCoordinator::new(config, broadcaster, data));
//! coordinator.ensure_running();
//! // ...
//! coordinator.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use panel_events::{Broadcaster, DashboardEvent, ServerSnapshot};
use panel_storage::DataCache;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::config::{AutoUpdateConfig, AutoUpdatePatch};
use crate::error::ApiResult;
use crate::telemetry::metrics::with_metrics;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for coordinator activity since startup.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Wake-ups that ran a cycle
    pub cycles: AtomicU64,

    /// Automatic updates published
    pub published: AtomicU64,

    /// Cycles skipped because nobody was subscribed
    pub skipped_no_subscribers: AtomicU64,

    /// Cycles skipped because no component was configured
    pub skipped_no_components: AtomicU64,

    /// Subscribers removed by the max_clients ceiling
    pub subscribers_evicted: AtomicU64,

    /// Data cache entries reloaded during cycles
    pub sources_reloaded: AtomicU64,
}

impl RefreshMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            skipped_no_subscribers: self.skipped_no_subscribers.load(Ordering::Relaxed),
            skipped_no_components: self.skipped_no_components.load(Ordering::Relaxed),
            subscribers_evicted: self.subscribers_evicted.load(Ordering::Relaxed),
            sources_reloaded: self.sources_reloaded.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of coordinator metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshSnapshot {
    pub cycles: u64,
    pub published: u64,
    pub skipped_no_subscribers: u64,
    pub skipped_no_components: u64,
    pub subscribers_evicted: u64,
    pub sources_reloaded: u64,
}

// ============================================================================
// TOPIC SELECTION
// ============================================================================

/// Pick the component to refresh.
///
/// Random mode draws uniformly. Otherwise the index is
/// `(now_secs / interval) % len`, so consecutive intervals walk the list.
pub fn select_topic<'a, R: Rng + ?Sized>(
    components: &'a [String],
    random: bool,
    interval_secs: u64,
    now_secs: u64,
    rng: &mut R,
) -> Option<&'a str> {
    if components.is_empty() {
        return None;
    }
    if random {
        return components.choose(rng).map(String::as_str);
    }
    let index = (now_secs / interval_secs.max(1)) % components.len() as u64;
    components.get(index as usize).map(String::as_str)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Result of one coordinator cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoSubscribers,
    NoComponents,
    Published { component: String, delivered: usize },
}

/// State shared between the coordinator handle and its loop.
struct Shared {
    config: RwLock<AutoUpdateConfig>,
    broadcaster: Broadcaster,
    data: Arc<DataCache>,
    metrics: RefreshMetrics,
}

impl Shared {
    fn tick(&self, config: &AutoUpdateConfig) -> TickOutcome {
        self.metrics.cycles.fetch_add(1, Ordering::Relaxed);

        if self.broadcaster.is_empty() {
            self.metrics
                .skipped_no_subscribers
                .fetch_add(1, Ordering::Relaxed);
            tracing::debug!("No subscribers, skipping automatic update");
            return TickOutcome::NoSubscribers;
        }

        let evicted = self.broadcaster.evict_oldest(config.max_clients);
        if evicted > 0 {
            self.metrics
                .subscribers_evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
            tracing::warn!(
                evicted,
                max_clients = config.max_clients,
                "Subscriber count over limit, evicted oldest"
            );
        }

        let reloaded = self.data.revalidate_all();
        self.metrics
            .sources_reloaded
            .fetch_add(reloaded as u64, Ordering::Relaxed);

        let selected = select_topic(
            &config.components,
            config.random_selection,
            config.interval,
            now_secs(),
            &mut rand::rng(),
        );
        let Some(component) = selected else {
            self.metrics
                .skipped_no_components
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Auto-update component list is empty");
            return TickOutcome::NoComponents;
        };

        let event = DashboardEvent::auto_update(
            component,
            ServerSnapshot {
                interval: config.interval,
                random_mode: config.random_selection,
            },
        );
        let delivered = self.broadcaster.publish(event);
        self.metrics.published.fetch_add(1, Ordering::Relaxed);
        with_metrics(|m| m.record_broadcast("auto_update"));

        tracing::info!(
            component = %component,
            delivered,
            "Automatic update published"
        );
        TickOutcome::Published {
            component: component.to_string(),
            delivered,
        }
    }
}

/// Clears the running flag when the loop exits, however it exits.
struct RunningGuard {
    running: Arc<AtomicBool>,
    released: bool,
}

impl RunningGuard {
    fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            released: false,
        }
    }

    /// Clear the running flag now. A later drop leaves the flag alone, so a
    /// loop spawned after this point keeps its own claim.
    fn release(&mut self) {
        if !self.released {
            self.running.store(false, Ordering::SeqCst);
            self.released = true;
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns the background refresh loop and its runtime-mutable configuration.
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("running", &self.is_running())
            .field("metrics", &self.shared.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(config: AutoUpdateConfig, broadcaster: Broadcaster, data: Arc<DataCache>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                broadcaster,
                data,
                metrics: RefreshMetrics::new(),
            }),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Whether the loop is currently alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> RefreshSnapshot {
        self.shared.metrics.snapshot()
    }

    pub async fn config(&self) -> AutoUpdateConfig {
        self.shared.config.read().await.clone()
    }

    /// Apply a partial configuration update, starting the loop if the
    /// update enabled it.
    pub async fn update_config(&self, patch: AutoUpdatePatch) -> ApiResult<AutoUpdateConfig> {
        let updated = {
            let mut config = self.shared.config.write().await;
            config.apply(patch)?;
            config.clone()
        };
        tracing::info!(
            enabled = updated.enabled,
            interval = updated.interval,
            components = updated.components.len(),
            "Auto-update configuration changed"
        );
        if updated.enabled {
            self.ensure_running();
        }
        Ok(updated)
    }

    /// Flip the enabled flag. Returns the new configuration.
    pub async fn toggle(&self) -> AutoUpdateConfig {
        let updated = {
            let mut config = self.shared.config.write().await;
            config.enabled = !config.enabled;
            config.clone()
        };
        tracing::info!(enabled = updated.enabled, "Auto-update toggled");
        if updated.enabled {
            self.ensure_running();
        }
        updated
    }

    /// Run one cycle now with the current configuration.
    pub async fn tick_now(&self) -> TickOutcome {
        let config = self.config().await;
        self.shared.tick(&config)
    }

    /// Spawn the loop unless one is already running. Returns true if this
    /// call started it. Must be called from within a Tokio runtime.
    pub fn ensure_running(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let guard = RunningGuard::new(self.running.clone());
        let handle = tokio::spawn(run_loop(self.shared.clone(), shutdown_rx, guard));

        let previous = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            // Finished loop left behind by an earlier run.
            previous.abort();
        }
        true
    }

    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Refresh coordinator task ended abnormally");
            }
        }
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut guard: RunningGuard,
) {
    {
        let config = shared.config.read().await;
        tracing::info!(
            interval_secs = config.interval,
            components = config.components.len(),
            random_selection = config.random_selection,
            max_clients = config.max_clients,
            "Refresh coordinator started"
        );
    }

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        let interval = shared.config.read().await.interval_duration();

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Refresh coordinator shutting down");
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let config = {
            let current = shared.config.read().await;
            if !current.enabled {
                // Released under the read lock: an enable that lands after
                // this sees the flag clear and spawns a fresh loop.
                guard.release();
                drop(current);
                tracing::info!("Auto-update disabled, refresh coordinator exiting");
                break;
            }
            current.clone()
        };
        shared.tick(&config);
    }

    let snapshot = shared.metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        published = snapshot.published,
        skipped_no_subscribers = snapshot.skipped_no_subscribers,
        subscribers_evicted = snapshot.subscribers_evicted,
        "Refresh coordinator completed"
    );
}
