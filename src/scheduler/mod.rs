// src/scheduler/mod.rs
//!
//! Periodic driver for the broadcast hub
//!
//! Three loops on independent clocks: a new-threat poll, a statistics
//! push, and the heartbeat. The poll carries an explicit watermark (the
//! highest index already seen) into and out of every call instead of
//! keeping hidden last-seen state on the driver.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::broadcast::Broadcaster;
use crate::correlation::models::{ThreatIndex, ThreatRecord};
use crate::correlation::store::ThreatStore;
use crate::stats::StatsService;

/// Fetch records newer than `watermark` and advance it.
///
/// The returned watermark is the highest index seen so far; callers feed
/// it back into the next poll.
pub async fn poll_new_threats(
    store: &dyn ThreatStore,
    watermark: ThreatIndex,
) -> (Vec<ThreatRecord>, ThreatIndex) {
    let fresh = store.poll_since(watermark).await;
    let next = fresh
        .last()
        .map(|r| r.threat_index)
        .unwrap_or(watermark);
    (fresh, next)
}

/// Owns the periodic loops; the clocks live here, the effects in the hub
pub struct Scheduler {
    threats: Arc<dyn ThreatStore>,
    stats: Arc<StatsService>,
    hub: Arc<Broadcaster>,
    refresh_interval: Duration,
    stats_interval: Duration,
    heartbeat_interval: Duration,
}

impl Scheduler {
    pub fn new(
        threats: Arc<dyn ThreatStore>,
        stats: Arc<StatsService>,
        hub: Arc<Broadcaster>,
        refresh_interval: Duration,
        stats_interval: Duration,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            threats,
            stats,
            hub,
            refresh_interval,
            stats_interval,
            heartbeat_interval,
        }
    }

    /// Spawn all three loops. The handles keep running until aborted or
    /// the runtime shuts down.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.spawn_refresh_loop(),
            self.spawn_stats_loop(),
            self.spawn_heartbeat_loop(),
        ]
    }

    fn spawn_refresh_loop(&self) -> JoinHandle<()> {
        let store = self.threats.clone();
        let hub = self.hub.clone();
        let period = self.refresh_interval;

        tokio::spawn(async move {
            // Threats already stored at startup are not replayed
            let mut watermark = store
                .recent(1)
                .await
                .first()
                .map(|r| r.threat_index)
                .unwrap_or(0);

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let (fresh, next) = poll_new_threats(store.as_ref(), watermark).await;
                if !fresh.is_empty() {
                    info!("detected {} new threats", fresh.len());
                    for record in &fresh {
                        match serde_json::to_value(record) {
                            Ok(payload) => hub.send_threat(payload),
                            Err(e) => warn!("threat push skipped: {}", e),
                        }
                    }
                }
                watermark = next;
            }
        })
    }

    fn spawn_stats_loop(&self) -> JoinHandle<()> {
        let stats = self.stats.clone();
        let hub = self.hub.clone();
        let period = self.stats_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let snapshot = stats.snapshot().await;
                match serde_json::to_value(&snapshot) {
                    Ok(payload) => {
                        hub.send_stats(payload);
                        debug!(
                            "stats update pushed: threats={}, analyses={}",
                            snapshot.total_threats, snapshot.total_analyses
                        );
                    }
                    Err(e) => warn!("stats push skipped: {}", e),
                }
            }
        })
    }

    fn spawn_heartbeat_loop(&self) -> JoinHandle<()> {
        let hub = self.hub.clone();
        let period = self.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                hub.heartbeat();
                debug!(
                    "heartbeat sent - active connections: {}",
                    hub.total_connections()
                );
            }
        })
    }
}
