// src/stats/mod.rs
//!
//! Dashboard statistics snapshots
//!
//! Computed on demand from the in-process stores and pushed periodically on
//! the stats topic by the scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::broadcast::{Broadcaster, Topic};
use crate::correlation::store::{AnalysisStore, ThreatStore};

/// Window for the "recent" counters, in minutes
const RECENT_WINDOW_MINUTES: i64 = 5;

/// One statistics snapshot as pushed to dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_threats: usize,
    pub recent_threats: usize,
    pub total_analyses: usize,
    pub recent_analyses: usize,
    pub threats_by_level: HashMap<String, usize>,
    pub threats_by_type: HashMap<String, usize>,
    pub active_connections: ConnectionCounts,
    pub last_update: String,
}

/// Active subscriber counts per topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionCounts {
    pub general: usize,
    pub threat: usize,
    pub stats: usize,
}

/// Computes dashboard snapshots
pub struct StatsService {
    threats: Arc<dyn ThreatStore>,
    analyses: Arc<dyn AnalysisStore>,
    hub: Arc<Broadcaster>,
}

impl StatsService {
    pub fn new(
        threats: Arc<dyn ThreatStore>,
        analyses: Arc<dyn AnalysisStore>,
        hub: Arc<Broadcaster>,
    ) -> Self {
        Self {
            threats,
            analyses,
            hub,
        }
    }

    pub async fn snapshot(&self) -> DashboardStats {
        let since = Utc::now() - Duration::minutes(RECENT_WINDOW_MINUTES);

        let mut threats_by_level: HashMap<String, usize> = HashMap::new();
        let mut threats_by_type: HashMap<String, usize> = HashMap::new();
        for record in self.threats.list_all().await {
            *threats_by_level
                .entry(record.threat_level.as_str().to_string())
                .or_insert(0) += 1;
            let label = if record.threat_type.is_empty() {
                "unclassified".to_string()
            } else {
                record.threat_type.clone()
            };
            *threats_by_type.entry(label).or_insert(0) += 1;
        }

        DashboardStats {
            total_threats: self.threats.count().await,
            recent_threats: self.threats.count_since(since).await,
            total_analyses: self.analyses.count().await,
            recent_analyses: self.analyses.count_since(since).await,
            threats_by_level,
            threats_by_type,
            active_connections: ConnectionCounts {
                general: self.hub.active_connections(Topic::General),
                threat: self.hub.active_connections(Topic::Threat),
                stats: self.hub.active_connections(Topic::Stats),
            },
            last_update: Utc::now().to_rfc3339(),
        }
    }
}
