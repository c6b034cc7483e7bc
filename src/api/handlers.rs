// src/api/handlers.rs
// Axum handlers for ingestion, queries, and SSE subscription

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{self, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use log::info;

use crate::api::models::{AnalysisPageQuery, IngestAck, PagedAnalyses, RecentQuery};
use crate::broadcast::{Broadcaster, Topic};
use crate::config::ServerConfig;
use crate::correlation::models::{AnalysisRecord, AnalysisResult, RiskAlarm, ThreatRecord};
use crate::correlation::store::{AnalysisStore, ThreatStore};
use crate::error::Result;
use crate::ingest::{AlarmIngestor, AnalysisIngestor};
use crate::stats::{DashboardStats, StatsService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub hub: Arc<Broadcaster>,
    pub threats: Arc<dyn ThreatStore>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub alarm_ingestor: Arc<AlarmIngestor>,
    pub analysis_ingestor: Arc<AnalysisIngestor>,
    pub stats: Arc<StatsService>,
}

/// Receive one ML/DL risk alarm and store it as a threat record
pub async fn ingest_alarm(
    State(state): State<AppState>,
    Path(engine): Path<String>,
    Json(payload): Json<RiskAlarm>,
) -> Result<Json<ThreatRecord>> {
    let saved = state.alarm_ingestor.ingest_risk_alarm(&engine, payload).await?;
    Ok(Json(saved))
}

/// Receive a batch of XAI analysis results
pub async fn receive_analyses(
    State(state): State<AppState>,
    Json(batch): Json<Vec<AnalysisResult>>,
) -> Result<Json<IngestAck>> {
    let stored = state.analysis_ingestor.ingest_batch(batch).await?;
    Ok(Json(IngestAck { stored }))
}

/// Paged analysis listing, newest first
pub async fn list_analyses(
    State(state): State<AppState>,
    Query(query): Query<AnalysisPageQuery>,
) -> Json<PagedAnalyses> {
    let size = query.size.clamp(1, 100);
    let (items, total) = state.analyses.page(query.page, size).await;
    Json(PagedAnalyses {
        items,
        page: query.page,
        size,
        total,
    })
}

/// The ten most recent analyses
pub async fn recent_analyses(State(state): State<AppState>) -> Json<Vec<AnalysisRecord>> {
    Json(state.analyses.recent(10).await)
}

/// The most recent threat records
pub async fn recent_threats(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<ThreatRecord>> {
    Json(state.threats.recent(query.limit.clamp(1, 100)).await)
}

/// Current dashboard statistics snapshot
pub async fn dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.stats.snapshot().await)
}

/// Subscribe to every event
pub async fn subscribe_general(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<sse::Event, Infallible>>> {
    event_stream(&state, Topic::General)
}

/// Subscribe to threat events only
pub async fn subscribe_threats(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<sse::Event, Infallible>>> {
    event_stream(&state, Topic::Threat)
}

/// Subscribe to statistics events only
pub async fn subscribe_stats(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<sse::Event, Infallible>>> {
    event_stream(&state, Topic::Stats)
}

/// Attach a subscriber and adapt it to an SSE response.
///
/// The stream ends at the configured per-connection timeout; dropping it
/// (timeout, client disconnect, transport error) detaches the subscriber.
fn event_stream(
    state: &AppState,
    topic: Topic,
) -> Sse<impl Stream<Item = std::result::Result<sse::Event, Infallible>>> {
    info!("SSE connection requested for topic {}", topic.as_str());
    let handle = state.hub.subscribe(topic);
    let deadline = tokio::time::sleep(state.config.sse.timeout());

    let stream = handle
        .map(|event| {
            Ok(sse::Event::default()
                .event(event.name)
                .data(event.payload.to_string()))
        })
        .take_until(deadline);

    Sse::new(stream)
}
