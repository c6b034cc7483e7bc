// src/api/server.rs
// HTTP server for the monitoring backend

use std::net::SocketAddr;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use http::header::{ACCEPT, CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::{
    AppState, dashboard_stats, ingest_alarm, list_analyses, receive_analyses, recent_analyses,
    recent_threats, subscribe_general, subscribe_stats, subscribe_threats,
};
use crate::error::{OtwatchError, Result};

pub struct ApiServer {
    address: SocketAddr,
}

impl ApiServer {
    pub fn new(address: SocketAddr) -> Self {
        Self { address }
    }

    pub async fn run(&self, state: AppState) -> Result<()> {
        let app = create_router(state);

        log::info!("starting API server on {}", self.address);

        let listener = tokio::net::TcpListener::bind(self.address)
            .await
            .map_err(|e| {
                OtwatchError::ApiError(format!("failed to bind to {}: {}", self.address, e))
            })?;

        axum::serve(listener, app)
            .await
            .map_err(|e| OtwatchError::ApiError(format!("server runtime error: {}", e)))?;

        Ok(())
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/alarms/:engine", post(ingest_alarm))
        .route("/api/xai/analysis", post(receive_analyses))
        .route("/api/xai/analyses", get(list_analyses))
        .route("/api/xai/analyses/recent", get(recent_analyses))
        .route("/api/threats/recent", get(recent_threats))
        .route("/api/dashboard/stats", get(dashboard_stats))
        .route("/api/sse/subscribe", get(subscribe_general))
        .route("/api/sse/threats", get(subscribe_threats))
        .route("/api/sse/stats", get(subscribe_stats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE, ACCEPT]),
        )
        .with_state(state)
}
