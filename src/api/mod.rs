// src/api/mod.rs
//!
//! HTTP boundary: ingestion endpoints, query endpoints, and the SSE
//! subscription streams

pub mod handlers;
pub mod models;
pub mod server;

pub use handlers::AppState;
pub use server::ApiServer;
