// src/api/models.rs
// Request/response models for the HTTP boundary

use serde::{Deserialize, Serialize};

use crate::correlation::models::AnalysisRecord;

/// Acknowledgment for an ingested analysis batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestAck {
    pub stored: usize,
}

/// Paging parameters for the analysis listing
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisPageQuery {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_page_size() -> usize {
    10
}

/// One page of analysis records, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedAnalyses {
    pub items: Vec<AnalysisRecord>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
}

/// Limit parameter for the recent-threats listing
#[derive(Debug, Clone, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: usize,
}

fn default_recent_limit() -> usize {
    20
}
