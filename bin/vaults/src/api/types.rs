use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Vaults in the installed snapshot, if any
    pub cached_vaults: Option<usize>,
    pub cache_updated_at: Option<String>,
}

/// Result of `POST /cache/invalidate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Query of `GET /zap/estimate`; `amount_in` is a base-unit integer string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZapEstimateQuery {
    pub vault: String,
    pub token_in: String,
    pub amount_in: String,
}

/// Zap split with amounts as base-unit integer strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapEstimateResponse {
    pub swap_amount_in: String,
    pub swap_amount_out: String,
    pub swap_token_out: String,
}
