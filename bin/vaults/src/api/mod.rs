pub mod client;
pub mod routes;
pub mod server;
pub mod types;

pub use client::VaultsApiClient;
pub use routes::AppState;
pub use server::{router, ApiServer};
pub use types::{
    ErrorResponse, HealthResponse, InvalidateResponse, ZapEstimateQuery, ZapEstimateResponse,
};
