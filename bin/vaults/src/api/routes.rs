use super::types::{
    ErrorResponse, HealthResponse, InvalidateResponse, ZapEstimateQuery, ZapEstimateResponse,
};
use crate::apy::{GteClient, MarketApy, MarketApyMap};
use crate::cache::{Refresher, UnifiedCache, UnifiedSnapshot};
use crate::chain::ChainReader;
use crate::queries::{self, UserLpBalance, VaultConfigEntry, VaultDetail, VaultTableEntry};
use alloy_primitives::{Address, U256};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::interfaces::zap::VAULT_ZAP_ADDRESS;
use std::fmt::Display;
use std::sync::Arc;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Shared state, generic over the chain reader
pub struct AppState<R: ?Sized> {
    pub cache: Arc<UnifiedCache<R>>,
    /// Yield source; yield routes answer 503 without one
    pub gte: Option<GteClient>,
    pub zap: Address,
}

impl<R: ?Sized> AppState<R> {
    pub fn new(cache: Arc<UnifiedCache<R>>) -> Self {
        Self {
            cache,
            gte: None,
            zap: VAULT_ZAP_ADDRESS,
        }
    }

    pub fn with_gte(mut self, gte: GteClient) -> Self {
        self.gte = Some(gte);
        self
    }

    pub fn with_zap(mut self, zap: Address) -> Self {
        self.zap = zap;
        self
    }
}

impl<R: ?Sized> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            gte: self.gte.clone(),
            zap: self.zap,
        }
    }
}

fn error(status: StatusCode, message: impl Display) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

async fn load<R>(state: &AppState<R>) -> Result<Arc<UnifiedSnapshot>, ApiError>
where
    R: ChainReader + ?Sized,
{
    state.cache.get().await.map_err(|e| {
        tracing::error!("❌ Failed to load vault data: {}", e);
        error(StatusCode::BAD_GATEWAY, e)
    })
}

fn parse_address(value: &str) -> Result<Address, ApiError> {
    value.parse().map_err(|_| {
        error(
            StatusCode::BAD_REQUEST,
            format!("Invalid address: {}", value),
        )
    })
}

fn gte_client<R: ?Sized>(state: &AppState<R>) -> Result<&GteClient, ApiError> {
    state
        .gte
        .as_ref()
        .ok_or_else(|| error(StatusCode::SERVICE_UNAVAILABLE, "GTE API not configured"))
}

pub async fn health<R>(State(state): State<AppState<R>>) -> Json<HealthResponse>
where
    R: ChainReader + ?Sized + 'static,
{
    let snapshot = state.cache.snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_vaults: snapshot.as_ref().map(|s| s.registry.vault_configs.len()),
        cache_updated_at: snapshot.map(|s| s.updated_at.to_rfc3339()),
    })
}

/// POST /cache/invalidate
pub async fn invalidate_cache<R>(State(state): State<AppState<R>>) -> Json<InvalidateResponse>
where
    R: ChainReader + ?Sized + 'static,
{
    let success = state.cache.refresh().await;
    Json(InvalidateResponse { success })
}

pub async fn vault_table<R>(State(state): State<AppState<R>>) -> ApiResult<Vec<VaultTableEntry>>
where
    R: ChainReader + ?Sized + 'static,
{
    let snapshot = load(&state).await?;

    let apys = match &state.gte {
        Some(gte) => gte.vault_apys(&snapshot).await.unwrap_or_else(|e| {
            tracing::warn!("Vault yields unavailable: {:?}", e);
            MarketApyMap::new()
        }),
        None => MarketApyMap::new(),
    };

    Ok(Json(queries::vault_table(&snapshot, &apys)))
}

pub async fn vault_configs<R>(
    State(state): State<AppState<R>>,
) -> ApiResult<Vec<VaultConfigEntry>>
where
    R: ChainReader + ?Sized + 'static,
{
    let snapshot = load(&state).await?;
    Ok(Json(queries::vault_configs(&snapshot)))
}

pub async fn vault_detail<R>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> ApiResult<VaultDetail>
where
    R: ChainReader + ?Sized + 'static,
{
    let snapshot = load(&state).await?;

    match queries::vault_detail(&snapshot, state.cache.reader().as_ref(), &id, Utc::now()).await {
        Ok(Some(detail)) => Ok(Json(detail)),
        Ok(None) => Err(error(
            StatusCode::NOT_FOUND,
            format!("Vault {} not found", id),
        )),
        Err(e) => {
            tracing::error!("❌ Failed to load vault {}: {}", id, e);
            Err(error(StatusCode::BAD_GATEWAY, e))
        }
    }
}

pub async fn user_balances<R>(
    State(state): State<AppState<R>>,
    Path(address): Path<String>,
) -> ApiResult<Vec<UserLpBalance>>
where
    R: ChainReader + ?Sized + 'static,
{
    let user = parse_address(&address)?;

    let snapshot = load(&state).await?;

    queries::user_balances(&snapshot, state.cache.reader().as_ref(), user)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("❌ Failed to load balances for {}: {}", user, e);
            error(StatusCode::BAD_GATEWAY, e)
        })
}

/// GET /vaults/apys
pub async fn vault_apys<R>(State(state): State<AppState<R>>) -> ApiResult<MarketApyMap>
where
    R: ChainReader + ?Sized + 'static,
{
    let gte = gte_client(&state)?;
    let snapshot = load(&state).await?;

    gte.vault_apys(&snapshot).await.map(Json).map_err(|e| {
        tracing::error!("❌ Failed to fetch vault yields: {:?}", e);
        error(StatusCode::BAD_GATEWAY, e)
    })
}

/// GET /markets/{address}/apy
pub async fn market_apy<R>(
    State(state): State<AppState<R>>,
    Path(address): Path<String>,
) -> ApiResult<MarketApy>
where
    R: ChainReader + ?Sized + 'static,
{
    let market = parse_address(&address)?;
    let gte = gte_client(&state)?;

    gte.market_apy(market).await.map(Json).map_err(|e| {
        tracing::error!("❌ Failed to fetch yield for market {}: {:?}", market, e);
        error(StatusCode::BAD_GATEWAY, e)
    })
}

/// GET /zap/estimate
pub async fn zap_estimate<R>(
    State(state): State<AppState<R>>,
    Query(query): Query<ZapEstimateQuery>,
) -> ApiResult<ZapEstimateResponse>
where
    R: ChainReader + ?Sized + 'static,
{
    let vault = parse_address(&query.vault)?;
    let token_in = parse_address(&query.token_in)?;
    let amount_in: U256 = query.amount_in.parse().map_err(|_| {
        error(
            StatusCode::BAD_REQUEST,
            format!("Invalid amount: {}", query.amount_in),
        )
    })?;

    let estimate = state
        .cache
        .reader()
        .estimate_swap(state.zap, vault, token_in, amount_in)
        .await
        .map_err(|e| {
            tracing::error!("❌ Failed to estimate zap into {}: {}", vault, e);
            error(StatusCode::BAD_GATEWAY, e)
        })?;

    Ok(Json(ZapEstimateResponse {
        swap_amount_in: estimate.swap_amount_in.to_string(),
        swap_amount_out: estimate.swap_amount_out.to_string(),
        swap_token_out: estimate.swap_token_out.to_string(),
    }))
}
