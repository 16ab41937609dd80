use super::routes::{
    health, invalidate_cache, market_apy, user_balances, vault_apys, vault_configs, vault_detail,
    vault_table, zap_estimate, AppState,
};
use crate::chain::ChainReader;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub fn router<R>(state: AppState<R>) -> Router
where
    R: ChainReader + ?Sized + 'static,
{
    Router::new()
        .route("/health", get(health::<R>))
        .route("/cache/invalidate", post(invalidate_cache::<R>))
        .route("/vaults", get(vault_table::<R>))
        .route("/vaults/configs", get(vault_configs::<R>))
        .route("/vaults/apys", get(vault_apys::<R>))
        .route("/vaults/{id}", get(vault_detail::<R>))
        .route("/users/{address}/balances", get(user_balances::<R>))
        .route("/markets/{address}/apy", get(market_apy::<R>))
        .route("/zap/estimate", get(zap_estimate::<R>))
        .with_state(state)
}

pub struct ApiServer<R: ?Sized> {
    state: AppState<R>,
    addr: SocketAddr,
    cancel_token: CancellationToken,
}

impl<R> ApiServer<R>
where
    R: ChainReader + ?Sized + 'static,
{
    pub fn new(state: AppState<R>, addr: SocketAddr) -> Self {
        Self {
            state,
            addr,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub async fn start(self) -> eyre::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(self, listener: TcpListener) -> eyre::Result<()> {
        tracing::info!("API server listening on {}", listener.local_addr()?);

        let cancel_token = self.cancel_token;
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
            })
            .await?;

        tracing::info!("API server stopped");
        Ok(())
    }
}
