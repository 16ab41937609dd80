use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy_primitives::{Address, U256};
use chrono::Utc;
use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaults::api::{ApiServer, AppState, VaultsApiClient};
use vaults::apy::{GteClient, MarketApyMap};
use vaults::cache::{Refresher, UnifiedCache};
use vaults::chain::{ChainReader, RpcChainReader};
use vaults::config::VaultsConfig;
use vaults::queries;
use vaults::tx::{
    deposit_intent, withdraw_intent, AllowanceGatedWrite, SignerWallet, TracingNotifier,
    VaultTarget, WriteExecutor,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Overrides `api.listen_addr`
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Print the vault table
    Vaults,

    /// Deposit LP tokens into a vault, approving first when needed
    Deposit {
        /// Vault address or registry name
        vault: String,
        /// Amount in LP tokens, e.g. "1.5"
        amount: String,
        /// Running vaults API to invalidate after the deposit confirms
        #[arg(long, env = "VAULTS_API_URL")]
        api_url: Option<String>,
    },

    /// Withdraw LP tokens from a vault
    Withdraw {
        vault: String,
        amount: String,
        #[arg(long, env = "VAULTS_API_URL")]
        api_url: Option<String>,
    },

    /// Invalidate the cache of a running vaults API
    Invalidate {
        #[arg(long, env = "VAULTS_API_URL", default_value = "http://localhost:8080")]
        api_url: String,
    },
}

type Reader = RpcChainReader<DynProvider>;

fn build_cache(config: &VaultsConfig, provider: DynProvider) -> Result<Arc<UnifiedCache<Reader>>> {
    let reader = RpcChainReader::new(
        provider,
        config.registry_address()?,
        config.lp_oracle_address()?,
        config.chain.multicall_address,
    );
    Ok(Arc::new(UnifiedCache::new(Arc::new(reader), config.cache_ttl())))
}

fn gte_client(config: &VaultsConfig) -> Result<Option<GteClient>> {
    config.gte.api_url.as_deref().map(GteClient::new).transpose()
}

fn read_provider(config: &VaultsConfig) -> Result<DynProvider> {
    let url = config
        .chain
        .rpc_url
        .parse()
        .with_context(|| format!("Invalid RPC URL: {}", config.chain.rpc_url))?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = VaultsConfig::load(cli.config.as_deref())?;
    tracing::debug!("Loaded config: {:?}", config);

    match cli.command {
        Command::Serve { listen } => serve(&config, listen).await,
        Command::Vaults => print_vaults(&config).await,
        Command::Deposit {
            vault,
            amount,
            api_url,
        } => write(&config, WriteKind::Deposit, &vault, &amount, api_url).await,
        Command::Withdraw {
            vault,
            amount,
            api_url,
        } => write(&config, WriteKind::Withdraw, &vault, &amount, api_url).await,
        Command::Invalidate { api_url } => {
            let client = VaultsApiClient::new(api_url)?;
            let response = client.invalidate_cache().await?;
            tracing::info!("Cache invalidated at {}: {}", client.base_url(), response.success);
            Ok(())
        }
    }
}

async fn serve(config: &VaultsConfig, listen: Option<SocketAddr>) -> Result<()> {
    tracing::info!("Starting vaults API");

    let cache = build_cache(config, read_provider(config)?)?;

    // Warm up so the first request does not pay for the registry read
    match cache.get().await {
        Ok(snapshot) => tracing::info!(
            "✅ Loaded {} vaults",
            snapshot.registry.vault_configs.len()
        ),
        Err(e) => tracing::warn!("Initial vault load failed: {}", e),
    }

    let addr = listen.unwrap_or(config.api.listen_addr);
    let mut state = AppState::new(cache).with_zap(config.chain.zap_address);
    match gte_client(config)? {
        Some(gte) => state = state.with_gte(gte),
        None => tracing::warn!("GTE_API not set, vault yields disabled"),
    }
    let server = ApiServer::new(state, addr);
    let cancel_token = server.cancel_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_token.cancel();
    });

    server.start().await
}

async fn print_vaults(config: &VaultsConfig) -> Result<()> {
    let cache = build_cache(config, read_provider(config)?)?;
    let snapshot = cache.get().await?;
    let apys = match gte_client(config)? {
        Some(gte) => gte.vault_apys(&snapshot).await?,
        None => MarketApyMap::new(),
    };

    for entry in queries::vault_table(&snapshot, &apys) {
        println!(
            "{:<42}  {:<24} {:<12} ${:>14.2} {:>8.2}%",
            entry.address,
            entry.name,
            entry.platform_id,
            entry.tvl_usd,
            entry.apy * 100.0
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum WriteKind {
    Deposit,
    Withdraw,
}

async fn write(
    config: &VaultsConfig,
    kind: WriteKind,
    vault: &str,
    amount: &str,
    api_url: Option<String>,
) -> Result<()> {
    let wallet = Arc::new(SignerWallet::connect(&config.chain.rpc_url, config.private_key()?).await?);
    let account = wallet.signer_address();

    // Reads go through the signing provider so they see our own writes
    let cache = build_cache(config, wallet.provider().clone())?;
    let snapshot = cache.get().await?;
    let reader = cache.reader().clone();

    let detail = queries::vault_detail(&snapshot, reader.as_ref(), vault, Utc::now())
        .await?
        .ok_or_else(|| eyre::eyre!("Vault {} not found", vault))?;
    let target = VaultTarget::from_detail(&detail);

    let refresher: Arc<dyn Refresher> = match api_url {
        Some(url) => Arc::new(VaultsApiClient::new(url)?) as Arc<dyn Refresher>,
        None => cache.clone() as Arc<dyn Refresher>,
    };

    let executor = Arc::new(
        WriteExecutor::new(wallet.clone(), Arc::new(TracingNotifier), config.poll_policy())
            .with_refresher(refresher),
    );

    let intent = match kind {
        WriteKind::Deposit => {
            let lp_balance = balance_of(reader.as_ref(), account, target.lp_token).await?;
            deposit_intent(&target, amount, lp_balance)?
        }
        WriteKind::Withdraw => {
            let shares = balance_of(reader.as_ref(), account, target.address).await?;
            withdraw_intent(&target, amount, shares, Some(account))?
        }
    };

    let gated = AllowanceGatedWrite::new(executor, reader);
    let prepared = gated.prepare(&intent).await;
    tracing::info!("{} on {} ({})", prepared.label, target.name, target.address);

    let outcome = gated.execute(&intent).await?;
    if let Some(approval) = &outcome.approval {
        tracing::info!("Approval: {}", approval);
    }
    tracing::info!("✅ Confirmed: {}", outcome.main);
    Ok(())
}

async fn balance_of<R>(reader: &R, owner: Address, token: Address) -> Result<U256>
where
    R: ChainReader + ?Sized,
{
    let balances = reader.lp_balances(owner, &[token]).await?;
    balances
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("No balance returned for {}", token))?
        .map_err(|e| eyre::eyre!("Unable to read balance of {} for {}: {}", token, owner, e))
}
