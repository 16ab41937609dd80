use alloy_primitives::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use vaults::cache::{CacheTtl, Refresher, UnifiedCache};
use vaults::chain::{SimulatedChainReader, SimulatedVault};

const VAULT: Address = Address::repeat_byte(0xa1);

fn eth(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

fn chain() -> SimulatedChainReader {
    let chain = SimulatedChainReader::new();
    chain.add_vault(
        VAULT,
        SimulatedVault::new(
            "aerodrome-SYND-WETH",
            Address::repeat_byte(0x5),
            [
                Address::repeat_byte(0x10),
                Address::repeat_byte(0x11),
                Address::repeat_byte(0x12),
            ],
        )
        .with_valuation(eth(10), eth(2)),
    );
    chain
}

fn cache(chain: Arc<SimulatedChainReader>) -> Arc<UnifiedCache<SimulatedChainReader>> {
    Arc::new(UnifiedCache::new(chain, CacheTtl::default()))
}

#[tokio::test(start_paused = true)]
async fn test_fresh_snapshot_is_served_from_cache() {
    let chain = Arc::new(chain());
    let cache = cache(chain.clone());

    let first = cache.get().await.unwrap();
    let second = cache.get().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(chain.registry_reads(), 1);
    assert_eq!(chain.valuation_reads(), 1);
    assert_eq!(first.vault_tvl[&VAULT].usd_value, 20.0);
}

#[tokio::test(start_paused = true)]
async fn test_tvl_expiry_reuses_registry() {
    let chain = Arc::new(chain());
    let cache = cache(chain.clone());

    let first = cache.get().await.unwrap();
    chain.update_vault(VAULT, |v| v.balance = Ok(eth(20)));

    tokio::time::advance(Duration::from_secs(6 * 60)).await;
    let second = cache.get().await.unwrap();

    assert_eq!(chain.registry_reads(), 1);
    assert_eq!(chain.valuation_reads(), 2);
    assert!(Arc::ptr_eq(&first.registry, &second.registry));
    assert_eq!(second.vault_tvl[&VAULT].usd_value, 40.0);
}

#[tokio::test(start_paused = true)]
async fn test_registry_expiry_refreshes_everything() {
    let chain = Arc::new(chain());
    let cache = cache(chain.clone());

    cache.get().await.unwrap();
    tokio::time::advance(Duration::from_secs(31 * 60)).await;
    cache.get().await.unwrap();

    assert_eq!(chain.registry_reads(), 2);
    assert_eq!(chain.valuation_reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_forces_full_refresh() {
    let chain = Arc::new(chain());
    let cache = cache(chain.clone());

    cache.get().await.unwrap();
    cache.invalidate();
    cache.get().await.unwrap();

    assert_eq!(chain.registry_reads(), 2);
    assert_eq!(chain.valuation_reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_signals_subscribers() {
    let chain = Arc::new(chain());
    let cache = cache(chain.clone());
    let mut updates = cache.subscribe();

    cache.get().await.unwrap();
    assert!(cache.refresh().await);

    updates.changed().await.unwrap();
    assert_eq!(*updates.borrow(), 1);

    cache.get().await.unwrap();
    assert_eq!(chain.registry_reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let chain = Arc::new(chain());
    let cache = cache(chain.clone());

    let first = cache.get().await.unwrap();
    chain.update_vault(VAULT, |v| v.lp_value = Err("execution reverted".to_string()));
    cache.invalidate();

    let err = cache.get().await.unwrap_err();
    assert!(err.to_string().contains("LP value"));
    assert!(err.to_string().contains(&VAULT.to_string()));

    let kept = cache.snapshot().unwrap();
    assert!(Arc::ptr_eq(&first, &kept));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_misses_share_one_refresh() {
    let chain = Arc::new(chain().with_read_delay(Duration::from_millis(500)));
    let cache = cache(chain.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get().await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(chain.registry_reads(), 1);
    assert_eq!(chain.valuation_reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_during_refresh_is_not_masked() {
    let chain = Arc::new(chain().with_read_delay(Duration::from_secs(1)));
    let cache = cache(chain.clone());

    let pending = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get().await })
    };

    // Let the refresh start its registry read
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(chain.registry_reads(), 1);
    cache.invalidate();

    let stale = pending.await.unwrap().unwrap();
    assert_eq!(stale.registry.vault_configs.len(), 1);
    assert!(cache.snapshot().is_none());

    cache.get().await.unwrap();
    assert_eq!(chain.registry_reads(), 2);
    assert!(cache.snapshot().is_some());
}
