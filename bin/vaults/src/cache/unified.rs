//! Read-side cache of vault configuration and TVL.
//!
//! Two independently expiring halves share one snapshot: the registry half
//! (slow moving, long TTL) and the TVL half (short TTL). An expired TVL half is
//! recomputed against the current registry half; an expired registry half
//! forces a full refresh.

use super::refresh::Refresher;
use super::registry::{fetch_registry, RegistrySnapshot};
use super::tvl::fetch_tvl;
use crate::chain::{ChainError, ChainReader, VaultTvlMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub config_ttl: Duration,
    pub tvl_ttl: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            config_ttl: Duration::from_secs(30 * 60),
            tvl_ttl: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnifiedSnapshot {
    pub registry: Arc<RegistrySnapshot>,
    pub vault_tvl: Arc<VaultTvlMap>,
    pub updated_at: DateTime<Utc>,
    registry_fetched_at: Instant,
    tvl_fetched_at: Instant,
}

impl UnifiedSnapshot {
    fn registry_fresh(&self, ttl: &CacheTtl, now: Instant) -> bool {
        now.duration_since(self.registry_fetched_at) < ttl.config_ttl
    }

    fn tvl_fresh(&self, ttl: &CacheTtl, now: Instant) -> bool {
        now.duration_since(self.tvl_fetched_at) < ttl.tvl_ttl
    }
}

#[derive(Default)]
struct CacheSlot {
    snapshot: Option<Arc<UnifiedSnapshot>>,
    invalidated: bool,
    generation: u64,
}

pub struct UnifiedCache<R: ?Sized> {
    ttl: CacheTtl,
    slot: RwLock<CacheSlot>,
    refresh_lock: Mutex<()>,
    refresh_tx: watch::Sender<u64>,
    reader: Arc<R>,
}

impl<R> UnifiedCache<R>
where
    R: ChainReader + ?Sized,
{
    pub fn new(reader: Arc<R>, ttl: CacheTtl) -> Self {
        let (refresh_tx, _) = watch::channel(0);
        Self {
            ttl,
            slot: RwLock::new(CacheSlot::default()),
            refresh_lock: Mutex::new(()),
            refresh_tx,
            reader,
        }
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    fn fresh_snapshot(&self) -> Option<Arc<UnifiedSnapshot>> {
        let slot = self.slot.read();
        if slot.invalidated {
            return None;
        }
        let snapshot = slot.snapshot.as_ref()?;
        let now = Instant::now();
        if snapshot.registry_fresh(&self.ttl, now) && snapshot.tvl_fresh(&self.ttl, now) {
            Some(snapshot.clone())
        } else {
            None
        }
    }

    /// Return the current snapshot, refreshing whichever half has expired.
    ///
    /// Concurrent callers that miss share a single refresh. A refresh that was
    /// started before [`invalidate`](Self::invalidate) still returns its data to
    /// the caller but is not installed.
    pub async fn get(&self) -> Result<Arc<UnifiedSnapshot>, ChainError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        let (previous, invalidated, generation) = {
            let slot = self.slot.read();
            (slot.snapshot.clone(), slot.invalidated, slot.generation)
        };

        let now = Instant::now();
        let reusable = previous
            .filter(|p| !invalidated && p.registry_fresh(&self.ttl, now));

        let (registry, registry_fetched_at) = match reusable {
            Some(previous) => {
                tracing::debug!("TVL expired, reusing vault configs");
                (previous.registry.clone(), previous.registry_fetched_at)
            }
            None => {
                tracing::debug!("Refreshing vault configs and TVL");
                (Arc::new(fetch_registry(self.reader.as_ref()).await?), Instant::now())
            }
        };

        let vault_tvl = Arc::new(fetch_tvl(self.reader.as_ref(), &registry).await?);

        let snapshot = Arc::new(UnifiedSnapshot {
            registry,
            vault_tvl,
            updated_at: Utc::now(),
            registry_fetched_at,
            tvl_fetched_at: Instant::now(),
        });

        {
            let mut slot = self.slot.write();
            if slot.generation == generation {
                slot.snapshot = Some(snapshot.clone());
                slot.invalidated = false;
            } else {
                tracing::debug!("Cache invalidated during refresh, not installing result");
            }
        }

        Ok(snapshot)
    }

    /// Last installed snapshot, without triggering a refresh
    pub fn snapshot(&self) -> Option<Arc<UnifiedSnapshot>> {
        self.slot.read().snapshot.clone()
    }

    /// Mark the cache expired; the next [`get`](Self::get) performs a full refresh
    pub fn invalidate(&self) {
        let mut slot = self.slot.write();
        slot.invalidated = true;
        slot.generation += 1;
        tracing::info!("Vault cache invalidated (generation {})", slot.generation);
    }

    /// Watch channel bumped on every [`Refresher::refresh`]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.refresh_tx.subscribe()
    }
}

#[async_trait]
impl<R> Refresher for UnifiedCache<R>
where
    R: ChainReader + ?Sized,
{
    async fn refresh(&self) -> bool {
        self.invalidate();
        self.refresh_tx.send_modify(|generation| *generation += 1);
        true
    }
}
