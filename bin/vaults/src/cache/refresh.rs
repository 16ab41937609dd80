use async_trait::async_trait;

/// Invalidates cached read state after a successful write and signals
/// dependants to refetch
#[async_trait]
pub trait Refresher: Send + Sync {
    /// Returns whether the invalidation took effect
    async fn refresh(&self) -> bool;
}
