pub mod refresh;
pub mod registry;
pub mod tvl;
pub mod unified;

pub use refresh::Refresher;
pub use registry::{fetch_registry, RegistrySnapshot};
pub use tvl::fetch_tvl;
pub use unified::{CacheTtl, UnifiedCache, UnifiedSnapshot};
