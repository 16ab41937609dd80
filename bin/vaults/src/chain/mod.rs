pub mod errors;
pub mod reader;
pub mod rpc_reader;
pub mod simulated;
pub mod types;

pub use errors::{ChainError, ReadKind};
pub use reader::ChainReader;
pub use rpc_reader::RpcChainReader;
pub use simulated::{SimulatedChainReader, SimulatedVault};
pub use types::*;
