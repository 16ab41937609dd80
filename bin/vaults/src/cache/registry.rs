use crate::chain::{ChainError, ChainReader, ReadKind, VaultConfig};
use alloy_primitives::Address;
use serde::Serialize;
use std::collections::HashMap;

/// Vault configurations keyed by address, plus a lower-cased name index
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub vault_configs: HashMap<Address, VaultConfig>,
    pub vault_name_to_address: HashMap<String, Address>,
}

impl RegistrySnapshot {
    pub fn lookup_name(&self, name: &str) -> Option<Address> {
        self.vault_name_to_address
            .get(&name.to_lowercase())
            .copied()
    }
}

/// Read every vault from the registry, skipping paused ones.
///
/// Any failed `getVaultInfo` aborts the whole read.
pub async fn fetch_registry<R>(reader: &R) -> Result<RegistrySnapshot, ChainError>
where
    R: ChainReader + ?Sized,
{
    let addresses = reader.vault_addresses().await?;
    tracing::debug!("Registry lists {} vaults", addresses.len());

    let infos = reader.vault_infos(&addresses).await?;

    let mut snapshot = RegistrySnapshot::default();
    for (address, info) in addresses.into_iter().zip(infos) {
        let info = info.map_err(|reason| ChainError::multicall_failure(ReadKind::VaultInfo, address, reason))?;

        if info.is_paused {
            tracing::debug!("Skipping paused vault {} ({})", info.name, address);
            continue;
        }

        let [lp_token, token0, token1] = match info.tokens.as_slice() {
            [lp, t0, t1, ..] => [*lp, *t0, *t1],
            _ => return Err(ChainError::InvalidTokenData(address)),
        };

        snapshot
            .vault_name_to_address
            .insert(info.name.to_lowercase(), address);
        snapshot.vault_configs.insert(
            address,
            VaultConfig {
                name: info.name,
                strategy: info.strategy,
                is_paused: info.is_paused,
                token0,
                token1,
                lp_token,
                block_number: info.block_number,
                retired: info.retired,
                gas_overhead: info.gas_overhead,
            },
        );
    }

    tracing::info!("Loaded {} active vault configs", snapshot.vault_configs.len());
    Ok(snapshot)
}
