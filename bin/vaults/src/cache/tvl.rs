use super::registry::RegistrySnapshot;
use crate::chain::{ChainError, ChainReader, ReadKind, VaultTvl, VaultTvlMap};
use crate::valuation::{lp_price, lp_usd_value};
use alloy_primitives::Address;

/// Value every vault in the registry snapshot in a single batched read.
///
/// A failed read for any vault aborts the whole computation; the error names
/// the read and the vault.
pub async fn fetch_tvl<R>(reader: &R, registry: &RegistrySnapshot) -> Result<VaultTvlMap, ChainError>
where
    R: ChainReader + ?Sized,
{
    let targets: Vec<(Address, Address)> = registry
        .vault_configs
        .iter()
        .map(|(vault, config)| (*vault, config.lp_token))
        .collect();

    let reads = reader.vault_valuations(&targets).await?;

    let mut tvl = VaultTvlMap::with_capacity(targets.len());
    for ((vault, lp_token), read) in targets.into_iter().zip(reads) {
        let fail = move |kind: ReadKind| move |reason: String| ChainError::multicall_failure(kind, vault, reason);

        let balance = read.balance.map_err(fail(ReadKind::VaultBalance))?;
        let lp_value = read.lp_value.map_err(fail(ReadKind::LpValue))?;
        let decimals = read.decimals.map_err(fail(ReadKind::Decimals))?;
        let lp_info = read.lp_info.map_err(fail(ReadKind::LpInfo))?;

        tvl.insert(
            vault,
            VaultTvl {
                raw_balance: balance,
                usd_value: lp_usd_value(balance, lp_value, decimals),
                lp_price: lp_price(lp_value),
                lp_token,
                decimals,
                lp_info,
            },
        );
    }

    tracing::debug!("Computed TVL for {} vaults", tvl.len());
    Ok(tvl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fetch_registry;
    use crate::chain::{SimulatedChainReader, SimulatedVault};
    use alloy_primitives::U256;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn wad(units: u64) -> U256 {
        U256::from(units) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[tokio::test]
    async fn test_fetch_tvl_values_each_vault() {
        let reader = SimulatedChainReader::new();
        reader.add_vault(
            addr(1),
            SimulatedVault::new("a-b-c", addr(9), [addr(2), addr(3), addr(4)])
                .with_valuation(wad(150), wad(2)),
        );
        let registry = fetch_registry(&reader).await.unwrap();

        let tvl = fetch_tvl(&reader, &registry).await.unwrap();

        let entry = &tvl[&addr(1)];
        assert_eq!(entry.usd_value, 300.0);
        assert_eq!(entry.lp_price, 2.0);
        assert_eq!(entry.lp_token, addr(2));
        assert_eq!(entry.raw_balance, wad(150));
    }

    #[tokio::test]
    async fn test_fetch_tvl_error_names_read_and_vault() {
        let reader = SimulatedChainReader::new();
        reader.add_vault(
            addr(1),
            SimulatedVault::new("a-b-c", addr(9), [addr(2), addr(3), addr(4)]),
        );
        let registry = fetch_registry(&reader).await.unwrap();
        reader.update_vault(addr(1), |v| v.lp_value = Err("oracle down".to_string()));

        let err = fetch_tvl(&reader, &registry).await.unwrap_err();

        assert!(matches!(
            &err,
            ChainError::MulticallFailure { read: ReadKind::LpValue, target, .. } if *target == addr(1)
        ));
        assert!(err.to_string().contains("LP value"));
    }
}
