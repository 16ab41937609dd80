use alloy_sol_types::sol;

sol! {
    interface IVaultRegistry {
        function allVaultAddresses() external view returns (address[] memory);

        /// `tokens` is laid out as `[lpToken, token0, token1]`
        function getVaultInfo(address vault) external view returns (
            string memory name,
            address strategy,
            bool isPaused,
            address[] memory tokens,
            uint256 blockNumber,
            bool retired,
            uint256 gasOverhead
        );
    }
}
