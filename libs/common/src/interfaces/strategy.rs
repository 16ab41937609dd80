use alloy_sol_types::sol;

sol! {
    interface IStrategy {
        function lastHarvest() external view returns (uint256);

        /// Basis points scaled by 1e2, i.e. `10` is 0.1%
        function depositFee() external view returns (uint256);

        function withdrawFee() external view returns (uint256);
    }
}
