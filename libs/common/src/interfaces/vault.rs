use alloy_sol_types::sol;

sol! {
    interface IVault {
        /// Total LP tokens held by the vault and its strategy
        function balance() external view returns (uint256);

        function deposit(uint256 amount) external;

        function withdraw(uint256 shares) external;
    }
}
