use alloy_sol_types::sol;

sol! {
    interface ILpShareOracle {
        /// Fair USD value of one whole LP token, scaled by 1e18
        function calculateLPValue(address lpToken) external view returns (uint256);

        function getLPInfo(address lpToken) external view returns (
            address token0,
            address token1,
            string memory symbol0,
            string memory symbol1,
            uint256 reserve0,
            uint256 reserve1,
            uint256 price0,
            uint256 price1,
            uint256 fairValue
        );
    }
}
