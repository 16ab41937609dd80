pub mod units;

pub mod interfaces {
    pub mod erc20;
    pub mod lp_oracle;
    pub mod multicall;
    pub mod registry;
    pub mod strategy;
    pub mod vault;
    pub mod zap;
}
