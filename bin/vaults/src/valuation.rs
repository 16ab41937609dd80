//! USD valuation of vault positions and the LP token breakdown.

use crate::chain::LpInfo;
use alloy_primitives::U256;
use common::units::{to_f64, WAD};
use serde::Serialize;

/// USD value of `balance` LP tokens given an 18-decimal oracle price
pub fn lp_usd_value(balance: U256, lp_value: U256, decimals: u8) -> f64 {
    to_f64(balance, decimals) * to_f64(lp_value, 0) / WAD
}

pub fn lp_price(lp_value: U256) -> f64 {
    to_f64(lp_value, 0) / WAD
}

/// Inputs to [`derive_lp_breakdown`], in token units and USD prices
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LpBreakdownInput {
    pub token0_reserve: f64,
    pub token0_price: f64,
    pub token1_reserve: f64,
    pub token1_price: f64,
    pub lp_reserve: f64,
    pub lp_price: f64,
}

impl LpBreakdownInput {
    pub fn from_lp_info(
        info: &LpInfo,
        token0_decimals: u8,
        token1_decimals: u8,
        lp_reserve: f64,
        lp_price: f64,
    ) -> Self {
        Self {
            token0_reserve: to_f64(info.reserve0, token0_decimals),
            token0_price: to_f64(info.price0, 0) / WAD,
            token1_reserve: to_f64(info.reserve1, token1_decimals),
            token1_price: to_f64(info.price1, 0) / WAD,
            lp_reserve,
            lp_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LpBreakdown {
    pub token0_reserve: f64,
    pub token1_reserve: f64,
    pub lp_reserve: f64,
    pub token0_usd_value: f64,
    pub token1_usd_value: f64,
    pub lp_usd_value: f64,
    pub token0_percentage: f64,
    pub token1_percentage: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn units_at(usd: f64, price: f64) -> f64 {
    if price > 0.0 {
        usd / price
    } else {
        0.0
    }
}

/// Split an LP position into its constituent tokens.
///
/// With no LP reserve the position is the sum of the constituents and the LP
/// reserve is implied from the LP price. Otherwise the LP value is
/// authoritative and is split by the constituents' value shares.
pub fn derive_lp_breakdown(input: LpBreakdownInput) -> LpBreakdown {
    let mut token0_usd = input.token0_reserve * input.token0_price;
    let mut token1_usd = input.token1_reserve * input.token1_price;
    let mut token0_reserve = input.token0_reserve;
    let mut token1_reserve = input.token1_reserve;
    let mut lp_reserve = input.lp_reserve;
    let constituents_usd = token0_usd + token1_usd;

    let lp_usd = if lp_reserve == 0.0 {
        lp_reserve = units_at(constituents_usd, input.lp_price);
        constituents_usd
    } else {
        let lp_usd = lp_reserve * input.lp_price;
        let (share0, share1) = if constituents_usd > 0.0 {
            (token0_usd / constituents_usd, token1_usd / constituents_usd)
        } else {
            (0.5, 0.5)
        };
        token0_usd = lp_usd * share0;
        token1_usd = lp_usd * share1;
        token0_reserve = units_at(token0_usd, input.token0_price);
        token1_reserve = units_at(token1_usd, input.token1_price);
        lp_usd
    };

    let total = token0_usd + token1_usd;
    let (token0_percentage, token1_percentage) = if total > 0.0 {
        (
            round2(token0_usd / total * 100.0),
            round2(token1_usd / total * 100.0),
        )
    } else {
        (50.0, 50.0)
    };

    LpBreakdown {
        token0_reserve,
        token1_reserve,
        lp_reserve,
        token0_usd_value: token0_usd,
        token1_usd_value: token1_usd,
        lp_usd_value: lp_usd,
        token0_percentage,
        token1_percentage,
    }
}
