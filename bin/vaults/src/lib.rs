pub mod api;
pub mod apy;
pub mod cache;
pub mod chain;
pub mod config;
pub mod queries;
pub mod tx;
pub mod valuation;
