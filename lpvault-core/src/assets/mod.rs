//! Token ledgers built into the chain.

pub mod erc20;
pub mod position_token;
