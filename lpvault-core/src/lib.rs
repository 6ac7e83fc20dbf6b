//! Custodial liquidity vaults and the components around them.
//!
//! Everything runs on an in-memory [`chain::Chain`]: users own [`vault`]s created by the
//! [`factory`], automated strategies are registered and executed through the
//! [`strategy::registry`], liquidity operations are routed to protocol adapters by the
//! [`liquidity::manager`] and users tune their strategy behaviour in the
//! [`strategy::parameters`] store.

pub mod admin;
pub mod assets;
pub mod batch;
pub mod chain;
pub mod cli;
pub mod config;
pub mod factory;
pub mod liquidity;
pub mod strategy;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod vault;
