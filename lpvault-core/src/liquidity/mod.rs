//! Adapter-routed liquidity provision.

pub mod manager;
