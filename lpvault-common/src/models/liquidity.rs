//! Normalized liquidity operations routed through the liquidity manager.
//!
//! Every protocol adapter speaks this vocabulary; the manager forwards the parameters
//! unchanged and only adds the bookkeeping (token custody, approvals, position records).

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::{Platform, PositionId};

/// Desired and minimum token amounts of a two-sided liquidity operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenAmounts {
    pub amount0: U256,
    pub amount1: U256,
}

impl TokenAmounts {
    pub const ZERO: TokenAmounts = TokenAmounts { amount0: U256::ZERO, amount1: U256::ZERO };

    pub fn new(amount0: U256, amount1: U256) -> Self {
        Self { amount0, amount1 }
    }

    pub fn is_zero(&self) -> bool {
        self.amount0.is_zero() && self.amount1.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePositionParams {
    pub platform: Platform,
    pub token0: Address,
    pub token1: Address,
    pub fee_tier: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub desired: TokenAmounts,
    pub min: TokenAmounts,
    /// Unix timestamp after which the adapter must refuse the operation. Zero disables it.
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityParams {
    pub position_id: PositionId,
    pub desired: TokenAmounts,
    pub min: TokenAmounts,
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityParams {
    pub position_id: PositionId,
    pub liquidity: u128,
    pub min: TokenAmounts,
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectFeesParams {
    pub position_id: PositionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePositionParams {
    pub position_id: PositionId,
    /// Burns the position token and forgets the position record when set.
    pub burn_token: bool,
    pub min: TokenAmounts,
    pub deadline: u64,
}

/// Result of `createPosition` and `addLiquidity`.
///
/// `used` is what the adapter actually pulled; the manager refunds the difference to the
/// desired amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionOutcome {
    pub position_id: PositionId,
    pub liquidity: u128,
    pub used: TokenAmounts,
}

/// Protocol-level state of a position as reported by its adapter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionDetails {
    pub token0: Address,
    pub token1: Address,
    pub fee_tier: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub tokens_owed: TokenAmounts,
}

/// Ownership record the liquidity manager keeps per position id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub platform: Platform,
    pub owner: Address,
}

/// Answer of `getPosition`: the manager's record joined with the adapter's details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub position_id: PositionId,
    pub platform: Platform,
    pub owner: Address,
    pub adapter: Address,
    pub details: PositionDetails,
}
