use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::models::{
    liquidity::TokenAmounts,
    parameters::{ParameterGroup, Template},
    Platform, PositionId, StrategyId,
};

/// An event together with the address of the component that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub emitter: Address,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // fungible and position tokens
    Transfer { from: Address, to: Address, amount: U256 },
    Approval { owner: Address, spender: Address, amount: U256 },
    PositionTransfer { from: Address, to: Address, id: PositionId },
    PositionApproval { owner: Address, approved: Address, id: PositionId },

    // batch executor and vault execution
    BatchCallExecuted { index: usize, target: Address, success: bool },
    BatchExecuted { calls: usize, value_used: U256, refunded: U256 },

    // vault
    StrategyAuthorized { account: Address, authorized: bool },
    Executed { caller: Address, calls: usize },
    TokensWithdrawn { token: Address, to: Address, amount: U256 },
    PositionReceived { token: Address, id: PositionId, from: Address },
    PositionWithdrawn { token: Address, id: PositionId, to: Address },
    PositionReleased { token: Address, id: PositionId, to: Address },

    // factory
    VaultCreated { vault: Address, owner: Address, name: String, user_vault_count: usize },
    VaultNameUpdated { vault: Address, name: String },
    StrategyWhitelisted { strategy: Address, whitelisted: bool },

    // registry and manager administration
    AdminTransferred { previous: Address, admin: Address },
    Paused { by: Address },
    Unpaused { by: Address },

    // registry
    StrategyRegistered { id: StrategyId, strategy: Address, approved: bool },
    StrategyUpdated { id: StrategyId, strategy: Address },
    StrategyApprovalSet { id: StrategyId, strategy: Address, approved: bool },
    StrategyExecuted { id: StrategyId, position_id: PositionId, caller: Address, params: Bytes },

    // liquidity manager
    AdapterRegistered { platform: Platform, adapter: Address },
    AdapterUpdated { platform: Platform, adapter: Address },
    AdapterRemoved { platform: Platform },
    PositionCreated { position_id: PositionId, platform: Platform, owner: Address, liquidity: u128 },
    LiquidityAdded { position_id: PositionId, liquidity: u128, used: TokenAmounts },
    LiquidityRemoved { position_id: PositionId, liquidity: u128, amounts: TokenAmounts },
    FeesCollected { position_id: PositionId, amounts: TokenAmounts },
    PositionClosed { position_id: PositionId, burned: bool, amounts: TokenAmounts },

    // parameter store
    TemplateSelected { user: Address, template: Template },
    ParametersCustomized { user: Address, group: ParameterGroup },
    ParametersReset { user: Address, template: Template },
}
