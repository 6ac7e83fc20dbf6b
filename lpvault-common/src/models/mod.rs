pub mod liquidity;
pub mod parameters;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Identifier of a position inside its protocol's position token.
pub type PositionId = U256;

/// Platform literal type to uniquely identify a liquidity protocol (e.g. `uniswap_v3`).
pub type Platform = String;

/// Strategy id literal type under which an implementation is registered.
pub type StrategyId = String;

/// Registry entry kept by the factory for every vault it deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInfo {
    pub owner: Address,
    pub name: String,
    pub creation_time: u64,
}

impl VaultInfo {
    pub fn new(owner: Address, name: impl Into<String>, creation_time: u64) -> Self {
        Self { owner, name: name.into(), creation_time }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VaultStatus {
    #[default]
    Idle,
    Executing,
}

/// Global switch of the registry and the liquidity manager.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ComponentStatus {
    #[default]
    Active,
    Paused,
}

/// A position custodied by a vault, keyed by the token contract that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedPosition {
    pub token: Address,
    pub id: PositionId,
}

impl ManagedPosition {
    pub fn new(token: Address, id: PositionId) -> Self {
        Self { token, id }
    }
}

/// Descriptive data a strategy implementation reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrategyMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl StrategyMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), description: String::new() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub id: StrategyId,
    pub strategy: Address,
    pub approved: bool,
    pub metadata: StrategyMetadata,
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_managed_positions_order_by_token_then_id() {
        let token_a = Address::repeat_byte(1);
        let token_b = Address::repeat_byte(2);
        let mut positions = vec![
            ManagedPosition::new(token_b, U256::from(1)),
            ManagedPosition::new(token_a, U256::from(9)),
            ManagedPosition::new(token_a, U256::from(3)),
        ];

        positions.sort();

        assert_eq!(
            positions,
            vec![
                ManagedPosition::new(token_a, U256::from(3)),
                ManagedPosition::new(token_a, U256::from(9)),
                ManagedPosition::new(token_b, U256::from(1)),
            ]
        );
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&VaultStatus::Executing).unwrap(), "\"executing\"");
        assert_eq!("paused".parse::<ComponentStatus>(), Ok(ComponentStatus::Paused));
    }
}
