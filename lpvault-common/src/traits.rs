use core::fmt::Debug;

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::{
    calls::{Call, ReturnData},
    errors::CoreError,
    events::Event,
    models::{
        liquidity::{
            AddLiquidityParams, ClosePositionParams, CollectFeesParams, CreatePositionParams,
            PositionDetails, PositionOutcome, RemoveLiquidityParams, TokenAmounts,
        },
        PositionId, StrategyMetadata,
    },
};

/// The execution environment handed to code running at an address.
///
/// A host is bound to one call frame: `caller` is whoever invoked the current code,
/// `address` is where that code lives and storage operations act on that address only.
pub trait Host {
    fn caller(&self) -> Address;

    fn address(&self) -> Address;

    /// Native value attached to the current call.
    fn value(&self) -> U256;

    /// Unix timestamp of the transaction being executed.
    fn timestamp(&self) -> u64;

    /// Calls `target` with the current address as caller.
    ///
    /// State changes made by the callee are only kept if the surrounding transaction
    /// succeeds; an error returned here should usually be propagated unchanged.
    fn call(&mut self, target: Address, call: Call) -> Result<ReturnData, CoreError> {
        self.call_with_value(target, call, U256::ZERO)
    }

    fn call_with_value(
        &mut self,
        target: Address,
        call: Call,
        value: U256,
    ) -> Result<ReturnData, CoreError>;

    fn sload(&self, slot: B256) -> U256;

    fn sstore(&mut self, slot: B256, value: U256);

    fn emit(&mut self, event: Event);

    /// Fungible balance of `account`, zero for unknown tokens.
    fn balance_of(&self, token: Address, account: Address) -> U256;

    fn native_balance(&self, account: Address) -> U256;

    /// Current owner of a position, `None` if the token or the id does not exist.
    fn owner_of(&self, token: Address, id: PositionId) -> Option<Address>;
}

/// Protocol specific implementation of the normalized liquidity operations.
///
/// Adapters are invoked by the liquidity manager with the manager as caller. The manager
/// holds the input tokens and has approved the adapter for them before `create_position` and
/// `add_liquidity` are called; the adapter pulls what it actually uses. Proceeds of the other
/// operations go to `recipient`.
pub trait LiquidityAdapter: Debug + Send + Sync {
    /// Address of the protocol factory backing this adapter. Must be non-zero.
    fn factory(&self) -> Address;

    fn create_position(
        &self,
        host: &mut dyn Host,
        params: &CreatePositionParams,
        recipient: Address,
    ) -> Result<PositionOutcome, CoreError>;

    fn add_liquidity(
        &self,
        host: &mut dyn Host,
        params: &AddLiquidityParams,
    ) -> Result<PositionOutcome, CoreError>;

    fn remove_liquidity(
        &self,
        host: &mut dyn Host,
        params: &RemoveLiquidityParams,
        recipient: Address,
    ) -> Result<TokenAmounts, CoreError>;

    fn collect_fees(
        &self,
        host: &mut dyn Host,
        params: &CollectFeesParams,
        recipient: Address,
    ) -> Result<TokenAmounts, CoreError>;

    /// Withdraws all liquidity and owed tokens; burns the position token if requested.
    fn close_position(
        &self,
        host: &mut dyn Host,
        params: &ClosePositionParams,
        recipient: Address,
    ) -> Result<TokenAmounts, CoreError>;

    fn position_details(
        &self,
        host: &dyn Host,
        position_id: PositionId,
    ) -> Result<PositionDetails, CoreError>;
}

/// An automated strategy that can be registered, approved and executed by the registry.
pub trait Strategy: Debug + Send + Sync {
    fn info(&self) -> StrategyMetadata;

    fn is_compatible(&self, host: &dyn Host, position_id: PositionId) -> bool;

    /// Returns whether the strategy considers the execution successful. `Ok(false)` fails the
    /// surrounding operation just like an error does.
    fn execute(
        &self,
        host: &mut dyn Host,
        position_id: PositionId,
        params: &Bytes,
    ) -> Result<bool, CoreError>;

    /// Effects of `simulate` are always discarded.
    fn simulate(
        &self,
        host: &mut dyn Host,
        position_id: PositionId,
        params: &Bytes,
    ) -> Result<Bytes, CoreError>;
}

/// Generic external code addressed with raw payloads.
pub trait Contract: Debug + Send + Sync {
    fn call(&self, host: &mut dyn Host, input: &Bytes) -> Result<Bytes, CoreError>;

    /// Whether plain value transfers are accepted.
    fn payable(&self) -> bool {
        true
    }
}
