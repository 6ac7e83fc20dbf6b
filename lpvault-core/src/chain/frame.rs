use alloy_primitives::{Address, B256, U256};
use lpvault_common::{
    events::{Event, LogEntry},
    models::PositionId,
    traits::Host,
    Call, CoreError, ReturnData,
};
use tracing::trace;

use super::state::{AccountKind, Code, WorldState};
use crate::{
    assets::{erc20, position_token},
    batch, factory,
    liquidity::manager,
    strategy::{parameters, registry},
    vault,
};

/// Maximum nesting of calls within one transaction.
pub const MAX_CALL_DEPTH: usize = 64;

/// A single call being executed: who called, which address is running and with what value.
///
/// Frames borrow the world mutably; a nested call reborrows it for a child frame. Nested calls
/// that fail are rolled back to the state they started from before the error is handed to
/// the calling code.
pub struct Frame<'w> {
    world: &'w mut WorldState,
    caller: Address,
    address: Address,
    value: U256,
    timestamp: u64,
    depth: usize,
}

impl<'w> Frame<'w> {
    /// Frame of an externally owned account, the origin of a transaction.
    pub(crate) fn root(world: &'w mut WorldState, origin: Address, timestamp: u64) -> Self {
        Frame { world, caller: Address::ZERO, address: origin, value: U256::ZERO, timestamp, depth: 0 }
    }

    /// Frame of the current call bound to another world, at the same depth.
    pub(crate) fn fork<'s>(&self, world: &'s mut WorldState) -> Frame<'s> {
        Frame {
            world,
            caller: self.caller,
            address: self.address,
            value: U256::ZERO,
            timestamp: self.timestamp,
            depth: self.depth,
        }
    }

    pub(crate) fn world(&self) -> &WorldState {
        &*self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut WorldState {
        &mut *self.world
    }

    /// Runs `f` in a child frame at `target`, called by the current address.
    pub(crate) fn with_child<R>(
        &mut self,
        target: Address,
        value: U256,
        f: impl FnOnce(&mut Frame<'_>) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(CoreError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        // the transaction snapshot already covers calls issued by the root frame
        let checkpoint = (self.depth > 0).then(|| self.world.checkpoint());
        let result = self.run_child(target, value, f);
        if result.is_err() {
            if let Some(checkpoint) = checkpoint {
                self.world.restore(checkpoint);
            }
        }
        result
    }

    fn run_child<R>(
        &mut self,
        target: Address,
        value: U256,
        f: impl FnOnce(&mut Frame<'_>) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        if !value.is_zero() {
            self.world
                .transfer_native(self.address, target, value)?;
        }
        let mut child = Frame {
            world: &mut *self.world,
            caller: self.address,
            address: target,
            value,
            timestamp: self.timestamp,
            depth: self.depth + 1,
        };
        f(&mut child)
    }

    /// Routes `call` to whatever lives at the current address.
    fn dispatch(&mut self, call: Call) -> Result<ReturnData, CoreError> {
        let target = self.address;
        trace!(target = %target, call = %call.name(), depth = self.depth, "Dispatching call");
        let kind = self.world.kind(target);
        match (kind, call) {
            (None | Some(AccountKind::Vault), Call::Transfer) => Ok(ReturnData::Empty),
            (Some(AccountKind::Token), Call::Token(call)) => erc20::handle(self, call),
            (Some(AccountKind::PositionToken), Call::PositionToken(call)) => {
                position_token::handle(self, call)
            }
            (Some(AccountKind::BatchExecutor), Call::Batch(call)) => batch::handle(self, call),
            (Some(AccountKind::Vault), Call::Vault(call)) => vault::handle(self, call),
            (Some(AccountKind::Factory), Call::Factory(call)) => factory::handle(self, call),
            (Some(AccountKind::Registry), Call::Registry(call)) => registry::handle(self, call),
            (Some(AccountKind::Manager), Call::Manager(call)) => manager::handle(self, call),
            (Some(AccountKind::Parameters), Call::Parameters(call)) => {
                parameters::handle(self, call)
            }
            (Some(AccountKind::Contract), call @ (Call::Raw(_) | Call::Transfer)) => {
                let contract = match self.world.code(target) {
                    Some(Code::Contract(contract)) => contract.clone(),
                    _ => return Err(CoreError::NoCode { address: target, call: call.name() }),
                };
                match call {
                    Call::Raw(input) => contract
                        .call(self, &input)
                        .map(ReturnData::Bytes),
                    _ if contract.payable() => Ok(ReturnData::Empty),
                    other => Err(CoreError::UnsupportedCall { target, call: other.name() }),
                }
            }
            (None, call) => Err(CoreError::NoCode { address: target, call: call.name() }),
            (Some(_), call) => Err(CoreError::UnsupportedCall { target, call: call.name() }),
        }
    }
}

impl Host for Frame<'_> {
    fn caller(&self) -> Address {
        self.caller
    }

    fn address(&self) -> Address {
        self.address
    }

    fn value(&self) -> U256 {
        self.value
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn call_with_value(
        &mut self,
        target: Address,
        call: Call,
        value: U256,
    ) -> Result<ReturnData, CoreError> {
        self.with_child(target, value, |child| child.dispatch(call))
    }

    fn sload(&self, slot: B256) -> U256 {
        self.world.sload(self.address, slot)
    }

    fn sstore(&mut self, slot: B256, value: U256) {
        self.world
            .sstore(self.address, slot, value)
    }

    fn emit(&mut self, event: Event) {
        self.world
            .logs
            .push(LogEntry { emitter: self.address, event });
    }

    fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.world.balance_of(token, account)
    }

    fn native_balance(&self, account: Address) -> U256 {
        self.world.native_balance(account)
    }

    fn owner_of(&self, token: Address, id: PositionId) -> Option<Address> {
        self.world.owner_of(token, id)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use alloy_primitives::Bytes;
    use lpvault_common::{traits::Contract, ErrorKind};

    use super::*;
    use crate::chain::state::Account;

    /// Calls itself until the depth limit is hit.
    #[derive(Debug)]
    struct Recurse;

    impl Contract for Recurse {
        fn call(&self, host: &mut dyn Host, input: &Bytes) -> Result<Bytes, CoreError> {
            let this = host.address();
            host.call(this, Call::Raw(input.clone()))?;
            Ok(Bytes::new())
        }
    }

    /// Writes a slot, then calls `inner` and swallows its error.
    #[derive(Debug)]
    struct Swallow {
        inner: Address,
    }

    impl Contract for Swallow {
        fn call(&self, host: &mut dyn Host, _input: &Bytes) -> Result<Bytes, CoreError> {
            host.sstore(B256::ZERO, U256::from(1));
            let _ = host.call(self.inner, Call::Raw(Bytes::new()));
            Ok(Bytes::new())
        }
    }

    /// Writes a slot, then fails.
    #[derive(Debug)]
    struct WriteThenFail;

    impl Contract for WriteThenFail {
        fn call(&self, host: &mut dyn Host, _input: &Bytes) -> Result<Bytes, CoreError> {
            host.sstore(B256::ZERO, U256::from(42));
            host.emit(Event::Paused { by: host.caller() });
            Err(CoreError::DelegateFailure("boom".into()))
        }

        fn payable(&self) -> bool {
            false
        }
    }

    fn deploy(world: &mut WorldState, contract: Arc<dyn Contract>) -> Address {
        world.install(Address::repeat_byte(0xde), Account::External(Code::Contract(contract)))
    }

    #[test]
    fn test_call_depth_is_limited() {
        let mut world = WorldState::default();
        let recurse = deploy(&mut world, Arc::new(Recurse));
        let mut root = Frame::root(&mut world, Address::repeat_byte(1), 0);

        let err = root
            .call(recurse, Call::Raw(Bytes::new()))
            .unwrap_err();

        assert_eq!(err, CoreError::CallDepthExceeded(MAX_CALL_DEPTH));
        assert_eq!(err.kind(), ErrorKind::DelegateFailure);
    }

    #[test]
    fn test_failed_nested_call_is_rolled_back() {
        let mut world = WorldState::default();
        let failing = deploy(&mut world, Arc::new(WriteThenFail));
        let swallow = deploy(&mut world, Arc::new(Swallow { inner: failing }));
        let mut root = Frame::root(&mut world, Address::repeat_byte(1), 0);

        root.call(swallow, Call::Raw(Bytes::new()))
            .unwrap();

        assert_eq!(world.sload(swallow, B256::ZERO), U256::from(1));
        assert_eq!(world.sload(failing, B256::ZERO), U256::ZERO);
        assert!(world.logs().is_empty());
    }

    #[test]
    fn test_value_transfers() {
        let alice = Address::repeat_byte(1);
        let bob = Address::repeat_byte(2);
        let mut world = WorldState::default();
        world.native.insert(alice, U256::from(100));
        let closed = deploy(&mut world, Arc::new(WriteThenFail));
        let mut root = Frame::root(&mut world, alice, 0);

        root.call_with_value(bob, Call::Transfer, U256::from(30))
            .unwrap();
        let err = root
            .call(Address::repeat_byte(3), Call::Raw(Bytes::new()))
            .unwrap_err();
        let refused = root
            .call_with_value(closed, Call::Transfer, U256::from(1))
            .unwrap_err();

        assert_eq!(world.native_balance(bob), U256::from(30));
        assert!(matches!(err, CoreError::NoCode { .. }));
        assert!(matches!(refused, CoreError::UnsupportedCall { .. }));
    }
}
