use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, B256, U256};
use lpvault_common::{
    events::LogEntry,
    traits::{Contract, LiquidityAdapter, Strategy},
    CoreError,
};
use strum_macros::Display;

use crate::{
    assets::{erc20::FungibleToken, position_token::PositionToken},
    batch::BatchExecutor,
    factory::VaultFactory,
    liquidity::manager::LiquidityManager,
    strategy::{parameters::ParameterStore, registry::StrategyRegistry},
    vault::PositionVault,
};

/// External code deployed at an address, typed by the capability it implements.
#[derive(Debug, Clone)]
pub enum Code {
    Contract(Arc<dyn Contract>),
    Adapter(Arc<dyn LiquidityAdapter>),
    Strategy(Arc<dyn Strategy>),
}

#[derive(Debug, Clone)]
pub enum Account {
    Token(FungibleToken),
    PositionToken(PositionToken),
    BatchExecutor(BatchExecutor),
    Vault(PositionVault),
    Factory(VaultFactory),
    Registry(StrategyRegistry),
    Manager(LiquidityManager),
    Parameters(ParameterStore),
    External(Code),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AccountKind {
    Token,
    PositionToken,
    BatchExecutor,
    Vault,
    Factory,
    Registry,
    Manager,
    Parameters,
    Contract,
    Adapter,
    Strategy,
}

impl Account {
    pub fn kind(&self) -> AccountKind {
        match self {
            Account::Token(_) => AccountKind::Token,
            Account::PositionToken(_) => AccountKind::PositionToken,
            Account::BatchExecutor(_) => AccountKind::BatchExecutor,
            Account::Vault(_) => AccountKind::Vault,
            Account::Factory(_) => AccountKind::Factory,
            Account::Registry(_) => AccountKind::Registry,
            Account::Manager(_) => AccountKind::Manager,
            Account::Parameters(_) => AccountKind::Parameters,
            Account::External(Code::Contract(_)) => AccountKind::Contract,
            Account::External(Code::Adapter(_)) => AccountKind::Adapter,
            Account::External(Code::Strategy(_)) => AccountKind::Strategy,
        }
    }
}

/// Everything a transaction can touch.
///
/// The log is append-only, so a [`Checkpoint`] records its length instead of copying it.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub(crate) native: HashMap<Address, U256>,
    pub(crate) accounts: HashMap<Address, Account>,
    pub(crate) storage: HashMap<Address, HashMap<B256, U256>>,
    pub(crate) logs: Vec<LogEntry>,
    nonces: HashMap<Address, u64>,
}

/// State to return to if the work started after it fails.
#[derive(Debug)]
pub(crate) struct Checkpoint {
    native: HashMap<Address, U256>,
    accounts: HashMap<Address, Account>,
    storage: HashMap<Address, HashMap<B256, U256>>,
    nonces: HashMap<Address, u64>,
    log_len: usize,
}

macro_rules! account_accessors {
    ($($get:ident, $get_mut:ident => $variant:ident($ty:ty)),* $(,)?) => {
        $(
            pub fn $get(&self, address: Address) -> Option<&$ty> {
                match self.accounts.get(&address) {
                    Some(Account::$variant(inner)) => Some(inner),
                    _ => None,
                }
            }

            pub(crate) fn $get_mut(&mut self, address: Address) -> Option<&mut $ty> {
                match self.accounts.get_mut(&address) {
                    Some(Account::$variant(inner)) => Some(inner),
                    _ => None,
                }
            }
        )*
    };
}

impl WorldState {
    account_accessors!(
        token, token_mut => Token(FungibleToken),
        position_token, position_token_mut => PositionToken(PositionToken),
        batch_executor, batch_executor_mut => BatchExecutor(BatchExecutor),
        vault, vault_mut => Vault(PositionVault),
        factory, factory_mut => Factory(VaultFactory),
        registry, registry_mut => Registry(StrategyRegistry),
        manager, manager_mut => Manager(LiquidityManager),
        parameters, parameters_mut => Parameters(ParameterStore),
    );

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            native: self.native.clone(),
            accounts: self.accounts.clone(),
            storage: self.storage.clone(),
            nonces: self.nonces.clone(),
            log_len: self.logs.len(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.native = checkpoint.native;
        self.accounts = checkpoint.accounts;
        self.storage = checkpoint.storage;
        self.nonces = checkpoint.nonces;
        self.logs.truncate(checkpoint.log_len);
    }

    /// Copy of the world without its log, for work whose effects are thrown away.
    pub(crate) fn scratch(&self) -> WorldState {
        WorldState {
            native: self.native.clone(),
            accounts: self.accounts.clone(),
            storage: self.storage.clone(),
            logs: Vec::new(),
            nonces: self.nonces.clone(),
        }
    }

    pub fn kind(&self, address: Address) -> Option<AccountKind> {
        self.accounts
            .get(&address)
            .map(Account::kind)
    }

    pub fn code(&self, address: Address) -> Option<&Code> {
        match self.accounts.get(&address) {
            Some(Account::External(code)) => Some(code),
            _ => None,
        }
    }

    /// Address the next deployment by `deployer` will receive.
    pub fn next_address(&self, deployer: Address) -> Address {
        deployer.create(self.nonce(deployer))
    }

    pub fn nonce(&self, deployer: Address) -> u64 {
        self.nonces
            .get(&deployer)
            .copied()
            .unwrap_or_default()
    }

    /// Places `account` at the next creation address of `deployer`.
    pub(crate) fn install(&mut self, deployer: Address, account: Account) -> Address {
        let nonce = self.nonces.entry(deployer).or_default();
        let address = deployer.create(*nonce);
        *nonce += 1;
        self.accounts.insert(address, account);
        address
    }

    pub fn native_balance(&self, account: Address) -> U256 {
        self.native
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn transfer_native(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), CoreError> {
        let available = self.native_balance(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(CoreError::InsufficientValue { required: amount, supplied: available })?;
        self.native.insert(from, remaining);
        *self.native.entry(to).or_default() += amount;
        Ok(())
    }

    pub fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.token(token)
            .map(|t| t.balance_of(account))
            .unwrap_or_default()
    }

    pub fn owner_of(&self, token: Address, id: U256) -> Option<Address> {
        self.position_token(token)
            .and_then(|t| t.owner_of(id))
    }

    pub fn sload(&self, address: Address, slot: B256) -> U256 {
        self.storage
            .get(&address)
            .and_then(|slots| slots.get(&slot))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn sstore(&mut self, address: Address, slot: B256, value: U256) {
        let slots = self.storage.entry(address).or_default();
        if value.is_zero() {
            slots.remove(&slot);
        } else {
            slots.insert(slot, value);
        }
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }
}

#[cfg(test)]
mod test {
    use lpvault_common::events::Event;

    use super::*;

    #[test]
    fn test_install_uses_creation_addresses() {
        let deployer = Address::repeat_byte(0xde);
        let mut world = WorldState::default();
        let predicted = world.next_address(deployer);

        let first = world.install(deployer, Account::BatchExecutor(BatchExecutor::default()));
        let second = world.install(deployer, Account::BatchExecutor(BatchExecutor::default()));

        assert_eq!(first, predicted);
        assert_eq!(first, deployer.create(0));
        assert_eq!(second, deployer.create(1));
        assert_eq!(world.kind(first), Some(AccountKind::BatchExecutor));
        assert_eq!(world.nonce(deployer), 2);
    }

    #[test]
    fn test_native_transfer_checks_balance() {
        let (alice, bob) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let mut world = WorldState::default();
        world.native.insert(alice, U256::from(10));

        world
            .transfer_native(alice, bob, U256::from(4))
            .unwrap();
        let err = world
            .transfer_native(alice, bob, U256::from(7))
            .unwrap_err();

        assert_eq!(world.native_balance(alice), U256::from(6));
        assert_eq!(world.native_balance(bob), U256::from(4));
        assert_eq!(err, CoreError::InsufficientValue { required: U256::from(7), supplied: U256::from(6) });
    }

    #[test]
    fn test_restore_truncates_log() {
        let contract = Address::repeat_byte(9);
        let mut world = WorldState::default();
        world.logs.push(LogEntry { emitter: contract, event: Event::Paused { by: contract } });
        let checkpoint = world.checkpoint();

        world.sstore(contract, B256::ZERO, U256::from(1));
        world.logs.push(LogEntry { emitter: contract, event: Event::Unpaused { by: contract } });
        world.restore(checkpoint);

        assert_eq!(world.sload(contract, B256::ZERO), U256::ZERO);
        assert_eq!(world.logs().len(), 1);
        assert_eq!(world.logs()[0].event, Event::Paused { by: contract });
    }

    #[test]
    fn test_scratch_leaves_log_behind() {
        let contract = Address::repeat_byte(9);
        let mut world = WorldState::default();
        world.sstore(contract, B256::ZERO, U256::from(3));
        world.logs.push(LogEntry { emitter: contract, event: Event::Paused { by: contract } });

        let scratch = world.scratch();

        assert_eq!(scratch.sload(contract, B256::ZERO), U256::from(3));
        assert!(scratch.logs().is_empty());
    }

    #[test]
    fn test_zero_store_clears_slot() {
        let contract = Address::repeat_byte(9);
        let slot = B256::repeat_byte(1);
        let mut world = WorldState::default();

        world.sstore(contract, slot, U256::from(5));
        assert_eq!(world.sload(contract, slot), U256::from(5));

        world.sstore(contract, slot, U256::ZERO);
        assert!(world.storage[&contract].is_empty());
    }
}
