//! The in-memory ledger every component lives on.
//!
//! [`Chain`] is the single writer of a [`WorldState`]. Each [`Transaction`] runs against the
//! live world and is undone completely if anything in it fails, so callers only ever observe
//! committed state.

pub mod clock;
pub mod frame;
pub mod state;

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use lpvault_common::{
    calls::{FactoryCall, ManagerCall, RegistryCall},
    events::LogEntry,
    models::PositionId,
    traits::{Contract, Host, LiquidityAdapter, Strategy},
    Call, CoreError, ReturnData,
};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use self::{
    clock::{Clock, SystemClock},
    frame::Frame,
    state::{Account, Code, WorldState},
};
use crate::{
    assets::{erc20::FungibleToken, position_token::PositionToken},
    batch::BatchExecutor,
    config::DeploymentConfig,
    factory::VaultFactory,
    liquidity::manager::LiquidityManager,
    strategy::{parameters::ParameterStore, registry::StrategyRegistry},
};

/// A call issued by an externally owned account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub call: Call,
}

impl Transaction {
    pub fn new(from: Address, to: Address, call: impl Into<Call>) -> Self {
        Self { from, to, value: U256::ZERO, call: call.into() }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Addresses of the core components deployed by [`Chain::deploy_core`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub batch_executor: Address,
    pub factory: Address,
    pub registry: Address,
    pub manager: Address,
    pub parameters: Address,
}

pub struct Chain {
    world: WorldState,
    clock: Box<dyn Clock>,
    deployer: Address,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self { world: WorldState::default(), clock: Box::new(clock), deployer: Address::repeat_byte(0xde) }
    }

    pub fn timestamp(&self) -> u64 {
        self.clock.now()
    }

    /// Executes `tx` atomically: either every effect is committed or none is.
    #[instrument(skip_all, fields(from = %tx.from, to = %tx.to, call = %tx.call.name()))]
    pub fn transact(&mut self, tx: Transaction) -> Result<ReturnData, CoreError> {
        let timestamp = self.clock.now();
        let checkpoint = self.world.checkpoint();
        let result = Frame::root(&mut self.world, tx.from, timestamp).call_with_value(
            tx.to,
            tx.call,
            tx.value,
        );
        match result {
            Ok(data) => {
                counter!("lpvault_transactions", "status" => "committed").increment(1);
                debug!("Transaction committed");
                Ok(data)
            }
            Err(err) => {
                self.world.restore(checkpoint);
                counter!("lpvault_transactions", "status" => "reverted", "kind" => err.kind().to_string())
                    .increment(1);
                warn!(kind = %err.kind(), error = %err, "Transaction reverted");
                Err(err)
            }
        }
    }

    pub fn call(
        &mut self,
        from: Address,
        to: Address,
        call: impl Into<Call>,
    ) -> Result<ReturnData, CoreError> {
        self.transact(Transaction::new(from, to, call))
    }

    /// Runs a read-only `call` against a throw-away copy of the world. Nothing it does is kept,
    /// including the effects of nested calls made by a simulation.
    pub fn view(
        &self,
        from: Address,
        to: Address,
        call: impl Into<Call>,
    ) -> Result<ReturnData, CoreError> {
        let call = call.into();
        if !call.is_read_only() {
            return Err(CoreError::NotReadOnly(call.name()));
        }
        let mut scratch = self.world.scratch();
        Frame::root(&mut scratch, from, self.clock.now()).call(to, call)
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn logs(&self) -> &[LogEntry] {
        self.world.logs()
    }

    /// Address the deployment `offset` deployments from now will receive.
    pub fn predict_address(&self, offset: u64) -> Address {
        self.deployer
            .create(self.world.nonce(self.deployer) + offset)
    }

    fn install(&mut self, account: Account) -> Address {
        let kind = account.kind();
        let address = self
            .world
            .install(self.deployer, account);
        debug!(%address, %kind, "Deployed");
        address
    }

    pub fn deploy_token(&mut self, symbol: &str, decimals: u8) -> Address {
        self.install(Account::Token(FungibleToken::new(symbol, decimals)))
    }

    pub fn deploy_position_token(&mut self, name: &str, minter: Address) -> Address {
        self.install(Account::PositionToken(PositionToken::new(name, minter)))
    }

    pub fn deploy_contract(&mut self, contract: Arc<dyn Contract>) -> Address {
        self.install(Account::External(Code::Contract(contract)))
    }

    pub fn deploy_adapter(&mut self, adapter: Arc<dyn LiquidityAdapter>) -> Address {
        self.install(Account::External(Code::Adapter(adapter)))
    }

    pub fn deploy_strategy(&mut self, strategy: Arc<dyn Strategy>) -> Address {
        self.install(Account::External(Code::Strategy(strategy)))
    }

    pub fn deploy_batch_executor(&mut self) -> Address {
        self.install(Account::BatchExecutor(BatchExecutor::default()))
    }

    pub fn deploy_factory(&mut self, admin: Address) -> Address {
        self.install(Account::Factory(VaultFactory::new(admin)))
    }

    pub fn deploy_registry(&mut self, admin: Address) -> Address {
        self.install(Account::Registry(StrategyRegistry::new(admin)))
    }

    pub fn deploy_manager(&mut self, admin: Address) -> Address {
        self.install(Account::Manager(LiquidityManager::new(admin)))
    }

    pub fn deploy_parameter_store(&mut self) -> Address {
        self.install(Account::Parameters(ParameterStore::default()))
    }

    /// Deploys every core component and applies the configured initial state. Nothing is
    /// deployed if any part of the configuration is rejected.
    pub fn deploy_core(&mut self, config: &DeploymentConfig) -> Result<Deployment, CoreError> {
        if config.admin.is_zero() {
            return Err(CoreError::ZeroAddress("admin"));
        }
        let checkpoint = self.world.checkpoint();
        let result = self.install_core(config);
        if let Err(err) = &result {
            self.world.restore(checkpoint);
            warn!(error = %err, "Core deployment rolled back");
        }
        result
    }

    fn install_core(&mut self, config: &DeploymentConfig) -> Result<Deployment, CoreError> {
        let deployment = Deployment {
            batch_executor: self.deploy_batch_executor(),
            factory: self.deploy_factory(config.admin),
            registry: self.deploy_registry(config.admin),
            manager: self.deploy_manager(config.admin),
            parameters: self.deploy_parameter_store(),
        };
        for strategy in &config.factory.whitelisted_strategies {
            self.call(
                config.admin,
                deployment.factory,
                FactoryCall::SetStrategyWhitelisting { strategy: *strategy, whitelisted: true },
            )?;
        }
        if config.registry.paused {
            self.call(config.admin, deployment.registry, RegistryCall::Pause)?;
        }
        if config.manager.paused {
            self.call(config.admin, deployment.manager, ManagerCall::Pause)?;
        }
        info!(
            factory = %deployment.factory,
            registry = %deployment.registry,
            manager = %deployment.manager,
            "Core deployed"
        );
        Ok(deployment)
    }

    /// Credits `amount` of `token` to `account` out of thin air.
    pub fn deal(&mut self, token: Address, account: Address, amount: U256) -> Result<(), CoreError> {
        let ledger = self
            .world
            .token_mut(token)
            .ok_or(CoreError::NoCode { address: token, call: "deal".to_string() })?;
        ledger.mint(account, amount);
        Ok(())
    }

    pub fn deal_native(&mut self, account: Address, amount: U256) {
        *self
            .world
            .native
            .entry(account)
            .or_default() += amount;
    }

    pub fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.world.balance_of(token, account)
    }

    pub fn native_balance(&self, account: Address) -> U256 {
        self.world.native_balance(account)
    }

    pub fn owner_of(&self, token: Address, id: PositionId) -> Option<Address> {
        self.world.owner_of(token, id)
    }

    pub fn storage(&self, address: Address, slot: B256) -> U256 {
        self.world.sload(address, slot)
    }

    pub fn set_storage(&mut self, address: Address, slot: B256, value: U256) {
        self.world.sstore(address, slot, value)
    }
}
