//! Contracts, strategies and adapters for tests, plus a fully deployed [`Fixture`].

use std::sync::Arc;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use lpvault_common::{
    calls::{FactoryCall, ManagerCall, PositionTokenCall, TokenCall},
    models::{
        liquidity::{
            AddLiquidityParams, ClosePositionParams, CollectFeesParams, CreatePositionParams,
            PositionDetails, PositionOutcome, RemoveLiquidityParams, TokenAmounts,
        },
        Platform, PositionId, StrategyMetadata,
    },
    traits::{Contract, Host, LiquidityAdapter, Strategy},
    Call, CoreError, ReturnData,
};

use crate::{
    chain::{clock::ManualClock, Chain, Deployment},
    config::DeploymentConfig,
};

pub const GENESIS: u64 = 1_700_000_000;

fn increment(host: &mut dyn Host, slot: B256) -> U256 {
    let next = host.sload(slot) + U256::from(1);
    host.sstore(slot, next);
    next
}

/// `inc` bumps a counter and returns its new value, `fail` always errors.
#[derive(Debug, Clone, Copy)]
pub struct Counter;

impl Counter {
    pub fn count(chain: &Chain, address: Address) -> U256 {
        chain.storage(address, B256::ZERO)
    }
}

impl Contract for Counter {
    fn call(&self, host: &mut dyn Host, input: &Bytes) -> Result<Bytes, CoreError> {
        match input.as_ref() {
            b"inc" => Ok(Bytes::from(increment(host, B256::ZERO).to_be_bytes_vec())),
            b"fail" => Err(CoreError::DelegateFailure("counter asked to fail".to_string())),
            _ => Err(CoreError::UnsupportedCall { target: host.address(), call: "raw".to_string() }),
        }
    }
}

/// Calls back into `target` whenever it is called.
#[derive(Debug, Clone)]
pub struct Reenterer {
    target: Address,
    call: Call,
}

impl Reenterer {
    pub fn new(target: Address, call: Call) -> Self {
        Self { target, call }
    }
}

impl Contract for Reenterer {
    fn call(&self, host: &mut dyn Host, _input: &Bytes) -> Result<Bytes, CoreError> {
        host.call(self.target, self.call.clone())?;
        Ok(Bytes::new())
    }
}

/// Strategy with a fixed outcome that performs a list of calls when executed.
#[derive(Debug, Clone)]
pub struct ScriptedStrategy {
    name: String,
    compatible: bool,
    succeeds: bool,
    steps: Vec<(Address, Call)>,
}

impl ScriptedStrategy {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), compatible: true, succeeds: true, steps: Vec::new() }
    }

    pub fn compatible(mut self, compatible: bool) -> Self {
        self.compatible = compatible;
        self
    }

    pub fn succeeds(mut self, succeeds: bool) -> Self {
        self.succeeds = succeeds;
        self
    }

    pub fn step(mut self, target: Address, call: impl Into<Call>) -> Self {
        self.steps.push((target, call.into()));
        self
    }

    /// Number of executions and simulations that were kept.
    pub fn runs(chain: &Chain, address: Address) -> U256 {
        chain.storage(address, B256::ZERO)
    }
}

impl Strategy for ScriptedStrategy {
    fn info(&self) -> StrategyMetadata {
        StrategyMetadata::new(self.name.clone(), "1.0.0").with_description("Replays a fixed list of calls")
    }

    fn is_compatible(&self, _host: &dyn Host, _position_id: PositionId) -> bool {
        self.compatible
    }

    fn execute(
        &self,
        host: &mut dyn Host,
        _position_id: PositionId,
        _params: &Bytes,
    ) -> Result<bool, CoreError> {
        increment(host, B256::ZERO);
        for (target, call) in &self.steps {
            host.call(*target, call.clone())?;
        }
        Ok(self.succeeds)
    }

    fn simulate(
        &self,
        host: &mut dyn Host,
        _position_id: PositionId,
        _params: &Bytes,
    ) -> Result<Bytes, CoreError> {
        Ok(Bytes::from(increment(host, B256::ZERO).to_be_bytes_vec()))
    }
}

/// Full-range pool in which one unit of liquidity is one unit of each token.
///
/// The adapter is its own pool: it keeps the deposited tokens and stores positions in its
/// storage. It must be the minter of `position_token`.
#[derive(Debug, Clone)]
pub struct RangeAdapter {
    factory: Address,
    position_token: Address,
}

const NEXT_ID: B256 = B256::ZERO;

#[derive(Debug, Clone, Copy)]
enum Field {
    Token0,
    Token1,
    FeeTier,
    TickLower,
    TickUpper,
    Liquidity,
    Owed0,
    Owed1,
}

fn slot(id: PositionId, field: Field) -> B256 {
    let mut preimage = id.to_be_bytes_vec();
    preimage.push(field as u8);
    keccak256(preimage)
}

fn address_word(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}

fn word_address(word: U256) -> Address {
    Address::from_word(B256::from(word.to_be_bytes::<32>()))
}

impl RangeAdapter {
    pub fn new(factory: Address, position_token: Address) -> Self {
        Self { factory, position_token }
    }

    /// Credits fees to a position and funds the pool to pay them out.
    pub fn accrue_fees(chain: &mut Chain, adapter: Address, id: PositionId, fees: TokenAmounts) {
        let token0 = word_address(chain.storage(adapter, slot(id, Field::Token0)));
        let token1 = word_address(chain.storage(adapter, slot(id, Field::Token1)));
        for (field, token, amount) in
            [(Field::Owed0, token0, fees.amount0), (Field::Owed1, token1, fees.amount1)]
        {
            let owed = chain.storage(adapter, slot(id, field));
            chain.set_storage(adapter, slot(id, field), owed + amount);
            chain
                .deal(token, adapter, amount)
                .expect("pool token is deployed");
        }
    }

    fn load(&self, host: &dyn Host, id: PositionId) -> Result<PositionDetails, CoreError> {
        let token0 = word_address(host.sload(slot(id, Field::Token0)));
        if token0.is_zero() {
            return Err(CoreError::NonexistentPosition { token: self.position_token, id });
        }
        let read = |field| host.sload(slot(id, field));
        Ok(PositionDetails {
            token0,
            token1: word_address(read(Field::Token1)),
            fee_tier: read(Field::FeeTier).saturating_to(),
            tick_lower: read(Field::TickLower).saturating_to::<u32>() as i32,
            tick_upper: read(Field::TickUpper).saturating_to::<u32>() as i32,
            liquidity: read(Field::Liquidity).saturating_to(),
            tokens_owed: TokenAmounts::new(read(Field::Owed0), read(Field::Owed1)),
        })
    }

    fn set_liquidity(host: &mut dyn Host, id: PositionId, liquidity: u128) {
        host.sstore(slot(id, Field::Liquidity), U256::from(liquidity));
    }

    /// Takes `liquidity` of both tokens from the caller.
    fn deposit(
        host: &mut dyn Host,
        tokens: (Address, Address),
        desired: &TokenAmounts,
        min: &TokenAmounts,
    ) -> Result<u128, CoreError> {
        let amount = desired.amount0.min(desired.amount1);
        if amount.is_zero() {
            return Err(CoreError::invalid_parameter("desired", "no liquidity to add"));
        }
        if amount < min.amount0 || amount < min.amount1 {
            return Err(CoreError::DelegateFailure("price slippage check".to_string()));
        }
        let (from, to) = (host.caller(), host.address());
        host.call(tokens.0, TokenCall::TransferFrom { from, to, amount }.into())?;
        host.call(tokens.1, TokenCall::TransferFrom { from, to, amount }.into())?;
        Ok(amount.saturating_to())
    }

    fn pay(
        host: &mut dyn Host,
        details: &PositionDetails,
        amounts: TokenAmounts,
        recipient: Address,
    ) -> Result<TokenAmounts, CoreError> {
        if !amounts.amount0.is_zero() {
            host.call(details.token0, TokenCall::Transfer { to: recipient, amount: amounts.amount0 }.into())?;
        }
        if !amounts.amount1.is_zero() {
            host.call(details.token1, TokenCall::Transfer { to: recipient, amount: amounts.amount1 }.into())?;
        }
        Ok(amounts)
    }
}

impl LiquidityAdapter for RangeAdapter {
    fn factory(&self) -> Address {
        self.factory
    }

    fn create_position(
        &self,
        host: &mut dyn Host,
        params: &CreatePositionParams,
        recipient: Address,
    ) -> Result<PositionOutcome, CoreError> {
        if params.token0.is_zero() || params.token1.is_zero() {
            return Err(CoreError::ZeroAddress("pool token"));
        }
        let liquidity = Self::deposit(host, (params.token0, params.token1), &params.desired, &params.min)?;
        let id = host.sload(NEXT_ID) + U256::from(1);
        host.sstore(NEXT_ID, id);
        host.sstore(slot(id, Field::Token0), address_word(params.token0));
        host.sstore(slot(id, Field::Token1), address_word(params.token1));
        host.sstore(slot(id, Field::FeeTier), U256::from(params.fee_tier));
        host.sstore(slot(id, Field::TickLower), U256::from(params.tick_lower as u32));
        host.sstore(slot(id, Field::TickUpper), U256::from(params.tick_upper as u32));
        Self::set_liquidity(host, id, liquidity);
        host.call(self.position_token, PositionTokenCall::Mint { to: recipient, id }.into())?;
        let used = TokenAmounts::new(U256::from(liquidity), U256::from(liquidity));
        Ok(PositionOutcome { position_id: id, liquidity, used })
    }

    fn add_liquidity(
        &self,
        host: &mut dyn Host,
        params: &AddLiquidityParams,
    ) -> Result<PositionOutcome, CoreError> {
        let details = self.load(host, params.position_id)?;
        let added = Self::deposit(host, (details.token0, details.token1), &params.desired, &params.min)?;
        Self::set_liquidity(host, params.position_id, details.liquidity.saturating_add(added));
        let used = TokenAmounts::new(U256::from(added), U256::from(added));
        Ok(PositionOutcome { position_id: params.position_id, liquidity: added, used })
    }

    fn remove_liquidity(
        &self,
        host: &mut dyn Host,
        params: &RemoveLiquidityParams,
        recipient: Address,
    ) -> Result<TokenAmounts, CoreError> {
        let details = self.load(host, params.position_id)?;
        let remaining = details
            .liquidity
            .checked_sub(params.liquidity)
            .ok_or_else(|| CoreError::invalid_parameter("liquidity", "exceeds position liquidity"))?;
        let amount = U256::from(params.liquidity);
        if amount < params.min.amount0 || amount < params.min.amount1 {
            return Err(CoreError::DelegateFailure("price slippage check".to_string()));
        }
        Self::set_liquidity(host, params.position_id, remaining);
        Self::pay(host, &details, TokenAmounts::new(amount, amount), recipient)
    }

    fn collect_fees(
        &self,
        host: &mut dyn Host,
        params: &CollectFeesParams,
        recipient: Address,
    ) -> Result<TokenAmounts, CoreError> {
        let details = self.load(host, params.position_id)?;
        host.sstore(slot(params.position_id, Field::Owed0), U256::ZERO);
        host.sstore(slot(params.position_id, Field::Owed1), U256::ZERO);
        Self::pay(host, &details, details.tokens_owed, recipient)
    }

    fn close_position(
        &self,
        host: &mut dyn Host,
        params: &ClosePositionParams,
        recipient: Address,
    ) -> Result<TokenAmounts, CoreError> {
        let id = params.position_id;
        let details = self.load(host, id)?;
        let principal = U256::from(details.liquidity);
        let amounts = TokenAmounts::new(
            principal + details.tokens_owed.amount0,
            principal + details.tokens_owed.amount1,
        );
        if amounts.amount0 < params.min.amount0 || amounts.amount1 < params.min.amount1 {
            return Err(CoreError::DelegateFailure("price slippage check".to_string()));
        }
        Self::set_liquidity(host, id, 0);
        host.sstore(slot(id, Field::Owed0), U256::ZERO);
        host.sstore(slot(id, Field::Owed1), U256::ZERO);
        if params.burn_token {
            for field in [Field::Token0, Field::Token1, Field::FeeTier, Field::TickLower, Field::TickUpper] {
                host.sstore(slot(id, field), U256::ZERO);
            }
            host.call(self.position_token, PositionTokenCall::Burn { id }.into())?;
        }
        Self::pay(host, &details, amounts, recipient)
    }

    fn position_details(
        &self,
        host: &dyn Host,
        position_id: PositionId,
    ) -> Result<PositionDetails, CoreError> {
        self.load(host, position_id)
    }
}

/// Core deployment with two pool tokens and one registered adapter.
///
/// The adapter is the minter of `position_token`. Nothing is whitelisted on the factory.
pub struct Fixture {
    pub chain: Chain,
    pub clock: ManualClock,
    pub deployment: Deployment,
    pub admin: Address,
    pub alice: Address,
    pub bob: Address,
    pub token0: Address,
    pub token1: Address,
    pub position_token: Address,
    pub adapter: Address,
    pub platform: Platform,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        let admin = Address::repeat_byte(0xad);
        let clock = ManualClock::new(GENESIS);
        let mut chain = Chain::with_clock(clock.clone());
        let deployment = chain
            .deploy_core(&DeploymentConfig::new(admin))
            .expect("core deploys");
        let token0 = chain.deploy_token("USDC", 6);
        let token1 = chain.deploy_token("WETH", 18);

        let predicted_adapter = chain.predict_address(1);
        let position_token = chain.deploy_position_token("Range Positions", predicted_adapter);
        let adapter = chain.deploy_adapter(Arc::new(RangeAdapter::new(
            Address::repeat_byte(0xfa),
            position_token,
        )));
        assert_eq!(adapter, predicted_adapter);

        let platform = "uniswap-v3".to_string();
        chain
            .call(
                admin,
                deployment.manager,
                ManagerCall::RegisterAdapter { platform: platform.clone(), adapter },
            )
            .expect("adapter registers");

        Self {
            chain,
            clock,
            deployment,
            admin,
            alice: Address::repeat_byte(0xa1),
            bob: Address::repeat_byte(0xb0),
            token0,
            token1,
            position_token,
            adapter,
            platform,
        }
    }

    pub fn create_vault(&mut self, owner: Address, name: &str) -> Address {
        self.chain
            .call(owner, self.deployment.factory, FactoryCall::CreateVault { name: name.to_string() })
            .and_then(ReturnData::into_address)
            .expect("vault created")
    }

    /// Deals `amount` of both pool tokens to `account`.
    pub fn fund(&mut self, account: Address, amount: u64) {
        for token in [self.token0, self.token1] {
            self.chain
                .deal(token, account, U256::from(amount))
                .expect("token deployed");
        }
    }

    /// Funds `owner` and lets `spender` move the funds.
    pub fn fund_and_approve(&mut self, owner: Address, spender: Address, amount: u64) {
        self.fund(owner, amount);
        for token in [self.token0, self.token1] {
            self.chain
                .call(owner, token, TokenCall::Approve { spender, amount: U256::from(amount) })
                .expect("approve");
        }
    }

    pub fn create_params(&self, amount0: u64, amount1: u64) -> CreatePositionParams {
        CreatePositionParams {
            platform: self.platform.clone(),
            token0: self.token0,
            token1: self.token1,
            fee_tier: 3_000,
            tick_lower: -600,
            tick_upper: 600,
            desired: TokenAmounts::new(U256::from(amount0), U256::from(amount1)),
            min: TokenAmounts::ZERO,
            deadline: 0,
        }
    }
}
