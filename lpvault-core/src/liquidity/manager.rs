//! Protocol-agnostic entry point for liquidity operations.
//!
//! The manager keeps one adapter per platform and a record of who created each position.
//! Input tokens are pulled from the caller, approved to the adapter and whatever the adapter
//! did not use is refunded in the same call. Proceeds of withdrawals go straight to the
//! caller.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use alloy_primitives::{Address, U256};
use lpvault_common::{
    calls::{ManagerCall, TokenCall},
    events::Event,
    models::{
        liquidity::{
            AddLiquidityParams, ClosePositionParams, CollectFeesParams, CreatePositionParams,
            PositionDetails, PositionRecord, PositionView, RemoveLiquidityParams, TokenAmounts,
        },
        ComponentStatus, Platform, PositionId,
    },
    traits::{Host, LiquidityAdapter},
    CoreError, ReturnData,
};
use metrics::counter;
use tracing::{debug, info};

use crate::{
    admin::AdminControl,
    chain::{
        frame::Frame,
        state::{Code, WorldState},
    },
};

#[derive(Debug, Clone)]
pub struct LiquidityManager {
    admin: AdminControl,
    adapters: BTreeMap<Platform, Address>,
    positions: HashMap<PositionId, PositionRecord>,
}

impl LiquidityManager {
    pub fn new(admin: Address) -> Self {
        Self { admin: AdminControl::new(admin), adapters: BTreeMap::new(), positions: HashMap::new() }
    }

    pub fn adapter(&self, platform: &str) -> Option<Address> {
        self.adapters.get(platform).copied()
    }

    pub fn position(&self, position_id: PositionId) -> Option<&PositionRecord> {
        self.positions.get(&position_id)
    }

    fn registered_adapter(&self, platform: &str) -> Result<Address, CoreError> {
        self.adapter(platform)
            .ok_or_else(|| CoreError::AdapterNotFound(platform.to_string()))
    }

    /// Record of `position_id`, which must have been created by `caller`.
    fn owned_position(
        &self,
        caller: Address,
        position_id: PositionId,
    ) -> Result<&PositionRecord, CoreError> {
        let record = self
            .positions
            .get(&position_id)
            .ok_or(CoreError::PositionNotFound(position_id))?;
        if record.owner != caller {
            return Err(CoreError::NotPositionOwner { caller, position_id });
        }
        Ok(record)
    }
}

/// Checks that `address` runs an adapter bound to a protocol factory.
fn probe(world: &WorldState, address: Address) -> Result<Arc<dyn LiquidityAdapter>, CoreError> {
    let adapter = match world.code(address) {
        Some(Code::Adapter(adapter)) => adapter.clone(),
        _ => {
            return Err(CoreError::MissingCapability { address, capability: "liquidity adapter" })
        }
    };
    if adapter.factory().is_zero() {
        return Err(CoreError::CapabilityProbeFailed {
            address,
            reason: "adapter reports no protocol factory".to_string(),
        });
    }
    Ok(adapter)
}

fn state<'a>(frame: &'a Frame<'_>) -> Result<&'a LiquidityManager, CoreError> {
    let this = frame.address();
    frame
        .world()
        .manager(this)
        .ok_or(CoreError::NoCode { address: this, call: "manager".to_string() })
}

fn state_mut<'a>(frame: &'a mut Frame<'_>) -> Result<&'a mut LiquidityManager, CoreError> {
    let this = frame.address();
    frame
        .world_mut()
        .manager_mut(this)
        .ok_or(CoreError::NoCode { address: this, call: "manager".to_string() })
}

fn ensure_admin_active(frame: &Frame<'_>) -> Result<(), CoreError> {
    let admin = &state(frame)?.admin;
    admin.ensure_admin(frame.caller(), frame.address())?;
    admin.ensure_active(frame.address())
}

fn ensure_active(frame: &Frame<'_>) -> Result<(), CoreError> {
    state(frame)?
        .admin
        .ensure_active(frame.address())
}

fn check_deadline(frame: &Frame<'_>, deadline: u64) -> Result<(), CoreError> {
    let timestamp = frame.timestamp();
    if deadline != 0 && timestamp > deadline {
        return Err(CoreError::DeadlineExpired { deadline, timestamp });
    }
    Ok(())
}

fn check_platform(platform: &str) -> Result<(), CoreError> {
    if platform.is_empty() {
        return Err(CoreError::invalid_parameter("platform", "must not be empty"));
    }
    Ok(())
}

/// Adapter currently serving `platform`.
fn resolve(frame: &Frame<'_>, platform: &str) -> Result<(Address, Arc<dyn LiquidityAdapter>), CoreError> {
    let address = state(frame)?.registered_adapter(platform)?;
    Ok((address, probe(frame.world(), address)?))
}

/// Moves `amount` of `token` from `from` into the manager.
fn pull(frame: &mut Frame<'_>, token: Address, from: Address, amount: U256) -> Result<(), CoreError> {
    if amount.is_zero() {
        return Ok(());
    }
    let this = frame.address();
    frame.call(token, TokenCall::TransferFrom { from, to: this, amount }.into())?;
    Ok(())
}

fn send(frame: &mut Frame<'_>, token: Address, to: Address, amount: U256) -> Result<(), CoreError> {
    if amount.is_zero() {
        return Ok(());
    }
    frame.call(token, TokenCall::Transfer { to, amount }.into())?;
    Ok(())
}

/// Grants `spender` an unlimited allowance unless it can already spend `amount`. A non-zero
/// allowance is reset to zero first.
fn ensure_allowance(
    frame: &mut Frame<'_>,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<(), CoreError> {
    let this = frame.address();
    let current = frame
        .call(token, TokenCall::Allowance { owner: this, spender }.into())?
        .into_amount()?;
    if current >= amount {
        return Ok(());
    }
    if !current.is_zero() {
        frame.call(token, TokenCall::Approve { spender, amount: U256::ZERO }.into())?;
    }
    frame.call(token, TokenCall::Approve { spender, amount: U256::MAX }.into())?;
    debug!(%token, %spender, "Approved adapter");
    Ok(())
}

/// Takes the desired amounts from the caller and lets the adapter spend them.
fn fund_adapter(
    frame: &mut Frame<'_>,
    tokens: (Address, Address),
    adapter: Address,
    desired: &TokenAmounts,
) -> Result<(), CoreError> {
    let caller = frame.caller();
    pull(frame, tokens.0, caller, desired.amount0)?;
    pull(frame, tokens.1, caller, desired.amount1)?;
    ensure_allowance(frame, tokens.0, adapter, desired.amount0)?;
    ensure_allowance(frame, tokens.1, adapter, desired.amount1)
}

/// Returns whatever the adapter left of the desired amounts to the caller.
fn refund_unused(
    frame: &mut Frame<'_>,
    tokens: (Address, Address),
    desired: &TokenAmounts,
    used: &TokenAmounts,
) -> Result<(), CoreError> {
    let caller = frame.caller();
    let overspent = || CoreError::DelegateFailure("adapter used more than the desired amounts".to_string());
    let refund = TokenAmounts::new(
        desired
            .amount0
            .checked_sub(used.amount0)
            .ok_or_else(overspent)?,
        desired
            .amount1
            .checked_sub(used.amount1)
            .ok_or_else(overspent)?,
    );
    if refund.is_zero() {
        return Ok(());
    }
    debug!(%caller, amount0 = %refund.amount0, amount1 = %refund.amount1, "Refunding unused input");
    send(frame, tokens.0, caller, refund.amount0)?;
    send(frame, tokens.1, caller, refund.amount1)
}

fn details(
    frame: &mut Frame<'_>,
    adapter: Address,
    implementation: &Arc<dyn LiquidityAdapter>,
    position_id: PositionId,
) -> Result<PositionDetails, CoreError> {
    frame.with_child(adapter, U256::ZERO, |host| implementation.position_details(&*host, position_id))
}

fn create_position(frame: &mut Frame<'_>, params: CreatePositionParams) -> Result<ReturnData, CoreError> {
    let caller = frame.caller();
    ensure_active(frame)?;
    check_platform(&params.platform)?;
    check_deadline(frame, params.deadline)?;
    let (adapter, implementation) = resolve(frame, &params.platform)?;
    let tokens = (params.token0, params.token1);

    fund_adapter(frame, tokens, adapter, &params.desired)?;
    let outcome = frame.with_child(adapter, U256::ZERO, |host| {
        implementation.create_position(host, &params, caller)
    })?;
    refund_unused(frame, tokens, &params.desired, &outcome.used)?;

    let manager = state_mut(frame)?;
    if manager
        .positions
        .contains_key(&outcome.position_id)
    {
        return Err(CoreError::PositionAlreadyRecorded(outcome.position_id));
    }
    manager.positions.insert(
        outcome.position_id,
        PositionRecord { platform: params.platform.clone(), owner: caller },
    );

    frame.emit(Event::PositionCreated {
        position_id: outcome.position_id,
        platform: params.platform.clone(),
        owner: caller,
        liquidity: outcome.liquidity,
    });
    counter!("lpvault_positions_created", "platform" => params.platform.clone()).increment(1);
    info!(
        position_id = %outcome.position_id,
        platform = %params.platform,
        owner = %caller,
        liquidity = outcome.liquidity,
        "Position created"
    );
    Ok(ReturnData::Position(outcome))
}

fn add_liquidity(frame: &mut Frame<'_>, params: AddLiquidityParams) -> Result<ReturnData, CoreError> {
    let caller = frame.caller();
    ensure_active(frame)?;
    check_deadline(frame, params.deadline)?;
    let platform = state(frame)?
        .owned_position(caller, params.position_id)?
        .platform
        .clone();
    let (adapter, implementation) = resolve(frame, &platform)?;
    let position = details(frame, adapter, &implementation, params.position_id)?;
    let tokens = (position.token0, position.token1);

    fund_adapter(frame, tokens, adapter, &params.desired)?;
    let outcome = frame.with_child(adapter, U256::ZERO, |host| {
        implementation.add_liquidity(host, &params)
    })?;
    refund_unused(frame, tokens, &params.desired, &outcome.used)?;

    frame.emit(Event::LiquidityAdded {
        position_id: params.position_id,
        liquidity: outcome.liquidity,
        used: outcome.used,
    });
    debug!(position_id = %params.position_id, liquidity = outcome.liquidity, "Liquidity added");
    Ok(ReturnData::Position(outcome))
}

/// Shared prologue of the withdrawing operations: ownership, deadline and adapter lookup.
fn prepare_withdrawal(
    frame: &Frame<'_>,
    position_id: PositionId,
    deadline: Option<u64>,
) -> Result<(Address, Arc<dyn LiquidityAdapter>), CoreError> {
    let caller = frame.caller();
    ensure_active(frame)?;
    if let Some(deadline) = deadline {
        check_deadline(frame, deadline)?;
    }
    let platform = state(frame)?
        .owned_position(caller, position_id)?
        .platform
        .clone();
    resolve(frame, &platform)
}

fn remove_liquidity(
    frame: &mut Frame<'_>,
    params: RemoveLiquidityParams,
) -> Result<ReturnData, CoreError> {
    let caller = frame.caller();
    let (adapter, implementation) = prepare_withdrawal(frame, params.position_id, Some(params.deadline))?;
    let amounts = frame.with_child(adapter, U256::ZERO, |host| {
        implementation.remove_liquidity(host, &params, caller)
    })?;
    frame.emit(Event::LiquidityRemoved {
        position_id: params.position_id,
        liquidity: params.liquidity,
        amounts,
    });
    debug!(position_id = %params.position_id, liquidity = params.liquidity, "Liquidity removed");
    Ok(ReturnData::Amounts(amounts))
}

fn collect_fees(frame: &mut Frame<'_>, params: CollectFeesParams) -> Result<ReturnData, CoreError> {
    let caller = frame.caller();
    let (adapter, implementation) = prepare_withdrawal(frame, params.position_id, None)?;
    let amounts = frame.with_child(adapter, U256::ZERO, |host| {
        implementation.collect_fees(host, &params, caller)
    })?;
    frame.emit(Event::FeesCollected { position_id: params.position_id, amounts });
    Ok(ReturnData::Amounts(amounts))
}

fn close_position(frame: &mut Frame<'_>, params: ClosePositionParams) -> Result<ReturnData, CoreError> {
    let caller = frame.caller();
    let (adapter, implementation) = prepare_withdrawal(frame, params.position_id, Some(params.deadline))?;
    let amounts = frame.with_child(adapter, U256::ZERO, |host| {
        implementation.close_position(host, &params, caller)
    })?;
    if params.burn_token {
        state_mut(frame)?
            .positions
            .remove(&params.position_id);
    }
    frame.emit(Event::PositionClosed {
        position_id: params.position_id,
        burned: params.burn_token,
        amounts,
    });
    info!(position_id = %params.position_id, burned = params.burn_token, "Position closed");
    Ok(ReturnData::Amounts(amounts))
}

fn get_position(frame: &mut Frame<'_>, position_id: PositionId) -> Result<ReturnData, CoreError> {
    let record = state(frame)?
        .position(position_id)
        .cloned()
        .ok_or(CoreError::PositionNotFound(position_id))?;
    let (adapter, implementation) = resolve(frame, &record.platform)?;
    let details = details(frame, adapter, &implementation, position_id)?;
    Ok(ReturnData::PositionView(Box::new(PositionView {
        position_id,
        platform: record.platform,
        owner: record.owner,
        adapter,
        details,
    })))
}

fn set_status(frame: &mut Frame<'_>, status: ComponentStatus) -> Result<ReturnData, CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    let admin = &mut state_mut(frame)?.admin;
    admin.ensure_admin(caller, this)?;
    admin.set_status(status);
    frame.emit(match status {
        ComponentStatus::Paused => Event::Paused { by: caller },
        ComponentStatus::Active => Event::Unpaused { by: caller },
    });
    Ok(ReturnData::Empty)
}

pub(crate) fn handle(frame: &mut Frame<'_>, call: ManagerCall) -> Result<ReturnData, CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    match call {
        ManagerCall::RegisterAdapter { platform, adapter } => {
            ensure_admin_active(frame)?;
            check_platform(&platform)?;
            if state(frame)?.adapter(&platform).is_some() {
                return Err(CoreError::AdapterAlreadyRegistered(platform));
            }
            probe(frame.world(), adapter)?;
            state_mut(frame)?
                .adapters
                .insert(platform.clone(), adapter);
            info!(%platform, %adapter, "Adapter registered");
            frame.emit(Event::AdapterRegistered { platform, adapter });
            Ok(ReturnData::Empty)
        }
        ManagerCall::UpdateAdapter { platform, adapter } => {
            ensure_admin_active(frame)?;
            let previous = state(frame)?.registered_adapter(&platform)?;
            probe(frame.world(), adapter)?;
            state_mut(frame)?
                .adapters
                .insert(platform.clone(), adapter);
            info!(%platform, %previous, %adapter, "Adapter updated");
            frame.emit(Event::AdapterUpdated { platform, adapter });
            Ok(ReturnData::Empty)
        }
        ManagerCall::RemoveAdapter(platform) => {
            ensure_admin_active(frame)?;
            state_mut(frame)?
                .adapters
                .remove(&platform)
                .ok_or_else(|| CoreError::AdapterNotFound(platform.clone()))?;
            info!(%platform, "Adapter removed");
            frame.emit(Event::AdapterRemoved { platform });
            Ok(ReturnData::Empty)
        }
        ManagerCall::CreatePosition(params) => create_position(frame, params),
        ManagerCall::AddLiquidity(params) => add_liquidity(frame, params),
        ManagerCall::RemoveLiquidity(params) => remove_liquidity(frame, params),
        ManagerCall::CollectFees(params) => collect_fees(frame, params),
        ManagerCall::ClosePosition(params) => close_position(frame, params),
        ManagerCall::Pause => set_status(frame, ComponentStatus::Paused),
        ManagerCall::Unpause => set_status(frame, ComponentStatus::Active),
        ManagerCall::TransferAdmin(new_admin) => {
            let admin = &mut state_mut(frame)?.admin;
            admin.ensure_admin(caller, this)?;
            let previous = admin.transfer(new_admin)?;
            frame.emit(Event::AdminTransferred { previous, admin: new_admin });
            Ok(ReturnData::Empty)
        }
        ManagerCall::GetPosition(position_id) => get_position(frame, position_id),
        ManagerCall::IsAdapterRegistered(platform) => {
            Ok(ReturnData::Bool(state(frame)?.adapter(&platform).is_some()))
        }
        ManagerCall::GetAdapter(platform) => state(frame)?
            .registered_adapter(&platform)
            .map(ReturnData::Address),
        ManagerCall::GetPlatforms => Ok(ReturnData::Strings(
            state(frame)?
                .adapters
                .keys()
                .cloned()
                .collect(),
        )),
        ManagerCall::IsPaused => Ok(ReturnData::Bool(state(frame)?.admin.is_paused())),
        ManagerCall::Admin => Ok(ReturnData::Address(state(frame)?.admin.admin())),
    }
}
