//! Per-user custodial vault.
//!
//! A vault holds tokens and position tokens on behalf of its owner. The owner, and every
//! account the owner authorized (typically automated strategies), may run atomic batches
//! from the vault's address. Only the owner can change authorizations or move assets out.

use std::collections::BTreeSet;

use alloy_primitives::{Address, U256};
use lpvault_common::{
    calls::{PositionTokenCall, TokenCall, VaultCall},
    events::Event,
    models::{ManagedPosition, VaultStatus},
    traits::Host,
    CoreError, ReturnData,
};
use tracing::{debug, info};

use crate::{
    batch::{run_calls, validate_batch},
    chain::{frame::Frame, state::AccountKind},
};

#[derive(Debug, Clone)]
pub struct PositionVault {
    owner: Address,
    /// Deployer; authorized only until it revokes itself at the end of vault creation.
    factory: Address,
    authorized: BTreeSet<Address>,
    managed: BTreeSet<ManagedPosition>,
    status: VaultStatus,
}

impl PositionVault {
    pub fn new(owner: Address, factory: Address) -> Self {
        Self {
            owner,
            factory,
            authorized: BTreeSet::from([factory]),
            managed: BTreeSet::new(),
            status: VaultStatus::Idle,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn status(&self) -> VaultStatus {
        self.status
    }

    pub fn is_authorized(&self, account: Address) -> bool {
        account == self.owner || self.authorized.contains(&account)
    }

    pub fn is_managed(&self, token: Address, id: U256) -> bool {
        self.managed
            .contains(&ManagedPosition::new(token, id))
    }

    pub fn managed_positions(&self) -> impl Iterator<Item = &ManagedPosition> {
        self.managed.iter()
    }

    fn ensure_owner(&self, caller: Address, vault: Address) -> Result<(), CoreError> {
        if caller != self.owner {
            return Err(CoreError::NotOwner { caller, target: vault });
        }
        Ok(())
    }

    fn ensure_idle(&self, vault: Address) -> Result<(), CoreError> {
        if self.status == VaultStatus::Executing {
            return Err(CoreError::Reentrancy(vault));
        }
        Ok(())
    }
}

fn state<'a>(frame: &'a Frame<'_>) -> Result<&'a PositionVault, CoreError> {
    let this = frame.address();
    frame
        .world()
        .vault(this)
        .ok_or(CoreError::VaultNotFound(this))
}

fn state_mut<'a>(frame: &'a mut Frame<'_>) -> Result<&'a mut PositionVault, CoreError> {
    let this = frame.address();
    frame
        .world_mut()
        .vault_mut(this)
        .ok_or(CoreError::VaultNotFound(this))
}

pub(crate) fn handle(frame: &mut Frame<'_>, call: VaultCall) -> Result<ReturnData, CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    match call {
        VaultCall::Execute { targets, payloads } => {
            let vault = state(frame)?;
            vault.ensure_idle(this)?;
            if !vault.is_authorized(caller) {
                return Err(CoreError::NotAuthorized { caller, target: this, action: "execute" });
            }
            validate_batch(&targets, &payloads)?;
            let calls = targets.len();
            debug!(vault = %this, %caller, calls, "Executing");

            state_mut(frame)?.status = VaultStatus::Executing;
            let outcome = run_calls(frame, targets, payloads, Vec::new())?;
            state_mut(frame)?.status = VaultStatus::Idle;

            frame.emit(Event::Executed { caller, calls });
            Ok(ReturnData::Batch(outcome))
        }
        VaultCall::SetStrategyAuthorization { account, authorized } => {
            let vault = state_mut(frame)?;
            let bootstrapping = caller == vault.factory && vault.authorized.contains(&caller);
            if caller != vault.owner && !bootstrapping {
                return Err(CoreError::NotOwner { caller, target: this });
            }
            if account.is_zero() {
                return Err(CoreError::ZeroAddress("account"));
            }
            if authorized {
                vault.authorized.insert(account);
            } else {
                vault.authorized.remove(&account);
            }
            frame.emit(Event::StrategyAuthorized { account, authorized });
            Ok(ReturnData::Empty)
        }
        VaultCall::WithdrawTokens { token, to, amount } => {
            let vault = state(frame)?;
            vault.ensure_owner(caller, this)?;
            vault.ensure_idle(this)?;
            if to.is_zero() {
                return Err(CoreError::ZeroAddress("recipient"));
            }
            frame.call(token, TokenCall::Transfer { to, amount }.into())?;
            frame.emit(Event::TokensWithdrawn { token, to, amount });
            info!(vault = %this, %token, %to, %amount, "Tokens withdrawn");
            Ok(ReturnData::Empty)
        }
        VaultCall::WithdrawPosition { token, id, to } => {
            let vault = state(frame)?;
            vault.ensure_owner(caller, this)?;
            vault.ensure_idle(this)?;
            if !vault.is_managed(token, id) {
                return Err(CoreError::PositionNotManaged { token, id });
            }
            if to.is_zero() {
                return Err(CoreError::ZeroAddress("recipient"));
            }
            state_mut(frame)?
                .managed
                .remove(&ManagedPosition::new(token, id));
            frame
                .call(token, PositionTokenCall::SafeTransferFrom { from: this, to, id }.into())
                .and_then(ReturnData::into_empty)?;
            frame.emit(Event::PositionWithdrawn { token, id, to });
            info!(vault = %this, %token, %id, %to, "Position withdrawn");
            Ok(ReturnData::Empty)
        }
        VaultCall::OnPositionReceived { operator, from, id } => {
            // the caller is the position token that just moved `id` into this vault
            let is_position_token = frame.world().kind(caller) == Some(AccountKind::PositionToken);
            if !is_position_token || frame.owner_of(caller, id) != Some(this) {
                return Err(CoreError::NotAuthorized { caller, target: this, action: "record position" });
            }
            state_mut(frame)?
                .managed
                .insert(ManagedPosition::new(caller, id));
            frame.emit(Event::PositionReceived { token: caller, id, from });
            debug!(vault = %this, token = %caller, %id, %operator, "Position received");
            Ok(ReturnData::Empty)
        }
        VaultCall::OnPositionReleased { to, id } => {
            // the caller is the position token that just moved `id` out of this vault
            let is_position_token = frame.world().kind(caller) == Some(AccountKind::PositionToken);
            if !is_position_token || frame.owner_of(caller, id) == Some(this) {
                return Err(CoreError::NotAuthorized { caller, target: this, action: "release position" });
            }
            if state_mut(frame)?
                .managed
                .remove(&ManagedPosition::new(caller, id))
            {
                frame.emit(Event::PositionReleased { token: caller, id, to });
                debug!(vault = %this, token = %caller, %id, %to, "Position released");
            }
            Ok(ReturnData::Empty)
        }
        VaultCall::Owner => Ok(ReturnData::Address(state(frame)?.owner)),
        VaultCall::IsAuthorized(account) => Ok(ReturnData::Bool(state(frame)?.is_authorized(account))),
        VaultCall::AuthorizedAccounts => Ok(ReturnData::Addresses(
            state(frame)?
                .authorized
                .iter()
                .copied()
                .collect(),
        )),
        VaultCall::ManagedPositions => Ok(ReturnData::ManagedPositions(
            state(frame)?
                .managed_positions()
                .copied()
                .collect(),
        )),
        VaultCall::IsManaged { token, id } => Ok(ReturnData::Bool(state(frame)?.is_managed(token, id))),
        VaultCall::Status => Ok(ReturnData::VaultStatus(state(frame)?.status())),
    }
}
