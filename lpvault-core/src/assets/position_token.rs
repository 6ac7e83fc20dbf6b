use std::collections::HashMap;

use alloy_primitives::Address;
use lpvault_common::{
    calls::{PositionTokenCall, VaultCall},
    events::Event,
    models::PositionId,
    traits::Host,
    CoreError, ReturnData,
};

use crate::chain::{frame::Frame, state::AccountKind};

/// Ledger of a non-fungible position token. Only the minter can create or destroy ids.
#[derive(Debug, Clone)]
pub struct PositionToken {
    pub name: String,
    minter: Address,
    owners: HashMap<PositionId, Address>,
    approvals: HashMap<PositionId, Address>,
}

impl PositionToken {
    pub fn new(name: &str, minter: Address) -> Self {
        Self { name: name.to_string(), minter, owners: HashMap::new(), approvals: HashMap::new() }
    }

    pub fn minter(&self) -> Address {
        self.minter
    }

    pub fn owner_of(&self, id: PositionId) -> Option<Address> {
        self.owners.get(&id).copied()
    }

    pub fn approved(&self, id: PositionId) -> Option<Address> {
        self.approvals.get(&id).copied()
    }
}

fn ledger<'a>(frame: &'a mut Frame<'_>) -> Result<&'a mut PositionToken, CoreError> {
    let this = frame.address();
    frame
        .world_mut()
        .position_token_mut(this)
        .ok_or(CoreError::NoCode { address: this, call: "positiontoken".to_string() })
}

fn existing_owner(token: &PositionToken, this: Address, id: PositionId) -> Result<Address, CoreError> {
    token
        .owner_of(id)
        .ok_or(CoreError::NonexistentPosition { token: this, id })
}

/// Tells the vaults on either side of a move of `id` about it. Other accounts are not notified.
fn notify_vaults(
    frame: &mut Frame<'_>,
    operator: Address,
    from: Address,
    to: Address,
    id: PositionId,
) -> Result<(), CoreError> {
    if frame.world().kind(from) == Some(AccountKind::Vault) {
        frame
            .call(from, VaultCall::OnPositionReleased { to, id }.into())
            .and_then(ReturnData::into_empty)?;
    }
    if frame.world().kind(to) == Some(AccountKind::Vault) {
        frame
            .call(to, VaultCall::OnPositionReceived { operator, from, id }.into())
            .and_then(ReturnData::into_empty)?;
    }
    Ok(())
}

fn transfer(
    frame: &mut Frame<'_>,
    from: Address,
    to: Address,
    id: PositionId,
) -> Result<(), CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    if to.is_zero() {
        return Err(CoreError::ZeroAddress("recipient"));
    }
    let token = ledger(frame)?;
    let owner = existing_owner(token, this, id)?;
    let approved = token.approved(id) == Some(caller);
    if owner != from || (caller != owner && !approved) {
        return Err(CoreError::NotApprovedForPosition { caller, token: this, id });
    }
    token.approvals.remove(&id);
    token.owners.insert(id, to);
    frame.emit(Event::PositionTransfer { from, to, id });
    notify_vaults(frame, caller, from, to, id)
}

pub(crate) fn handle(frame: &mut Frame<'_>, call: PositionTokenCall) -> Result<ReturnData, CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    match call {
        PositionTokenCall::Mint { to, id } => {
            if to.is_zero() {
                return Err(CoreError::ZeroAddress("recipient"));
            }
            let token = ledger(frame)?;
            if caller != token.minter() {
                return Err(CoreError::NotMinter { caller, token: this });
            }
            if token.owners.contains_key(&id) {
                return Err(CoreError::PositionExists { token: this, id });
            }
            token.owners.insert(id, to);
            frame.emit(Event::PositionTransfer { from: Address::ZERO, to, id });
            notify_vaults(frame, caller, Address::ZERO, to, id)?;
            Ok(ReturnData::Empty)
        }
        PositionTokenCall::Burn { id } => {
            let token = ledger(frame)?;
            if caller != token.minter() {
                return Err(CoreError::NotMinter { caller, token: this });
            }
            let owner = existing_owner(token, this, id)?;
            token.owners.remove(&id);
            token.approvals.remove(&id);
            frame.emit(Event::PositionTransfer { from: owner, to: Address::ZERO, id });
            notify_vaults(frame, caller, owner, Address::ZERO, id)?;
            Ok(ReturnData::Empty)
        }
        PositionTokenCall::TransferFrom { from, to, id } |
        PositionTokenCall::SafeTransferFrom { from, to, id } => {
            transfer(frame, from, to, id)?;
            Ok(ReturnData::Empty)
        }
        PositionTokenCall::Approve { to, id } => {
            let token = ledger(frame)?;
            let owner = existing_owner(token, this, id)?;
            if owner != caller {
                return Err(CoreError::NotApprovedForPosition { caller, token: this, id });
            }
            if to.is_zero() {
                token.approvals.remove(&id);
            } else {
                token.approvals.insert(id, to);
            }
            frame.emit(Event::PositionApproval { owner, approved: to, id });
            Ok(ReturnData::Empty)
        }
        PositionTokenCall::OwnerOf(id) => {
            let token = ledger(frame)?;
            existing_owner(token, this, id).map(ReturnData::Address)
        }
        PositionTokenCall::GetApproved(id) => {
            let token = ledger(frame)?;
            existing_owner(token, this, id)?;
            Ok(ReturnData::Address(token.approved(id).unwrap_or_default()))
        }
    }
}
