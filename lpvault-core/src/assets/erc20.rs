use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use lpvault_common::{calls::TokenCall, events::Event, traits::Host, CoreError, ReturnData};

use crate::chain::frame::Frame;

/// Ledger of a fungible token. An allowance of `U256::MAX` is never decremented.
#[derive(Debug, Clone, Default)]
pub struct FungibleToken {
    symbol: String,
    decimals: u8,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl FungibleToken {
    pub fn new(symbol: &str, decimals: u8) -> Self {
        Self { symbol: symbol.to_string(), decimals, ..Default::default() }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub(crate) fn mint(&mut self, to: Address, amount: U256) {
        self.total_supply = self.total_supply.saturating_add(amount);
        let balance = self.balances.entry(to).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn move_balance(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), CoreError> {
        if to.is_zero() {
            return Err(CoreError::ZeroAddress("recipient"));
        }
        let available = self.balance_of(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(CoreError::InsufficientBalance {
                token,
                account: from,
                required: amount,
                available,
            })?;
        self.balances.insert(from, remaining);
        *self.balances.entry(to).or_default() += amount;
        Ok(())
    }

    fn spend_allowance(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), CoreError> {
        let available = self.allowance(owner, spender);
        if available == U256::MAX {
            return Ok(());
        }
        let remaining = available
            .checked_sub(amount)
            .ok_or(CoreError::InsufficientAllowance {
                token,
                owner,
                spender,
                required: amount,
                available,
            })?;
        self.allowances
            .insert((owner, spender), remaining);
        Ok(())
    }
}

fn ledger<'a>(frame: &'a mut Frame<'_>) -> Result<&'a mut FungibleToken, CoreError> {
    let this = frame.address();
    frame
        .world_mut()
        .token_mut(this)
        .ok_or(CoreError::NoCode { address: this, call: "token".to_string() })
}

pub(crate) fn handle(frame: &mut Frame<'_>, call: TokenCall) -> Result<ReturnData, CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    match call {
        TokenCall::Transfer { to, amount } => {
            ledger(frame)?.move_balance(this, caller, to, amount)?;
            frame.emit(Event::Transfer { from: caller, to, amount });
            Ok(ReturnData::Bool(true))
        }
        TokenCall::TransferFrom { from, to, amount } => {
            let token = ledger(frame)?;
            if from != caller {
                token.spend_allowance(this, from, caller, amount)?;
            }
            token.move_balance(this, from, to, amount)?;
            frame.emit(Event::Transfer { from, to, amount });
            Ok(ReturnData::Bool(true))
        }
        TokenCall::Approve { spender, amount } => {
            if spender.is_zero() {
                return Err(CoreError::ZeroAddress("spender"));
            }
            ledger(frame)?
                .allowances
                .insert((caller, spender), amount);
            frame.emit(Event::Approval { owner: caller, spender, amount });
            Ok(ReturnData::Bool(true))
        }
        TokenCall::BalanceOf(account) => Ok(ReturnData::Amount(ledger(frame)?.balance_of(account))),
        TokenCall::Allowance { owner, spender } => {
            Ok(ReturnData::Amount(ledger(frame)?.allowance(owner, spender)))
        }
        TokenCall::TotalSupply => Ok(ReturnData::Amount(ledger(frame)?.total_supply())),
        TokenCall::Symbol => Ok(ReturnData::Text(ledger(frame)?.symbol().to_string())),
        TokenCall::Decimals => Ok(ReturnData::Amount(U256::from(ledger(frame)?.decimals()))),
    }
}
