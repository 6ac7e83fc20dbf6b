//! Typed call messages and their return values.
//!
//! Every interaction with something deployed on the chain is a [`Call`] sent to an address.
//! Built-in components understand their own sub-enum; external contracts receive
//! [`Call::Raw`] payloads.

use alloy_primitives::{Address, Bytes, U256};
use strum_macros::IntoStaticStr;

use crate::{
    errors::CoreError,
    models::{
        liquidity::{
            AddLiquidityParams, ClosePositionParams, CollectFeesParams, CreatePositionParams,
            PositionOutcome, PositionView, RemoveLiquidityParams, TokenAmounts,
        },
        parameters::{
            AdaptiveParameters, FeeParameters, OracleParameters, RangeParameters, RiskParameters,
            StrategyParameters, Template,
        },
        ManagedPosition, Platform, PositionId, StrategyId, StrategyInfo, VaultInfo, VaultStatus,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Call {
    /// Plain native value transfer, carries no payload.
    Transfer,
    Token(TokenCall),
    PositionToken(PositionTokenCall),
    Batch(BatchCall),
    Vault(VaultCall),
    Factory(FactoryCall),
    Registry(RegistryCall),
    Manager(ManagerCall),
    Parameters(ParameterCall),
    /// Opaque payload for external contracts.
    Raw(Bytes),
}

impl Call {
    /// Human readable name used in logs and errors, e.g. `vault.execute`.
    pub fn name(&self) -> String {
        let component: &'static str = self.into();
        let operation: Option<&'static str> = match self {
            Call::Transfer | Call::Raw(_) => None,
            Call::Token(c) => Some(c.into()),
            Call::PositionToken(c) => Some(c.into()),
            Call::Batch(c) => Some(c.into()),
            Call::Vault(c) => Some(c.into()),
            Call::Factory(c) => Some(c.into()),
            Call::Registry(c) => Some(c.into()),
            Call::Manager(c) => Some(c.into()),
            Call::Parameters(c) => Some(c.into()),
        };
        match operation {
            Some(op) => format!("{component}.{op}"),
            None => component.to_string(),
        }
    }

    /// Calls that never change state. Issuing them through `Chain::view` is always safe.
    pub fn is_read_only(&self) -> bool {
        match self {
            Call::Token(c) => matches!(
                c,
                TokenCall::BalanceOf(_) |
                    TokenCall::Allowance { .. } |
                    TokenCall::TotalSupply |
                    TokenCall::Symbol |
                    TokenCall::Decimals
            ),
            Call::PositionToken(c) => {
                matches!(c, PositionTokenCall::OwnerOf(_) | PositionTokenCall::GetApproved(_))
            }
            Call::Vault(c) => matches!(
                c,
                VaultCall::Owner |
                    VaultCall::IsAuthorized(_) |
                    VaultCall::AuthorizedAccounts |
                    VaultCall::ManagedPositions |
                    VaultCall::IsManaged { .. } |
                    VaultCall::Status
            ),
            Call::Factory(c) => matches!(
                c,
                FactoryCall::GetVaults(_) |
                    FactoryCall::GetVaultInfo(_) |
                    FactoryCall::IsVault(_) |
                    FactoryCall::GetWhitelistedStrategies |
                    FactoryCall::IsStrategyWhitelisted(_) |
                    FactoryCall::GetTotalVaultCount |
                    FactoryCall::Admin
            ),
            Call::Registry(c) => matches!(
                c,
                RegistryCall::SimulateStrategy { .. } |
                    RegistryCall::GetStrategyInfo(_) |
                    RegistryCall::IsStrategyRegistered(_) |
                    RegistryCall::IsStrategyApproved(_) |
                    RegistryCall::GetStrategyIds |
                    RegistryCall::IsPaused |
                    RegistryCall::Admin
            ),
            Call::Manager(c) => matches!(
                c,
                ManagerCall::GetPosition(_) |
                    ManagerCall::IsAdapterRegistered(_) |
                    ManagerCall::GetAdapter(_) |
                    ManagerCall::GetPlatforms |
                    ManagerCall::IsPaused |
                    ManagerCall::Admin
            ),
            Call::Parameters(c) => matches!(
                c,
                ParameterCall::GetAllParameters(_) |
                    ParameterCall::GetRangeParameters(_) |
                    ParameterCall::GetFeeParameters(_) |
                    ParameterCall::GetRiskParameters(_) |
                    ParameterCall::GetAdaptiveParameters(_) |
                    ParameterCall::GetOracleParameters(_) |
                    ParameterCall::GetSelectedTemplate(_) |
                    ParameterCall::GetCustomizationBitmap(_) |
                    ParameterCall::GetTemplateDefaults(_)
            ),
            Call::Transfer | Call::Batch(_) | Call::Raw(_) => false,
        }
    }
}

macro_rules! impl_from_call {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Call {
                fn from(call: $ty) -> Self {
                    Call::$variant(call)
                }
            }
        )*
    };
}

impl_from_call!(
    Token(TokenCall),
    PositionToken(PositionTokenCall),
    Batch(BatchCall),
    Vault(VaultCall),
    Factory(FactoryCall),
    Registry(RegistryCall),
    Manager(ManagerCall),
    Parameters(ParameterCall),
    Raw(Bytes),
);

/// Fungible token ledger.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum TokenCall {
    Transfer { to: Address, amount: U256 },
    TransferFrom { from: Address, to: Address, amount: U256 },
    Approve { spender: Address, amount: U256 },
    BalanceOf(Address),
    Allowance { owner: Address, spender: Address },
    TotalSupply,
    Symbol,
    Decimals,
}

/// Non-fungible position token ledger.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum PositionTokenCall {
    /// Minter only. Notifies the recipient if it is a vault.
    Mint { to: Address, id: PositionId },
    /// Minter only. Notifies the holder if it is a vault.
    Burn { id: PositionId },
    /// Notifies sender and recipient if they are vaults.
    TransferFrom { from: Address, to: Address, id: PositionId },
    /// Same effect as `TransferFrom`.
    SafeTransferFrom { from: Address, to: Address, id: PositionId },
    Approve { to: Address, id: PositionId },
    OwnerOf(PositionId),
    GetApproved(PositionId),
}

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum BatchCall {
    ExecuteBatch { targets: Vec<Address>, payloads: Vec<Call>, values: Vec<U256> },
}

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum VaultCall {
    Execute { targets: Vec<Address>, payloads: Vec<Call> },
    SetStrategyAuthorization { account: Address, authorized: bool },
    WithdrawTokens { token: Address, to: Address, amount: U256 },
    WithdrawPosition { token: Address, id: PositionId, to: Address },
    /// Receipt hook, only accepted from the position token that moved `id`.
    OnPositionReceived { operator: Address, from: Address, id: PositionId },
    /// Departure hook, only accepted from the position token once `id` left the vault.
    OnPositionReleased { to: Address, id: PositionId },
    Owner,
    IsAuthorized(Address),
    AuthorizedAccounts,
    ManagedPositions,
    IsManaged { token: Address, id: PositionId },
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum FactoryCall {
    CreateVault { name: String },
    UpdateVaultName { vault: Address, name: String },
    SetStrategyWhitelisting { strategy: Address, whitelisted: bool },
    TransferAdmin(Address),
    GetVaults(Address),
    GetVaultInfo(Address),
    IsVault(Address),
    GetWhitelistedStrategies,
    IsStrategyWhitelisted(Address),
    GetTotalVaultCount,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum RegistryCall {
    RegisterStrategy { id: StrategyId, strategy: Address, approved: bool },
    UpdateStrategy { id: StrategyId, strategy: Address },
    SetStrategyApproval { strategy: Address, approved: bool },
    ExecuteStrategy { id: StrategyId, position_id: PositionId, params: Bytes },
    SimulateStrategy { id: StrategyId, position_id: PositionId, params: Bytes },
    Pause,
    Unpause,
    TransferAdmin(Address),
    GetStrategyInfo(StrategyId),
    IsStrategyRegistered(StrategyId),
    IsStrategyApproved(StrategyId),
    GetStrategyIds,
    IsPaused,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ManagerCall {
    RegisterAdapter { platform: Platform, adapter: Address },
    UpdateAdapter { platform: Platform, adapter: Address },
    RemoveAdapter(Platform),
    CreatePosition(CreatePositionParams),
    AddLiquidity(AddLiquidityParams),
    RemoveLiquidity(RemoveLiquidityParams),
    CollectFees(CollectFeesParams),
    ClosePosition(ClosePositionParams),
    Pause,
    Unpause,
    TransferAdmin(Address),
    GetPosition(PositionId),
    IsAdapterRegistered(Platform),
    GetAdapter(Platform),
    GetPlatforms,
    IsPaused,
    Admin,
}

/// Setters act on the caller's own parameters, getters take the user to resolve for.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ParameterCall {
    SelectTemplate(Template),
    SetRangeParameters(RangeParameters),
    SetFeeParameters(FeeParameters),
    SetRiskParameters(RiskParameters),
    SetAdaptiveParameters(AdaptiveParameters),
    SetOracleParameters(OracleParameters),
    ResetToTemplate,
    ResetAll,
    GetAllParameters(Address),
    GetRangeParameters(Address),
    GetFeeParameters(Address),
    GetRiskParameters(Address),
    GetAdaptiveParameters(Address),
    GetOracleParameters(Address),
    GetSelectedTemplate(Address),
    GetCustomizationBitmap(Address),
    GetTemplateDefaults(Template),
}

/// Per-entry outcome of a batch. All entries succeeded if the batch returned at all, the
/// `successes` vector is kept for callers that inspect it positionally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub successes: Vec<bool>,
    pub results: Vec<ReturnData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReturnData {
    #[default]
    Empty,
    Bool(bool),
    Amount(U256),
    Address(Address),
    Addresses(Vec<Address>),
    Bytes(Bytes),
    Text(String),
    Strings(Vec<String>),
    Batch(BatchOutcome),
    VaultInfo(VaultInfo),
    IsVault { is_vault: bool, owner: Address },
    VaultStatus(VaultStatus),
    ManagedPositions(Vec<ManagedPosition>),
    StrategyInfo(StrategyInfo),
    Position(PositionOutcome),
    Amounts(TokenAmounts),
    PositionView(Box<PositionView>),
    Parameters(Box<StrategyParameters>),
    Range(RangeParameters),
    Fee(FeeParameters),
    Risk(RiskParameters),
    Adaptive(AdaptiveParameters),
    Oracle(OracleParameters),
    Template(Template),
    Bitmap(u32),
}

macro_rules! accessors {
    ($($fn_name:ident => $variant:ident($ty:ty)),* $(,)?) => {
        $(
            pub fn $fn_name(self) -> Result<$ty, CoreError> {
                match self {
                    ReturnData::$variant(value) => Ok(value),
                    _ => Err(CoreError::UnexpectedReturn(stringify!($variant))),
                }
            }
        )*
    };
}

impl ReturnData {
    accessors!(
        into_bool => Bool(bool),
        into_amount => Amount(U256),
        into_address => Address(Address),
        into_addresses => Addresses(Vec<Address>),
        into_bytes => Bytes(Bytes),
        into_text => Text(String),
        into_strings => Strings(Vec<String>),
        into_batch => Batch(BatchOutcome),
        into_vault_info => VaultInfo(VaultInfo),
        into_vault_status => VaultStatus(VaultStatus),
        into_managed_positions => ManagedPositions(Vec<ManagedPosition>),
        into_strategy_info => StrategyInfo(StrategyInfo),
        into_position => Position(PositionOutcome),
        into_amounts => Amounts(TokenAmounts),
        into_position_view => PositionView(Box<PositionView>),
        into_parameters => Parameters(Box<StrategyParameters>),
        into_range => Range(RangeParameters),
        into_fee => Fee(FeeParameters),
        into_risk => Risk(RiskParameters),
        into_adaptive => Adaptive(AdaptiveParameters),
        into_oracle => Oracle(OracleParameters),
        into_template => Template(Template),
        into_bitmap => Bitmap(u32),
    );

    pub fn into_is_vault(self) -> Result<(bool, Address), CoreError> {
        match self {
            ReturnData::IsVault { is_vault, owner } => Ok((is_vault, owner)),
            _ => Err(CoreError::UnexpectedReturn("IsVault")),
        }
    }

    pub fn into_empty(self) -> Result<(), CoreError> {
        match self {
            ReturnData::Empty => Ok(()),
            _ => Err(CoreError::UnexpectedReturn("Empty")),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain_transfer(Call::Transfer, "transfer")]
    #[case::vault(
        VaultCall::Execute { targets: vec![], payloads: vec![] }.into(),
        "vault.execute"
    )]
    #[case::manager(ManagerCall::GetPlatforms.into(), "manager.getPlatforms")]
    #[case::parameters(ParameterCall::ResetAll.into(), "parameters.resetAll")]
    #[case::raw(Call::Raw(Bytes::from_static(b"inc")), "raw")]
    fn test_call_name(#[case] call: Call, #[case] expected: &str) {
        assert_eq!(call.name(), expected);
    }

    #[test]
    fn test_read_only_classification() {
        assert!(Call::from(FactoryCall::IsVault(Address::ZERO)).is_read_only());
        assert!(Call::from(RegistryCall::SimulateStrategy {
            id: "s".into(),
            position_id: U256::from(1),
            params: Bytes::new(),
        })
        .is_read_only());
        assert!(!Call::from(FactoryCall::CreateVault { name: "A".into() }).is_read_only());
        assert!(!Call::Raw(Bytes::new()).is_read_only());
    }

    #[test]
    fn test_accessor_mismatch() {
        assert_eq!(ReturnData::Bool(true).into_bool(), Ok(true));
        assert_eq!(ReturnData::Empty.into_amount(), Err(CoreError::UnexpectedReturn("Amount")));
        assert_eq!(
            ReturnData::IsVault { is_vault: true, owner: Address::repeat_byte(3) }.into_is_vault(),
            Ok((true, Address::repeat_byte(3)))
        );
    }
}
