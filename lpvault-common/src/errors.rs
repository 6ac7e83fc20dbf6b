use alloy_primitives::{Address, U256};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::models::{Platform, PositionId, StrategyId};

/// Coarse classification of every [`CoreError`].
///
/// Callers that only care about *why* something was refused (e.g. an automation service
/// deciding whether a retry makes sense) should match on this instead of the concrete
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The caller lacks the required capability (owner, admin, authorized executor).
    Authorization,
    /// Unknown vault, strategy id, adapter, platform or position.
    NotFound,
    /// Duplicate registration, paused component or re-entrant call.
    StateConflict,
    /// Malformed input: empty names, mismatched arrays, zero addresses, missing funds.
    Validation,
    /// A delegated call (adapter, strategy, contract) failed or reported failure.
    DelegateFailure,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("{caller} is not authorized to {action} on {target}")]
    NotAuthorized { caller: Address, target: Address, action: &'static str },
    #[error("{caller} is not the owner of {target}")]
    NotOwner { caller: Address, target: Address },
    #[error("{caller} is not the admin of {target}")]
    NotAdmin { caller: Address, target: Address },
    #[error("{caller} does not own position {position_id}")]
    NotPositionOwner { caller: Address, position_id: PositionId },
    #[error("{caller} is not the minter of position token {token}")]
    NotMinter { caller: Address, token: Address },
    #[error("{caller} may not move position {id} of {token}")]
    NotApprovedForPosition { caller: Address, token: Address, id: PositionId },
    #[error("Strategy {0} is not approved")]
    StrategyNotApproved(StrategyId),

    #[error("No code deployed at {address}, cannot handle {call}")]
    NoCode { address: Address, call: String },
    #[error("Vault not found: {0}")]
    VaultNotFound(Address),
    #[error("Strategy not found: {0}")]
    StrategyNotFound(StrategyId),
    #[error("Strategy address {0} is not registered under any id")]
    StrategyAddressNotRegistered(Address),
    #[error("No adapter registered for platform {0}")]
    AdapterNotFound(Platform),
    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),
    #[error("Position {id} of {token} is not managed by this vault")]
    PositionNotManaged { token: Address, id: PositionId },
    #[error("Position {id} of {token} does not exist")]
    NonexistentPosition { token: Address, id: PositionId },

    #[error("Strategy id already registered: {0}")]
    StrategyAlreadyRegistered(StrategyId),
    #[error("Adapter already registered for platform {0}")]
    AdapterAlreadyRegistered(Platform),
    #[error("Position already recorded: {0}")]
    PositionAlreadyRecorded(PositionId),
    #[error("Position {id} of {token} already exists")]
    PositionExists { token: Address, id: PositionId },
    #[error("{0} is paused")]
    Paused(Address),
    #[error("Re-entrant call into {0}")]
    Reentrancy(Address),

    #[error("Name must not be empty")]
    EmptyName,
    #[error("Array length mismatch: {0}")]
    LengthMismatch(String),
    #[error("Zero address not allowed for {0}")]
    ZeroAddress(&'static str),
    #[error("Insufficient value: required {required}, supplied {supplied}")]
    InsufficientValue { required: U256, supplied: U256 },
    #[error("Insufficient balance of {token} for {account}: required {required}, available {available}")]
    InsufficientBalance { token: Address, account: Address, required: U256, available: U256 },
    #[error("Insufficient allowance of {token} from {owner} to {spender}: required {required}, available {available}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        required: U256,
        available: U256,
    },
    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
    #[error("Deadline {deadline} expired at {timestamp}")]
    DeadlineExpired { deadline: u64, timestamp: u64 },
    #[error("{address} does not implement the {capability} capability")]
    MissingCapability { address: Address, capability: &'static str },
    #[error("Capability probe on {address} failed: {reason}")]
    CapabilityProbeFailed { address: Address, reason: String },
    #[error("{target} does not support {call}")]
    UnsupportedCall { target: Address, call: String },
    #[error("Unexpected return data, expected {0}")]
    UnexpectedReturn(&'static str),
    #[error("{0} changes state and cannot be viewed")]
    NotReadOnly(String),

    #[error("Delegate failure: {0}")]
    DelegateFailure(String),
    #[error("Strategy {id} is not compatible with position {position_id}")]
    StrategyIncompatible { id: StrategyId, position_id: PositionId },
    #[error("Strategy {0} reported an unsuccessful execution")]
    StrategyExecutionFailed(StrategyId),
    #[error("Call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),
    #[error("Batch call {index} to {target} failed: {source}")]
    BatchCallFailed {
        index: usize,
        target: Address,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        use CoreError::*;
        match self {
            NotAuthorized { .. } |
            NotOwner { .. } |
            NotAdmin { .. } |
            NotPositionOwner { .. } |
            NotMinter { .. } |
            NotApprovedForPosition { .. } |
            StrategyNotApproved(_) => ErrorKind::Authorization,
            NoCode { .. } |
            VaultNotFound(_) |
            StrategyNotFound(_) |
            StrategyAddressNotRegistered(_) |
            AdapterNotFound(_) |
            PositionNotFound(_) |
            PositionNotManaged { .. } |
            NonexistentPosition { .. } => ErrorKind::NotFound,
            StrategyAlreadyRegistered(_) |
            AdapterAlreadyRegistered(_) |
            PositionAlreadyRecorded(_) |
            PositionExists { .. } |
            Paused(_) |
            Reentrancy(_) => ErrorKind::StateConflict,
            EmptyName |
            LengthMismatch(_) |
            ZeroAddress(_) |
            InsufficientValue { .. } |
            InsufficientBalance { .. } |
            InsufficientAllowance { .. } |
            InvalidParameter { .. } |
            DeadlineExpired { .. } |
            MissingCapability { .. } |
            CapabilityProbeFailed { .. } |
            UnsupportedCall { .. } |
            UnexpectedReturn(_) |
            NotReadOnly(_) => ErrorKind::Validation,
            DelegateFailure(_) |
            StrategyIncompatible { .. } |
            StrategyExecutionFailed(_) |
            CallDepthExceeded(_) |
            BatchCallFailed { .. } => ErrorKind::DelegateFailure,
        }
    }

    /// Follows `BatchCallFailed` wrappers down to the error that actually aborted the call.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            CoreError::BatchCallFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn invalid_parameter(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidParameter { field, reason: reason.into() }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::not_owner(
        CoreError::NotOwner { caller: Address::ZERO, target: Address::ZERO },
        ErrorKind::Authorization
    )]
    #[case::unknown_platform(CoreError::AdapterNotFound("uniswap_v3".into()), ErrorKind::NotFound)]
    #[case::duplicate(CoreError::AdapterAlreadyRegistered("uniswap_v3".into()), ErrorKind::StateConflict)]
    #[case::reentrancy(CoreError::Reentrancy(Address::ZERO), ErrorKind::StateConflict)]
    #[case::empty_name(CoreError::EmptyName, ErrorKind::Validation)]
    #[case::probe(
        CoreError::CapabilityProbeFailed { address: Address::ZERO, reason: "zero factory".into() },
        ErrorKind::Validation
    )]
    #[case::strategy_failed(CoreError::StrategyExecutionFailed("s".into()), ErrorKind::DelegateFailure)]
    fn test_error_kind(#[case] error: CoreError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_root_cause_unwraps_nested_batches() {
        let inner = CoreError::PositionNotManaged { token: Address::ZERO, id: U256::from(7) };
        let wrapped = CoreError::BatchCallFailed {
            index: 1,
            target: Address::repeat_byte(1),
            source: Box::new(CoreError::BatchCallFailed {
                index: 0,
                target: Address::repeat_byte(2),
                source: Box::new(inner.clone()),
            }),
        };

        assert_eq!(wrapped.kind(), ErrorKind::DelegateFailure);
        assert_eq!(wrapped.root_cause(), &inner);
        assert_eq!(wrapped.root_cause().kind(), ErrorKind::NotFound);
    }
}
