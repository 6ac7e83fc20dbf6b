//! Atomic multi-call execution.
//!
//! [`run_calls`] is shared by the standalone batch executor and by vault execution: entries
//! run in order and the first failure aborts the whole batch. Because the failing entry's
//! error propagates out of the calling frame, every entry executed before it is rolled back
//! with it.

use alloy_primitives::{Address, U256};
use lpvault_common::{
    calls::{BatchCall, BatchOutcome},
    events::Event,
    traits::Host,
    Call, CoreError, ReturnData,
};
use tracing::debug;

use crate::chain::frame::Frame;

/// Stateless apart from the flag rejecting re-entrant batches.
#[derive(Debug, Clone, Default)]
pub struct BatchExecutor {
    executing: bool,
}

pub(crate) fn validate_batch(targets: &[Address], payloads: &[Call]) -> Result<(), CoreError> {
    if targets.len() != payloads.len() {
        return Err(CoreError::LengthMismatch(format!(
            "{} targets, {} payloads",
            targets.len(),
            payloads.len()
        )));
    }
    if targets.iter().any(|target| target.is_zero()) {
        return Err(CoreError::ZeroAddress("target"));
    }
    Ok(())
}

/// Executes every `(target, payload, value)` entry from the current frame.
pub(crate) fn run_calls(
    frame: &mut Frame<'_>,
    targets: Vec<Address>,
    payloads: Vec<Call>,
    values: Vec<U256>,
) -> Result<BatchOutcome, CoreError> {
    let mut outcome = BatchOutcome {
        successes: Vec::with_capacity(targets.len()),
        results: Vec::with_capacity(targets.len()),
    };
    let values = values
        .into_iter()
        .chain(std::iter::repeat(U256::ZERO));
    for (index, ((target, payload), value)) in targets
        .into_iter()
        .zip(payloads)
        .zip(values)
        .enumerate()
    {
        let result = frame
            .call_with_value(target, payload, value)
            .map_err(|source| CoreError::BatchCallFailed { index, target, source: Box::new(source) })?;
        frame.emit(Event::BatchCallExecuted { index, target, success: true });
        outcome.successes.push(true);
        outcome.results.push(result);
    }
    Ok(outcome)
}

fn executor<'a>(frame: &'a mut Frame<'_>) -> Result<&'a mut BatchExecutor, CoreError> {
    let this = frame.address();
    frame
        .world_mut()
        .batch_executor_mut(this)
        .ok_or(CoreError::NoCode { address: this, call: "batch".to_string() })
}

pub(crate) fn handle(frame: &mut Frame<'_>, call: BatchCall) -> Result<ReturnData, CoreError> {
    let BatchCall::ExecuteBatch { targets, payloads, values } = call;
    let this = frame.address();
    let caller = frame.caller();
    let supplied = frame.value();

    if executor(frame)?.executing {
        return Err(CoreError::Reentrancy(this));
    }
    validate_batch(&targets, &payloads)?;
    if values.len() != targets.len() {
        return Err(CoreError::LengthMismatch(format!(
            "{} targets, {} values",
            targets.len(),
            values.len()
        )));
    }
    let required = values
        .iter()
        .try_fold(U256::ZERO, |acc, v| acc.checked_add(*v))
        .ok_or(CoreError::InsufficientValue { required: U256::MAX, supplied })?;
    if required > supplied {
        return Err(CoreError::InsufficientValue { required, supplied });
    }

    let calls = targets.len();
    debug!(executor = %this, %caller, calls, "Executing batch");
    executor(frame)?.executing = true;
    let outcome = run_calls(frame, targets, payloads, values)?;
    executor(frame)?.executing = false;

    let refunded = supplied - required;
    if !refunded.is_zero() {
        frame.call_with_value(caller, Call::Transfer, refunded)?;
    }
    frame.emit(Event::BatchExecuted { calls, value_used: required, refunded });
    Ok(ReturnData::Batch(outcome))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use alloy_primitives::Bytes;
    use lpvault_common::{calls::TokenCall, ErrorKind};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{
        chain::{clock::ManualClock, Chain, Transaction},
        testing::{Counter, Reenterer},
    };

    struct Setup {
        chain: Chain,
        executor: Address,
        counter: Address,
        token: Address,
        alice: Address,
    }

    fn setup() -> Setup {
        let mut chain = Chain::with_clock(ManualClock::new(0));
        let executor = chain.deploy_batch_executor();
        let counter = chain.deploy_contract(Arc::new(Counter));
        let token = chain.deploy_token("USDC", 6);
        let alice = Address::repeat_byte(0xa1);
        chain
            .deal(token, executor, U256::from(100))
            .unwrap();
        chain.deal_native(alice, U256::from(1_000));
        Setup { chain, executor, counter, token, alice }
    }

    fn inc() -> Call {
        Call::Raw(Bytes::from_static(b"inc"))
    }

    #[test_log::test]
    fn test_batch_refunds_unused_value() {
        let Setup { mut chain, executor, counter, alice, .. } = setup();
        let bob = Address::repeat_byte(0xb0);

        let outcome = chain
            .transact(
                Transaction::new(
                    alice,
                    executor,
                    BatchCall::ExecuteBatch {
                        targets: vec![counter, bob],
                        payloads: vec![inc(), Call::Transfer],
                        values: vec![U256::ZERO, U256::from(60)],
                    },
                )
                .with_value(U256::from(100)),
            )
            .and_then(ReturnData::into_batch)
            .unwrap();

        assert_eq!(outcome.successes, vec![true, true]);
        assert_eq!(chain.native_balance(bob), U256::from(60));
        assert_eq!(chain.native_balance(alice), U256::from(940));
        assert_eq!(chain.native_balance(executor), U256::ZERO);
        assert_eq!(
            chain.logs().last().map(|l| l.event.clone()),
            Some(Event::BatchExecuted { calls: 2, value_used: U256::from(60), refunded: U256::from(40) })
        );
    }

    #[rstest]
    #[case::first_fails(0)]
    #[case::middle_fails(1)]
    #[case::last_fails(2)]
    fn test_failure_rolls_back_every_entry(#[case] failing: usize) {
        let Setup { mut chain, executor, counter, token, alice } = setup();
        let bob = Address::repeat_byte(0xb0);
        let mut payloads = vec![
            inc(),
            TokenCall::Transfer { to: bob, amount: U256::from(10) }.into(),
            inc(),
        ];
        let mut targets = vec![counter, token, counter];
        payloads[failing] = Call::Raw(Bytes::from_static(b"fail"));
        targets[failing] = counter;

        let err = chain
            .call(
                alice,
                executor,
                BatchCall::ExecuteBatch { targets, payloads, values: vec![U256::ZERO; 3] },
            )
            .unwrap_err();

        assert!(matches!(err, CoreError::BatchCallFailed { index, .. } if index == failing));
        assert_eq!(err.root_cause().kind(), ErrorKind::DelegateFailure);
        assert_eq!(chain.balance_of(token, bob), U256::ZERO);
        assert_eq!(Counter::count(&chain, counter), U256::ZERO);
        assert!(chain.logs().is_empty());
    }

    #[rstest]
    #[case::length_mismatch(vec![Address::repeat_byte(1)], vec![], vec![])]
    #[case::zero_target(vec![Address::ZERO], vec![Call::Transfer], vec![U256::ZERO])]
    #[case::value_mismatch(vec![Address::repeat_byte(1)], vec![Call::Transfer], vec![])]
    #[case::insufficient_value(
        vec![Address::repeat_byte(1)],
        vec![Call::Transfer],
        vec![U256::from(1)]
    )]
    fn test_invalid_batches(
        #[case] targets: Vec<Address>,
        #[case] payloads: Vec<Call>,
        #[case] values: Vec<U256>,
    ) {
        let Setup { mut chain, executor, alice, .. } = setup();

        let err = chain
            .call(alice, executor, BatchCall::ExecuteBatch { targets, payloads, values })
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_reentrant_batch_is_rejected() {
        let Setup { mut chain, executor, alice, .. } = setup();
        let reenter = chain.deploy_contract(Arc::new(Reenterer::new(
            executor,
            BatchCall::ExecuteBatch { targets: vec![], payloads: vec![], values: vec![] }.into(),
        )));

        let err = chain
            .call(
                alice,
                executor,
                BatchCall::ExecuteBatch {
                    targets: vec![reenter],
                    payloads: vec![Call::Raw(Bytes::new())],
                    values: vec![U256::ZERO],
                },
            )
            .unwrap_err();

        assert_eq!(err.root_cause(), &CoreError::Reentrancy(executor));
        assert_eq!(err.root_cause().kind(), ErrorKind::StateConflict);
    }
}
