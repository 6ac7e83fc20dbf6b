//! Flows spanning several components.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use lpvault_common::{
    calls::{
        FactoryCall, ManagerCall, PositionTokenCall, RegistryCall, TokenCall, VaultCall,
    },
    events::Event,
    models::{
        liquidity::{AddLiquidityParams, TokenAmounts},
        ManagedPosition,
    },
    Call, CoreError, ErrorKind, ReturnData,
};
use lpvault_core::testing::{Counter, Fixture, ScriptedStrategy};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn test_vault_without_whitelist() {
    let mut fx = Fixture::new();

    let vault = fx.create_vault(fx.alice, "A");

    let vaults = fx
        .chain
        .view(fx.bob, fx.deployment.factory, FactoryCall::GetVaults(fx.alice))
        .and_then(ReturnData::into_addresses)
        .unwrap();
    let is_vault = fx
        .chain
        .view(fx.bob, fx.deployment.factory, FactoryCall::IsVault(vault))
        .and_then(ReturnData::into_is_vault)
        .unwrap();
    let authorized = fx
        .chain
        .view(fx.bob, vault, VaultCall::AuthorizedAccounts)
        .and_then(ReturnData::into_addresses)
        .unwrap();
    assert_eq!(vaults, vec![vault]);
    assert_eq!(is_vault, (true, fx.alice));
    assert!(authorized.is_empty());
}

#[test]
fn test_whitelisted_strategy_is_authorized_on_new_vault() {
    let mut fx = Fixture::new();
    let strategy = Address::repeat_byte(0x5);
    fx.chain
        .call(
            fx.admin,
            fx.deployment.factory,
            FactoryCall::SetStrategyWhitelisting { strategy, whitelisted: true },
        )
        .unwrap();

    let vault = fx.create_vault(fx.alice, "B");

    let authorized = fx
        .chain
        .view(fx.bob, vault, VaultCall::IsAuthorized(strategy))
        .and_then(ReturnData::into_bool)
        .unwrap();
    assert!(authorized);
}

#[test]
fn test_position_through_registered_platform() {
    let mut fx = Fixture::new();
    let manager = fx.deployment.manager;
    fx.fund_and_approve(fx.alice, manager, 1_000);
    fx.fund_and_approve(fx.bob, manager, 1_000);

    let outcome = fx
        .chain
        .call(fx.alice, manager, ManagerCall::CreatePosition(fx.create_params(500, 500)))
        .and_then(ReturnData::into_position)
        .unwrap();
    let view = fx
        .chain
        .view(fx.bob, manager, ManagerCall::GetPosition(outcome.position_id))
        .and_then(ReturnData::into_position_view)
        .unwrap();
    let err = fx
        .chain
        .call(
            fx.bob,
            manager,
            ManagerCall::AddLiquidity(AddLiquidityParams {
                position_id: outcome.position_id,
                desired: TokenAmounts::new(U256::from(10), U256::from(10)),
                min: TokenAmounts::ZERO,
                deadline: 0,
            }),
        )
        .unwrap_err();

    assert_eq!(view.platform, fx.platform);
    assert_eq!(view.owner, fx.alice);
    assert_eq!(view.adapter, fx.adapter);
    assert_eq!(view.details.liquidity, 500);
    assert_eq!(view.details.token0, fx.token0);
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(fx.chain.balance_of(fx.token0, fx.bob), U256::from(1_000));
}

/// Two token transfers out of the vault and a counter bump, with entry `failing` replaced by
/// a call that errors.
#[rstest]
#[case::nothing_ran(0)]
#[case::one_transfer_ran(1)]
#[case::both_transfers_ran(2)]
#[case::everything_but_last_ran(3)]
fn test_vault_batch_failure_restores_everything(#[case] failing: usize) {
    let mut fx = Fixture::new();
    let vault = fx.create_vault(fx.alice, "A");
    let counter = fx.chain.deploy_contract(Arc::new(Counter));
    fx.chain
        .deal(fx.token0, vault, U256::from(100))
        .unwrap();
    fx.chain
        .call(fx.adapter, fx.position_token, PositionTokenCall::Mint { to: vault, id: U256::from(9) })
        .unwrap();
    let mut targets = vec![fx.token0, fx.token0, counter, fx.position_token];
    let mut payloads: Vec<Call> = vec![
        TokenCall::Transfer { to: fx.bob, amount: U256::from(30) }.into(),
        TokenCall::Transfer { to: fx.bob, amount: U256::from(20) }.into(),
        Call::Raw(Bytes::from_static(b"inc")),
        PositionTokenCall::TransferFrom { from: vault, to: fx.bob, id: U256::from(9) }.into(),
    ];
    targets[failing] = counter;
    payloads[failing] = Call::Raw(Bytes::from_static(b"fail"));
    let logs_before = fx.chain.logs().len();

    let err = fx
        .chain
        .call(fx.alice, vault, VaultCall::Execute { targets, payloads })
        .unwrap_err();

    assert!(matches!(err, CoreError::BatchCallFailed { index, .. } if index == failing));
    assert_eq!(fx.chain.balance_of(fx.token0, vault), U256::from(100));
    assert_eq!(fx.chain.balance_of(fx.token0, fx.bob), U256::ZERO);
    assert_eq!(Counter::count(&fx.chain, counter), U256::ZERO);
    assert_eq!(fx.chain.owner_of(fx.position_token, U256::from(9)), Some(vault));
    let managed = fx
        .chain
        .view(fx.alice, vault, VaultCall::ManagedPositions)
        .and_then(ReturnData::into_managed_positions)
        .unwrap();
    assert_eq!(managed, vec![ManagedPosition::new(fx.position_token, U256::from(9))]);
    assert_eq!(fx.chain.logs().len(), logs_before);
}

#[test]
fn test_strategy_provides_liquidity_from_vault() {
    let mut fx = Fixture::new();
    let manager = fx.deployment.manager;
    let registry = fx.deployment.registry;
    let strategy = fx.chain.predict_address(0);
    fx.chain
        .call(
            fx.admin,
            fx.deployment.factory,
            FactoryCall::SetStrategyWhitelisting { strategy, whitelisted: true },
        )
        .unwrap();
    let vault = fx.create_vault(fx.alice, "auto");
    fx.fund(vault, 1_000);
    let params = fx.create_params(600, 400);
    let deployed = fx.chain.deploy_strategy(Arc::new(
        ScriptedStrategy::new("range-provider").step(
            vault,
            VaultCall::Execute {
                targets: vec![fx.token0, fx.token1, manager],
                payloads: vec![
                    TokenCall::Approve { spender: manager, amount: U256::MAX }.into(),
                    TokenCall::Approve { spender: manager, amount: U256::MAX }.into(),
                    ManagerCall::CreatePosition(params).into(),
                ],
            },
        ),
    ));
    assert_eq!(deployed, strategy);
    fx.chain
        .call(
            fx.admin,
            registry,
            RegistryCall::RegisterStrategy { id: "range".into(), strategy, approved: true },
        )
        .unwrap();

    fx.chain
        .call(
            fx.bob,
            registry,
            RegistryCall::ExecuteStrategy {
                id: "range".into(),
                position_id: U256::ZERO,
                params: Bytes::new(),
            },
        )
        .unwrap();

    let position_id = U256::from(1);
    let managed = fx
        .chain
        .view(fx.alice, vault, VaultCall::ManagedPositions)
        .and_then(ReturnData::into_managed_positions)
        .unwrap();
    let view = fx
        .chain
        .view(fx.alice, manager, ManagerCall::GetPosition(position_id))
        .and_then(ReturnData::into_position_view)
        .unwrap();
    assert_eq!(managed, vec![ManagedPosition::new(fx.position_token, position_id)]);
    assert_eq!(view.owner, vault);
    assert_eq!(fx.chain.balance_of(fx.token0, vault), U256::from(600));
    assert_eq!(fx.chain.balance_of(fx.token1, vault), U256::from(600));
    assert_eq!(ScriptedStrategy::runs(&fx.chain, strategy), U256::from(1));
    assert!(fx.chain.logs().iter().any(|log| log.emitter == registry &&
        matches!(&log.event, Event::StrategyExecuted { id, caller, .. } if id == "range" && *caller == fx.bob)));
}

#[test]
fn test_failing_strategy_leaves_vault_untouched() {
    let mut fx = Fixture::new();
    let registry = fx.deployment.registry;
    let strategy = fx.chain.predict_address(0);
    fx.chain
        .call(
            fx.admin,
            fx.deployment.factory,
            FactoryCall::SetStrategyWhitelisting { strategy, whitelisted: true },
        )
        .unwrap();
    let vault = fx.create_vault(fx.alice, "auto");
    fx.fund(vault, 100);
    fx.chain.deploy_strategy(Arc::new(
        ScriptedStrategy::new("drain")
            .step(
                vault,
                VaultCall::Execute {
                    targets: vec![fx.token0],
                    payloads: vec![TokenCall::Transfer { to: fx.bob, amount: U256::from(100) }.into()],
                },
            )
            .succeeds(false),
    ));
    fx.chain
        .call(
            fx.admin,
            registry,
            RegistryCall::RegisterStrategy { id: "drain".into(), strategy, approved: true },
        )
        .unwrap();

    let err = fx
        .chain
        .call(
            fx.bob,
            registry,
            RegistryCall::ExecuteStrategy { id: "drain".into(), position_id: U256::ZERO, params: Bytes::new() },
        )
        .unwrap_err();

    assert_eq!(err, CoreError::StrategyExecutionFailed("drain".into()));
    assert_eq!(fx.chain.balance_of(fx.token0, vault), U256::from(100));
    assert_eq!(ScriptedStrategy::runs(&fx.chain, strategy), U256::ZERO);
}
