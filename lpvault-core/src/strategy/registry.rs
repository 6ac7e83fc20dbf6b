use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use alloy_primitives::{Address, Bytes, U256};
use lpvault_common::{
    calls::RegistryCall,
    events::Event,
    models::{ComponentStatus, PositionId, StrategyId, StrategyInfo, StrategyMetadata},
    traits::{Host, Strategy},
    CoreError, ReturnData,
};
use metrics::counter;
use tracing::{info, warn};

use crate::{
    admin::AdminControl,
    chain::{
        frame::Frame,
        state::{Code, WorldState},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    strategy: Address,
    approved: bool,
}

/// Strategy implementations keyed by id, with approval gating.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    admin: AdminControl,
    strategies: HashMap<StrategyId, Registration>,
    /// Registration order, for enumeration.
    ids: Vec<StrategyId>,
    by_address: HashMap<Address, BTreeSet<StrategyId>>,
}

impl StrategyRegistry {
    pub fn new(admin: Address) -> Self {
        Self {
            admin: AdminControl::new(admin),
            strategies: HashMap::new(),
            ids: Vec::new(),
            by_address: HashMap::new(),
        }
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.strategies.contains_key(id)
    }

    pub fn is_approved(&self, id: &str) -> bool {
        self.strategies
            .get(id)
            .map(|r| r.approved)
            .unwrap_or(false)
    }

    fn registration(&self, id: &str) -> Result<&Registration, CoreError> {
        self.strategies
            .get(id)
            .ok_or_else(|| CoreError::StrategyNotFound(id.to_string()))
    }

    fn index(&mut self, id: &str, strategy: Address) {
        self.by_address
            .entry(strategy)
            .or_default()
            .insert(id.to_string());
    }

    fn unindex(&mut self, id: &str, strategy: Address) {
        if let Some(ids) = self.by_address.get_mut(&strategy) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_address.remove(&strategy);
            }
        }
    }
}

/// Checks that `address` runs a strategy that describes itself with a non-empty name.
fn probe(world: &WorldState, address: Address) -> Result<Arc<dyn Strategy>, CoreError> {
    let strategy = match world.code(address) {
        Some(Code::Strategy(strategy)) => strategy.clone(),
        _ => return Err(CoreError::MissingCapability { address, capability: "strategy" }),
    };
    if strategy.info().name.is_empty() {
        return Err(CoreError::CapabilityProbeFailed {
            address,
            reason: "strategy reports an empty name".to_string(),
        });
    }
    Ok(strategy)
}

fn state<'a>(frame: &'a Frame<'_>) -> Result<&'a StrategyRegistry, CoreError> {
    let this = frame.address();
    frame
        .world()
        .registry(this)
        .ok_or(CoreError::NoCode { address: this, call: "registry".to_string() })
}

fn state_mut<'a>(frame: &'a mut Frame<'_>) -> Result<&'a mut StrategyRegistry, CoreError> {
    let this = frame.address();
    frame
        .world_mut()
        .registry_mut(this)
        .ok_or(CoreError::NoCode { address: this, call: "registry".to_string() })
}

/// Admin-only and only while active.
fn ensure_admin_active(frame: &Frame<'_>) -> Result<(), CoreError> {
    let admin = &state(frame)?.admin;
    admin.ensure_admin(frame.caller(), frame.address())?;
    admin.ensure_active(frame.address())
}

fn execute_strategy(
    frame: &mut Frame<'_>,
    id: StrategyId,
    position_id: PositionId,
    params: Bytes,
) -> Result<ReturnData, CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    let registry = state(frame)?;
    registry.admin.ensure_active(this)?;
    let registration = registry.registration(&id)?;
    if !registration.approved {
        return Err(CoreError::StrategyNotApproved(id));
    }
    let address = registration.strategy;
    let strategy = probe(frame.world(), address)?;

    let compatible = frame.with_child(address, U256::ZERO, |host| {
        Ok(strategy.is_compatible(&*host, position_id))
    })?;
    if !compatible {
        return Err(CoreError::StrategyIncompatible { id, position_id });
    }

    let succeeded = frame.with_child(address, U256::ZERO, |host| {
        strategy.execute(host, position_id, &params)
    })?;
    if !succeeded {
        warn!(%id, %position_id, "Strategy reported failure");
        return Err(CoreError::StrategyExecutionFailed(id));
    }

    frame.emit(Event::StrategyExecuted { id: id.clone(), position_id, caller, params });
    counter!("lpvault_strategy_executions", "strategy" => id.clone()).increment(1);
    info!(%id, %position_id, %caller, "Strategy executed");
    Ok(ReturnData::Empty)
}

/// Runs the strategy's simulation against a copy of the world that is dropped afterwards.
fn simulate_strategy(
    frame: &mut Frame<'_>,
    id: StrategyId,
    position_id: PositionId,
    params: Bytes,
) -> Result<ReturnData, CoreError> {
    let address = state(frame)?.registration(&id)?.strategy;
    let strategy = probe(frame.world(), address)?;
    let mut scratch = frame.world().scratch();
    let mut forked = frame.fork(&mut scratch);
    forked.with_child(address, U256::ZERO, |host| strategy.simulate(host, position_id, &params))
        .map(ReturnData::Bytes)
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

pub(crate) fn handle(frame: &mut Frame<'_>, call: RegistryCall) -> Result<ReturnData, CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    match call {
        RegistryCall::RegisterStrategy { id, strategy, approved } => {
            ensure_admin_active(frame)?;
            if id.is_empty() {
                return Err(CoreError::EmptyName);
            }
            if state(frame)?.is_registered(&id) {
                return Err(CoreError::StrategyAlreadyRegistered(id));
            }
            let metadata = probe(frame.world(), strategy)?.info();
            let registry = state_mut(frame)?;
            registry
                .strategies
                .insert(id.clone(), Registration { strategy, approved });
            registry.ids.push(id.clone());
            registry.index(&id, strategy);
            info!(%id, %strategy, approved, name = %metadata.name, "Strategy registered");
            frame.emit(Event::StrategyRegistered { id, strategy, approved });
            Ok(ReturnData::Empty)
        }
        RegistryCall::UpdateStrategy { id, strategy } => {
            ensure_admin_active(frame)?;
            let previous = state(frame)?.registration(&id)?.strategy;
            probe(frame.world(), strategy)?;
            let registry = state_mut(frame)?;
            registry.unindex(&id, previous);
            registry.index(&id, strategy);
            registry
                .strategies
                .insert(id.clone(), Registration { strategy, approved: false });
            info!(%id, %previous, %strategy, "Strategy updated, approval reset");
            frame.emit(Event::StrategyUpdated { id, strategy });
            Ok(ReturnData::Empty)
        }
        RegistryCall::SetStrategyApproval { strategy, approved } => {
            ensure_admin_active(frame)?;
            let registry = state_mut(frame)?;
            let ids: Vec<StrategyId> = registry
                .by_address
                .get(&strategy)
                .map(|ids| ids.iter().cloned().collect())
                .ok_or(CoreError::StrategyAddressNotRegistered(strategy))?;
            for id in &ids {
                if let Some(registration) = registry.strategies.get_mut(id) {
                    registration.approved = approved;
                }
            }
            for id in ids {
                frame.emit(Event::StrategyApprovalSet { id, strategy, approved });
            }
            Ok(ReturnData::Empty)
        }
        RegistryCall::ExecuteStrategy { id, position_id, params } => {
            execute_strategy(frame, id, position_id, params)
        }
        RegistryCall::SimulateStrategy { id, position_id, params } => {
            simulate_strategy(frame, id, position_id, params)
        }
        RegistryCall::Pause => set_status(frame, ComponentStatus::Paused),
        RegistryCall::Unpause => set_status(frame, ComponentStatus::Active),
        RegistryCall::TransferAdmin(new_admin) => {
            let admin = &mut state_mut(frame)?.admin;
            admin.ensure_admin(caller, this)?;
            let previous = admin.transfer(new_admin)?;
            frame.emit(Event::AdminTransferred { previous, admin: new_admin });
            Ok(ReturnData::Empty)
        }
        RegistryCall::GetStrategyInfo(id) => {
            let registration = state(frame)?.registration(&id)?.clone();
            let metadata = match frame.world().code(registration.strategy) {
                Some(Code::Strategy(strategy)) => strategy.info(),
                _ => StrategyMetadata::default(),
            };
            Ok(ReturnData::StrategyInfo(StrategyInfo {
                id,
                strategy: registration.strategy,
                approved: registration.approved,
                metadata,
            }))
        }
        RegistryCall::IsStrategyRegistered(id) => Ok(ReturnData::Bool(state(frame)?.is_registered(&id))),
        RegistryCall::IsStrategyApproved(id) => Ok(ReturnData::Bool(state(frame)?.is_approved(&id))),
        RegistryCall::GetStrategyIds => Ok(ReturnData::Strings(state(frame)?.ids.clone())),
        RegistryCall::IsPaused => Ok(ReturnData::Bool(state(frame)?.admin.is_paused())),
        RegistryCall::Admin => Ok(ReturnData::Address(state(frame)?.admin.admin())),
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use lpvault_common::ErrorKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{
        chain::frame::MAX_CALL_DEPTH,
        testing::{Counter, Fixture, ScriptedStrategy},
    };

    /// Simulates by asking the registry to simulate it again.
    #[derive(Debug)]
    struct SelfSimulating {
        registry: Address,
    }

    impl Strategy for SelfSimulating {
        fn info(&self) -> StrategyMetadata {
            StrategyMetadata::new("mirror", "1.0.0")
        }

        fn is_compatible(&self, _host: &dyn Host, _position_id: PositionId) -> bool {
            true
        }

        fn execute(&self, _host: &mut dyn Host, _position_id: PositionId, _params: &Bytes) -> Result<bool, CoreError> {
            Ok(true)
        }

        fn simulate(&self, host: &mut dyn Host, position_id: PositionId, params: &Bytes) -> Result<Bytes, CoreError> {
            host.call(
                self.registry,
                RegistryCall::SimulateStrategy { id: "mirror".into(), position_id, params: params.clone() }.into(),
            )
            .and_then(ReturnData::into_bytes)
        }
    }

    fn register(fx: &mut Fixture, id: &str, strategy: Address, approved: bool) -> Result<ReturnData, CoreError> {
        fx.chain.call(
            fx.admin,
            fx.deployment.registry,
            RegistryCall::RegisterStrategy { id: id.into(), strategy, approved },
        )
    }

    fn info(fx: &Fixture, id: &str) -> StrategyInfo {
        fx.chain
            .view(fx.alice, fx.deployment.registry, RegistryCall::GetStrategyInfo(id.into()))
            .and_then(ReturnData::into_strategy_info)
            .unwrap()
    }

    fn execute(fx: &mut Fixture, id: &str) -> Result<ReturnData, CoreError> {
        fx.chain.call(
            fx.bob,
            fx.deployment.registry,
            RegistryCall::ExecuteStrategy { id: id.into(), position_id: U256::from(1), params: Bytes::new() },
        )
    }

    #[test]
    fn test_register_checks_capability() {
        let mut fx = Fixture::new();
        let good = fx
            .chain
            .deploy_strategy(Arc::new(ScriptedStrategy::new("rebalancer")));
        let nameless = fx
            .chain
            .deploy_strategy(Arc::new(ScriptedStrategy::new("")));
        let not_a_strategy = fx.chain.deploy_contract(Arc::new(Counter));

        register(&mut fx, "rebalance", good, true).unwrap();
        let duplicate = register(&mut fx, "rebalance", good, true).unwrap_err();
        let empty = register(&mut fx, "empty", nameless, true).unwrap_err();
        let missing = register(&mut fx, "counter", not_a_strategy, true).unwrap_err();

        assert_eq!(duplicate.kind(), ErrorKind::StateConflict);
        assert_eq!(empty.kind(), ErrorKind::Validation);
        assert_eq!(missing.kind(), ErrorKind::Validation);
        let info = info(&fx, "rebalance");
        assert_eq!(info.strategy, good);
        assert!(info.approved);
        assert_eq!(info.metadata.name, "rebalancer");
        assert_eq!(info.metadata.description, "Replays a fixed list of calls");
    }

    #[rstest]
    #[case::was_approved(true)]
    #[case::was_unapproved(false)]
    fn test_update_resets_approval(#[case] previously_approved: bool) {
        let mut fx = Fixture::new();
        let v1 = fx.chain.deploy_strategy(Arc::new(ScriptedStrategy::new("v1")));
        let v2 = fx.chain.deploy_strategy(Arc::new(ScriptedStrategy::new("v2")));
        register(&mut fx, "s", v1, previously_approved).unwrap();

        fx.chain
            .call(
                fx.admin,
                fx.deployment.registry,
                RegistryCall::UpdateStrategy { id: "s".into(), strategy: v2 },
            )
            .unwrap();

        let info = info(&fx, "s");
        assert_eq!(info.strategy, v2);
        assert!(!info.approved);
        // the old address no longer resolves to any id
        let err = fx
            .chain
            .call(
                fx.admin,
                fx.deployment.registry,
                RegistryCall::SetStrategyApproval { strategy: v1, approved: true },
            )
            .unwrap_err();
        assert_eq!(err, CoreError::StrategyAddressNotRegistered(v1));
    }

    #[test]
    fn test_approval_applies_to_every_id_of_an_address() {
        let mut fx = Fixture::new();
        let shared = fx
            .chain
            .deploy_strategy(Arc::new(ScriptedStrategy::new("shared")));
        register(&mut fx, "a", shared, false).unwrap();
        register(&mut fx, "b", shared, false).unwrap();

        fx.chain
            .call(
                fx.admin,
                fx.deployment.registry,
                RegistryCall::SetStrategyApproval { strategy: shared, approved: true },
            )
            .unwrap();

        assert!(info(&fx, "a").approved);
        assert!(info(&fx, "b").approved);
        let ids = fx
            .chain
            .view(fx.alice, fx.deployment.registry, RegistryCall::GetStrategyIds)
            .and_then(ReturnData::into_strings)
            .unwrap();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[rstest]
    #[case::unregistered(None, CoreError::StrategyNotFound("s".into()))]
    #[case::unapproved(Some((false, true, true)), CoreError::StrategyNotApproved("s".into()))]
    #[case::incompatible(
        Some((true, false, true)),
        CoreError::StrategyIncompatible { id: "s".into(), position_id: U256::from(1) }
    )]
    #[case::reports_failure(Some((true, true, false)), CoreError::StrategyExecutionFailed("s".into()))]
    fn test_execute_failures(#[case] setup: Option<(bool, bool, bool)>, #[case] expected: CoreError) {
        let mut fx = Fixture::new();
        if let Some((approved, compatible, succeeds)) = setup {
            let strategy = fx.chain.deploy_strategy(Arc::new(
                ScriptedStrategy::new("s")
                    .compatible(compatible)
                    .succeeds(succeeds),
            ));
            register(&mut fx, "s", strategy, approved).unwrap();
        }

        let err = execute(&mut fx, "s").unwrap_err();

        assert_eq!(err, expected);
    }

    #[test]
    fn test_execute_and_simulate() {
        let mut fx = Fixture::new();
        let strategy = fx
            .chain
            .deploy_strategy(Arc::new(ScriptedStrategy::new("s")));
        register(&mut fx, "s", strategy, true).unwrap();

        let simulated = fx
            .chain
            .call(
                fx.bob,
                fx.deployment.registry,
                RegistryCall::SimulateStrategy { id: "s".into(), position_id: U256::from(1), params: Bytes::new() },
            )
            .and_then(ReturnData::into_bytes)
            .unwrap();
        assert_eq!(ScriptedStrategy::runs(&fx.chain, strategy), U256::ZERO);

        execute(&mut fx, "s").unwrap();

        assert_eq!(simulated, Bytes::from(U256::from(1).to_be_bytes_vec()));
        assert_eq!(ScriptedStrategy::runs(&fx.chain, strategy), U256::from(1));
    }

    #[test]
    fn test_paused_registry_rejects_execution() {
        let mut fx = Fixture::new();
        let strategy = fx
            .chain
            .deploy_strategy(Arc::new(ScriptedStrategy::new("s")));
        register(&mut fx, "s", strategy, true).unwrap();
        fx.chain
            .call(fx.admin, fx.deployment.registry, RegistryCall::Pause)
            .unwrap();

        let paused = execute(&mut fx, "s").unwrap_err();
        let register_paused = register(&mut fx, "t", strategy, true).unwrap_err();
        fx.chain
            .call(fx.admin, fx.deployment.registry, RegistryCall::Unpause)
            .unwrap();

        assert_eq!(paused, CoreError::Paused(fx.deployment.registry));
        assert_eq!(register_paused.kind(), ErrorKind::StateConflict);
        execute(&mut fx, "s").unwrap();
    }

    #[test]
    fn test_recursive_simulation_hits_depth_limit() {
        let mut fx = Fixture::new();
        let registry = fx.deployment.registry;
        let strategy = fx
            .chain
            .deploy_strategy(Arc::new(SelfSimulating { registry }));
        register(&mut fx, "mirror", strategy, true).unwrap();

        let err = fx
            .chain
            .view(
                fx.bob,
                registry,
                RegistryCall::SimulateStrategy { id: "mirror".into(), position_id: U256::from(1), params: Bytes::new() },
            )
            .unwrap_err();

        assert_eq!(err, CoreError::CallDepthExceeded(MAX_CALL_DEPTH));
    }
}
