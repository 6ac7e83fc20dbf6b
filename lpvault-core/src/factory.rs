use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, U256};
use lpvault_common::{
    calls::{FactoryCall, VaultCall},
    events::Event,
    models::VaultInfo,
    traits::Host,
    CoreError, ReturnData,
};
use metrics::counter;
use tracing::info;

use crate::{
    admin::AdminControl,
    chain::{frame::Frame, state::Account},
    vault::PositionVault,
};

/// Deploys vaults and keeps the registry of every vault it created.
#[derive(Debug, Clone)]
pub struct VaultFactory {
    admin: AdminControl,
    vaults: HashMap<Address, VaultInfo>,
    all_vaults: Vec<Address>,
    user_vaults: HashMap<Address, Vec<Address>>,
    whitelisted: HashSet<Address>,
    /// Same members as `whitelisted`, compact for enumeration. Order is not preserved on
    /// removal.
    whitelist: Vec<Address>,
}

impl VaultFactory {
    pub fn new(admin: Address) -> Self {
        Self {
            admin: AdminControl::new(admin),
            vaults: HashMap::new(),
            all_vaults: Vec::new(),
            user_vaults: HashMap::new(),
            whitelisted: HashSet::new(),
            whitelist: Vec::new(),
        }
    }

    pub fn vault_info(&self, vault: Address) -> Option<&VaultInfo> {
        self.vaults.get(&vault)
    }

    pub fn vaults_of(&self, user: Address) -> &[Address] {
        self.user_vaults
            .get(&user)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn whitelisted_strategies(&self) -> &[Address] {
        &self.whitelist
    }

    fn set_whitelisted(&mut self, strategy: Address, whitelisted: bool) -> bool {
        match (whitelisted, self.whitelisted.contains(&strategy)) {
            (true, false) => {
                self.whitelisted.insert(strategy);
                self.whitelist.push(strategy);
                true
            }
            (false, true) => {
                self.whitelisted.remove(&strategy);
                if let Some(pos) = self
                    .whitelist
                    .iter()
                    .position(|s| *s == strategy)
                {
                    self.whitelist.swap_remove(pos);
                }
                true
            }
            _ => false,
        }
    }
}

fn state<'a>(frame: &'a Frame<'_>) -> Result<&'a VaultFactory, CoreError> {
    let this = frame.address();
    frame
        .world()
        .factory(this)
        .ok_or(CoreError::NoCode { address: this, call: "factory".to_string() })
}

fn state_mut<'a>(frame: &'a mut Frame<'_>) -> Result<&'a mut VaultFactory, CoreError> {
    let this = frame.address();
    frame
        .world_mut()
        .factory_mut(this)
        .ok_or(CoreError::NoCode { address: this, call: "factory".to_string() })
}

fn create_vault(frame: &mut Frame<'_>, name: String) -> Result<Address, CoreError> {
    let this = frame.address();
    let owner = frame.caller();
    if name.is_empty() {
        return Err(CoreError::EmptyName);
    }
    let creation_time = frame.timestamp();
    let vault = frame
        .world_mut()
        .install(this, Account::Vault(PositionVault::new(owner, this)));

    let factory = state_mut(frame)?;
    factory
        .vaults
        .insert(vault, VaultInfo::new(owner, name.clone(), creation_time));
    factory.all_vaults.push(vault);
    let owned = factory.user_vaults.entry(owner).or_default();
    owned.push(vault);
    let user_vault_count = owned.len();
    let strategies = factory.whitelist.clone();

    for strategy in strategies {
        frame.call(vault, VaultCall::SetStrategyAuthorization { account: strategy, authorized: true }.into())?;
    }
    frame.call(vault, VaultCall::SetStrategyAuthorization { account: this, authorized: false }.into())?;

    frame.emit(Event::VaultCreated { vault, owner, name: name.clone(), user_vault_count });
    counter!("lpvault_vaults_created").increment(1);
    info!(%vault, %owner, %name, user_vault_count, "Vault created");
    Ok(vault)
}

pub(crate) fn handle(frame: &mut Frame<'_>, call: FactoryCall) -> Result<ReturnData, CoreError> {
    let this = frame.address();
    let caller = frame.caller();
    match call {
        FactoryCall::CreateVault { name } => create_vault(frame, name).map(ReturnData::Address),
        FactoryCall::UpdateVaultName { vault, name } => {
            if name.is_empty() {
                return Err(CoreError::EmptyName);
            }
            let info = state_mut(frame)?
                .vaults
                .get_mut(&vault)
                .ok_or(CoreError::VaultNotFound(vault))?;
            if info.owner != caller {
                return Err(CoreError::NotOwner { caller, target: vault });
            }
            info.name = name.clone();
            frame.emit(Event::VaultNameUpdated { vault, name });
            Ok(ReturnData::Empty)
        }
        FactoryCall::SetStrategyWhitelisting { strategy, whitelisted } => {
            let factory = state_mut(frame)?;
            factory.admin.ensure_admin(caller, this)?;
            if strategy.is_zero() {
                return Err(CoreError::ZeroAddress("strategy"));
            }
            if factory.set_whitelisted(strategy, whitelisted) {
                frame.emit(Event::StrategyWhitelisted { strategy, whitelisted });
                info!(%strategy, whitelisted, "Strategy whitelisting changed");
            }
            Ok(ReturnData::Empty)
        }
        FactoryCall::TransferAdmin(new_admin) => {
            let admin = &mut state_mut(frame)?.admin;
            admin.ensure_admin(caller, this)?;
            let previous = admin.transfer(new_admin)?;
            frame.emit(Event::AdminTransferred { previous, admin: new_admin });
            Ok(ReturnData::Empty)
        }
        FactoryCall::GetVaults(user) => Ok(ReturnData::Addresses(state(frame)?.vaults_of(user).to_vec())),
        FactoryCall::GetVaultInfo(vault) => state(frame)?
            .vault_info(vault)
            .cloned()
            .map(ReturnData::VaultInfo)
            .ok_or(CoreError::VaultNotFound(vault)),
        FactoryCall::IsVault(vault) => {
            let owner = state(frame)?
                .vault_info(vault)
                .map(|info| info.owner);
            Ok(ReturnData::IsVault { is_vault: owner.is_some(), owner: owner.unwrap_or_default() })
        }
        FactoryCall::GetWhitelistedStrategies => {
            Ok(ReturnData::Addresses(state(frame)?.whitelist.clone()))
        }
        FactoryCall::IsStrategyWhitelisted(strategy) => {
            Ok(ReturnData::Bool(state(frame)?.whitelisted.contains(&strategy)))
        }
        FactoryCall::GetTotalVaultCount => {
            Ok(ReturnData::Amount(U256::from(state(frame)?.all_vaults.len())))
        }
        FactoryCall::Admin => Ok(ReturnData::Address(state(frame)?.admin.admin())),
    }
}

#[cfg(test)]
mod test {
    use lpvault_common::{calls::VaultCall, ErrorKind};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::Fixture;

    #[test]
    fn test_whitelist_swap_and_pop() {
        let mut factory = VaultFactory::new(Address::ZERO);
        let [a, b, c] = [1u8, 2, 3].map(Address::repeat_byte);
        for s in [a, b, c] {
            assert!(factory.set_whitelisted(s, true));
        }

        assert!(!factory.set_whitelisted(b, true));
        assert!(factory.set_whitelisted(a, false));
        assert!(!factory.set_whitelisted(a, false));

        assert_eq!(factory.whitelisted_strategies(), &[c, b]);
        assert!(!factory.whitelisted.contains(&a));
    }

    #[test_log::test]
    fn test_create_vault_records_entry() {
        let mut fx = Fixture::new();
        fx.clock.set(1_700_000_123);

        let first = fx.create_vault(fx.alice, "A");
        let second = fx.create_vault(fx.alice, "B");
        fx.create_vault(fx.bob, "C");

        let info = fx
            .chain
            .view(fx.bob, fx.deployment.factory, FactoryCall::GetVaultInfo(first))
            .and_then(ReturnData::into_vault_info)
            .unwrap();
        let vaults = fx
            .chain
            .view(fx.bob, fx.deployment.factory, FactoryCall::GetVaults(fx.alice))
            .and_then(ReturnData::into_addresses)
            .unwrap();
        let total = fx
            .chain
            .view(fx.bob, fx.deployment.factory, FactoryCall::GetTotalVaultCount)
            .and_then(ReturnData::into_amount)
            .unwrap();
        assert_eq!(info, VaultInfo::new(fx.alice, "A", 1_700_000_123));
        assert_eq!(vaults, vec![first, second]);
        assert_eq!(total, U256::from(3));
        assert!(fx.chain.logs().iter().any(|log| log.event ==
            Event::VaultCreated { vault: second, owner: fx.alice, name: "B".into(), user_vault_count: 2 }));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut fx = Fixture::new();

        let err = fx
            .chain
            .call(fx.alice, fx.deployment.factory, FactoryCall::CreateVault { name: String::new() })
            .unwrap_err();

        assert_eq!(err, CoreError::EmptyName);
    }

    #[test]
    fn test_whitelisted_strategies_are_authorized_on_new_vaults_only() {
        let mut fx = Fixture::new();
        let strategy = Address::repeat_byte(0x5);
        let before = fx.create_vault(fx.alice, "before");
        fx.chain
            .call(
                fx.admin,
                fx.deployment.factory,
                FactoryCall::SetStrategyWhitelisting { strategy, whitelisted: true },
            )
            .unwrap();

        let after = fx.create_vault(fx.alice, "after");

        let authorized = |fx: &Fixture, vault| {
            fx.chain
                .view(fx.alice, vault, VaultCall::IsAuthorized(strategy))
                .and_then(ReturnData::into_bool)
                .unwrap()
        };
        assert!(!authorized(&fx, before));
        assert!(authorized(&fx, after));
    }

    #[test]
    fn test_rename_owner_only() {
        let mut fx = Fixture::new();
        let vault = fx.create_vault(fx.alice, "A");
        let factory = fx.deployment.factory;

        let err = fx
            .chain
            .call(fx.bob, factory, FactoryCall::UpdateVaultName { vault, name: "mine".into() })
            .unwrap_err();
        fx.chain
            .call(fx.alice, factory, FactoryCall::UpdateVaultName { vault, name: "A2".into() })
            .unwrap();

        let info = fx
            .chain
            .view(fx.bob, factory, FactoryCall::GetVaultInfo(vault))
            .and_then(ReturnData::into_vault_info)
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(info.name, "A2");
    }

    #[test]
    fn test_unknown_vault() {
        let fx = Fixture::new();
        let unknown = Address::repeat_byte(0x77);

        let is_vault = fx
            .chain
            .view(fx.bob, fx.deployment.factory, FactoryCall::IsVault(unknown))
            .and_then(ReturnData::into_is_vault)
            .unwrap();
        let info = fx
            .chain
            .view(fx.bob, fx.deployment.factory, FactoryCall::GetVaultInfo(unknown))
            .unwrap_err();

        assert_eq!(is_vault, (false, Address::ZERO));
        assert_eq!(info.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_admin_gates_whitelisting() {
        let mut fx = Fixture::new();
        let factory = fx.deployment.factory;

        let err = fx
            .chain
            .call(
                fx.alice,
                factory,
                FactoryCall::SetStrategyWhitelisting { strategy: fx.bob, whitelisted: true },
            )
            .unwrap_err();
        fx.chain
            .call(fx.admin, factory, FactoryCall::TransferAdmin(fx.alice))
            .unwrap();
        fx.chain
            .call(
                fx.alice,
                factory,
                FactoryCall::SetStrategyWhitelisting { strategy: fx.bob, whitelisted: true },
            )
            .unwrap();

        assert_eq!(err.kind(), ErrorKind::Authorization);
        let whitelisted = fx
            .chain
            .view(fx.alice, factory, FactoryCall::IsStrategyWhitelisted(fx.bob))
            .and_then(ReturnData::into_bool)
            .unwrap();
        assert!(whitelisted);
    }
}
