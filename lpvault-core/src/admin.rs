use alloy_primitives::Address;
use lpvault_common::{models::ComponentStatus, CoreError};

/// Single-admin ownership with an optional pause switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminControl {
    admin: Address,
    status: ComponentStatus,
}

impl AdminControl {
    pub fn new(admin: Address) -> Self {
        Self { admin, status: ComponentStatus::Active }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn is_paused(&self) -> bool {
        self.status == ComponentStatus::Paused
    }

    pub fn ensure_admin(&self, caller: Address, component: Address) -> Result<(), CoreError> {
        if caller != self.admin {
            return Err(CoreError::NotAdmin { caller, target: component });
        }
        Ok(())
    }

    pub fn ensure_active(&self, component: Address) -> Result<(), CoreError> {
        if self.is_paused() {
            return Err(CoreError::Paused(component));
        }
        Ok(())
    }

    pub fn set_status(&mut self, status: ComponentStatus) {
        self.status = status;
    }

    /// Returns the previous admin.
    pub fn transfer(&mut self, new_admin: Address) -> Result<Address, CoreError> {
        if new_admin.is_zero() {
            return Err(CoreError::ZeroAddress("admin"));
        }
        Ok(std::mem::replace(&mut self.admin, new_admin))
    }
}
