//! Role-based capability checks.
//!
//! Each component embeds its own [`AccessRegistry`], so a role is always
//! scoped to the component that checks it. Mutating operations call
//! [`AccessRegistry::require`] before touching any state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::error::{ProtocolError, Result};
use crate::events::{Event, TxContext};
use crate::types::Address;

/// Named capabilities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Grants roles, updates configuration, pauses
    Administrator,
    /// May register tasks
    TaskCreator,
    /// May record completions in the task registry
    TaskVerifier,
    /// May approve or reject submitted proofs
    ProofVerifier,
    /// May credit rewards to learners
    Distributor,
    /// May mint credentials or tokens
    Minter,
    /// May verify institutions and bump their counters
    InstitutionVerifier,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Administrator => "ADMINISTRATOR",
            Self::TaskCreator => "TASK_CREATOR",
            Self::TaskVerifier => "TASK_VERIFIER",
            Self::ProofVerifier => "PROOF_VERIFIER",
            Self::Distributor => "DISTRIBUTOR",
            Self::Minter => "MINTER",
            Self::InstitutionVerifier => "INSTITUTION_VERIFIER",
        };
        f.write_str(name)
    }
}

/// Role membership table of one component
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccessRegistry {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl AccessRegistry {
    /// Registry with `admin` holding [`Role::Administrator`]
    #[must_use]
    pub fn with_admin(admin: Address) -> Self {
        let mut registry = Self::default();
        registry
            .members
            .entry(Role::Administrator)
            .or_default()
            .insert(admin);
        registry
    }

    /// Whether `account` holds `role`
    #[must_use]
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(account))
    }

    /// Fail with `Unauthorized` unless `account` holds `role`
    ///
    /// # Errors
    /// Returns `Unauthorized` naming the missing role
    pub fn require(&self, role: Role, account: &Address) -> Result<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            warn!(%role, %account, "Missing role");
            Err(ProtocolError::unauthorized(format!(
                "account {account} is missing role {role}"
            )))
        }
    }

    /// Members of `role` in address order
    #[must_use]
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Grant `role` to `account`; the sender must be an administrator.
    ///
    /// Granting a role that is already held is accepted and emits nothing.
    ///
    /// # Errors
    /// Returns `Unauthorized` if the sender is not an administrator,
    /// `InvalidInput` for the zero address
    pub fn grant_role(
        &mut self,
        tx: &mut TxContext,
        emitter: Address,
        role: Role,
        account: Address,
    ) -> Result<()> {
        self.require(Role::Administrator, &tx.sender())?;
        if account.is_zero() {
            return Err(ProtocolError::invalid("cannot grant a role to the zero address"));
        }

        if self.members.entry(role).or_default().insert(account) {
            info!(%role, %account, "Role granted");
            tx.emit(
                emitter,
                Event::RoleGranted {
                    role,
                    account,
                    sender: tx.sender(),
                },
            );
        }
        Ok(())
    }

    /// Revoke `role` from `account`; the sender must be an administrator.
    ///
    /// # Errors
    /// Returns `Unauthorized` if the sender is not an administrator
    pub fn revoke_role(
        &mut self,
        tx: &mut TxContext,
        emitter: Address,
        role: Role,
        account: Address,
    ) -> Result<()> {
        self.require(Role::Administrator, &tx.sender())?;

        let removed = self
            .members
            .get_mut(&role)
            .is_some_and(|set| set.remove(&account));
        if removed {
            info!(%role, %account, "Role revoked");
            tx.emit(
                emitter,
                Event::RoleRevoked {
                    role,
                    account,
                    sender: tx.sender(),
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn admin() -> Address {
        Address::from_label("admin")
    }

    #[test]
    fn test_admin_can_grant_and_revoke() {
        let mut acl = AccessRegistry::with_admin(admin());
        let alice = Address::from_label("alice");
        let mut tx = TxContext::new(admin(), 0);

        acl.grant_role(&mut tx, Address::ZERO, Role::TaskCreator, alice)
            .unwrap();
        assert!(acl.has_role(Role::TaskCreator, &alice));
        assert!(acl.require(Role::TaskCreator, &alice).is_ok());

        acl.revoke_role(&mut tx, Address::ZERO, Role::TaskCreator, alice)
            .unwrap();
        assert!(!acl.has_role(Role::TaskCreator, &alice));
        assert_eq!(tx.event_count(), 2);
    }

    #[test]
    fn test_non_admin_cannot_grant() {
        let mut acl = AccessRegistry::with_admin(admin());
        let mallory = Address::from_label("mallory");
        let mut tx = TxContext::new(mallory, 0);

        let err = acl
            .grant_role(&mut tx, Address::ZERO, Role::Distributor, mallory)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(!acl.has_role(Role::Distributor, &mallory));
        assert_eq!(tx.event_count(), 0);
    }

    #[test]
    fn test_roles_are_not_hierarchical() {
        let acl = AccessRegistry::with_admin(admin());
        assert!(acl.has_role(Role::Administrator, &admin()));
        assert!(!acl.has_role(Role::TaskCreator, &admin()));
    }

    #[test]
    fn test_regrant_is_silent() {
        let mut acl = AccessRegistry::with_admin(admin());
        let bob = Address::from_label("bob");
        let mut tx = TxContext::new(admin(), 0);

        acl.grant_role(&mut tx, Address::ZERO, Role::Minter, bob).unwrap();
        acl.grant_role(&mut tx, Address::ZERO, Role::Minter, bob).unwrap();
        assert_eq!(tx.event_count(), 1);
        assert_eq!(acl.members(Role::Minter), vec![bob]);
    }
}
