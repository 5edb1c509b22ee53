//! Institutions that publish tasks.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::InstitutionDirectory;
use crate::access::{AccessRegistry, Role};
use crate::error::{ProtocolError, Result};
use crate::events::{Event, TxContext};
use crate::types::{Address, Timestamp};

/// Verification status of an institution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstitutionStatus {
    /// Registered, awaiting review
    Pending,
    /// Reviewed and trusted
    Verified,
    /// Temporarily distrusted
    Suspended,
    /// Permanently distrusted
    Revoked,
}

impl fmt::Display for InstitutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Suspended => "suspended",
            Self::Revoked => "revoked",
        };
        f.write_str(name)
    }
}

/// A registered institution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    /// Display name
    pub name: String,
    /// Opaque metadata pointer
    pub metadata_locator: String,
    /// Current status
    pub status: InstitutionStatus,
    /// Registration time
    pub registered_at: Timestamp,
    /// Time of the last successful verification, if any
    pub verified_at: Option<Timestamp>,
    /// Tasks published
    pub tasks_created: u64,
    /// Credentials issued for its tasks
    pub credentials_issued: u64,
}

/// Status registry of institutions
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstitutionRegistry {
    address: Address,
    access: AccessRegistry,
    institutions: BTreeMap<Address, Institution>,
    registration_order: Vec<Address>,
    verified: Vec<Address>,
}

impl InstitutionRegistry {
    /// Deploy a registry administered by `admin`
    #[must_use]
    pub fn new(address: Address, admin: Address) -> Self {
        Self {
            address,
            access: AccessRegistry::with_admin(admin),
            institutions: BTreeMap::new(),
            registration_order: Vec::new(),
            verified: Vec::new(),
        }
    }

    /// Component address
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Grant a role on the registry
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.grant_role(tx, self.address, role, account)
    }

    /// Allow `account` to verify institutions and bump their counters
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_verifier_role(&mut self, tx: &mut TxContext, account: Address) -> Result<()> {
        self.grant_role(tx, Role::InstitutionVerifier, account)
    }

    /// Register the sender as an institution
    ///
    /// # Errors
    /// Returns `InvalidInput` for an empty name, `StateConflict` if the
    /// sender is already registered
    pub fn register_institution(
        &mut self,
        tx: &mut TxContext,
        name: &str,
        metadata_locator: &str,
    ) -> Result<()> {
        let institution = tx.sender();
        if name.is_empty() {
            return Err(ProtocolError::invalid("name required"));
        }
        if self.institutions.contains_key(&institution) {
            return Err(ProtocolError::conflict("already registered"));
        }

        self.institutions.insert(
            institution,
            Institution {
                name: name.to_string(),
                metadata_locator: metadata_locator.to_string(),
                status: InstitutionStatus::Pending,
                registered_at: tx.timestamp(),
                verified_at: None,
                tasks_created: 0,
                credentials_issued: 0,
            },
        );
        self.registration_order.push(institution);

        info!(institution = %institution, name, "Institution registered");
        tx.emit(
            self.address,
            Event::InstitutionRegistered {
                institution,
                name: name.to_string(),
                timestamp: tx.timestamp(),
            },
        );
        Ok(())
    }

    /// Mark a registered institution as verified
    ///
    /// # Errors
    /// - `Unauthorized` without the institution-verifier role
    /// - `NotFound` for an unregistered institution
    /// - `StateConflict` if it is already verified
    pub fn verify_institution(&mut self, tx: &mut TxContext, institution: Address) -> Result<()> {
        self.access.require(Role::InstitutionVerifier, &tx.sender())?;
        let entry = self.entry_mut(&institution)?;
        if entry.status == InstitutionStatus::Verified {
            return Err(ProtocolError::conflict("already verified"));
        }

        entry.status = InstitutionStatus::Verified;
        entry.verified_at = Some(tx.timestamp());
        self.verified.push(institution);

        info!(institution = %institution, verifier = %tx.sender(), "Institution verified");
        tx.emit(
            self.address,
            Event::InstitutionVerified {
                institution,
                verifier: tx.sender(),
                timestamp: tx.timestamp(),
            },
        );
        Ok(())
    }

    /// Set an institution's status; leaving `Verified` drops it from the
    /// verified list.
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator,
    /// `NotFound` for an unregistered institution
    pub fn update_institution_status(
        &mut self,
        tx: &mut TxContext,
        institution: Address,
        status: InstitutionStatus,
    ) -> Result<()> {
        self.access.require(Role::Administrator, &tx.sender())?;
        let now = tx.timestamp();
        let entry = self.entry_mut(&institution)?;
        let old = entry.status;
        entry.status = status;

        if old == InstitutionStatus::Verified && status != InstitutionStatus::Verified {
            self.verified.retain(|a| *a != institution);
        } else if old != InstitutionStatus::Verified && status == InstitutionStatus::Verified {
            entry.verified_at = Some(now);
            self.verified.push(institution);
        }

        info!(institution = %institution, %old, new = %status, "Institution status changed");
        tx.emit(
            self.address,
            Event::InstitutionStatusChanged {
                institution,
                old,
                new: status,
            },
        );
        Ok(())
    }

    /// Replace the sender's metadata locator
    ///
    /// # Errors
    /// Returns `NotFound` if the sender is not registered
    pub fn update_metadata_locator(&mut self, tx: &mut TxContext, locator: &str) -> Result<()> {
        let institution = tx.sender();
        let address = self.address;
        let entry = self.entry_mut(&institution)?;
        entry.metadata_locator = locator.to_string();

        info!(institution = %institution, locator, "Institution metadata updated");
        tx.emit(
            address,
            Event::InstitutionMetadataUpdated {
                institution,
                metadata_locator: locator.to_string(),
            },
        );
        Ok(())
    }

    fn entry_mut(&mut self, institution: &Address) -> Result<&mut Institution> {
        self.institutions
            .get_mut(institution)
            .ok_or_else(|| ProtocolError::not_found("institution not registered"))
    }

    /// Look up an institution
    ///
    /// # Errors
    /// Returns `NotFound` for an unregistered institution
    pub fn get_institution(&self, institution: &Address) -> Result<&Institution> {
        self.institutions
            .get(institution)
            .ok_or_else(|| ProtocolError::not_found("institution not registered"))
    }

    /// Currently verified institutions, in verification order
    #[must_use]
    pub fn verified_institutions(&self) -> &[Address] {
        &self.verified
    }

    /// Every registered institution, in registration order
    #[must_use]
    pub fn institutions(&self) -> &[Address] {
        &self.registration_order
    }

    /// Number of registered institutions
    #[must_use]
    pub fn total_institutions(&self) -> usize {
        self.registration_order.len()
    }
}

impl InstitutionDirectory for InstitutionRegistry {
    fn is_registered(&self, institution: &Address) -> bool {
        self.institutions.contains_key(institution)
    }

    fn is_verified(&self, institution: &Address) -> bool {
        self.institutions
            .get(institution)
            .is_some_and(|i| i.status == InstitutionStatus::Verified)
    }

    fn increment_task_count(&mut self, tx: &mut TxContext, institution: Address) -> Result<()> {
        self.access.require(Role::InstitutionVerifier, &tx.sender())?;
        let entry = self.entry_mut(&institution)?;
        entry.tasks_created += 1;
        info!(institution = %institution, tasks = entry.tasks_created, "Institution task count");
        Ok(())
    }

    fn increment_credential_count(
        &mut self,
        tx: &mut TxContext,
        institution: Address,
    ) -> Result<()> {
        self.access.require(Role::InstitutionVerifier, &tx.sender())?;
        let entry = self.entry_mut(&institution)?;
        entry.credentials_issued += 1;
        info!(
            institution = %institution,
            credentials = entry.credentials_issued,
            "Institution credential count"
        );
        Ok(())
    }
}
