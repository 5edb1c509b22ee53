//! Soul-bound completion credentials.
//!
//! One credential per `(task, learner)` pair. Credentials can be revoked but
//! never transferred.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::CredentialIssuer;
use crate::access::{AccessRegistry, Role};
use crate::error::{ProtocolError, Result};
use crate::events::{Event, TxContext};
use crate::types::{Address, CredentialId, TaskId, Timestamp};

/// An issued credential
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Sequential id
    pub id: CredentialId,
    /// Holder
    pub learner: Address,
    /// Task it attests
    pub task_id: TaskId,
    /// Metadata locator, may be empty
    pub locator: String,
    /// Issue time
    pub issued_at: Timestamp,
    /// Whether it was revoked
    pub revoked: bool,
    /// Reason given on revocation
    pub revocation_reason: Option<String>,
}

/// Registry of issued credentials
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialRegistry {
    address: Address,
    name: String,
    symbol: String,
    base_uri: String,
    access: AccessRegistry,
    credentials: Vec<Credential>,
    by_learner: BTreeMap<Address, Vec<CredentialId>>,
    by_task: BTreeMap<TaskId, BTreeMap<Address, CredentialId>>,
}

impl CredentialRegistry {
    /// Deploy a registry administered by `admin`
    #[must_use]
    pub fn new(
        address: Address,
        admin: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        base_uri: impl Into<String>,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            base_uri: base_uri.into(),
            access: AccessRegistry::with_admin(admin),
            credentials: Vec::new(),
            by_learner: BTreeMap::new(),
            by_task: BTreeMap::new(),
        }
    }

    /// Component address
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection symbol
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Grant a role on the registry
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.grant_role(tx, self.address, role, account)
    }

    /// Look up a credential
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id
    pub fn get_credential(&self, credential_id: CredentialId) -> Result<&Credential> {
        usize::try_from(credential_id)
            .ok()
            .and_then(|idx| self.credentials.get(idx))
            .ok_or_else(|| {
                ProtocolError::not_found(format!("credential {credential_id} does not exist"))
            })
    }

    /// Ids of every credential issued to `learner`, revoked ones included
    #[must_use]
    pub fn credentials_by_learner(&self, learner: &Address) -> &[CredentialId] {
        self.by_learner.get(learner).map_or(&[], Vec::as_slice)
    }

    /// Metadata URI: the stored locator, or `base_uri` followed by the id
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id
    pub fn credential_uri(&self, credential_id: CredentialId) -> Result<String> {
        let credential = self.get_credential(credential_id)?;
        if credential.locator.is_empty() {
            Ok(format!("{}{credential_id}", self.base_uri))
        } else {
            Ok(credential.locator.clone())
        }
    }

    /// Whether the credential exists and is not revoked
    #[must_use]
    pub fn is_valid_credential(&self, credential_id: CredentialId) -> bool {
        self.get_credential(credential_id)
            .is_ok_and(|c| !c.revoked)
    }

    /// Whether a credential was issued for `(task_id, learner)`
    #[must_use]
    pub fn has_credential(&self, task_id: TaskId, learner: &Address) -> bool {
        self.by_task
            .get(&task_id)
            .is_some_and(|holders| holders.contains_key(learner))
    }

    /// Number of credentials ever issued
    #[must_use]
    pub fn total_supply(&self) -> u64 {
        self.credentials.len() as u64
    }

    /// Credentials cannot change hands.
    ///
    /// # Errors
    /// Always returns `Unauthorized`
    pub fn transfer(
        &mut self,
        tx: &mut TxContext,
        _to: Address,
        credential_id: CredentialId,
    ) -> Result<()> {
        warn!(credential_id, by = %tx.sender(), "Rejected credential transfer");
        Err(ProtocolError::unauthorized("soul-bound: transfer not allowed"))
    }
}

impl CredentialIssuer for CredentialRegistry {
    fn mint_credential(
        &mut self,
        tx: &mut TxContext,
        learner: Address,
        task_id: TaskId,
        locator: &str,
    ) -> Result<CredentialId> {
        self.access.require(Role::Minter, &tx.sender())?;
        if learner.is_zero() {
            return Err(ProtocolError::invalid("invalid learner address"));
        }
        if self.has_credential(task_id, &learner) {
            return Err(ProtocolError::conflict(
                "credential already minted for this task",
            ));
        }

        let id = self.credentials.len() as CredentialId;
        self.credentials.push(Credential {
            id,
            learner,
            task_id,
            locator: locator.to_string(),
            issued_at: tx.timestamp(),
            revoked: false,
            revocation_reason: None,
        });
        self.by_learner.entry(learner).or_default().push(id);
        self.by_task.entry(task_id).or_default().insert(learner, id);

        info!(credential_id = id, task_id, learner = %learner, "Credential minted");
        tx.emit(
            self.address,
            Event::CredentialMinted {
                credential_id: id,
                learner,
                task_id,
                locator: locator.to_string(),
            },
        );
        Ok(id)
    }

    fn revoke_credential(
        &mut self,
        tx: &mut TxContext,
        credential_id: CredentialId,
        reason: &str,
    ) -> Result<()> {
        self.access.require(Role::Administrator, &tx.sender())?;
        let address = self.address;
        let credential = usize::try_from(credential_id)
            .ok()
            .and_then(|idx| self.credentials.get_mut(idx))
            .ok_or_else(|| {
                ProtocolError::not_found(format!("credential {credential_id} does not exist"))
            })?;

        if credential.revoked {
            return Err(ProtocolError::conflict("credential already revoked"));
        }
        credential.revoked = true;
        credential.revocation_reason = Some(reason.to_string());

        info!(credential_id, learner = %credential.learner, reason, "Credential revoked");
        tx.emit(
            address,
            Event::CredentialRevoked {
                credential_id,
                learner: credential.learner,
                reason: reason.to_string(),
            },
        );
        Ok(())
    }

    fn credential_count(&self, learner: &Address) -> usize {
        self.credentials_by_learner(learner).len()
    }
}
