//! Collaborators the core components call into.
//!
//! The reward ledger pays through [`FungibleToken`], the coordinator issues
//! credentials through [`CredentialIssuer`] and books institution counters
//! through [`InstitutionDirectory`]. The in-process implementations below
//! back the node and the tests.

mod credential;
mod institution;
mod token;

pub use credential::{Credential, CredentialRegistry};
pub use institution::{Institution, InstitutionRegistry, InstitutionStatus};
pub use token::LearnToken;

use crate::error::Result;
use crate::events::TxContext;
use crate::types::{Address, CredentialId, TaskId, TokenAmount};

/// Balance ledger used to pay rewards
pub trait FungibleToken {
    /// Balance held by `account`
    fn balance_of(&self, account: &Address) -> TokenAmount;

    /// Move `amount` from the transaction sender to `to`
    ///
    /// # Errors
    /// Returns `InsufficientFunds` when the sender's balance is too low
    fn transfer(&mut self, tx: &mut TxContext, to: Address, amount: TokenAmount) -> Result<()>;
}

/// Issuer of soul-bound completion credentials
pub trait CredentialIssuer {
    /// Issue a credential for `(task_id, learner)`; an empty `locator`
    /// leaves the URI to the issuer's default
    ///
    /// # Errors
    /// Returns `StateConflict` if one was already issued for the pair
    fn mint_credential(
        &mut self,
        tx: &mut TxContext,
        learner: Address,
        task_id: TaskId,
        locator: &str,
    ) -> Result<CredentialId>;

    /// Revoke a credential
    ///
    /// # Errors
    /// Returns `StateConflict` on a second revocation
    fn revoke_credential(
        &mut self,
        tx: &mut TxContext,
        credential_id: CredentialId,
        reason: &str,
    ) -> Result<()>;

    /// Number of credentials ever issued to `learner`
    fn credential_count(&self, learner: &Address) -> usize;
}

/// Registry of institutions publishing tasks
pub trait InstitutionDirectory {
    /// Whether `institution` registered
    fn is_registered(&self, institution: &Address) -> bool;

    /// Whether `institution` is currently verified
    fn is_verified(&self, institution: &Address) -> bool;

    /// Count one more task published by `institution`
    ///
    /// # Errors
    /// Returns `NotFound` for an unregistered institution
    fn increment_task_count(&mut self, tx: &mut TxContext, institution: Address) -> Result<()>;

    /// Count one more credential issued for `institution`'s tasks
    ///
    /// # Errors
    /// Returns `NotFound` for an unregistered institution
    fn increment_credential_count(&mut self, tx: &mut TxContext, institution: Address)
        -> Result<()>;
}
