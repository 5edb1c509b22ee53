//! Composition root.
//!
//! The coordinator holds shared handles to every component, runs the
//! multi-component flows (publishing a task, finalizing a completion) and
//! aggregates read views. It never touches component state directly; every
//! effect goes through a component's public operation.
//!
//! Locks are always taken in the same order (tasks, proofs, credentials,
//! rewards, token, institutions, events) and held until the transaction's
//! events are committed, so concurrent callers are linearized.

mod stats;

pub use stats::{InstitutionStats, LearnerStats, ProtocolSnapshot};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::access::{AccessRegistry, Role};
use crate::collaborators::{
    CredentialIssuer, CredentialRegistry, FungibleToken, InstitutionDirectory,
    InstitutionRegistry, LearnToken,
};
use crate::config::ProtocolConfig;
use crate::crypto::{Hash, ProofSignature};
use crate::error::{ProtocolError, Result};
use crate::events::{Event, EventLog, TxContext};
use crate::proofs::ProofVerifier;
use crate::rewards::RewardLedger;
use crate::tasks::{NewTask, TaskRegistry};
use crate::types::{Address, CredentialId, RewardKind, TaskId, TokenAmount};

/// Shared handle to a component
pub type Handle<T> = Arc<RwLock<T>>;

fn handle<T>(component: T) -> Handle<T> {
    Arc::new(RwLock::new(component))
}

/// Handles to every component the coordinator drives
#[derive(Clone, Debug)]
pub struct Components {
    /// Task registry
    pub tasks: Handle<TaskRegistry>,
    /// Proof verifier
    pub proofs: Handle<ProofVerifier>,
    /// Credential registry
    pub credentials: Handle<CredentialRegistry>,
    /// Reward ledger
    pub rewards: Handle<RewardLedger>,
    /// Reward token
    pub token: Handle<LearnToken>,
    /// Institution registry
    pub institutions: Handle<InstitutionRegistry>,
}

/// Replacement handles for [`Coordinator::update_contracts`]; `None` keeps
/// the current one.
#[derive(Clone, Debug, Default)]
pub struct ContractUpdate {
    /// New task registry
    pub tasks: Option<Handle<TaskRegistry>>,
    /// New proof verifier
    pub proofs: Option<Handle<ProofVerifier>>,
    /// New credential registry
    pub credentials: Option<Handle<CredentialRegistry>>,
    /// New reward ledger
    pub rewards: Option<Handle<RewardLedger>>,
    /// New institution registry
    pub institutions: Option<Handle<InstitutionRegistry>>,
}

/// Result of a finalized completion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReceipt {
    /// Completed task
    pub task_id: TaskId,
    /// Learner
    pub learner: Address,
    /// Issued credential
    pub credential_id: CredentialId,
    /// Credited reward
    pub reward: TokenAmount,
    /// Payout kind of the task
    pub kind: RewardKind,
    /// Sequence numbers of the committed events
    pub event_sequences: Vec<u64>,
}

/// Orchestrates the learn, prove, earn workflow
#[derive(Debug)]
pub struct Coordinator {
    address: Address,
    access: AccessRegistry,
    components: Components,
    events: Handle<EventLog>,
}

impl Coordinator {
    /// Coordinator over existing components.
    ///
    /// For [`complete_learning`](Self::complete_learning) and
    /// [`publish_task`](Self::publish_task) to succeed, `address` must hold
    /// the task-verifier, minter, distributor and institution-verifier roles
    /// on the respective components.
    #[must_use]
    pub fn new(
        address: Address,
        admin: Address,
        components: Components,
        events: Handle<EventLog>,
    ) -> Self {
        Self {
            address,
            access: AccessRegistry::with_admin(admin),
            components,
            events,
        }
    }

    /// Deploy every component under `admin`, wire the coordinator's roles
    /// and fund the reward ledger.
    ///
    /// # Errors
    /// Returns `InvalidInput` if `config` fails validation
    pub fn deploy(config: &ProtocolConfig, admin: Address) -> Result<Self> {
        config.validate()?;

        let address = Address::from_label("coordinator");
        let mut tasks = TaskRegistry::new(Address::from_label("task-registry"), admin);
        let proofs = ProofVerifier::new(
            Address::from_label("proof-verifier"),
            admin,
            config.domain_name.clone(),
            config.domain_version.clone(),
            config.chain_id,
        );
        let mut credentials = CredentialRegistry::new(
            Address::from_label("credential-registry"),
            admin,
            config.credential.name.clone(),
            config.credential.symbol.clone(),
            config.credential.base_uri.clone(),
        );
        let mut rewards = RewardLedger::with_config(
            Address::from_label("reward-ledger"),
            admin,
            config.reward.to_reward_config(),
        )?;
        let mut token = LearnToken::new(
            Address::from_label("learn-token"),
            admin,
            config.token.name.clone(),
            config.token.symbol.clone(),
            TokenAmount::from_tokens(config.token.initial_supply),
            TokenAmount::from_tokens(config.token.max_supply),
        )?;
        let mut institutions =
            InstitutionRegistry::new(Address::from_label("institution-registry"), admin);

        let mut tx = TxContext::now(admin);
        tasks.grant_verifier_role(&mut tx, address)?;
        credentials.grant_role(&mut tx, Role::Minter, address)?;
        rewards.grant_distributor_role(&mut tx, address)?;
        institutions.grant_verifier_role(&mut tx, address)?;
        token.transfer(
            &mut tx,
            rewards.address(),
            TokenAmount::from_tokens(config.token.reward_funding),
        )?;

        let mut events = EventLog::new(config.event_capacity);
        let committed = events.commit(tx);
        info!(
            coordinator = %address,
            chain_id = config.chain_id,
            bootstrap_events = committed.len(),
            "Protocol deployed"
        );

        let components = Components {
            tasks: handle(tasks),
            proofs: handle(proofs),
            credentials: handle(credentials),
            rewards: handle(rewards),
            token: handle(token),
            institutions: handle(institutions),
        };
        Ok(Self::new(address, admin, components, handle(events)))
    }

    /// Coordinator identity used for downstream calls
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Component handles
    #[must_use]
    pub const fn components(&self) -> &Components {
        &self.components
    }

    /// Committed event log
    #[must_use]
    pub const fn events(&self) -> &Handle<EventLog> {
        &self.events
    }

    /// Publish the events of a transaction the caller ran directly against
    /// a component
    pub async fn commit(&self, tx: TxContext) -> Vec<u64> {
        self.events.write().await.commit(tx)
    }

    /// Repoint component handles; `None` entries are left unchanged.
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub async fn update_contracts(
        &mut self,
        mut tx: TxContext,
        update: ContractUpdate,
    ) -> Result<()> {
        self.access.require(Role::Administrator, &tx.sender())?;

        if let Some(tasks) = update.tasks {
            self.components.tasks = tasks;
        }
        if let Some(proofs) = update.proofs {
            self.components.proofs = proofs;
        }
        if let Some(credentials) = update.credentials {
            self.components.credentials = credentials;
        }
        if let Some(rewards) = update.rewards {
            self.components.rewards = rewards;
        }
        if let Some(institutions) = update.institutions {
            self.components.institutions = institutions;
        }

        let event = Event::ContractsUpdated {
            tasks: self.components.tasks.read().await.address(),
            proofs: self.components.proofs.read().await.address(),
            credentials: self.components.credentials.read().await.address(),
            rewards: self.components.rewards.read().await.address(),
            institutions: self.components.institutions.read().await.address(),
        };
        info!(by = %tx.sender(), "Contracts updated");
        tx.emit(self.address, event);
        self.commit(tx).await;
        Ok(())
    }

    /// Register a task for the sending institution and count it against the
    /// institution when registered.
    ///
    /// # Errors
    /// Returns the task registry's error; nothing is recorded on failure
    pub async fn publish_task(&self, mut tx: TxContext, params: NewTask) -> Result<TaskId> {
        let mut tasks = self.components.tasks.write().await;
        let mut institutions = self.components.institutions.write().await;
        let institution = tx.sender();

        let saved = tasks.clone();
        let task_id = tasks.create_task(&mut tx, params)?;
        if institutions.is_registered(&institution) {
            let counted = tx.as_caller(self.address, |tx| {
                institutions.increment_task_count(tx, institution)
            });
            if let Err(e) = counted {
                *tasks = saved;
                return Err(e);
            }
        }

        self.events.write().await.commit(tx);
        Ok(task_id)
    }

    /// Submit a signed proof as the sender
    ///
    /// # Errors
    /// See [`ProofVerifier::submit_proof`]
    pub async fn submit_proof(
        &self,
        mut tx: TxContext,
        task_id: TaskId,
        proof_hash: Hash,
        signature: &ProofSignature,
    ) -> Result<()> {
        let tasks = self.components.tasks.read().await;
        let mut proofs = self.components.proofs.write().await;
        proofs.submit_proof(&mut tx, &tasks, task_id, proof_hash, signature)?;
        self.events.write().await.commit(tx);
        Ok(())
    }

    /// Record the sender's decision on a proof
    ///
    /// # Errors
    /// See [`ProofVerifier::verify_proof`]
    pub async fn verify_proof(
        &self,
        mut tx: TxContext,
        task_id: TaskId,
        learner: Address,
        approved: bool,
        reason: &str,
    ) -> Result<()> {
        let mut proofs = self.components.proofs.write().await;
        proofs.verify_proof(&mut tx, task_id, learner, approved, reason)?;
        self.events.write().await.commit(tx);
        Ok(())
    }

    /// Finalize an approved proof: mark the task completed, issue the
    /// credential, credit the reward and count the credential against the
    /// creating institution.
    ///
    /// The sender must be the task's verifier or a proof verifier. Downstream
    /// calls run under the coordinator's own identity. Either every step
    /// takes effect or none does.
    ///
    /// # Errors
    /// - `NotFound` for an unknown task
    /// - `Unauthorized` for any other sender
    /// - `StateConflict` if the proof is not approved, or any downstream
    ///   uniqueness check fails
    pub async fn complete_learning(
        &self,
        mut tx: TxContext,
        task_id: TaskId,
        learner: Address,
        credential_locator: &str,
    ) -> Result<CompletionReceipt> {
        let mut tasks = self.components.tasks.write().await;
        let proofs = self.components.proofs.read().await;
        let mut credentials = self.components.credentials.write().await;
        let mut rewards = self.components.rewards.write().await;
        let mut institutions = self.components.institutions.write().await;

        let task = tasks.get_task(task_id)?.clone();
        let caller = tx.sender();
        if task.verifier != caller && !proofs.access().has_role(Role::ProofVerifier, &caller) {
            return Err(ProtocolError::unauthorized(format!(
                "account {caller} may not finalize task {task_id}"
            )));
        }
        if !proofs.is_proof_verified(task_id, &learner) {
            return Err(ProtocolError::conflict("proof not verified"));
        }

        let saved_tasks = tasks.clone();
        let saved_credentials = credentials.clone();
        let saved_rewards = rewards.clone();
        let saved_institutions = institutions.clone();

        let outcome = tx.as_caller(self.address, |tx| -> Result<(CredentialId, TokenAmount)> {
            tasks.mark_task_completed(tx, task_id, learner)?;
            let credential_id =
                credentials.mint_credential(tx, learner, task_id, credential_locator)?;
            let reward = rewards.distribute_reward(
                tx,
                &tasks,
                task_id,
                learner,
                task.difficulty,
                task.reward_kind,
            )?;
            if institutions.is_registered(&task.creator) {
                institutions.increment_credential_count(tx, task.creator)?;
            }
            Ok((credential_id, reward))
        });

        let (credential_id, reward) = match outcome {
            Ok(done) => done,
            Err(e) => {
                warn!(task_id, learner = %learner, error = %e, "Completion rolled back");
                *tasks = saved_tasks;
                *credentials = saved_credentials;
                *rewards = saved_rewards;
                *institutions = saved_institutions;
                return Err(e);
            }
        };

        let event_sequences = self.events.write().await.commit(tx);
        info!(
            task_id,
            learner = %learner,
            credential_id,
            reward = %reward,
            "Learning completed"
        );
        Ok(CompletionReceipt {
            task_id,
            learner,
            credential_id,
            reward,
            kind: task.reward_kind,
            event_sequences,
        })
    }

    /// Pay out the sender's pending rewards
    ///
    /// # Errors
    /// See [`RewardLedger::claim_rewards`]
    pub async fn claim_rewards(&self, mut tx: TxContext) -> Result<TokenAmount> {
        let mut rewards = self.components.rewards.write().await;
        let mut token = self.components.token.write().await;
        let amount = rewards.claim_rewards(&mut tx, &mut *token)?;
        self.events.write().await.commit(tx);
        Ok(amount)
    }

    /// Completion, credential and reward totals of `learner`
    pub async fn get_learner_stats(&self, learner: &Address) -> LearnerStats {
        let tasks = self.components.tasks.read().await;
        let credentials = self.components.credentials.read().await;
        let rewards = self.components.rewards.read().await;
        LearnerStats {
            completed_tasks: tasks.completed_tasks(learner).len(),
            credentials_earned: credentials.credential_count(learner),
            pending_rewards: rewards.pending_rewards(learner),
        }
    }

    /// Verification status and counters of `institution`; zeros when it
    /// never registered
    pub async fn get_institution_stats(&self, institution: &Address) -> InstitutionStats {
        let institutions = self.components.institutions.read().await;
        institutions
            .get_institution(institution)
            .map_or_else(|_| InstitutionStats::default(), |entry| InstitutionStats {
                is_verified: institutions.is_verified(institution),
                tasks_created: entry.tasks_created,
                credentials_issued: entry.credentials_issued,
            })
    }

    /// Token balance of `account`
    pub async fn balance_of(&self, account: &Address) -> TokenAmount {
        self.components.token.read().await.balance_of(account)
    }

    /// Serializable copy of every component with a Merkle root over them
    ///
    /// # Errors
    /// Returns error if a component fails to serialize
    pub async fn snapshot(&self) -> std::result::Result<ProtocolSnapshot, serde_json::Error> {
        let tasks = self.components.tasks.read().await;
        let proofs = self.components.proofs.read().await;
        let credentials = self.components.credentials.read().await;
        let rewards = self.components.rewards.read().await;
        let token = self.components.token.read().await;
        let institutions = self.components.institutions.read().await;
        let events = self.events.read().await;

        ProtocolSnapshot::capture(
            tasks.clone(),
            proofs.clone(),
            credentials.clone(),
            rewards.clone(),
            token.clone(),
            institutions.clone(),
            events.len() as u64,
        )
    }
}

#[cfg(test)]
mod tests;
