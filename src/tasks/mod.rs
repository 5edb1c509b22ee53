//! Task registry: the canonical list of tasks and who completed them.
//!
//! Task ids are dense: a task's id is its index in the registry. Completion is
//! tracked per `(task, learner)` pair; a task's own `status` is only an
//! administrative flag maintained by its creator.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::access::{AccessRegistry, Role};
use crate::error::{ProtocolError, Result};
use crate::events::{Event, TxContext};
use crate::types::{
    Address, Difficulty, RewardKind, TaskId, TaskStatus, Timestamp, TokenAmount,
};

/// A unit of learning work
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Sequential id
    pub id: TaskId,
    /// Institution that registered the task
    pub creator: Address,
    /// Opaque pointer to off-chain task metadata
    pub metadata_locator: String,
    /// How completion pays out
    pub reward_kind: RewardKind,
    /// Difficulty, drives the reward multiplier
    pub difficulty: Difficulty,
    /// Account assigned to confirm completions
    pub verifier: Address,
    /// Reward advertised by the creator
    pub base_reward: TokenAmount,
    /// Completion cap
    pub max_completions: u32,
    /// Completions recorded so far
    pub current_completions: u32,
    /// Administrative status
    pub status: TaskStatus,
    /// Registration time
    pub created_at: Timestamp,
    /// Expiry time
    pub expires_at: Timestamp,
}

impl Task {
    /// Whether `now` is past the expiry
    #[must_use]
    pub const fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Whether the completion cap is reached
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.current_completions >= self.max_completions
    }
}

/// Parameters of [`TaskRegistry::create_task`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Opaque metadata pointer, must be non-empty
    pub metadata_locator: String,
    /// Payout kind
    pub reward_kind: RewardKind,
    /// Difficulty
    pub difficulty: Difficulty,
    /// Assigned verifier, must be non-zero
    pub verifier: Address,
    /// Advertised reward
    pub base_reward: TokenAmount,
    /// Completion cap, must be positive
    pub max_completions: u32,
    /// Expiry, must be in the future
    pub expires_at: Timestamp,
}

/// Owns tasks and completion records
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRegistry {
    address: Address,
    access: AccessRegistry,
    tasks: Vec<Task>,
    by_creator: BTreeMap<Address, Vec<TaskId>>,
    completions: BTreeSet<(TaskId, Address)>,
    completed_by_learner: BTreeMap<Address, Vec<TaskId>>,
    paused: bool,
}

impl TaskRegistry {
    /// Deploy a registry at `address` administered by `admin`
    #[must_use]
    pub fn new(address: Address, admin: Address) -> Self {
        Self {
            address,
            access: AccessRegistry::with_admin(admin),
            tasks: Vec::new(),
            by_creator: BTreeMap::new(),
            completions: BTreeSet::new(),
            completed_by_learner: BTreeMap::new(),
            paused: false,
        }
    }

    /// Component address
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Role table
    #[must_use]
    pub const fn access(&self) -> &AccessRegistry {
        &self.access
    }

    /// Grant any role scoped to this registry
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.grant_role(tx, self.address, role, account)
    }

    /// Revoke any role scoped to this registry
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn revoke_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.revoke_role(tx, self.address, role, account)
    }

    /// Allow `account` to register tasks
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_task_creator_role(&mut self, tx: &mut TxContext, account: Address) -> Result<()> {
        self.grant_role(tx, Role::TaskCreator, account)
    }

    /// Allow `account` to record completions for any task
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_verifier_role(&mut self, tx: &mut TxContext, account: Address) -> Result<()> {
        self.grant_role(tx, Role::TaskVerifier, account)
    }

    /// Stop accepting new tasks and completions
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator,
    /// `StateConflict` if already paused
    pub fn pause(&mut self, tx: &mut TxContext) -> Result<()> {
        self.access.require(Role::Administrator, &tx.sender())?;
        if self.paused {
            return Err(ProtocolError::conflict("task registry is already paused"));
        }
        self.paused = true;
        info!(by = %tx.sender(), "Task registry paused");
        tx.emit(self.address, Event::Paused { account: tx.sender() });
        Ok(())
    }

    /// Resume accepting new tasks and completions
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator,
    /// `StateConflict` if not paused
    pub fn unpause(&mut self, tx: &mut TxContext) -> Result<()> {
        self.access.require(Role::Administrator, &tx.sender())?;
        if !self.paused {
            return Err(ProtocolError::conflict("task registry is not paused"));
        }
        self.paused = false;
        info!(by = %tx.sender(), "Task registry unpaused");
        tx.emit(self.address, Event::Unpaused { account: tx.sender() });
        Ok(())
    }

    /// Whether mutations are suspended
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    fn require_not_paused(&self) -> Result<()> {
        if self.paused {
            Err(ProtocolError::conflict("task registry is paused"))
        } else {
            Ok(())
        }
    }

    /// Register a task and return its id
    ///
    /// # Errors
    /// - `Unauthorized` without the task-creator role
    /// - `InvalidInput` for an empty locator, zero verifier, zero cap or
    ///   an expiry that is not in the future
    /// - `StateConflict` while paused
    pub fn create_task(&mut self, tx: &mut TxContext, params: NewTask) -> Result<TaskId> {
        self.require_not_paused()?;
        let creator = tx.sender();
        self.access.require(Role::TaskCreator, &creator)?;

        if params.metadata_locator.is_empty() {
            return Err(ProtocolError::invalid("metadata locator required"));
        }
        if params.verifier.is_zero() {
            return Err(ProtocolError::invalid("invalid verifier address"));
        }
        if params.max_completions == 0 {
            return Err(ProtocolError::invalid("max completions must be positive"));
        }
        if params.expires_at <= tx.timestamp() {
            return Err(ProtocolError::invalid("invalid expiration"));
        }

        let id = self.tasks.len() as TaskId;
        let task = Task {
            id,
            creator,
            metadata_locator: params.metadata_locator,
            reward_kind: params.reward_kind,
            difficulty: params.difficulty,
            verifier: params.verifier,
            base_reward: params.base_reward,
            max_completions: params.max_completions,
            current_completions: 0,
            status: TaskStatus::Active,
            created_at: tx.timestamp(),
            expires_at: params.expires_at,
        };

        info!(
            task_id = id,
            creator = %creator,
            difficulty = %task.difficulty,
            base_reward = %task.base_reward,
            "Task created"
        );
        tx.emit(
            self.address,
            Event::TaskCreated {
                task_id: id,
                creator,
                difficulty: task.difficulty,
                base_reward: task.base_reward,
            },
        );

        self.tasks.push(task);
        self.by_creator.entry(creator).or_default().push(id);
        Ok(id)
    }

    /// Change a task's administrative status; only its creator may do so.
    ///
    /// # Errors
    /// - `NotFound` for an unknown task
    /// - `Unauthorized` if the sender is not the creator
    /// - `StateConflict` if the task is already cancelled
    pub fn update_task_status(
        &mut self,
        tx: &mut TxContext,
        task_id: TaskId,
        status: TaskStatus,
    ) -> Result<()> {
        let address = self.address;
        let task = self.task_mut(task_id)?;

        if task.creator != tx.sender() {
            return Err(ProtocolError::unauthorized(
                "only the task creator may update status",
            ));
        }
        if task.status == TaskStatus::Cancelled {
            return Err(ProtocolError::conflict("task is cancelled"));
        }

        let previous = task.status;
        task.status = status;
        info!(task_id, from = %previous, to = %status, "Task status updated");
        tx.emit(address, Event::TaskUpdated { task_id, status });
        Ok(())
    }

    /// Record that `learner` completed `task_id`.
    ///
    /// The sender must be the task's assigned verifier or hold
    /// [`Role::TaskVerifier`] on this registry.
    ///
    /// # Errors
    /// - `NotFound` for an unknown task
    /// - `Unauthorized` for any other sender
    /// - `InvalidInput` for the zero learner
    /// - `StateConflict` if already completed, the task is cancelled, its
    ///   completion cap is reached, or the registry is paused
    pub fn mark_task_completed(
        &mut self,
        tx: &mut TxContext,
        task_id: TaskId,
        learner: Address,
    ) -> Result<()> {
        self.require_not_paused()?;
        let sender = tx.sender();
        let is_role_verifier = self.access.has_role(Role::TaskVerifier, &sender);
        let already = self.completions.contains(&(task_id, learner));

        let address = self.address;
        let task = self.task_mut(task_id)?;

        if task.verifier != sender && !is_role_verifier {
            return Err(ProtocolError::unauthorized(format!(
                "account {sender} may not verify task {task_id}"
            )));
        }
        if learner.is_zero() {
            return Err(ProtocolError::invalid("invalid learner address"));
        }
        if task.status == TaskStatus::Cancelled {
            return Err(ProtocolError::conflict("task is cancelled"));
        }
        if already {
            return Err(ProtocolError::conflict("task already completed"));
        }
        if task.is_full() {
            return Err(ProtocolError::conflict("max completions reached"));
        }

        task.current_completions += 1;
        let completions = task.current_completions;

        self.completions.insert((task_id, learner));
        self.completed_by_learner
            .entry(learner)
            .or_default()
            .push(task_id);

        info!(task_id, learner = %learner, completions, "Task completed");
        tx.emit(
            address,
            Event::TaskCompleted {
                task_id,
                learner,
                timestamp: tx.timestamp(),
            },
        );
        Ok(())
    }

    fn task_mut(&mut self, task_id: TaskId) -> Result<&mut Task> {
        usize::try_from(task_id)
            .ok()
            .and_then(|idx| self.tasks.get_mut(idx))
            .ok_or_else(|| ProtocolError::not_found(format!("task {task_id} does not exist")))
    }

    /// Look up a task
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id
    pub fn get_task(&self, task_id: TaskId) -> Result<&Task> {
        debug!(task_id, "Task lookup");
        usize::try_from(task_id)
            .ok()
            .and_then(|idx| self.tasks.get(idx))
            .ok_or_else(|| ProtocolError::not_found(format!("task {task_id} does not exist")))
    }

    /// Number of tasks ever created
    #[must_use]
    pub fn total_tasks(&self) -> u64 {
        self.tasks.len() as u64
    }

    /// Ids of tasks registered by `creator`
    #[must_use]
    pub fn tasks_by_creator(&self, creator: &Address) -> &[TaskId] {
        self.by_creator.get(creator).map_or(&[], Vec::as_slice)
    }

    /// Whether `learner` completed `task_id`
    #[must_use]
    pub fn has_completed(&self, task_id: TaskId, learner: &Address) -> bool {
        self.completions.contains(&(task_id, *learner))
    }

    /// Ids of tasks `learner` completed, in completion order
    #[must_use]
    pub fn completed_tasks(&self, learner: &Address) -> &[TaskId] {
        self.completed_by_learner
            .get(learner)
            .map_or(&[], Vec::as_slice)
    }

    /// All tasks in id order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}
