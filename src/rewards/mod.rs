//! Reward accounting and settlement.
//!
//! Distribution credits a learner's pending balance; claiming pays the whole
//! pending balance out of the ledger's own token holdings. Amounts scale with
//! task difficulty:
//!
//! ```text
//! reward = base_amount * multipliers[difficulty] / 10_000
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{AccessRegistry, Role};
use crate::collaborators::FungibleToken;
use crate::error::{ProtocolError, Result};
use crate::events::{Event, TxContext};
use crate::tasks::TaskRegistry;
use crate::types::{Address, Difficulty, RewardKind, TaskId, Timestamp, TokenAmount};

/// Reward schedule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Reward at a multiplier of 10 000 basis points
    pub base_amount: TokenAmount,
    /// Basis-point multipliers indexed by [`Difficulty::rank`]
    pub multipliers: [u32; 4],
    /// Whether distribution is switched on
    pub enabled: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base_amount: TokenAmount::from_tokens(100),
            multipliers: [5_000, 10_000, 15_000, 25_000],
            enabled: true,
        }
    }
}

impl RewardConfig {
    /// Reject zero multipliers and schedules whose largest reward overflows
    ///
    /// # Errors
    /// Returns `InvalidInput` describing the problem
    pub fn validate(&self) -> Result<()> {
        if self.multipliers.contains(&0) {
            return Err(ProtocolError::invalid("invalid multipliers"));
        }
        let largest = self.multipliers.iter().copied().max().unwrap_or(0);
        if self.base_amount.apply_basis_points(largest).is_none() {
            return Err(ProtocolError::invalid("base amount too large"));
        }
        Ok(())
    }

    /// Reward for a task of `difficulty`
    #[must_use]
    pub fn reward_for(&self, difficulty: Difficulty) -> TokenAmount {
        // validate() rules out overflow for any stored config
        self.base_amount
            .apply_basis_points(self.multipliers[difficulty.rank()])
            .unwrap_or(TokenAmount::from_raw(u128::MAX))
    }
}

/// One distribution to one learner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    /// Task the reward is for
    pub task_id: TaskId,
    /// Recipient
    pub learner: Address,
    /// Credited amount
    pub amount: TokenAmount,
    /// Payout kind declared at distribution
    pub kind: RewardKind,
    /// Distribution time
    pub distributed_at: Timestamp,
    /// Whether it was paid out
    pub claimed: bool,
    /// Payout time
    pub claimed_at: Option<Timestamp>,
}

/// Pending balances, distribution records and the reward schedule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardLedger {
    address: Address,
    access: AccessRegistry,
    config: RewardConfig,
    pending: BTreeMap<Address, TokenAmount>,
    history: BTreeMap<Address, Vec<RewardRecord>>,
    distributed: BTreeSet<(TaskId, Address)>,
}

impl RewardLedger {
    /// Deploy with the default schedule
    #[must_use]
    pub fn new(address: Address, admin: Address) -> Self {
        Self {
            address,
            access: AccessRegistry::with_admin(admin),
            config: RewardConfig::default(),
            pending: BTreeMap::new(),
            history: BTreeMap::new(),
            distributed: BTreeSet::new(),
        }
    }

    /// Deploy with an explicit schedule
    ///
    /// # Errors
    /// Returns `InvalidInput` if `config` fails validation
    pub fn with_config(address: Address, admin: Address, config: RewardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(address, admin)
        })
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

    /// Grant any role scoped to the ledger
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.grant_role(tx, self.address, role, account)
    }

    /// Revoke any role scoped to the ledger
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn revoke_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.revoke_role(tx, self.address, role, account)
    }

    /// Allow `account` to credit rewards
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_distributor_role(&mut self, tx: &mut TxContext, account: Address) -> Result<()> {
        self.grant_role(tx, Role::Distributor, account)
    }

    /// Reward for a task of `difficulty` under the current schedule
    #[must_use]
    pub fn calculate_reward(&self, difficulty: Difficulty) -> TokenAmount {
        self.config.reward_for(difficulty)
    }

    /// Credit `learner` for completing `task_id`, returning the amount
    ///
    /// # Errors
    /// - `Unauthorized` without the distributor role
    /// - `InvalidInput` for the zero learner
    /// - `NotFound` for an unknown task
    /// - `StateConflict` if rewards are disabled, the learner has not
    ///   completed the task, or the pair was already rewarded
    pub fn distribute_reward(
        &mut self,
        tx: &mut TxContext,
        tasks: &TaskRegistry,
        task_id: TaskId,
        learner: Address,
        difficulty: Difficulty,
        kind: RewardKind,
    ) -> Result<TokenAmount> {
        self.access.require(Role::Distributor, &tx.sender())?;
        if !self.config.enabled {
            return Err(ProtocolError::conflict("rewards disabled"));
        }
        if learner.is_zero() {
            return Err(ProtocolError::invalid("invalid learner address"));
        }

        tasks.get_task(task_id)?;
        if !tasks.has_completed(task_id, &learner) {
            return Err(ProtocolError::conflict("task not completed by learner"));
        }
        if self.distributed.contains(&(task_id, learner)) {
            return Err(ProtocolError::conflict("reward already distributed"));
        }

        let amount = self.calculate_reward(difficulty);
        let pending = self
            .pending_rewards(&learner)
            .checked_add(amount)
            .ok_or_else(|| ProtocolError::invalid("pending balance overflow"))?;

        self.pending.insert(learner, pending);
        self.distributed.insert((task_id, learner));
        self.history.entry(learner).or_default().push(RewardRecord {
            task_id,
            learner,
            amount,
            kind,
            distributed_at: tx.timestamp(),
            claimed: false,
            claimed_at: None,
        });

        info!(
            task_id,
            learner = %learner,
            amount = %amount,
            %difficulty,
            "Reward distributed"
        );
        tx.emit(
            self.address,
            Event::RewardDistributed {
                task_id,
                learner,
                amount,
                kind,
            },
        );
        Ok(amount)
    }

    /// Pay the sender's whole pending balance out of the ledger's holdings
    ///
    /// The balance is cleared before the transfer and restored if the
    /// transfer fails.
    ///
    /// # Errors
    /// Returns `NoOp` with nothing pending, or the token's error
    /// (`InsufficientFunds`) if the ledger cannot cover the amount
    pub fn claim_rewards<T: FungibleToken>(
        &mut self,
        tx: &mut TxContext,
        token: &mut T,
    ) -> Result<TokenAmount> {
        let learner = tx.sender();
        let amount = self.pending.remove(&learner).unwrap_or_default();
        if amount.is_zero() {
            return Err(ProtocolError::NoOp("no pending rewards".into()));
        }

        let ledger = self.address;
        if let Err(e) = tx.as_caller(ledger, |tx| token.transfer(tx, learner, amount)) {
            warn!(learner = %learner, amount = %amount, error = %e, "Reward claim failed");
            self.pending.insert(learner, amount);
            return Err(e);
        }

        let now = tx.timestamp();
        for record in self
            .history
            .get_mut(&learner)
            .into_iter()
            .flatten()
            .filter(|r| !r.claimed)
        {
            record.claimed = true;
            record.claimed_at = Some(now);
        }

        info!(learner = %learner, amount = %amount, "Rewards claimed");
        tx.emit(
            self.address,
            Event::RewardClaimed {
                learner,
                amount,
                timestamp: now,
            },
        );
        Ok(amount)
    }

    /// Unclaimed balance of `learner`
    #[must_use]
    pub fn pending_rewards(&self, learner: &Address) -> TokenAmount {
        self.pending.get(learner).copied().unwrap_or_default()
    }

    /// Every distribution to `learner`, oldest first
    #[must_use]
    pub fn reward_history(&self, learner: &Address) -> &[RewardRecord] {
        debug!(learner = %learner, "Reward history lookup");
        self.history.get(learner).map_or(&[], Vec::as_slice)
    }

    /// The distribution record for the pair, if any
    #[must_use]
    pub fn reward_record(&self, task_id: TaskId, learner: &Address) -> Option<&RewardRecord> {
        self.reward_history(learner)
            .iter()
            .find(|r| r.task_id == task_id)
    }

    /// Current schedule
    #[must_use]
    pub const fn reward_config(&self) -> &RewardConfig {
        &self.config
    }

    /// Replace the base amount and multipliers; takes effect immediately
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator,
    /// `InvalidInput` for a zero multiplier or an overflowing schedule
    pub fn update_reward_config(
        &mut self,
        tx: &mut TxContext,
        base_amount: TokenAmount,
        multipliers: [u32; 4],
    ) -> Result<()> {
        self.access.require(Role::Administrator, &tx.sender())?;
        let config = RewardConfig {
            base_amount,
            multipliers,
            enabled: self.config.enabled,
        };
        config.validate()?;
        self.config = config;

        info!(base_amount = %base_amount, ?multipliers, "Reward config updated");
        tx.emit(
            self.address,
            Event::RewardConfigUpdated {
                base_amount,
                multipliers,
            },
        );
        Ok(())
    }

    /// Switch distribution on or off
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn set_rewards_enabled(&mut self, tx: &mut TxContext, enabled: bool) -> Result<()> {
        self.access.require(Role::Administrator, &tx.sender())?;
        self.config.enabled = enabled;
        info!(enabled, "Rewards toggled");
        tx.emit(self.address, Event::RewardsToggled { enabled });
        Ok(())
    }

    /// Move `amount` of the ledger's holdings to the calling administrator
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator, or the
    /// token's error if the ledger holds less than `amount`
    pub fn emergency_withdraw<T: FungibleToken>(
        &mut self,
        tx: &mut TxContext,
        token: &mut T,
        amount: TokenAmount,
    ) -> Result<()> {
        let admin = tx.sender();
        self.access.require(Role::Administrator, &admin)?;
        tx.as_caller(self.address, |tx| token.transfer(tx, admin, amount))?;

        warn!(to = %admin, amount = %amount, "Emergency withdrawal");
        tx.emit(self.address, Event::EmergencyWithdrawal { to: admin, amount });
        Ok(())
    }
}
