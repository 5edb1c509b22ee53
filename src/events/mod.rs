//! Transaction context and the append-only event log.
//!
//! Operations never publish directly. They buffer events on the
//! [`TxContext`] they run under; the caller hands a successful context to
//! [`EventLog::commit`], which assigns sequence numbers and fans records out
//! to live subscribers. Dropping a context after a failure publishes nothing.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::access::Role;
use crate::collaborators::InstitutionStatus;
use crate::crypto::Hash;
use crate::types::{
    now_millis, Address, CredentialId, Difficulty, RewardKind, TaskId, TaskStatus, Timestamp,
    TokenAmount,
};

/// Everything an observer can see happen
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A task was registered
    TaskCreated {
        /// New task id
        task_id: TaskId,
        /// Creating institution
        creator: Address,
        /// Declared difficulty
        difficulty: Difficulty,
        /// Declared base reward
        base_reward: TokenAmount,
    },
    /// A task's administrative status changed
    TaskUpdated {
        /// Task id
        task_id: TaskId,
        /// New status
        status: TaskStatus,
    },
    /// A learner's completion was recorded
    TaskCompleted {
        /// Task id
        task_id: TaskId,
        /// Learner
        learner: Address,
        /// When it was recorded
        timestamp: Timestamp,
    },
    /// A learner submitted a signed proof
    ProofSubmitted {
        /// Task id
        task_id: TaskId,
        /// Learner
        learner: Address,
        /// Proof digest
        proof_hash: Hash,
        /// Submission time
        timestamp: Timestamp,
    },
    /// A proof was approved
    ProofVerified {
        /// Task id
        task_id: TaskId,
        /// Learner
        learner: Address,
        /// Approving verifier
        verifier: Address,
        /// Decision time
        timestamp: Timestamp,
    },
    /// A proof was rejected
    ProofRejected {
        /// Task id
        task_id: TaskId,
        /// Learner
        learner: Address,
        /// Rejecting verifier
        verifier: Address,
        /// Why it was rejected
        reason: String,
    },
    /// A reward was credited to a learner's pending balance
    RewardDistributed {
        /// Task id
        task_id: TaskId,
        /// Learner
        learner: Address,
        /// Credited amount
        amount: TokenAmount,
        /// Payout kind
        kind: RewardKind,
    },
    /// A learner withdrew their pending balance
    RewardClaimed {
        /// Learner
        learner: Address,
        /// Amount transferred
        amount: TokenAmount,
        /// Claim time
        timestamp: Timestamp,
    },
    /// Reward configuration replaced
    RewardConfigUpdated {
        /// New base amount
        base_amount: TokenAmount,
        /// New multipliers in basis points
        multipliers: [u32; 4],
    },
    /// Reward distribution switched on or off
    RewardsToggled {
        /// New state
        enabled: bool,
    },
    /// Administrator pulled funds out of the reward ledger
    EmergencyWithdrawal {
        /// Recipient
        to: Address,
        /// Amount withdrawn
        amount: TokenAmount,
    },
    /// A role was granted
    RoleGranted {
        /// Role
        role: Role,
        /// Grantee
        account: Address,
        /// Granting administrator
        sender: Address,
    },
    /// A role was revoked
    RoleRevoked {
        /// Role
        role: Role,
        /// Former holder
        account: Address,
        /// Revoking administrator
        sender: Address,
    },
    /// A component stopped accepting mutations
    Paused {
        /// Administrator
        account: Address,
    },
    /// A component resumed accepting mutations
    Unpaused {
        /// Administrator
        account: Address,
    },
    /// Coordinator handles were repointed
    ContractsUpdated {
        /// Task registry address
        tasks: Address,
        /// Proof verifier address
        proofs: Address,
        /// Credential registry address
        credentials: Address,
        /// Reward ledger address
        rewards: Address,
        /// Institution registry address
        institutions: Address,
    },
    /// A credential was issued
    CredentialMinted {
        /// Credential id
        credential_id: CredentialId,
        /// Holder
        learner: Address,
        /// Task the credential attests
        task_id: TaskId,
        /// Metadata locator
        locator: String,
    },
    /// A credential was revoked
    CredentialRevoked {
        /// Credential id
        credential_id: CredentialId,
        /// Holder
        learner: Address,
        /// Why
        reason: String,
    },
    /// An institution registered itself
    InstitutionRegistered {
        /// Institution
        institution: Address,
        /// Display name
        name: String,
        /// Registration time
        timestamp: Timestamp,
    },
    /// An institution was verified
    InstitutionVerified {
        /// Institution
        institution: Address,
        /// Verifying account
        verifier: Address,
        /// Verification time
        timestamp: Timestamp,
    },
    /// An institution's status changed
    InstitutionStatusChanged {
        /// Institution
        institution: Address,
        /// Previous status
        old: InstitutionStatus,
        /// New status
        new: InstitutionStatus,
    },
    /// An institution replaced its metadata locator
    InstitutionMetadataUpdated {
        /// Institution
        institution: Address,
        /// New locator
        metadata_locator: String,
    },
    /// Tokens moved (mint has a zero `from`, burn a zero `to`)
    Transfer {
        /// Sender
        from: Address,
        /// Recipient
        to: Address,
        /// Amount
        amount: TokenAmount,
    },
}

/// The caller, block time and pending events of one transaction
#[derive(Debug)]
pub struct TxContext {
    sender: Address,
    timestamp: Timestamp,
    emitted: Vec<(Address, Event)>,
}

impl TxContext {
    /// Context for `sender` at an explicit time
    #[must_use]
    pub const fn new(sender: Address, timestamp: Timestamp) -> Self {
        Self {
            sender,
            timestamp,
            emitted: Vec::new(),
        }
    }

    /// Context for `sender` at the current wall-clock time
    #[must_use]
    pub fn now(sender: Address) -> Self {
        Self::new(sender, now_millis())
    }

    /// Caller identity
    #[must_use]
    pub const fn sender(&self) -> Address {
        self.sender
    }

    /// Transaction time
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Buffer an event emitted by the component at `emitter`
    pub fn emit(&mut self, emitter: Address, event: Event) {
        self.emitted.push((emitter, event));
    }

    /// Events buffered so far
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.emitted.iter().map(|(_, e)| e)
    }

    /// Number of buffered events
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.emitted.len()
    }

    /// Run `f` with `caller` as the sender, as when one component calls another
    pub fn as_caller<R>(&mut self, caller: Address, f: impl FnOnce(&mut Self) -> R) -> R {
        let original = std::mem::replace(&mut self.sender, caller);
        let out = f(self);
        self.sender = original;
        out
    }
}

/// A committed event with its position in the global order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0
    pub sequence: u64,
    /// Component that emitted the event
    pub emitter: Address,
    /// Time of the transaction that emitted it
    pub timestamp: Timestamp,
    /// The event
    pub event: Event,
}

/// Ordered, append-only record of committed events
#[derive(Debug)]
pub struct EventLog {
    records: Vec<EventRecord>,
    channel: broadcast::Sender<EventRecord>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl EventLog {
    /// Default live-subscriber buffer size
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Largest live-subscriber buffer; the channel preallocates every slot
    pub const MAX_CAPACITY: usize = 1 << 16;

    /// Create an empty log; `capacity` bounds how far a subscriber may lag
    /// and is clamped to `1..=MAX_CAPACITY`
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (channel, _) = broadcast::channel(capacity.clamp(1, Self::MAX_CAPACITY));
        Self {
            records: Vec::new(),
            channel,
        }
    }

    /// Publish every event buffered on `tx`, returning the assigned sequences
    pub fn commit(&mut self, tx: TxContext) -> Vec<u64> {
        let timestamp = tx.timestamp;
        let mut sequences = Vec::with_capacity(tx.emitted.len());

        for (emitter, event) in tx.emitted {
            let record = EventRecord {
                sequence: self.records.len() as u64,
                emitter,
                timestamp,
                event,
            };
            sequences.push(record.sequence);

            if self.channel.receiver_count() > 0 {
                // A lagging receiver is told so on its next recv
                let _ = self.channel.send(record.clone());
            }
            self.records.push(record);
        }

        debug!(count = sequences.len(), total = self.records.len(), "Committed events");
        sequences
    }

    /// All records in order
    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `sequence >= from`
    #[must_use]
    pub fn replay_from(&self, from: u64) -> &[EventRecord] {
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(self.records.len());
        &self.records[start..]
    }

    /// Receive records committed from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.channel.subscribe()
    }

    /// Number of committed records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been committed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggled(enabled: bool) -> Event {
        Event::RewardsToggled { enabled }
    }

    #[test]
    fn test_commit_assigns_dense_sequences() {
        let mut log = EventLog::default();
        let emitter = Address::from_label("rewards");

        let mut tx = TxContext::new(Address::from_label("admin"), 10);
        tx.emit(emitter, toggled(false));
        tx.emit(emitter, toggled(true));
        assert_eq!(log.commit(tx), vec![0, 1]);

        let mut tx = TxContext::new(Address::from_label("admin"), 20);
        tx.emit(emitter, toggled(false));
        assert_eq!(log.commit(tx), vec![2]);

        assert_eq!(log.len(), 3);
        assert_eq!(log.records()[2].timestamp, 20);
        assert_eq!(log.replay_from(1).len(), 2);
        assert!(log.replay_from(99).is_empty());
    }

    #[test]
    fn test_dropped_context_publishes_nothing() {
        let log = EventLog::default();
        {
            let mut tx = TxContext::new(Address::ZERO, 0);
            tx.emit(Address::ZERO, toggled(true));
        }
        assert!(log.is_empty());
    }

    #[test]
    fn test_subscriber_receives_committed_records() {
        let mut log = EventLog::new(8);
        let mut rx = log.subscribe();

        let mut tx = TxContext::new(Address::ZERO, 5);
        tx.emit(Address::from_label("tasks"), toggled(true));
        log.commit(tx);

        let record = rx.try_recv().unwrap();
        assert_eq!(record.sequence, 0);
        assert_eq!(record.event, toggled(true));
    }

    #[test]
    fn test_oversized_capacity_is_clamped() {
        let mut log = EventLog::new(usize::MAX);
        let mut rx = log.subscribe();

        let mut tx = TxContext::new(Address::ZERO, 5);
        tx.emit(Address::from_label("tasks"), toggled(false));
        log.commit(tx);
        assert_eq!(rx.try_recv().unwrap().event, toggled(false));
    }

    #[test]
    fn test_as_caller_restores_sender() {
        let user = Address::from_label("user");
        let component = Address::from_label("component");
        let mut tx = TxContext::new(user, 0);

        let inner = tx.as_caller(component, |tx| tx.sender());
        assert_eq!(inner, component);
        assert_eq!(tx.sender(), user);
    }

    #[test]
    fn test_event_serializes_by_name() {
        let json = serde_json::to_value(toggled(true)).unwrap();
        assert_eq!(json["RewardsToggled"]["enabled"], true);
    }
}
