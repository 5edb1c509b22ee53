//! Aggregated read views.

use serde::{Deserialize, Serialize};

use crate::collaborators::{CredentialRegistry, InstitutionRegistry, LearnToken};
use crate::crypto::{hash_data, merkle_root, Hash};
use crate::proofs::ProofVerifier;
use crate::rewards::RewardLedger;
use crate::tasks::TaskRegistry;
use crate::types::{now_millis, Timestamp, TokenAmount};

/// Per-learner totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerStats {
    /// Tasks with a recorded completion
    pub completed_tasks: usize,
    /// Credentials held, revoked ones included
    pub credentials_earned: usize,
    /// Credited but unclaimed rewards
    pub pending_rewards: TokenAmount,
}

/// Per-institution totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionStats {
    /// Currently verified
    pub is_verified: bool,
    /// Tasks published through the coordinator
    pub tasks_created: u64,
    /// Credentials issued for its tasks
    pub credentials_issued: u64,
}

/// Point-in-time copy of every component.
///
/// `state_root` is the Merkle root over the BLAKE3 digests of each
/// component's JSON encoding, in field order. It does not cover
/// `taken_at` or `event_count`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    /// Wall-clock capture time
    pub taken_at: Timestamp,
    /// Committed events so far
    pub event_count: u64,
    /// Root over the component digests
    pub state_root: Hash,
    /// Task registry
    pub tasks: TaskRegistry,
    /// Proof verifier
    pub proofs: ProofVerifier,
    /// Credential registry
    pub credentials: CredentialRegistry,
    /// Reward ledger
    pub rewards: RewardLedger,
    /// Reward token
    pub token: LearnToken,
    /// Institution registry
    pub institutions: InstitutionRegistry,
}

impl ProtocolSnapshot {
    pub(super) fn capture(
        tasks: TaskRegistry,
        proofs: ProofVerifier,
        credentials: CredentialRegistry,
        rewards: RewardLedger,
        token: LearnToken,
        institutions: InstitutionRegistry,
        event_count: u64,
    ) -> Result<Self, serde_json::Error> {
        let leaves = [
            hash_data(&serde_json::to_vec(&tasks)?),
            hash_data(&serde_json::to_vec(&proofs)?),
            hash_data(&serde_json::to_vec(&credentials)?),
            hash_data(&serde_json::to_vec(&rewards)?),
            hash_data(&serde_json::to_vec(&token)?),
            hash_data(&serde_json::to_vec(&institutions)?),
        ];

        Ok(Self {
            taken_at: now_millis(),
            event_count,
            state_root: merkle_root(&leaves),
            tasks,
            proofs,
            credentials,
            rewards,
            token,
            institutions,
        })
    }
}
