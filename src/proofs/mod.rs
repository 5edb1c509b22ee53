//! Signed proof submission and verifier decisions.
//!
//! A learner claims a task by signing a [`ProofMessage`] under this
//! component's [`SigningDomain`]. The message includes the learner's current
//! nonce, so each accepted submission consumes the signature. Review happens
//! in a separate step by an account holding [`Role::ProofVerifier`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{AccessRegistry, Role};
use crate::crypto::{recover_signer, Hash, ProofMessage, ProofSignature, SigningDomain};
use crate::error::{ProtocolError, Result};
use crate::events::{Event, TxContext};
use crate::tasks::TaskRegistry;
use crate::types::{Address, TaskId, TaskStatus, Timestamp};

/// An accepted proof claim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSubmission {
    /// Claimed task
    pub task_id: TaskId,
    /// Claiming learner
    pub learner: Address,
    /// Digest of the off-chain proof material
    pub proof_hash: Hash,
    /// Submission time
    pub submitted_at: Timestamp,
}

/// A verifier's decision on a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Task id
    pub task_id: TaskId,
    /// Learner
    pub learner: Address,
    /// Deciding verifier
    pub verifier: Address,
    /// Approved or rejected
    pub approved: bool,
    /// Rejection reason, empty on approval
    pub reason: String,
    /// Decision time
    pub decided_at: Timestamp,
}

/// Accepts signed proofs and records verifier decisions
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofVerifier {
    address: Address,
    access: AccessRegistry,
    domain: SigningDomain,
    nonces: BTreeMap<Address, u64>,
    submissions: BTreeMap<TaskId, BTreeMap<Address, ProofSubmission>>,
    outcomes: BTreeMap<TaskId, BTreeMap<Address, VerificationOutcome>>,
}

impl ProofVerifier {
    /// Deploy at `address`; signatures are bound to `(name, version, chain_id, address)`
    #[must_use]
    pub fn new(
        address: Address,
        admin: Address,
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
    ) -> Self {
        Self {
            address,
            access: AccessRegistry::with_admin(admin),
            domain: SigningDomain {
                name: name.into(),
                version: version.into(),
                chain_id,
                verifying_contract: address,
            },
            nonces: BTreeMap::new(),
            submissions: BTreeMap::new(),
            outcomes: BTreeMap::new(),
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

    /// The signing domain learners must sign under
    #[must_use]
    pub const fn domain(&self) -> &SigningDomain {
        &self.domain
    }

    /// Domain separator hash
    #[must_use]
    pub fn get_domain_separator(&self) -> Hash {
        self.domain.separator()
    }

    /// Grant any role scoped to this component
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.grant_role(tx, self.address, role, account)
    }

    /// Revoke any role scoped to this component
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn revoke_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.revoke_role(tx, self.address, role, account)
    }

    /// Allow `account` to approve and reject proofs
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_verifier_role(&mut self, tx: &mut TxContext, account: Address) -> Result<()> {
        self.grant_role(tx, Role::ProofVerifier, account)
    }

    /// Current replay-protection counter of `learner`
    #[must_use]
    pub fn get_nonce(&self, learner: &Address) -> u64 {
        self.nonces.get(learner).copied().unwrap_or(0)
    }

    /// The exact digest a learner signs for these fields
    #[must_use]
    pub fn proof_digest(
        &self,
        task_id: TaskId,
        learner: Address,
        proof_hash: Hash,
        nonce: u64,
        deadline: Timestamp,
    ) -> Hash {
        ProofMessage {
            task_id,
            learner,
            proof_hash,
            nonce,
            deadline,
        }
        .digest(&self.domain)
    }

    /// Accept the sender's signed claim of having completed `task_id`.
    ///
    /// The signature must cover the sender's current nonce. On success the
    /// nonce advances, so the same signed payload can never be accepted again.
    ///
    /// # Errors
    /// - `Expired` if the signed deadline passed or the task expired
    /// - `InvalidSignature` if the signature does not verify or was made
    ///   by another account
    /// - `NotFound` for an unknown task
    /// - `StateConflict` if the task is not active or the sender already
    ///   submitted for it
    pub fn submit_proof(
        &mut self,
        tx: &mut TxContext,
        tasks: &TaskRegistry,
        task_id: TaskId,
        proof_hash: Hash,
        signature: &ProofSignature,
    ) -> Result<()> {
        let learner = tx.sender();
        let now = tx.timestamp();

        if now > signature.deadline {
            return Err(ProtocolError::Expired("signature expired".into()));
        }

        let message = ProofMessage {
            task_id,
            learner,
            proof_hash,
            nonce: self.get_nonce(&learner),
            deadline: signature.deadline,
        };
        let signer = recover_signer(&self.domain, &message, signature).map_err(|e| {
            warn!(task_id, learner = %learner, error = %e, "Proof signature rejected");
            ProtocolError::InvalidSignature("signature does not verify".into())
        })?;
        if signer != learner {
            warn!(task_id, learner = %learner, signer = %signer, "Proof signed by another account");
            return Err(ProtocolError::InvalidSignature(
                "signer does not match learner".into(),
            ));
        }

        let task = tasks.get_task(task_id)?;
        if task.status != TaskStatus::Active {
            return Err(ProtocolError::conflict("task not active"));
        }
        if task.is_expired(now) {
            return Err(ProtocolError::Expired("task expired".into()));
        }
        if self.get_submission(task_id, &learner).is_some() {
            return Err(ProtocolError::conflict("proof already submitted"));
        }

        *self.nonces.entry(learner).or_insert(0) += 1;
        self.submissions.entry(task_id).or_default().insert(
            learner,
            ProofSubmission {
                task_id,
                learner,
                proof_hash,
                submitted_at: now,
            },
        );

        info!(task_id, learner = %learner, proof = %proof_hash, "Proof submitted");
        tx.emit(
            self.address,
            Event::ProofSubmitted {
                task_id,
                learner,
                proof_hash,
                timestamp: now,
            },
        );
        Ok(())
    }

    /// Record the sender's decision on a submitted proof
    ///
    /// # Errors
    /// - `Unauthorized` without [`Role::ProofVerifier`]
    /// - `NotFound` if no proof was submitted for the pair
    /// - `StateConflict` if a decision already exists
    /// - `InvalidInput` for a rejection without a reason
    pub fn verify_proof(
        &mut self,
        tx: &mut TxContext,
        task_id: TaskId,
        learner: Address,
        approved: bool,
        reason: &str,
    ) -> Result<()> {
        let verifier = tx.sender();
        self.access.require(Role::ProofVerifier, &verifier)?;

        if self.get_submission(task_id, &learner).is_none() {
            return Err(ProtocolError::not_found("proof not submitted"));
        }
        if self.get_outcome(task_id, &learner).is_some() {
            return Err(ProtocolError::conflict("proof already verified"));
        }
        if !approved && reason.is_empty() {
            return Err(ProtocolError::invalid("rejection reason required"));
        }

        self.outcomes.entry(task_id).or_default().insert(
            learner,
            VerificationOutcome {
                task_id,
                learner,
                verifier,
                approved,
                reason: reason.to_string(),
                decided_at: tx.timestamp(),
            },
        );

        let event = if approved {
            info!(task_id, learner = %learner, verifier = %verifier, "Proof approved");
            Event::ProofVerified {
                task_id,
                learner,
                verifier,
                timestamp: tx.timestamp(),
            }
        } else {
            info!(task_id, learner = %learner, verifier = %verifier, reason, "Proof rejected");
            Event::ProofRejected {
                task_id,
                learner,
                verifier,
                reason: reason.to_string(),
            }
        };
        tx.emit(self.address, event);
        Ok(())
    }

    /// Whether a decision exists for the pair and it was an approval
    #[must_use]
    pub fn is_proof_verified(&self, task_id: TaskId, learner: &Address) -> bool {
        self.get_outcome(task_id, learner).is_some_and(|o| o.approved)
    }

    /// The accepted submission for the pair, if any
    #[must_use]
    pub fn get_submission(&self, task_id: TaskId, learner: &Address) -> Option<&ProofSubmission> {
        debug!(task_id, learner = %learner, "Submission lookup");
        self.submissions.get(&task_id)?.get(learner)
    }

    /// The verifier decision for the pair, if any
    #[must_use]
    pub fn get_outcome(&self, task_id: TaskId, learner: &Address) -> Option<&VerificationOutcome> {
        self.outcomes.get(&task_id)?.get(learner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash_data, Keypair};
    use crate::error::ErrorKind;
    use crate::tasks::tests::{creator, new_task, registry_with_creator, NOW};
    use crate::types::{DAY_MS, HOUR_MS};

    const CHAIN_ID: u64 = 31337;

    struct Fixture {
        tasks: TaskRegistry,
        proofs: ProofVerifier,
        learner: Keypair,
        reviewer: Address,
    }

    impl Fixture {
        fn new() -> Self {
            let mut tasks = registry_with_creator();
            let mut tx = TxContext::new(creator(), NOW);
            tasks.create_task(&mut tx, new_task(50)).unwrap();

            let admin = Address::from_label("admin");
            let reviewer = Address::from_label("reviewer");
            let mut proofs = ProofVerifier::new(
                Address::from_label("proofs"),
                admin,
                "LearnChain",
                "1",
                CHAIN_ID,
            );
            let mut tx = TxContext::new(admin, NOW);
            proofs.grant_verifier_role(&mut tx, reviewer).unwrap();

            Self {
                tasks,
                proofs,
                learner: Keypair::from_seed([7u8; 32]),
                reviewer,
            }
        }

        fn learner(&self) -> Address {
            Address::from_public_key(self.learner.public_key())
        }

        fn sign(&self, task_id: TaskId, nonce: u64) -> ProofSignature {
            ProofSignature::sign(
                &self.learner,
                self.proofs.domain(),
                task_id,
                proof_hash(),
                nonce,
                NOW + HOUR_MS,
            )
        }

        fn submit_at(
            &mut self,
            time: Timestamp,
            task_id: TaskId,
            sig: &ProofSignature,
        ) -> Result<TxContext> {
            let mut tx = TxContext::new(self.learner(), time);
            self.proofs
                .submit_proof(&mut tx, &self.tasks, task_id, proof_hash(), sig)?;
            Ok(tx)
        }

        fn submit(&mut self, task_id: TaskId, sig: &ProofSignature) -> Result<TxContext> {
            self.submit_at(NOW, task_id, sig)
        }

        fn decide(&mut self, approved: bool, reason: &str) -> Result<TxContext> {
            let mut tx = TxContext::new(self.reviewer, NOW + 2 * HOUR_MS);
            let learner = self.learner();
            self.proofs
                .verify_proof(&mut tx, 0, learner, approved, reason)?;
            Ok(tx)
        }
    }

    fn proof_hash() -> Hash {
        hash_data(b"proof_data")
    }

    #[test]
    fn test_submit_valid_proof() {
        let mut fx = Fixture::new();
        assert_eq!(fx.proofs.get_nonce(&fx.learner()), 0);

        let sig = fx.sign(0, 0);
        let tx = fx.submit(0, &sig).unwrap();

        assert_eq!(
            tx.events().collect::<Vec<_>>(),
            vec![&Event::ProofSubmitted {
                task_id: 0,
                learner: fx.learner(),
                proof_hash: proof_hash(),
                timestamp: NOW,
            }]
        );
        assert_eq!(fx.proofs.get_nonce(&fx.learner()), 1);
        let submission = fx.proofs.get_submission(0, &fx.learner()).unwrap();
        assert_eq!(submission.submitted_at, NOW);
    }

    #[test]
    fn test_duplicate_submission_conflicts() {
        let mut fx = Fixture::new();
        let first = fx.sign(0, 0);
        fx.submit(0, &first).unwrap();

        let second = fx.sign(0, 1);
        let err = fx.submit(0, &second).unwrap_err();
        assert_eq!(err, ProtocolError::conflict("proof already submitted"));
        assert_eq!(fx.proofs.get_nonce(&fx.learner()), 1);
    }

    #[test]
    fn test_stale_nonce_replay_rejected() {
        let mut fx = Fixture::new();
        let mut tx = TxContext::new(creator(), NOW);
        fx.tasks.create_task(&mut tx, new_task(50)).unwrap();

        let sig = fx.sign(0, 0);
        fx.submit(0, &sig).unwrap();

        // Same payload against the same task, and re-targeted at another one
        assert_eq!(fx.submit(0, &sig).unwrap_err().kind(), ErrorKind::InvalidSignature);
        assert_eq!(fx.submit(1, &sig).unwrap_err().kind(), ErrorKind::InvalidSignature);
    }

    #[test]
    fn test_signature_from_other_key_rejected() {
        let mut fx = Fixture::new();
        let impostor = Keypair::from_seed([9u8; 32]);
        let sig = ProofSignature::sign(
            &impostor,
            fx.proofs.domain(),
            0,
            proof_hash(),
            0,
            NOW + HOUR_MS,
        );

        let err = fx.submit(0, &sig).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSignature);
        assert_eq!(fx.proofs.get_nonce(&fx.learner()), 0);
    }

    #[test]
    fn test_signature_for_other_deployment_rejected() {
        let mut fx = Fixture::new();
        let mut foreign = fx.proofs.domain().clone();
        foreign.chain_id = 1;
        let sig = ProofSignature::sign(&fx.learner, &foreign, 0, proof_hash(), 0, NOW + HOUR_MS);

        assert_eq!(fx.submit(0, &sig).unwrap_err().kind(), ErrorKind::InvalidSignature);
    }

    #[test]
    fn test_expired_deadline() {
        let mut fx = Fixture::new();
        let sig = fx.sign(0, 0);

        let err = fx.submit_at(NOW + HOUR_MS + 1, 0, &sig).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Expired);

        // The deadline instant itself is still accepted
        fx.submit_at(NOW + HOUR_MS, 0, &sig).unwrap();
    }

    #[test]
    fn test_unknown_task() {
        let mut fx = Fixture::new();
        let sig = fx.sign(5, 0);
        assert_eq!(fx.submit(5, &sig).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_task_availability() {
        let mut fx = Fixture::new();
        let mut tx = TxContext::new(creator(), NOW);
        fx.tasks
            .update_task_status(&mut tx, 0, TaskStatus::Paused)
            .unwrap();

        let sig = fx.sign(0, 0);
        let err = fx.submit(0, &sig).unwrap_err();
        assert_eq!(err, ProtocolError::conflict("task not active"));

        let mut fx = Fixture::new();
        let expires = new_task(50).expires_at;
        let sig = ProofSignature::sign(
            &fx.learner,
            fx.proofs.domain(),
            0,
            proof_hash(),
            0,
            expires + DAY_MS,
        );
        let err = fx.submit_at(expires, 0, &sig).unwrap_err();
        assert_eq!(err, ProtocolError::Expired("task expired".into()));
    }

    #[test]
    fn test_approve_proof() {
        let mut fx = Fixture::new();
        let sig = fx.sign(0, 0);
        fx.submit(0, &sig).unwrap();

        let tx = fx.decide(true, "").unwrap();
        assert_eq!(
            tx.events().last(),
            Some(&Event::ProofVerified {
                task_id: 0,
                learner: fx.learner(),
                verifier: fx.reviewer,
                timestamp: NOW + 2 * HOUR_MS,
            })
        );
        assert!(fx.proofs.is_proof_verified(0, &fx.learner()));

        let err = fx.decide(false, "changed my mind").unwrap_err();
        assert_eq!(err, ProtocolError::conflict("proof already verified"));
    }

    #[test]
    fn test_reject_proof() {
        let mut fx = Fixture::new();
        let sig = fx.sign(0, 0);
        fx.submit(0, &sig).unwrap();

        let err = fx.decide(false, "").unwrap_err();
        assert_eq!(err, ProtocolError::invalid("rejection reason required"));

        let tx = fx.decide(false, "Invalid proof data").unwrap();
        assert_eq!(
            tx.events().last(),
            Some(&Event::ProofRejected {
                task_id: 0,
                learner: fx.learner(),
                verifier: fx.reviewer,
                reason: "Invalid proof data".to_string(),
            })
        );
        assert!(!fx.proofs.is_proof_verified(0, &fx.learner()));
        assert!(!fx.proofs.get_outcome(0, &fx.learner()).unwrap().approved);
    }

    #[test]
    fn test_verify_requires_role_and_submission() {
        let mut fx = Fixture::new();

        let err = fx.decide(true, "").unwrap_err();
        assert_eq!(err, ProtocolError::not_found("proof not submitted"));

        let sig = fx.sign(0, 0);
        fx.submit(0, &sig).unwrap();

        let learner = fx.learner();
        let mut tx = TxContext::new(learner, NOW);
        let err = fx
            .proofs
            .verify_proof(&mut tx, 0, learner, true, "")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_domain_separator_and_digest() {
        let fx = Fixture::new();
        assert!(!fx.proofs.get_domain_separator().is_zero());

        let digest = fx
            .proofs
            .proof_digest(0, fx.learner(), proof_hash(), 0, NOW + HOUR_MS);
        let sig = fx.sign(0, 0);
        assert_eq!(fx.learner.sign_digest(&digest), sig.signature);
    }
}
