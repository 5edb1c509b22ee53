//! Structured proof messages and their domain binding.
//!
//! The layout follows EIP-712: a domain separator scopes every signature to
//! one (name, version, chain, verifying contract) deployment, and the proof
//! fields are hashed as 32-byte words under a type hash.
//!
//! ```text
//! digest = keccak(0x19 || 0x01 || domainSeparator || structHash)
//! ```

use serde::{Deserialize, Serialize};

use super::{keccak256, u256_word, verify, CryptoResult, Hash, Keypair, PublicKey, Signature};
use crate::types::{Address, TaskId, Timestamp};

/// Type string of the signing domain
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Type string of a learning proof
pub const PROOF_TYPE: &str =
    "LearningProof(uint256 taskId,address learner,bytes32 proofHash,uint256 nonce,uint256 deadline)";

/// The (name, version, chain, contract) tuple every proof signature is bound to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningDomain {
    /// Protocol name
    pub name: String,
    /// Protocol version
    pub version: String,
    /// Chain identifier
    pub chain_id: u64,
    /// Address of the proof verifier instance
    pub verifying_contract: Address,
}

impl SigningDomain {
    /// Domain separator hash
    #[must_use]
    pub fn separator(&self) -> Hash {
        keccak256(&[
            keccak256(&[DOMAIN_TYPE.as_bytes()]).as_bytes(),
            keccak256(&[self.name.as_bytes()]).as_bytes(),
            keccak256(&[self.version.as_bytes()]).as_bytes(),
            &u256_word(u128::from(self.chain_id)),
            &self.verifying_contract.to_word(),
        ])
    }
}

/// The fields a learner signs when claiming completion of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofMessage {
    /// Task being claimed
    pub task_id: TaskId,
    /// Claiming learner
    pub learner: Address,
    /// Digest of the off-chain proof material
    pub proof_hash: Hash,
    /// Learner's nonce at signing time
    pub nonce: u64,
    /// Last instant the signature is accepted
    pub deadline: Timestamp,
}

impl ProofMessage {
    /// Hash of the proof fields under [`PROOF_TYPE`]
    #[must_use]
    pub fn struct_hash(&self) -> Hash {
        keccak256(&[
            keccak256(&[PROOF_TYPE.as_bytes()]).as_bytes(),
            &u256_word(u128::from(self.task_id)),
            &self.learner.to_word(),
            self.proof_hash.as_bytes(),
            &u256_word(u128::from(self.nonce)),
            &u256_word(u128::try_from(self.deadline).unwrap_or_default()),
        ])
    }

    /// The digest that is actually signed
    #[must_use]
    pub fn digest(&self, domain: &SigningDomain) -> Hash {
        keccak256(&[
            &[0x19, 0x01],
            domain.separator().as_bytes(),
            self.struct_hash().as_bytes(),
        ])
    }
}

/// A learner's signature over a [`ProofMessage`].
///
/// Carries the deadline that was signed and the signer's verifying key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSignature {
    /// Deadline included in the signed message
    pub deadline: Timestamp,
    /// Key that produced the signature
    pub signer: PublicKey,
    /// Ed25519 signature over the message digest
    pub signature: Signature,
}

impl ProofSignature {
    /// Sign a proof claim for `task_id` as the keypair's own address
    #[must_use]
    pub fn sign(
        keypair: &Keypair,
        domain: &SigningDomain,
        task_id: TaskId,
        proof_hash: Hash,
        nonce: u64,
        deadline: Timestamp,
    ) -> Self {
        let message = ProofMessage {
            task_id,
            learner: Address::from_public_key(keypair.public_key()),
            proof_hash,
            nonce,
            deadline,
        };

        Self {
            deadline,
            signer: *keypair.public_key(),
            signature: keypair.sign_digest(&message.digest(domain)),
        }
    }
}

/// Verify `signature` over `message` in `domain` and return the signer's address.
///
/// The caller compares the result against the claimed learner.
///
/// # Errors
/// Returns error if the signature does not verify under the carried key
pub fn recover_signer(
    domain: &SigningDomain,
    message: &ProofMessage,
    signature: &ProofSignature,
) -> CryptoResult<Address> {
    let digest = message.digest(domain);
    verify(&signature.signer, digest.as_bytes(), &signature.signature)?;
    Ok(Address::from_public_key(&signature.signer))
}
