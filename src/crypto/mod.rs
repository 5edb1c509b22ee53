//! Cryptographic primitives for the `LearnChain` protocol.
//!
//! Uses audited, production-grade crates:
//! - ed25519-dalek for learner identity keys and proof signatures
//! - BLAKE3 for content digests
//! - Keccak-256 (sha3) for structured-message hashing

mod hash;
mod signature;
mod typed_data;

pub use hash::{hash_data, keccak256, merkle_root, u256_word, Hash, Hasher};
pub use signature::{verify, Keypair, PublicKey, Signature};
pub use typed_data::{
    recover_signer, ProofMessage, ProofSignature, SigningDomain, DOMAIN_TYPE, PROOF_TYPE,
};

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Invalid signature
    #[error("invalid signature")]
    InvalidSignature,
    /// Invalid public key format
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    /// Invalid hash format
    #[error("invalid hash: {0}")]
    InvalidHash(String),
    /// Invalid address format
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
