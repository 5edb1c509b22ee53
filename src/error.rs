//! Protocol-wide error taxonomy.
//!
//! Every failing operation aborts with no partial effect and reports one of
//! these variants. [`ProtocolError::kind`] gives callers a `Copy` value to
//! match on; the `Display` text carries the human-readable reason.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::crypto::CryptoError;
use crate::types::{AmountError, TokenAmount};

/// Machine-checkable failure category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller lacks the required role or ownership
    Unauthorized,
    /// Empty, zero or out-of-range argument, or bad configuration
    InvalidInput,
    /// Unknown id or address
    NotFound,
    /// A once-only invariant would be violated
    StateConflict,
    /// Signed payload or task past its deadline
    Expired,
    /// Signature does not verify for the claimed signer
    InvalidSignature,
    /// Transfer exceeds available holdings
    InsufficientFunds,
    /// Nothing to do
    NoOp,
}

/// Protocol errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Missing role or not the owner of the resource
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Bad argument or configuration
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Unknown id or address
    #[error("not found: {0}")]
    NotFound(String),
    /// Duplicate or out-of-order state transition
    #[error("state conflict: {0}")]
    StateConflict(String),
    /// Deadline passed
    #[error("expired: {0}")]
    Expired(String),
    /// Signature rejected
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// Not enough funds for a transfer
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Available balance
        have: TokenAmount,
        /// Requested amount
        need: TokenAmount,
    },
    /// Operation would have no effect
    #[error("no-op: {0}")]
    NoOp(String),
}

impl ProtocolError {
    /// The failure category
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StateConflict(_) => ErrorKind::StateConflict,
            Self::Expired(_) => ErrorKind::Expired,
            Self::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::NoOp(_) => ErrorKind::NoOp,
        }
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub(crate) fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        Self::StateConflict(reason.into())
    }
}

impl From<CryptoError> for ProtocolError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidSignature | CryptoError::InvalidPublicKey(_) => {
                Self::InvalidSignature(err.to_string())
            }
            CryptoError::InvalidHash(_) | CryptoError::InvalidAddress(_) => {
                Self::InvalidInput(err.to_string())
            }
        }
    }
}

impl From<ConfigError> for ProtocolError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<AmountError> for ProtocolError {
    fn from(err: AmountError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
