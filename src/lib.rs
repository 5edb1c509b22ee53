//! # `LearnChain` Protocol
//!
//! Learn, prove, earn: institutions publish learning tasks, learners submit
//! signed proofs of completion, verifiers approve them, and each approved
//! completion yields a soul-bound credential and a token reward.
//!
//! ## Architecture
//!
//! Each component owns its state and its role registry:
//! - **Tasks**: task catalog, completion records, pause switch
//! - **Proofs**: signed proof intake with per-learner nonces and a signing
//!   domain bound to chain and component address
//! - **Rewards**: difficulty-scaled reward schedule, pending balances, claims
//! - **Collaborators**: the LEARN token, the credential registry and the
//!   institution registry
//! - **Coordinator**: composes the above into atomic multi-step flows
//!
//! ## Execution Model
//!
//! Operations run under a [`TxContext`] carrying the sender and time. Events
//! are buffered on the context and published by [`EventLog::commit`] only
//! when the whole operation succeeded.

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms
)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod error;
pub mod events;
pub mod proofs;
pub mod rewards;
pub mod tasks;
pub mod types;

pub use access::{AccessRegistry, Role};
pub use collaborators::{
    CredentialIssuer, CredentialRegistry, FungibleToken, InstitutionDirectory,
    InstitutionRegistry, LearnToken,
};
pub use config::{ConfigError, ProtocolConfig};
pub use coordinator::{CompletionReceipt, ContractUpdate, Coordinator, ProtocolSnapshot};
pub use crypto::{Hash, Keypair, ProofSignature, PublicKey, Signature, SigningDomain};
pub use error::{ErrorKind, ProtocolError, Result};
pub use events::{Event, EventLog, EventRecord, TxContext};
pub use proofs::ProofVerifier;
pub use rewards::{RewardConfig, RewardLedger};
pub use tasks::{NewTask, Task, TaskRegistry};
pub use types::{
    Address, CredentialId, Difficulty, RewardKind, TaskId, TaskStatus, Timestamp, TokenAmount,
};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
