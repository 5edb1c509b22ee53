//! Task classification enums shared by the registry and the reward ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a task pays out
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardKind {
    /// LEARN tokens only
    Fungible,
    /// Credential only
    NonFungible,
    /// Tokens and a credential
    Both,
}

/// Task difficulty, ordered from easiest to hardest
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// Entry level
    Beginner,
    /// Some prior knowledge expected
    Intermediate,
    /// Substantial prior knowledge expected
    Advanced,
    /// Specialist level
    Expert,
}

impl Difficulty {
    /// All difficulties in rank order
    pub const ALL: [Self; 4] = [
        Self::Beginner,
        Self::Intermediate,
        Self::Advanced,
        Self::Expert,
    ];

    /// Position in the reward multiplier table
    #[must_use]
    pub const fn rank(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        };
        f.write_str(name)
    }
}

/// Administrative status of a task record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Accepting proofs
    Active,
    /// Temporarily not accepting proofs
    Paused,
    /// Closed by its creator
    Completed,
    /// Withdrawn by its creator
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_rank_matches_order() {
        for (i, d) in Difficulty::ALL.iter().enumerate() {
            assert_eq!(d.rank(), i);
        }
        assert!(Difficulty::Beginner < Difficulty::Expert);
    }
}
