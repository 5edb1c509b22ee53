//! Core data types for the `LearnChain` protocol.

mod address;
mod amount;
mod task;

pub use address::Address;
pub use amount::{AmountError, TokenAmount, BASIS_POINTS, DECIMALS, ONE_TOKEN};
pub use task::{Difficulty, RewardKind, TaskStatus};

use chrono::{DateTime, Utc};

/// Sequential task identifier
pub type TaskId = u64;

/// Sequential credential identifier
pub type CredentialId = u64;

/// Unix timestamp in milliseconds
pub type Timestamp = i64;

/// One hour in milliseconds
pub const HOUR_MS: Timestamp = 3_600_000;

/// One day in milliseconds
pub const DAY_MS: Timestamp = 24 * HOUR_MS;

/// Get current timestamp in milliseconds
#[must_use]
pub fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// Convert timestamp to `DateTime`
#[must_use]
pub fn timestamp_to_datetime(ts: Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_to_datetime() {
        let at = timestamp_to_datetime(1_700_000_000_000).unwrap();
        assert_eq!(at.to_rfc3339(), "2023-11-14T22:13:20+00:00");
        assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
    }
}
