//! Deployment configuration.
//!
//! Read from a JSON file; every field has a default so a partial file (or no
//! file at all) is enough. `LEARNCHAIN_CHAIN_ID` overrides the chain id.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::collaborators::LearnToken;
use crate::events::EventLog;
use crate::rewards::RewardConfig;
use crate::types::TokenAmount;

/// Environment variable overriding [`ProtocolConfig::chain_id`]
pub const CHAIN_ID_ENV: &str = "LEARNCHAIN_CHAIN_ID";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid JSON for this schema
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// An environment override is malformed
    #[error("invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },
    /// Values are inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Reward schedule, in whole tokens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSettings {
    /// Reward at a 10 000 basis-point multiplier
    pub base_tokens: u64,
    /// Multipliers per difficulty
    pub multipliers: [u32; 4],
    /// Distribution switched on at deploy
    pub enabled: bool,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            base_tokens: 100,
            multipliers: [5_000, 10_000, 15_000, 25_000],
            enabled: true,
        }
    }
}

impl RewardSettings {
    /// The ledger schedule these settings describe
    #[must_use]
    pub fn to_reward_config(&self) -> RewardConfig {
        RewardConfig {
            base_amount: TokenAmount::from_tokens(self.base_tokens),
            multipliers: self.multipliers,
            enabled: self.enabled,
        }
    }
}

/// Token deployment settings, in whole tokens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Minted to the deployer
    pub initial_supply: u64,
    /// Supply cap
    pub max_supply: u64,
    /// Moved from the deployer to the reward ledger at deploy
    pub reward_funding: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            name: "LearnChain Token".to_string(),
            symbol: "LEARN".to_string(),
            initial_supply: 100_000_000,
            max_supply: 1_000_000_000,
            reward_funding: 10_000_000,
        }
    }
}

/// Credential registry settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Collection name
    pub name: String,
    /// Collection symbol
    pub symbol: String,
    /// Prefix of generated credential URIs
    pub base_uri: String,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            name: "LearnChain Credentials".to_string(),
            symbol: "LEARNCRED".to_string(),
            base_uri: "https://api.learnchain.io/credentials/".to_string(),
        }
    }
}

/// Protocol configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Chain identifier bound into proof signatures
    pub chain_id: u64,
    /// Signing domain name
    pub domain_name: String,
    /// Signing domain version
    pub domain_version: String,
    /// Reward schedule
    pub reward: RewardSettings,
    /// Token deployment
    pub token: TokenSettings,
    /// Credential registry deployment
    pub credential: CredentialSettings,
    /// How far a live event subscriber may lag
    pub event_capacity: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            chain_id: 31_337,
            domain_name: "LearnChain".to_string(),
            domain_version: "1".to_string(),
            reward: RewardSettings::default(),
            token: TokenSettings::default(),
            credential: CredentialSettings::default(),
            event_capacity: 1024,
        }
    }
}

impl ProtocolConfig {
    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply environment overrides and validate.
    ///
    /// # Errors
    /// Returns error if the file is unreadable or malformed, an override is
    /// malformed, or the result fails [`validate`](Self::validate)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading config");
            Self::from_json(&std::fs::read_to_string(path)?)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        if let Ok(value) = std::env::var(CHAIN_ID_ENV) {
            config.apply_chain_id_override(&value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults
    ///
    /// # Errors
    /// Returns error if the document is not valid JSON for this schema
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    fn apply_chain_id_override(&mut self, value: &str) -> Result<(), ConfigError> {
        self.chain_id = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: CHAIN_ID_ENV,
            value: value.to_string(),
        })?;
        info!(chain_id = self.chain_id, "Chain id overridden from environment");
        Ok(())
    }

    /// Check internal consistency
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::Invalid("chain_id must be non-zero".into()));
        }
        if self.domain_name.is_empty() || self.domain_version.is_empty() {
            return Err(ConfigError::Invalid("signing domain name and version required".into()));
        }
        self.reward
            .to_reward_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let token = &self.token;
        if TokenAmount::from_tokens(token.max_supply) > LearnToken::MAX_SUPPLY {
            return Err(ConfigError::Invalid("token max_supply above one billion".into()));
        }
        if token.initial_supply > token.max_supply {
            return Err(ConfigError::Invalid("token initial_supply exceeds max_supply".into()));
        }
        if token.reward_funding > token.initial_supply {
            return Err(ConfigError::Invalid(
                "token reward_funding exceeds initial_supply".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be positive".into()));
        }
        if self.event_capacity > EventLog::MAX_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "event_capacity above {}",
                EventLog::MAX_CAPACITY
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProtocolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.domain_name, "LearnChain");
        assert_eq!(config.reward.to_reward_config(), RewardConfig::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"chain_id": 1, "reward": {"base_tokens": 200}}"#;
        let config = ProtocolConfig::from_json(json).unwrap();
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.reward.base_tokens, 200);
        assert_eq!(config.reward.multipliers, [5_000, 10_000, 15_000, 25_000]);
        assert_eq!(config.token.symbol, "LEARN");
    }

    #[test]
    fn test_rejects_zero_multiplier() {
        let mut config = ProtocolConfig::default();
        config.reward.multipliers[2] = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_inconsistent_supply() {
        let mut config = ProtocolConfig::default();
        config.token.initial_supply = config.token.max_supply + 1;
        assert!(config.validate().is_err());

        let mut config = ProtocolConfig::default();
        config.token.reward_funding = config.token.initial_supply + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_event_capacity_bounds() {
        let mut config = ProtocolConfig::default();
        config.event_capacity = EventLog::MAX_CAPACITY;
        assert!(config.validate().is_ok());

        for capacity in [0, EventLog::MAX_CAPACITY + 1, usize::MAX] {
            config.event_capacity = capacity;
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_chain_id_override() {
        let mut config = ProtocolConfig::default();
        config.apply_chain_id_override(" 8453 ").unwrap();
        assert_eq!(config.chain_id, 8453);

        let err = config.apply_chain_id_override("mainnet").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ProtocolConfig::load(Path::new("/nonexistent/learnchain.json")).unwrap();
        assert_eq!(config.domain_name, "LearnChain");
    }

    #[test]
    fn test_malformed_file() {
        let path = std::env::temp_dir().join(format!("learnchain-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let err = ProtocolConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
