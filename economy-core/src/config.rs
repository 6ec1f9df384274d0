//! Economy policy configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Reward amounts and limits applied by the ledger and the review queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Smallest coin amount a single tip may carry
    pub tip_min: i64,

    /// Largest coin amount a single tip may carry
    pub tip_max: i64,

    /// Coins granted by a daily check-in
    pub daily_reward_coins: i64,

    /// Exp granted by a daily check-in
    pub daily_reward_exp: i64,

    /// Exp granted for publishing a post
    pub post_reward_exp: i64,

    /// Role level a user needs to review uploads
    pub reviewer_min_level: i32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            tip_min: 1,
            tip_max: 10,
            daily_reward_coins: 50,
            daily_reward_exp: 25,
            post_reward_exp: 5,
            reviewer_min_level: 80,
        }
    }
}

impl EconomyConfig {
    /// Reject settings that would break the ledger's invariants
    pub fn validate(&self) -> Result<()> {
        if self.tip_min < 1 {
            return Err(Error::Config("tip_min must be at least 1".to_string()));
        }

        if self.tip_max < self.tip_min {
            return Err(Error::Config(format!(
                "tip_max ({}) is below tip_min ({})",
                self.tip_max, self.tip_min
            )));
        }

        if self.daily_reward_coins < 0 || self.daily_reward_exp < 0 || self.post_reward_exp < 0 {
            return Err(Error::Config("rewards cannot be negative".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EconomyConfig::default();
        assert_eq!((config.tip_min, config.tip_max), (1, 10));
        assert_eq!(config.daily_reward_coins, 50);
        assert_eq!(config.reviewer_min_level, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_tip_range() {
        let config = EconomyConfig {
            tip_min: 5,
            tip_max: 2,
            ..EconomyConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: EconomyConfig = serde_json::from_str(r#"{"tip_max": 20}"#).unwrap();
        assert_eq!(config.tip_max, 20);
        assert_eq!(config.daily_reward_exp, 25);
    }
}
