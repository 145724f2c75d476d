//! Reward data providers
//!
//! Two kinds of provider feed the engine: a bulk source that returns a
//! validator's whole reward history in one call, and a slower per-epoch source
//! that returns every validator's rewards for a single epoch. Trillium serves
//! both shapes.

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;

use crate::constants;
use crate::http::HttpClient;

/// One validator's row as returned by the reward API.
///
/// Amounts are in SOL, `commission` is a percentage, `mev_commission` is in
/// basis points.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderRecord {
    pub epoch: u64,
    #[serde(default)]
    pub identity_pubkey: Option<String>,
    #[serde(default)]
    pub total_inflation_reward: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub mev_earned: f64,
    #[serde(default)]
    pub mev_commission: f64,
    #[serde(default)]
    pub rewards: f64,
    #[serde(default)]
    pub vote_cost: f64,
}

/// Sanitized economic activity of one validator for one epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRewardRecord {
    pub epoch: u64,
    pub vote_reward_lamports: f64,
    pub jito_tip_lamports: f64,
    pub block_reward_lamports: f64,
    pub vote_cost_lamports: f64,
    /// Fraction in [0, 1]
    pub commission_rate: f64,
    /// Fraction in [0, 1]
    pub mev_commission_rate: f64,
}

impl TryFrom<&ProviderRecord> for EpochRewardRecord {
    type Error = String;

    fn try_from(row: &ProviderRecord) -> std::result::Result<Self, Self::Error> {
        let amounts = [
            ("total_inflation_reward", row.total_inflation_reward),
            ("mev_earned", row.mev_earned),
            ("rewards", row.rewards),
            ("vote_cost", row.vote_cost),
        ];
        for (field, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{field} = {value}"));
            }
        }

        let commission_rate = row.commission / constants::COMMISSION_PERCENT_SCALE;
        let mev_commission_rate = row.mev_commission / constants::MEV_COMMISSION_BPS_SCALE;
        for (field, rate) in [("commission", commission_rate), ("mev_commission", mev_commission_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(format!("{field} rate {rate} outside [0, 1]"));
            }
        }

        Ok(Self {
            epoch: row.epoch,
            vote_reward_lamports: row.total_inflation_reward * constants::LAMPORTS_PER_SOL,
            jito_tip_lamports: row.mev_earned * constants::LAMPORTS_PER_SOL,
            block_reward_lamports: row.rewards * constants::LAMPORTS_PER_SOL,
            vote_cost_lamports: row.vote_cost * constants::LAMPORTS_PER_SOL,
            commission_rate,
            mev_commission_rate,
        })
    }
}

#[automock]
#[async_trait]
pub trait BulkRewardSource: Send + Sync {
    /// Every epoch the provider knows about for `identity`
    async fn validator_history(&self, identity: &str) -> Result<Vec<ProviderRecord>>;
}

#[automock]
#[async_trait]
pub trait EpochRewardSource: Send + Sync {
    /// Every validator's row for `epoch`
    async fn epoch_rewards(&self, epoch: u64) -> Result<Vec<ProviderRecord>>;
}

/// Trillium validator rewards API
pub struct TrilliumClient {
    http: HttpClient,
    base_url: String,
}

impl TrilliumClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BulkRewardSource for TrilliumClient {
    async fn validator_history(&self, identity: &str) -> Result<Vec<ProviderRecord>> {
        let url = format!(
            "{}{}{}",
            self.base_url,
            constants::TRILLIUM_VALIDATOR_REWARDS,
            identity
        );
        self.http.get_json(&url, &[]).await
    }
}

#[async_trait]
impl EpochRewardSource for TrilliumClient {
    async fn epoch_rewards(&self, epoch: u64) -> Result<Vec<ProviderRecord>> {
        let url = format!(
            "{}{}{}",
            self.base_url,
            constants::TRILLIUM_EPOCH_REWARDS,
            epoch
        );
        self.http.get_json(&url, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ProviderRecord {
        ProviderRecord {
            epoch: 812,
            identity_pubkey: Some("CvSb7wdQAFpHuSpTYTJnX5SYH4hCfQ9VuGnqrKaKwycB".into()),
            total_inflation_reward: 20.0,
            commission: 5.0,
            mev_earned: 3.0,
            mev_commission: 800.0,
            rewards: 1.5,
            vote_cost: 1.1,
        }
    }

    #[test]
    fn test_converts_units() {
        let record = EpochRewardRecord::try_from(&row()).unwrap();
        assert_eq!(record.epoch, 812);
        assert_eq!(record.vote_reward_lamports, 20_000_000_000.0);
        assert_eq!(record.jito_tip_lamports, 3_000_000_000.0);
        assert_eq!(record.block_reward_lamports, 1_500_000_000.0);
        assert!((record.vote_cost_lamports - 1_100_000_000.0).abs() < 1e-3);
        assert!((record.commission_rate - 0.05).abs() < 1e-12);
        assert!((record.mev_commission_rate - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_negative_and_non_finite_amounts() {
        let mut bad = row();
        bad.vote_cost = -0.1;
        assert!(EpochRewardRecord::try_from(&bad).unwrap_err().contains("vote_cost"));

        let mut bad = row();
        bad.mev_earned = f64::NAN;
        assert!(EpochRewardRecord::try_from(&bad).unwrap_err().contains("mev_earned"));

        let mut bad = row();
        bad.rewards = f64::INFINITY;
        assert!(EpochRewardRecord::try_from(&bad).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_commission() {
        let mut bad = row();
        bad.commission = 101.0;
        assert!(EpochRewardRecord::try_from(&bad).unwrap_err().contains("commission"));

        let mut bad = row();
        bad.mev_commission = 10_001.0;
        assert!(EpochRewardRecord::try_from(&bad).unwrap_err().contains("mev_commission"));
    }

    #[test]
    fn test_deserializes_sparse_rows() {
        let json = r#"[{"epoch": 900, "identity_pubkey": "abc", "total_inflation_reward": 1.25}]"#;
        let rows: Vec<ProviderRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].epoch, 900);
        assert_eq!(rows[0].identity_pubkey.as_deref(), Some("abc"));
        assert_eq!(rows[0].total_inflation_reward, 1.25);
        assert_eq!(rows[0].vote_cost, 0.0);
    }

    #[test]
    fn test_trims_trailing_slash_from_base_url() {
        let http = HttpClient::new(std::time::Duration::from_secs(1), 1).unwrap();
        let client = TrilliumClient::new(http, "https://api.trillium.so/");
        assert_eq!(client.base_url, "https://api.trillium.so");
    }
}
