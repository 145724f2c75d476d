//! Per-epoch records folded into cumulative totals
//!
//! Commission rates are applied here, once, to the vote and MEV amounts.
//! Block rewards accrue fully to the operator and vote costs are taken as-is.

use std::iter::Sum;
use std::ops::Add;

use crate::sources::EpochRewardRecord;

/// Operator totals in lamports
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RewardsSummary {
    pub total_vote_reward: f64,
    pub total_jito_reward: f64,
    pub total_block_reward: f64,
    pub total_vote_cost: f64,
    /// Epochs with a record; may be below the range size when data is missing
    pub epochs_covered: usize,
}

impl RewardsSummary {
    /// Contribution of a single epoch
    pub fn from_record(record: &EpochRewardRecord) -> Self {
        Self {
            total_vote_reward: record.vote_reward_lamports * record.commission_rate,
            total_jito_reward: record.jito_tip_lamports * record.mev_commission_rate,
            total_block_reward: record.block_reward_lamports,
            total_vote_cost: record.vote_cost_lamports,
            epochs_covered: 1,
        }
    }

    pub fn total_revenue(&self) -> f64 {
        self.total_vote_reward + self.total_jito_reward + self.total_block_reward
    }
}

impl Add for RewardsSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            total_vote_reward: self.total_vote_reward + other.total_vote_reward,
            total_jito_reward: self.total_jito_reward + other.total_jito_reward,
            total_block_reward: self.total_block_reward + other.total_block_reward,
            total_vote_cost: self.total_vote_cost + other.total_vote_cost,
            epochs_covered: self.epochs_covered + other.epochs_covered,
        }
    }
}

impl Sum for RewardsSummary {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Sum the contributions of `records`. Expects sanitized input.
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a EpochRewardRecord>) -> RewardsSummary {
    records.into_iter().map(RewardsSummary::from_record).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: u64) -> EpochRewardRecord {
        EpochRewardRecord {
            epoch,
            vote_reward_lamports: 1_000_000_000.0 + epoch as f64 * 3.0,
            jito_tip_lamports: 400_000_000.0 + epoch as f64,
            block_reward_lamports: 50_000_000.0,
            vote_cost_lamports: 1_100_000_000.0,
            commission_rate: 0.05,
            mev_commission_rate: 0.08,
        }
    }

    fn assert_close(a: &RewardsSummary, b: &RewardsSummary) {
        assert_eq!(a.epochs_covered, b.epochs_covered);
        assert!((a.total_vote_reward - b.total_vote_reward).abs() < 1e-3);
        assert!((a.total_jito_reward - b.total_jito_reward).abs() < 1e-3);
        assert!((a.total_block_reward - b.total_block_reward).abs() < 1e-3);
        assert!((a.total_vote_cost - b.total_vote_cost).abs() < 1e-3);
    }

    #[test]
    fn test_applies_commission_once() {
        let summary = aggregate(&[record(0)]);
        assert_eq!(summary.total_vote_reward, 50_000_000.0);
        assert_eq!(summary.total_jito_reward, 32_000_000.0);
        assert_eq!(summary.total_block_reward, 50_000_000.0);
        assert_eq!(summary.total_vote_cost, 1_100_000_000.0);
        assert_eq!(summary.epochs_covered, 1);
        assert_eq!(summary.total_revenue(), 132_000_000.0);
    }

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(aggregate(&[] as &[EpochRewardRecord]), RewardsSummary::default());
    }

    #[test]
    fn test_additive_over_partitions() {
        let records: Vec<_> = (100..130).map(record).collect();
        let whole = aggregate(&records);

        for splits in [vec![10], vec![1, 29], vec![7, 15, 22], vec![0, 30]] {
            let mut bounds = vec![0];
            bounds.extend(splits);
            bounds.push(records.len());

            let parts: RewardsSummary = bounds
                .windows(2)
                .map(|w| aggregate(&records[w[0]..w[1]]))
                .sum();
            assert_close(&whole, &parts);
        }
    }

    #[test]
    fn test_order_does_not_matter() {
        let mut records: Vec<_> = (100..110).map(record).collect();
        let forward = aggregate(&records);
        records.reverse();
        assert_close(&forward, &aggregate(&records));
    }
}
