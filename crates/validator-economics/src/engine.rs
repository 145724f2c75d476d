//! One full report run: resolve the cycle's epochs, fetch, aggregate, price, project

use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregate::{RewardsSummary, aggregate};
use crate::billing::{BillingCycle, EpochContribution, ProfitabilityReport, project};
use crate::epoch::resolve_epoch;
use crate::error::{EconomicsError, Result, RunWarning};
use crate::fetch::RewardFetcher;
use crate::prices::PriceOracle;
use crate::rpc::ChainRpc;
use crate::sources::{BulkRewardSource, EpochRewardSource};

/// Settings for a single run, derived from the config at a given instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    pub identity: Pubkey,
    pub cycle: BillingCycle,
    pub monthly_base_expense_usd: f64,
    /// Applied uniformly to every epoch of the cycle
    pub vote_cost_reimbursement_percent: f64,
    pub fallback_sol_price: f64,
    pub seconds_per_slot: f64,
}

/// Build the profitability report for the cycle in `run`.
///
/// The epoch range runs from the epoch containing the cycle start up to, but
/// excluding, the current epoch, whose rewards are not final yet. Reward and
/// price problems degrade into warnings; only chain lookups needed to place
/// the cycle on the epoch timeline are fatal.
pub async fn compute_profitability_report<C, B, E, P>(
    run: &RunConfig,
    chain: &C,
    fetcher: &RewardFetcher<B, E>,
    prices: &P,
    cancel: &CancellationToken,
) -> Result<ProfitabilityReport>
where
    C: ChainRpc + ?Sized,
    B: BulkRewardSource,
    E: EpochRewardSource,
    P: PriceOracle + ?Sized,
{
    let reference = chain
        .recent_slot_and_timestamp()
        .await
        .map_err(|e| EconomicsError::Rpc(format!("{e:#}")))?;
    let current_epoch = chain
        .current_epoch()
        .await
        .map_err(|e| EconomicsError::Rpc(format!("{e:#}")))?;
    let schedule = chain
        .epoch_schedule()
        .await
        .map_err(|e| EconomicsError::Resolution(format!("{e:#}")))?;

    let start_epoch = resolve_epoch(run.cycle.start, reference, run.seconds_per_slot, |slot| {
        Ok(schedule.get_epoch(slot))
    })?;
    let epochs = start_epoch..current_epoch.max(start_epoch);
    info!(
        cycle_start = %run.cycle.start,
        reference_slot = reference.slot,
        current_epoch,
        epochs = ?epochs,
        "resolved billing cycle epochs"
    );

    let fetched = fetcher
        .fetch_rewards(&run.identity.to_string(), epochs.clone(), cancel)
        .await;
    let summary = aggregate(&fetched.records);
    let contributions = fetched
        .records
        .iter()
        .map(|record| EpochContribution {
            epoch: record.epoch,
            summary: RewardsSummary::from_record(record),
        })
        .collect();

    let mut warnings = fetched.warnings;
    let sol_price = match prices.sol_usd_price().await {
        Ok(price) if price.is_finite() && price > 0.0 => price,
        Ok(price) => price_fallback(run, format!("unusable price {price}"), &mut warnings),
        Err(e) => price_fallback(run, format!("{e:#}"), &mut warnings),
    };
    info!(sol_price, epochs_covered = summary.epochs_covered, "rewards aggregated");

    let mut report = project(
        &run.cycle,
        &summary,
        sol_price,
        run.monthly_base_expense_usd,
        run.vote_cost_reimbursement_percent,
    );
    report.epochs = epochs;
    report.current_epoch = current_epoch;
    report.contributions = contributions;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    Ok(report)
}

fn price_fallback(run: &RunConfig, reason: String, warnings: &mut Vec<RunWarning>) -> f64 {
    warn!(%reason, fallback = run.fallback_sol_price, "using fallback SOL price");
    warnings.push(RunWarning::PriceFallback {
        fallback: run.fallback_sol_price,
        reason,
    });
    run.fallback_sol_price
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::epoch::SlotReference;
    use crate::prices::MockPriceOracle;
    use crate::rpc::MockChainRpc;
    use crate::sources::{MockBulkRewardSource, MockEpochRewardSource, ProviderRecord};
    use chrono::{DateTime, TimeZone, Utc};
    use solana_epoch_schedule::EpochSchedule;
    use std::str::FromStr;

    const IDENTITY: &str = "6WgdYhhGE53WrZ7ywJA15hBVkw7CRbQ8yDBBTwmBtAHN";
    const SLOTS_PER_EPOCH: u64 = 432_000;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, d, 0, 0, 0).unwrap()
    }

    fn run_config() -> RunConfig {
        RunConfig {
            identity: Pubkey::from_str(IDENTITY).unwrap(),
            cycle: BillingCycle::new(at(15), Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap(), at(18)).unwrap(),
            monthly_base_expense_usd: 1400.0,
            vote_cost_reimbursement_percent: 0.0,
            fallback_sol_price: 185.0,
            seconds_per_slot: constants::SECONDS_PER_SLOT,
        }
    }

    /// First slot of epoch 896 observed on Dec 16, so the Dec 15 cycle start
    /// falls half an epoch earlier, in epoch 895
    fn chain(current_epoch: u64) -> MockChainRpc {
        let mut chain = MockChainRpc::new();
        chain.expect_recent_slot_and_timestamp().returning(|| {
            Ok(SlotReference {
                slot: 896 * SLOTS_PER_EPOCH,
                timestamp: at(16),
            })
        });
        chain.expect_current_epoch().returning(move || Ok(current_epoch));
        chain
            .expect_epoch_schedule()
            .returning(|| Ok(EpochSchedule::without_warmup()));
        chain
    }

    fn row(epoch: u64) -> ProviderRecord {
        ProviderRecord {
            epoch,
            identity_pubkey: Some(IDENTITY.to_string()),
            total_inflation_reward: 20.0,
            commission: 5.0,
            mev_earned: 4.0,
            mev_commission: 1000.0,
            rewards: 0.25,
            vote_cost: 1.1,
        }
    }

    fn fetcher() -> RewardFetcher<MockBulkRewardSource, MockEpochRewardSource> {
        let mut bulk = MockBulkRewardSource::new();
        bulk.expect_validator_history()
            .returning(|_| Ok((897..905).map(row).collect()));
        let mut per_epoch = MockEpochRewardSource::new();
        per_epoch
            .expect_epoch_rewards()
            .withf(|epoch| (895..897).contains(epoch))
            .returning(|epoch| Ok(vec![row(epoch)]));
        RewardFetcher::new(bulk, per_epoch, 2)
    }

    fn price(result: fn() -> anyhow::Result<f64>) -> MockPriceOracle {
        let mut prices = MockPriceOracle::new();
        prices.expect_sol_usd_price().returning(result);
        prices
    }

    #[tokio::test]
    async fn test_report_covers_cycle_start_to_current_epoch() {
        let report = compute_profitability_report(
            &run_config(),
            &chain(900),
            &fetcher(),
            &price(|| Ok(100.0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.epochs, 895..900);
        assert_eq!(report.current_epoch, 900);
        assert_eq!(report.summary.epochs_covered, 5);
        assert_eq!(
            report.contributions.iter().map(|c| c.epoch).collect::<Vec<_>>(),
            vec![895, 896, 897, 898, 899]
        );
        assert_eq!(report.sol_price, 100.0);
        assert!(report.warnings.is_empty());

        // per epoch: 1 SOL vote + 0.4 SOL MEV + 0.25 SOL blocks - 1.1 SOL votes
        assert!((report.total_revenue_native - 5.0 * 1.65).abs() < 1e-9);
        assert!((report.net_gain_native - 5.0 * 0.55).abs() < 1e-9);
        assert!((report.revenue_fiat - 275.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_contributions_sum_to_summary() {
        let report = compute_profitability_report(
            &run_config(),
            &chain(900),
            &fetcher(),
            &price(|| Ok(100.0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let total: RewardsSummary = report.contributions.iter().map(|c| c.summary).sum();
        assert_eq!(total, report.summary);
    }

    #[tokio::test]
    async fn test_price_failure_uses_fallback() {
        let report = compute_profitability_report(
            &run_config(),
            &chain(900),
            &fetcher(),
            &price(|| Err(anyhow::anyhow!("429 Too Many Requests"))),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.sol_price, 185.0);
        assert!(matches!(
            report.warnings.as_slice(),
            [RunWarning::PriceFallback { fallback, reason }] if *fallback == 185.0 && reason.contains("429")
        ));
    }

    #[tokio::test]
    async fn test_zero_price_uses_fallback() {
        let report = compute_profitability_report(
            &run_config(),
            &chain(900),
            &fetcher(),
            &price(|| Ok(0.0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.sol_price, 185.0);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_start_in_current_epoch_yields_empty_range() {
        let mut bulk = MockBulkRewardSource::new();
        bulk.expect_validator_history().never();
        let fetcher = RewardFetcher::new(bulk, MockEpochRewardSource::new(), 2);

        let report = compute_profitability_report(
            &run_config(),
            &chain(895),
            &fetcher,
            &price(|| Ok(100.0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(report.epochs.is_empty());
        assert_eq!(report.summary, RewardsSummary::default());
        assert_eq!(report.revenue_fiat, 0.0);
        assert!(!report.is_on_track());
    }

    #[tokio::test]
    async fn test_start_past_current_epoch_keeps_current_epoch() {
        let mut bulk = MockBulkRewardSource::new();
        bulk.expect_validator_history().never();
        let fetcher = RewardFetcher::new(bulk, MockEpochRewardSource::new(), 2);

        let report = compute_profitability_report(
            &run_config(),
            &chain(893),
            &fetcher,
            &price(|| Ok(100.0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.epochs, 895..895);
        assert_eq!(report.current_epoch, 893);
    }

    #[tokio::test]
    async fn test_rpc_failure_is_fatal_but_not_configuration() {
        let mut chain = MockChainRpc::new();
        chain
            .expect_recent_slot_and_timestamp()
            .returning(|| Err(anyhow::anyhow!("connection refused")));

        let err = compute_profitability_report(
            &run_config(),
            &chain,
            &fetcher(),
            &price(|| Ok(100.0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, EconomicsError::Rpc(ref m) if m.contains("connection refused")));
        assert!(!err.is_configuration());
    }

    #[tokio::test]
    async fn test_schedule_failure_is_resolution_error() {
        let mut chain = MockChainRpc::new();
        chain.expect_recent_slot_and_timestamp().returning(|| {
            Ok(SlotReference {
                slot: 896 * SLOTS_PER_EPOCH,
                timestamp: at(16),
            })
        });
        chain.expect_current_epoch().returning(|| Ok(900));
        chain
            .expect_epoch_schedule()
            .returning(|| Err(anyhow::anyhow!("method not found")));

        let err = compute_profitability_report(
            &run_config(),
            &chain,
            &fetcher(),
            &price(|| Ok(100.0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, EconomicsError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_source_warnings_precede_projection_warnings() {
        let mut run = run_config();
        run.cycle = BillingCycle::new(at(15), Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap(), at(15)).unwrap();

        let mut bulk = MockBulkRewardSource::new();
        bulk.expect_validator_history()
            .returning(|_| Err(anyhow::anyhow!("503")));
        let mut per_epoch = MockEpochRewardSource::new();
        per_epoch.expect_epoch_rewards().returning(|epoch| Ok(vec![row(epoch)]));
        let fetcher = RewardFetcher::new(bulk, per_epoch, 2);

        let report = compute_profitability_report(
            &run,
            &chain(900),
            &fetcher,
            &price(|| Ok(100.0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(report.warnings[0], RunWarning::BulkSourceFailure(_)));
        assert!(matches!(report.warnings.last(), Some(RunWarning::DivisionGuard(_))));
        assert_eq!(report.summary.epochs_covered, 5);
    }
}
