//! Two-tier reward fetching
//!
//! The bulk history is tried first. Epochs in the requested range that precede
//! the earliest bulk epoch are filled one at a time from the per-epoch source.
//! If the bulk call fails the per-epoch source covers the whole range. Every
//! per-epoch problem becomes a warning so a partial report can still be built.

use futures::{StreamExt, stream};
use std::collections::BTreeSet;
use std::ops::Range;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RunWarning;
use crate::sources::{BulkRewardSource, EpochRewardRecord, EpochRewardSource, ProviderRecord};

/// Records in ascending epoch order plus everything that went wrong
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<EpochRewardRecord>,
    pub warnings: Vec<RunWarning>,
}

/// Result of the bulk history call
#[derive(Debug)]
pub enum BulkResult {
    Ok(Vec<ProviderRecord>),
    Failed(String),
}

/// Result of one per-epoch request
enum EpochOutcome {
    Found(EpochRewardRecord),
    Missing,
    Malformed(String),
    Failed(String),
    Skipped,
}

pub struct RewardFetcher<B, E> {
    bulk: B,
    per_epoch: E,
    max_concurrent_requests: usize,
}

impl<B: BulkRewardSource, E: EpochRewardSource> RewardFetcher<B, E> {
    pub fn new(bulk: B, per_epoch: E, max_concurrent_requests: usize) -> Self {
        Self {
            bulk,
            per_epoch,
            max_concurrent_requests: max_concurrent_requests.max(1),
        }
    }

    /// Fetch one record per epoch in `epochs` for `identity`.
    ///
    /// Never fails: request errors, malformed rows and cancellation are
    /// reported through [`FetchOutcome::warnings`].
    pub async fn fetch_rewards(
        &self,
        identity: &str,
        epochs: Range<u64>,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        if epochs.is_empty() {
            return outcome;
        }

        let bulk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let skipped = (epochs.end - epochs.start) as usize;
                warn!(skipped, "reward fetch cancelled during bulk history request");
                outcome.warnings.push(RunWarning::Cancelled(skipped));
                return outcome;
            }
            bulk = self.fetch_bulk(identity) => bulk,
        };

        let gap = match bulk {
            BulkResult::Ok(rows) => {
                let earliest = rows.iter().map(|r| r.epoch).min();
                let mut covered = BTreeSet::new();

                for row in rows.iter().filter(|r| epochs.contains(&r.epoch)) {
                    if !covered.insert(row.epoch) {
                        debug!(epoch = row.epoch, "ignoring duplicate bulk row");
                        continue;
                    }
                    match EpochRewardRecord::try_from(row) {
                        Ok(record) => outcome.records.push(record),
                        Err(reason) => outcome.warnings.push(RunWarning::MalformedRecord {
                            epoch: row.epoch,
                            reason,
                        }),
                    }
                }

                let gap_end = earliest.map_or(epochs.end, |e| e.clamp(epochs.start, epochs.end));
                info!(
                    bulk_epochs = covered.len(),
                    earliest = ?earliest,
                    gap = ?(epochs.start..gap_end),
                    "bulk reward history loaded"
                );
                (epochs.start..gap_end)
                    .filter(|epoch| !covered.contains(epoch))
                    .collect::<Vec<_>>()
            }
            BulkResult::Failed(reason) => {
                warn!(%reason, "bulk reward history failed, falling back to per-epoch fetch");
                outcome.warnings.push(RunWarning::BulkSourceFailure(reason));
                epochs.clone().collect()
            }
        };

        let filled = self.fill_epochs(identity, gap, cancel).await;
        outcome.records.extend(filled.records);
        outcome.warnings.extend(filled.warnings);
        outcome.records.sort_by_key(|r| r.epoch);

        outcome
    }

    async fn fetch_bulk(&self, identity: &str) -> BulkResult {
        match self.bulk.validator_history(identity).await {
            Ok(rows) => BulkResult::Ok(rows),
            Err(e) => BulkResult::Failed(format!("{e:#}")),
        }
    }

    /// Per-epoch fetch for each of `epochs`, issued concurrently
    async fn fill_epochs(&self, identity: &str, epochs: Vec<u64>, cancel: &CancellationToken) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        if epochs.is_empty() {
            return outcome;
        }
        info!(count = epochs.len(), "fetching epochs individually");

        let mut results: Vec<(u64, EpochOutcome)> = stream::iter(epochs)
            .map(|epoch| async move { (epoch, self.fetch_epoch(identity, epoch, cancel).await) })
            .buffer_unordered(self.max_concurrent_requests)
            .collect()
            .await;
        results.sort_by_key(|(epoch, _)| *epoch);

        let mut skipped = 0;
        for (epoch, result) in results {
            match result {
                EpochOutcome::Found(record) => outcome.records.push(record),
                EpochOutcome::Missing => debug!(epoch, "no reward entry for validator"),
                EpochOutcome::Malformed(reason) => {
                    outcome.warnings.push(RunWarning::MalformedRecord { epoch, reason })
                }
                EpochOutcome::Failed(reason) => {
                    warn!(epoch, %reason, "epoch reward fetch failed");
                    outcome.warnings.push(RunWarning::EpochFetchFailed { epoch, reason })
                }
                EpochOutcome::Skipped => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "reward fetch cancelled");
            outcome.warnings.push(RunWarning::Cancelled(skipped));
        }

        outcome
    }

    async fn fetch_epoch(&self, identity: &str, epoch: u64, cancel: &CancellationToken) -> EpochOutcome {
        if cancel.is_cancelled() {
            return EpochOutcome::Skipped;
        }

        let rows = tokio::select! {
            biased;
            _ = cancel.cancelled() => return EpochOutcome::Skipped,
            rows = self.per_epoch.epoch_rewards(epoch) => rows,
        };

        match rows {
            Ok(rows) => match rows
                .iter()
                .find(|r| r.identity_pubkey.as_deref() == Some(identity))
            {
                Some(row) if row.epoch != epoch => {
                    EpochOutcome::Malformed(format!("row reports epoch {}", row.epoch))
                }
                Some(row) => match EpochRewardRecord::try_from(row) {
                    Ok(record) => EpochOutcome::Found(record),
                    Err(reason) => EpochOutcome::Malformed(reason),
                },
                None => EpochOutcome::Missing,
            },
            Err(e) => EpochOutcome::Failed(format!("{e:#}")),
        }
    }
}
