//! Calendar date to epoch resolution
//!
//! The target slot is extrapolated linearly from a recently observed
//! (slot, block time) pair using the nominal slot duration. The slot is then
//! mapped to an epoch through the chain's epoch schedule, which is injected so
//! that warmup and other non-uniform schedules are handled by the chain's own
//! rules rather than by dividing by slots-per-epoch here.

use chrono::{DateTime, Utc};

use crate::error::{EconomicsError, Result};

/// A slot together with its observed block time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotReference {
    pub slot: u64,
    pub timestamp: DateTime<Utc>,
}

/// Estimate the slot that will be (or was) produced at `target`.
///
/// Negative estimates collapse to the genesis slot.
pub fn estimate_slot(target: DateTime<Utc>, reference: SlotReference, seconds_per_slot: f64) -> u64 {
    let delta_ms = (target - reference.timestamp).num_milliseconds() as f64;
    let slot_delta = (delta_ms / (seconds_per_slot * 1000.0)).floor();
    let estimated = reference.slot as f64 + slot_delta;

    if estimated <= 0.0 { 0 } else { estimated as u64 }
}

/// Resolve `target` to an epoch index.
///
/// `epoch_for_slot` failures surface as [`EconomicsError::Resolution`] and are
/// not retried here.
pub fn resolve_epoch<F>(
    target: DateTime<Utc>,
    reference: SlotReference,
    seconds_per_slot: f64,
    epoch_for_slot: F,
) -> Result<u64>
where
    F: Fn(u64) -> anyhow::Result<u64>,
{
    if !(seconds_per_slot.is_finite() && seconds_per_slot > 0.0) {
        return Err(EconomicsError::Config(format!(
            "seconds per slot must be positive, got {seconds_per_slot}"
        )));
    }

    let slot = estimate_slot(target, reference, seconds_per_slot);
    epoch_for_slot(slot).map_err(|e| EconomicsError::Resolution(format!("slot {slot}: {e:#}")))
}
