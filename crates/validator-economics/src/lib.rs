//! Validator economics
//!
//! Estimates whether a Solana validator's earnings for the current billing
//! cycle cover its operating expenses, and projects the cycle's outcome from
//! the run rate so far.

pub mod aggregate;
pub mod billing;
pub mod compliance;
pub mod config;
pub mod constants;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod fetch;
pub mod http;
pub mod notify;
pub mod prices;
pub mod report;
pub mod rpc;
pub mod sources;

pub use aggregate::{RewardsSummary, aggregate};
pub use billing::{BillingCycle, ProfitabilityReport};
pub use engine::{RunConfig, compute_profitability_report};
pub use epoch::resolve_epoch;
pub use error::{EconomicsError, RunWarning};
pub use fetch::{FetchOutcome, RewardFetcher};
pub use report::{format_epoch_breakdown, format_report};
