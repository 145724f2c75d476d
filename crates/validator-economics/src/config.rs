//! Configuration for the validator economics report

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;

use crate::billing::BillingCycle;
use crate::compliance::ValidatorClient;
use crate::constants;
use crate::engine::RunConfig;
use crate::error::EconomicsError;

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    /// tracing filter directive, overridden by RUST_LOG
    #[serde(default = "default_log")]
    pub log: String,
    pub validator: ValidatorConfig,
    pub billing: BillingConfig,
    #[serde(default)]
    pub api_keys: ApiKeys,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
    #[serde(default)]
    pub compliance: ComplianceConfig,
}

/// Validator-specific configuration
#[derive(Debug, Deserialize)]
pub struct ValidatorConfig {
    /// Identity account address
    pub identity: String,
    /// Display name used in report headers
    #[serde(default)]
    pub name: Option<String>,
}

/// Billing cycle and operating expenses
#[derive(Debug, Deserialize)]
pub struct BillingConfig {
    /// Day of month the billing cycle starts (1-28)
    pub cycle_start_day: u32,
    /// Fixed expenses per cycle (hosting, contractors, ...)
    pub monthly_base_expense_usd: f64,
    /// Share of vote costs reimbursed by a third party (0-100)
    #[serde(default)]
    pub vote_cost_reimbursement_percent: Option<f64>,
    /// SFDP acceptance date; derives the reimbursement percent from the SFDP schedule
    #[serde(default)]
    pub sfdp_acceptance_date: Option<String>,
    /// SOL price used when the price API fails
    #[serde(default = "default_fallback_sol_price")]
    pub fallback_sol_price: f64,
}

/// API keys section
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub helius: Option<String>,
    #[serde(default)]
    pub coingecko: Option<String>,
}

/// Reward data provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_rewards_api_base")]
    pub rewards_api_base: String,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            rewards_api_base: default_rewards_api_base(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Notification sink
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub discord_webhook_url: String,
}

/// Version compliance settings
#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceConfig {
    #[serde(default)]
    pub client: ValidatorClient,
    /// RPC of the validator's own node (defaults to the main RPC URL)
    #[serde(default)]
    pub node_rpc_url: Option<String>,
    #[serde(default = "default_requirements_url")]
    pub requirements_url: String,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            client: ValidatorClient::default(),
            node_rpc_url: None,
            requirements_url: default_requirements_url(),
        }
    }
}

fn default_log() -> String {
    "info".to_string()
}

fn default_fallback_sol_price() -> f64 {
    constants::FALLBACK_SOL_PRICE
}

fn default_rewards_api_base() -> String {
    constants::TRILLIUM_API_BASE.to_string()
}

fn default_max_concurrent_requests() -> usize {
    constants::DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_request_timeout_secs() -> u64 {
    constants::DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    constants::DEFAULT_MAX_RETRIES
}

fn default_requirements_url() -> String {
    constants::REQUIRED_VERSIONS_URL.to_string()
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| {
            "Failed to parse config.toml. Check for:\n\
             - Missing required fields (validator.identity, billing.cycle_start_day, etc.)\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
             - Incorrect data types (strings vs numbers)\n\n\
             See config.toml.example for the expected format."
        })
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub log: String,
    /// Validator identity pubkey
    pub identity: Pubkey,
    pub validator_name: Option<String>,
    /// RPC URL
    pub rpc_url: String,
    pub coingecko_api_key: Option<String>,
    pub cycle_start_day: u32,
    pub monthly_base_expense_usd: f64,
    pub vote_cost_reimbursement_percent: Option<f64>,
    pub sfdp_acceptance_date: Option<NaiveDate>,
    pub fallback_sol_price: f64,
    pub sources: SourcesConfig,
    pub notify: Option<NotifyConfig>,
    pub compliance: ComplianceConfig,
}

impl Config {
    /// Validate file config, with an optional RPC URL override
    pub fn from_file(file_config: &FileConfig, rpc_url: Option<String>) -> Result<Self, EconomicsError> {
        let validator = &file_config.validator;
        let billing = &file_config.billing;

        let identity = Pubkey::from_str(&validator.identity)
            .map_err(|_| EconomicsError::InvalidIdentity(validator.identity.clone()))?;

        if !(1..=constants::MAX_CYCLE_START_DAY).contains(&billing.cycle_start_day) {
            return Err(EconomicsError::Config(format!(
                "billing.cycle_start_day must be between 1 and {}, got {}",
                constants::MAX_CYCLE_START_DAY,
                billing.cycle_start_day
            )));
        }
        if !billing.monthly_base_expense_usd.is_finite() || billing.monthly_base_expense_usd < 0.0 {
            return Err(EconomicsError::Config(format!(
                "billing.monthly_base_expense_usd must be non-negative, got {}",
                billing.monthly_base_expense_usd
            )));
        }
        if !billing.fallback_sol_price.is_finite() || billing.fallback_sol_price <= 0.0 {
            return Err(EconomicsError::Config(format!(
                "billing.fallback_sol_price must be positive, got {}",
                billing.fallback_sol_price
            )));
        }
        if let Some(percent) = billing.vote_cost_reimbursement_percent {
            if !(0.0..=100.0).contains(&percent) {
                return Err(EconomicsError::Config(format!(
                    "billing.vote_cost_reimbursement_percent must be between 0 and 100, got {percent}"
                )));
            }
            if billing.sfdp_acceptance_date.is_some() {
                return Err(EconomicsError::Config(
                    "set either billing.vote_cost_reimbursement_percent or billing.sfdp_acceptance_date, not both"
                        .to_string(),
                ));
            }
        }
        let sfdp_acceptance_date = billing
            .sfdp_acceptance_date
            .as_deref()
            .map(|date| {
                NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                    EconomicsError::Config(format!("billing.sfdp_acceptance_date '{date}' is not YYYY-MM-DD"))
                })
            })
            .transpose()?;
        if !(1..=constants::MAX_RETRIES_LIMIT).contains(&file_config.sources.max_retries) {
            return Err(EconomicsError::Config(format!(
                "sources.max_retries must be between 1 and {}, got {}",
                constants::MAX_RETRIES_LIMIT,
                file_config.sources.max_retries
            )));
        }
        if file_config.sources.max_concurrent_requests == 0 {
            return Err(EconomicsError::Config(
                "sources.max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        // Helius when a key is configured, public mainnet otherwise
        let rpc_url = rpc_url.unwrap_or_else(|| match &file_config.api_keys.helius {
            Some(key) => format!("{}{}", constants::HELIUS_RPC_BASE, key),
            None => constants::PUBLIC_RPC_URL.to_string(),
        });

        Ok(Self {
            log: file_config.log.clone(),
            identity,
            validator_name: validator.name.clone(),
            rpc_url,
            coingecko_api_key: file_config.api_keys.coingecko.clone(),
            cycle_start_day: billing.cycle_start_day,
            monthly_base_expense_usd: billing.monthly_base_expense_usd,
            vote_cost_reimbursement_percent: billing.vote_cost_reimbursement_percent,
            sfdp_acceptance_date,
            fallback_sol_price: billing.fallback_sol_price,
            sources: file_config.sources.clone(),
            notify: file_config.notify.clone(),
            compliance: file_config.compliance.clone(),
        })
    }

    /// Reimbursed share of vote costs on `date`: the fixed percentage if
    /// configured, else the SFDP schedule, else nothing
    pub fn vote_cost_reimbursement_percent(&self, date: NaiveDate) -> f64 {
        match (self.vote_cost_reimbursement_percent, self.sfdp_acceptance_date) {
            (Some(percent), _) => percent,
            (None, Some(acceptance)) => sfdp_coverage_percent(acceptance, date),
            (None, None) => 0.0,
        }
    }

    /// Per-run settings for the billing cycle containing `now`
    pub fn run_config(&self, now: DateTime<Utc>) -> Result<RunConfig, EconomicsError> {
        let cycle = BillingCycle::containing(now, self.cycle_start_day)?;

        Ok(RunConfig {
            identity: self.identity,
            cycle,
            monthly_base_expense_usd: self.monthly_base_expense_usd,
            vote_cost_reimbursement_percent: self.vote_cost_reimbursement_percent(cycle.start.date_naive()),
            fallback_sol_price: self.fallback_sol_price,
            seconds_per_slot: constants::SECONDS_PER_SLOT,
        })
    }
}

/// SFDP vote cost coverage percentage for a given date
/// Schedule from acceptance date:
/// - Months 1-3: 100% coverage
/// - Months 4-6: 75% coverage
/// - Months 7-9: 50% coverage
/// - Months 10-12: 25% coverage
/// - After 12 months: 0%
pub fn sfdp_coverage_percent(acceptance: NaiveDate, date: NaiveDate) -> f64 {
    let months_diff = (date.year() - acceptance.year()) * 12 + (date.month() as i32 - acceptance.month() as i32);

    if months_diff < 0 {
        0.0
    } else if months_diff < 3 {
        100.0
    } else if months_diff < 6 {
        75.0
    } else if months_diff < 9 {
        50.0
    } else if months_diff < 12 {
        25.0
    } else {
        0.0
    }
}
