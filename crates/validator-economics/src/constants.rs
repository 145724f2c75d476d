//! Centralized constants for the validator economics engine
//!
//! Network-wide values that apply to every Solana validator. Validator-specific
//! settings (identity, billing cycle, expenses) are loaded from config.toml.

// =============================================================================
// API Endpoints
// =============================================================================

/// Helius RPC base URL (append API key)
pub const HELIUS_RPC_BASE: &str = "https://mainnet.helius-rpc.com/?api-key=";

/// Public mainnet RPC, used when no Helius key is configured
pub const PUBLIC_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Trillium validator rewards API base URL
pub const TRILLIUM_API_BASE: &str = "https://api.trillium.so";

/// Full per-validator reward history (append identity pubkey)
pub const TRILLIUM_VALIDATOR_REWARDS: &str = "/validator_rewards/";

/// Every validator's rewards for one epoch (append epoch number)
pub const TRILLIUM_EPOCH_REWARDS: &str = "/epoch_rewards/";

/// CoinGecko API base URL
pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko current price endpoint
pub const COINGECKO_SIMPLE_PRICE: &str = "/simple/price?ids=solana&vs_currencies=usd";

/// Solana Foundation minimum version table
pub const REQUIRED_VERSIONS_URL: &str =
    "https://api.solana.org/api/epoch/required_versions?cluster=mainnet-beta";

// =============================================================================
// Solana Network Constants
// =============================================================================

/// Nominal slot duration on mainnet
pub const SECONDS_PER_SLOT: f64 = 0.4;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

// =============================================================================
// Provider Units
// =============================================================================

/// Provider `commission` is a whole percentage
pub const COMMISSION_PERCENT_SCALE: f64 = 100.0;

/// Provider `mev_commission` is in basis points (1000 = 10%)
pub const MEV_COMMISSION_BPS_SCALE: f64 = 10_000.0;

// =============================================================================
// File Names
// =============================================================================

/// Default config file path
pub const CONFIG_FILENAME: &str = "config.toml";

// =============================================================================
// Rate Limiting
// =============================================================================

/// Default number of concurrent per-epoch requests during gap-fill
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

/// Default per-request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default attempts per HTTP request (first try included)
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound accepted for `sources.max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Base backoff after a failed request (seconds, doubled per attempt)
pub const RETRY_BASE_DELAY_SECS: u64 = 2;

/// Base backoff after an HTTP 429 (seconds, doubled per attempt)
pub const RATE_LIMIT_BASE_DELAY_SECS: u64 = 30;

// =============================================================================
// Thresholds
// =============================================================================

/// Fallback SOL price if the price API fails
pub const FALLBACK_SOL_PRICE: f64 = 185.0;

/// Latest billing cycle start day accepted (every month has it)
pub const MAX_CYCLE_START_DAY: u32 = 28;

/// Discord rejects messages above this many characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
