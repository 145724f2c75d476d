//! Validator economics report
//!
//! Prints how the current billing cycle is going for a Solana validator and
//! optionally posts the summary to a webhook.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use validator_economics::compliance::{self, ComplianceStatus};
use validator_economics::config::{Config, FileConfig};
use validator_economics::constants;
use validator_economics::http::{HttpClient, mask_api_key};
use validator_economics::notify::{self, DiscordWebhook};
use validator_economics::prices::CoinGecko;
use validator_economics::rpc::SolanaRpc;
use validator_economics::sources::TrilliumClient;
use validator_economics::{
    EconomicsError, RewardFetcher, compute_profitability_report, format_epoch_breakdown, format_report,
};

#[derive(Parser, Debug)]
#[command(name = "validator-economics")]
#[command(about = "Billing cycle profitability for a Solana validator")]
struct Args {
    /// Path to config.toml
    #[arg(short, long, default_value = constants::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// RPC URL (overrides the Helius/public default)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the current cycle's report once (default)
    Report {
        /// Post the report to the configured webhook
        #[arg(long)]
        notify: bool,

        /// Also print per-epoch contributions
        #[arg(long)]
        breakdown: bool,
    },

    /// Recompute the report on a fixed interval until interrupted
    Watch {
        #[arg(long, default_value_t = 60)]
        interval_minutes: u64,

        /// Post each report to the configured webhook
        #[arg(long)]
        notify: bool,
    },

    /// Check the node's client version against the published minimums
    Compliance {
        /// Post the result to the configured webhook
        #[arg(long)]
        notify: bool,
    },
}

/// Load config file or exit with helpful message
fn load_config_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        anyhow::bail!(
            "Config file '{}' not found.\n\n\
            To get started:\n\
            1. Copy config.toml.example to config.toml\n\
            2. Fill in your validator identity and billing settings\n\n\
            See config.toml.example for the required format.",
            path.display()
        );
    }

    FileConfig::load(path)
}

fn init_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn shutdown_listener() -> CancellationToken {
    let cancellation_token = CancellationToken::new();
    let token = cancellation_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            token.cancel();
        }
    });
    cancellation_token
}

/// Ticks every `interval_minutes`; a run that overruns the period delays the
/// next tick instead of triggering catch-up runs
fn watch_interval(interval_minutes: u64) -> Interval {
    let period = Duration::from_secs(interval_minutes.max(1).saturating_mul(60));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Everything a report run talks to
struct App {
    config: Config,
    http: HttpClient,
    chain: SolanaRpc,
    fetcher: RewardFetcher<TrilliumClient, TrilliumClient>,
    prices: CoinGecko,
    notifier: Option<DiscordWebhook>,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let sources = &config.sources;
        let http = HttpClient::new(Duration::from_secs(sources.request_timeout_secs), sources.max_retries)?;

        let fetcher = RewardFetcher::new(
            TrilliumClient::new(http.clone(), sources.rewards_api_base.as_str()),
            TrilliumClient::new(http.clone(), sources.rewards_api_base.as_str()),
            sources.max_concurrent_requests,
        );
        let notifier = config
            .notify
            .as_ref()
            .map(|n| DiscordWebhook::new(http.clone(), n.discord_webhook_url.clone()));

        Ok(Self {
            chain: SolanaRpc::new(config.rpc_url.clone()),
            prices: CoinGecko::new(http.clone(), config.coingecko_api_key.clone()),
            fetcher,
            notifier,
            http,
            config,
        })
    }

    fn headline(&self, text: String) -> String {
        match &self.config.validator_name {
            Some(name) => format!("{name}\n{text}"),
            None => text,
        }
    }

    async fn deliver(&self, text: &str) {
        match &self.notifier {
            Some(notifier) => notify::notify(notifier, text).await,
            None => error!("--notify given but no [notify] section in config"),
        }
    }

    /// One report run. Only configuration problems are returned as errors.
    async fn report(&self, notify: bool, breakdown: bool, cancel: &CancellationToken) -> Result<(), EconomicsError> {
        let run = self.config.run_config(Utc::now())?;

        let report = match compute_profitability_report(&run, &self.chain, &self.fetcher, &self.prices, cancel).await {
            Ok(report) => report,
            Err(e) if e.is_configuration() => return Err(e),
            Err(e) => {
                error!("report run failed: {e}");
                return Ok(());
            }
        };

        let text = self.headline(format_report(&report));
        println!("{text}");
        if breakdown {
            println!("\n{}", format_epoch_breakdown(&report));
        }
        if notify {
            self.deliver(&text).await;
        }

        Ok(())
    }

    async fn watch(&self, interval_minutes: u64, notify: bool, cancel: &CancellationToken) -> Result<(), EconomicsError> {
        let mut interval = watch_interval(interval_minutes);
        info!(interval_minutes, "watching billing cycle");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.report(notify, false, cancel).await?,
            }
        }

        Ok(())
    }

    async fn compliance(&self, notify: bool) -> Result<()> {
        let node_rpc_url = self
            .config
            .compliance
            .node_rpc_url
            .clone()
            .unwrap_or_else(|| self.config.rpc_url.clone());
        info!(rpc = %mask_api_key(&node_rpc_url), "checking version compliance");

        let requirements = compliance::fetch_requirements(&self.http, &self.config.compliance.requirements_url).await?;
        let node = SolanaRpc::new(node_rpc_url);
        let report = compliance::check_node(&node, &requirements, self.config.compliance.client).await?;

        match &report.status {
            ComplianceStatus::Compliant => info!(running = %report.running, "node is compliant"),
            ComplianceStatus::UpcomingRequirement { epoch, required } => {
                warn!(%required, epoch, "upgrade required before upcoming epoch")
            }
            ComplianceStatus::NonCompliant { required } => {
                error!(running = %report.running, %required, "node is below the minimum version")
            }
        }

        let text = self.headline(compliance::format_compliance(&report));
        println!("{text}");
        if notify {
            self.deliver(&text).await;
        }

        Ok(())
    }
}

async fn run(args: Args) -> Result<()> {
    let file_config = load_config_file(&args.config)?;
    let config = Config::from_file(&file_config, args.rpc_url).context("Invalid configuration")?;

    init_logging(if args.verbose { "debug" } else { config.log.as_str() });
    info!(
        identity = %config.identity,
        rpc = %mask_api_key(&config.rpc_url),
        "validator economics starting"
    );

    let app = App::new(config)?;
    let cancel = shutdown_listener();

    match args.command.unwrap_or(Command::Report {
        notify: false,
        breakdown: false,
    }) {
        Command::Report { notify, breakdown } => app.report(notify, breakdown, &cancel).await?,
        Command::Watch {
            interval_minutes,
            notify,
        } => app.watch(interval_minutes, notify, &cancel).await?,
        Command::Compliance { notify } => {
            if let Err(e) = app.compliance(notify).await {
                error!("compliance check failed: {e:#}");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watch_interval_skips_missed_ticks() {
        let interval = watch_interval(15);
        assert_eq!(interval.period(), Duration::from_secs(15 * 60));
        assert_eq!(interval.missed_tick_behavior(), MissedTickBehavior::Skip);
    }

    #[tokio::test]
    async fn test_watch_interval_has_a_floor() {
        assert_eq!(watch_interval(0).period(), Duration::from_secs(60));
    }

    #[test]
    fn test_default_command_is_report() {
        let args = Args::parse_from(["validator-economics"]);
        assert!(args.command.is_none());

        let args = Args::parse_from(["validator-economics", "watch", "--interval-minutes", "5"]);
        assert!(matches!(args.command, Some(Command::Watch { interval_minutes: 5, notify: false })));
    }
}
