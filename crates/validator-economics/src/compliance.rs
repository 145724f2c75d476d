//! Minimum client version checks against the published requirement table

use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

use crate::http::HttpClient;
use crate::rpc::ChainRpc;

/// Validator client implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorClient {
    #[default]
    Agave,
    Firedancer,
}

impl fmt::Display for ValidatorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorClient::Agave => write!(f, "Agave"),
            ValidatorClient::Firedancer => write!(f, "Firedancer"),
        }
    }
}

/// Minimum versions in force from `epoch` onwards
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionRequirement {
    pub epoch: u64,
    #[serde(default)]
    pub agave_min_version: Option<String>,
    #[serde(default)]
    pub firedancer_min_version: Option<String>,
}

impl VersionRequirement {
    fn min_version(&self, client: ValidatorClient) -> Option<&str> {
        match client {
            ValidatorClient::Agave => self.agave_min_version.as_deref(),
            ValidatorClient::Firedancer => self.firedancer_min_version.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RequirementsResponse {
    Wrapped { data: Vec<VersionRequirement> },
    Bare(Vec<VersionRequirement>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplianceStatus {
    Compliant,
    /// Meets today's minimum, not the one taking effect at `epoch`
    UpcomingRequirement { epoch: u64, required: Version },
    NonCompliant { required: Version },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceReport {
    pub client: ValidatorClient,
    pub running: Version,
    pub current_epoch: u64,
    pub current: Option<VersionRequirement>,
    pub next: Option<VersionRequirement>,
    pub status: ComplianceStatus,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        !matches!(self.status, ComplianceStatus::NonCompliant { .. })
    }
}

/// Parse a version string such as "v2.2.14" or "0.503.20214"
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).with_context(|| format!("Invalid version '{raw}'"))
}

/// Compare `running_version` with the requirements in force at `current_epoch`
/// and the next scheduled one
pub fn check_compliance(
    running_version: &str,
    requirements: &[VersionRequirement],
    current_epoch: u64,
    client: ValidatorClient,
) -> Result<ComplianceReport> {
    let running = parse_version(running_version)?;

    let mut sorted = requirements.to_vec();
    sorted.sort_by_key(|r| r.epoch);
    let current = sorted.iter().rev().find(|r| r.epoch <= current_epoch).cloned();
    let next = sorted.iter().find(|r| r.epoch > current_epoch).cloned();

    let required = |requirement: &Option<VersionRequirement>| -> Result<Option<Version>> {
        requirement
            .as_ref()
            .and_then(|r| r.min_version(client))
            .map(parse_version)
            .transpose()
    };

    let status = match (required(&current)?, required(&next)?) {
        (Some(min), _) if running < min => ComplianceStatus::NonCompliant { required: min },
        (_, Some(min)) if running < min => ComplianceStatus::UpcomingRequirement {
            epoch: next.as_ref().map_or(current_epoch, |r| r.epoch),
            required: min,
        },
        _ => ComplianceStatus::Compliant,
    };
    debug!(%running, ?status, "compliance evaluated");

    Ok(ComplianceReport {
        client,
        running,
        current_epoch,
        current,
        next,
        status,
    })
}

/// Download the requirement table
pub async fn fetch_requirements(http: &HttpClient, url: &str) -> Result<Vec<VersionRequirement>> {
    let response: RequirementsResponse = http
        .get_json(url, &[])
        .await
        .context("Failed to fetch required versions")?;

    Ok(match response {
        RequirementsResponse::Wrapped { data } => data,
        RequirementsResponse::Bare(rows) => rows,
    })
}

/// Check the node behind `node` against `requirements`
pub async fn check_node<C: ChainRpc + ?Sized>(
    node: &C,
    requirements: &[VersionRequirement],
    client: ValidatorClient,
) -> Result<ComplianceReport> {
    let version = node.node_version().await?;
    let current_epoch = node.current_epoch().await?;
    info!(%version, current_epoch, %client, "checking node version");

    check_compliance(&version, requirements, current_epoch, client)
}

pub fn format_compliance(report: &ComplianceReport) -> String {
    let min = |r: &Option<VersionRequirement>| {
        r.as_ref()
            .and_then(|r| r.min_version(report.client).map(|v| format!("{v} (epoch {})", r.epoch)))
            .unwrap_or_else(|| "none".to_string())
    };

    let status = match &report.status {
        ComplianceStatus::Compliant => "COMPLIANT".to_string(),
        ComplianceStatus::UpcomingRequirement { epoch, required } => {
            format!("UPGRADE NEEDED: {required} required from epoch {epoch}")
        }
        ComplianceStatus::NonCompliant { required } => {
            format!("NON-COMPLIANT: running {} below minimum {required}", report.running)
        }
    };

    format!(
        "VERSION COMPLIANCE ({})\n  Running:  {}\n  Epoch:    {}\n  Current:  {}\n  Next:     {}\n  Status:   {}",
        report.client,
        report.running,
        report.current_epoch,
        min(&report.current),
        min(&report.next),
        status
    )
}
