//! Current SOL price from the CoinGecko API

use anyhow::{Context, Result};
use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;

use crate::constants;
use crate::http::HttpClient;

#[automock]
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Spot SOL/USD price
    async fn sol_usd_price(&self) -> Result<f64>;
}

/// CoinGecko simple price response
#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    solana: Option<SolanaPrice>,
}

#[derive(Debug, Deserialize)]
struct SolanaPrice {
    usd: f64,
}

pub struct CoinGecko {
    http: HttpClient,
    api_key: Option<String>,
}

impl CoinGecko {
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl PriceOracle for CoinGecko {
    async fn sol_usd_price(&self) -> Result<f64> {
        let url = format!(
            "{}{}",
            constants::COINGECKO_API_BASE,
            constants::COINGECKO_SIMPLE_PRICE
        );

        let headers: Vec<(&str, &str)> = self
            .api_key
            .as_deref()
            .map(|key| ("x-cg-demo-api-key", key))
            .into_iter()
            .collect();

        let data: SimplePriceResponse = self
            .http
            .get_json(&url, &headers)
            .await
            .context("Failed to fetch SOL price")?;

        data.solana
            .map(|s| s.usd)
            .ok_or_else(|| anyhow::anyhow!("No SOL price in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_simple_price() {
        let data: SimplePriceResponse = serde_json::from_str(r#"{"solana":{"usd":142.37}}"#).unwrap();
        assert_eq!(data.solana.map(|s| s.usd), Some(142.37));
    }

    #[test]
    fn test_missing_coin_is_none() {
        let data: SimplePriceResponse = serde_json::from_str("{}").unwrap();
        assert!(data.solana.is_none());
    }
}
