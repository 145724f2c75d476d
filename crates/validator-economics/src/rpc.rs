//! Solana RPC access used to place the billing cycle on the epoch timeline

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use mockall::automock;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_epoch_schedule::EpochSchedule;

use crate::epoch::SlotReference;

#[automock]
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn current_epoch(&self) -> Result<u64>;
    async fn epoch_schedule(&self) -> Result<EpochSchedule>;
    /// Most recent finalized slot and its block time
    async fn recent_slot_and_timestamp(&self) -> Result<SlotReference>;
    /// Version string reported by the node (e.g. "2.2.14")
    async fn node_version(&self) -> Result<String>;
}

pub struct SolanaRpc(RpcClient);

impl SolanaRpc {
    pub fn new(rpc_url: String) -> Self {
        Self(RpcClient::new_with_commitment(
            rpc_url,
            CommitmentConfig::finalized(),
        ))
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn current_epoch(&self) -> Result<u64> {
        let info = self
            .0
            .get_epoch_info()
            .await
            .context("Failed to get epoch info")?;
        Ok(info.epoch)
    }

    async fn epoch_schedule(&self) -> Result<EpochSchedule> {
        self.0
            .get_epoch_schedule()
            .await
            .context("Failed to get epoch schedule")
    }

    async fn recent_slot_and_timestamp(&self) -> Result<SlotReference> {
        let slot = self.0.get_slot().await.context("Failed to get slot")?;
        let block_time = self
            .0
            .get_block_time(slot)
            .await
            .with_context(|| format!("Failed to get block time for slot {slot}"))?;
        let timestamp = DateTime::from_timestamp(block_time, 0)
            .ok_or_else(|| anyhow::anyhow!("Block time {block_time} out of range"))?;

        Ok(SlotReference { slot, timestamp })
    }

    async fn node_version(&self) -> Result<String> {
        let version = self
            .0
            .get_version()
            .await
            .context("Failed to get node version")?;
        Ok(version.solana_core)
    }
}
