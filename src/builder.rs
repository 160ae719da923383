//! PoolSync Builder Implementation
//!
//! This module provides a builder pattern for constructing a PoolSync instance,
//! allowing for flexible configuration of the chain, the rate limit and the batch limits.

use std::time::Duration;

use crate::batch::BatchConfig;
use crate::errors::PoolSyncError;
use crate::{Chain, PoolSync};

/// Concurrent batch invocations when no rate limit is configured
pub const DEFAULT_RATE_LIMIT: usize = 100;
/// Addresses per batch invocation
pub const DEFAULT_SHARD_SIZE: usize = 40;
pub const MAX_RETRIES: u32 = 5;
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Builder for constructing a PoolSync instance
#[derive(Default)]
pub struct PoolSyncBuilder {
    /// The chain to be synced on
    chain: Option<Chain>,
    /// Rate limit on the rpc endpoint
    rate_limit: Option<usize>,
    /// Initial number of addresses per batch
    shard_size: Option<usize>,
    max_retries: Option<u32>,
    initial_backoff: Option<Duration>,
    /// Limits applied to every batch
    config: BatchConfig,
}

impl PoolSyncBuilder {
    /// Sets the chain to sync on
    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Set the rate limit of the rpc, the number of batches in flight at once
    pub fn rate_limit(mut self, rate_limit: usize) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Set the starting shard size. Shards that exceed a batch limit are split further
    pub fn shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = Some(shard_size);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = Some(initial_backoff);
        self
    }

    /// Set the per call budget, gas ceiling and payload limit of every batch
    pub fn batch_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Consumes the builder and produces a constructed PoolSync
    pub fn build(self) -> Result<PoolSync, PoolSyncError> {
        // Ensure the chain is set
        let chain = self.chain.ok_or(PoolSyncError::ChainNotSet)?;

        Ok(PoolSync {
            chain,
            rate_limit: self.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT).max(1),
            shard_size: self.shard_size.unwrap_or(DEFAULT_SHARD_SIZE).max(1),
            max_retries: self.max_retries.unwrap_or(MAX_RETRIES),
            initial_backoff: self.initial_backoff.unwrap_or(INITIAL_BACKOFF),
            config: self.config,
        })
    }
}
