//! Main synchronization logic
//!
//! `PoolSync` shards an address list into batches, runs up to `rate_limit` batches at once and
//! stitches the results back together in input order. A batch that fails as a whole is retried
//! with backoff, and a batch that is too large for its gas ceiling or payload limit is split in
//! half until it fits.

use std::time::Duration;

use alloy_primitives::Address;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tracing::{error, info, warn};

use crate::batch::{execute_batch, pack_checked, BatchConfig, BatchRequest, BatchResult};
use crate::builder::PoolSyncBuilder;
use crate::errors::{BatchError, PoolSyncError};
use crate::factory::FactoryPager;
use crate::pools::{PoolAdapter, PoolType};
use crate::reader::StateReader;
use crate::util::create_progress_bar;
use crate::Chain;

/// Exponential backoff with jitter between retries of one operation
struct Backoff {
    attempt: u32,
    max_retries: u32,
    delay: Duration,
}

impl Backoff {
    fn new(max_retries: u32, initial: Duration) -> Self {
        Self {
            attempt: 0,
            max_retries,
            delay: initial,
        }
    }

    /// Sleep before the next attempt, false once the retries are used up
    async fn wait(&mut self) -> bool {
        if self.attempt >= self.max_retries {
            return false;
        }
        let jitter = Duration::from_millis(fastrand::u64(0..=100));
        tokio::time::sleep(self.delay + jitter).await;
        self.attempt += 1;
        self.delay *= 2;
        true
    }
}

/// The main struct for pool synchronization
pub struct PoolSync {
    /// The chain to sync on
    pub(crate) chain: Chain,
    /// Number of batches in flight at once
    pub(crate) rate_limit: usize,
    /// Addresses per batch before any splitting
    pub(crate) shard_size: usize,
    pub(crate) max_retries: u32,
    pub(crate) initial_backoff: Duration,
    /// Limits applied to every batch
    pub(crate) config: BatchConfig,
}

impl PoolSync {
    /// Construct a new builder to configure sync parameters
    pub fn builder() -> PoolSyncBuilder {
        PoolSyncBuilder::default()
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Sync the pools at `addresses` with the default adapter of `pool_type` on this chain
    pub async fn sync_pools<R: StateReader + ?Sized>(
        &self,
        reader: &R,
        pool_type: PoolType,
        addresses: &[Address],
    ) -> Result<BatchResult, PoolSyncError> {
        let adapter = pool_type.adapter(self.chain)?;
        self.sync_with_adapter(reader, &adapter, addresses, None, &pool_type.to_string())
            .await
    }

    /// Sync `addresses` with an explicit adapter. `ticks` must be index aligned with the
    /// addresses when the adapter takes supplied ticks
    pub async fn sync_with_adapter<R: StateReader + ?Sized>(
        &self,
        reader: &R,
        adapter: &PoolAdapter,
        addresses: &[Address],
        ticks: Option<&[i32]>,
        label: &str,
    ) -> Result<BatchResult, PoolSyncError> {
        // caller errors are not worth a retry, reject them before any shard runs
        if ticks.is_some() || adapter.needs_ticks() {
            let supplied = ticks.map_or(0, <[i32]>::len);
            if supplied != addresses.len() {
                return Err(BatchError::TickListMismatch {
                    addresses: addresses.len(),
                    ticks: supplied,
                }
                .into());
            }
        }

        let shards: Vec<(&[Address], Option<&[i32]>)> = addresses
            .chunks(self.shard_size)
            .enumerate()
            .map(|(i, shard)| {
                let start = i * self.shard_size;
                let ticks = ticks.map(|ticks| &ticks[start..start + shard.len()]);
                (shard, ticks)
            })
            .collect();

        let progress_bar = create_progress_bar(shards.len() as u64, format!("{label} data sync"));
        let results: Vec<BatchResult> = futures::stream::iter(shards)
            .map(|(shard, ticks)| {
                let progress_bar = progress_bar.clone();
                async move {
                    let result = self.sync_shard(reader, adapter, shard, ticks).await;
                    progress_bar.inc(1);
                    result
                }
            })
            .buffered(self.rate_limit)
            .collect()
            .await;
        progress_bar.finish_and_clear();

        let mut merged = BatchResult {
            kind: adapter.kind(),
            pools: Vec::with_capacity(addresses.len()),
            diagnostics: self.config.diagnostics.then(Vec::new),
        };
        for result in results {
            merged.extend(result);
        }
        info!(
            "{label}: synced {} of {} pools",
            merged.synced(),
            merged.len()
        );
        Ok(merged)
    }

    // One shard, retried on batch failures and split when it does not fit a batch
    fn sync_shard<'a, R: StateReader + ?Sized>(
        &'a self,
        reader: &'a R,
        adapter: &'a PoolAdapter,
        addresses: &'a [Address],
        ticks: Option<&'a [i32]>,
    ) -> BoxFuture<'a, BatchResult> {
        async move {
            let mut backoff = Backoff::new(self.max_retries, self.initial_backoff);
            loop {
                let mut request = BatchRequest::new(addresses);
                if let Some(ticks) = ticks {
                    request = request.with_ticks(ticks);
                }
                let attempt = execute_batch(reader, adapter, request, &self.config)
                    .await
                    .and_then(|result| pack_checked(&result, &self.config).map(|_| result));

                let err = match attempt {
                    Ok(result) => return result,
                    Err(err) => err,
                };

                let oversized = matches!(
                    err,
                    BatchError::GasCeilingExceeded { .. } | BatchError::PayloadTooLarge { .. }
                );
                if oversized && addresses.len() > 1 {
                    let mid = addresses.len() / 2;
                    warn!(shard = addresses.len(), %err, "splitting shard");
                    let (left_ticks, right_ticks) = match ticks {
                        Some(ticks) => (Some(&ticks[..mid]), Some(&ticks[mid..])),
                        None => (None, None),
                    };
                    let mut left = self
                        .sync_shard(reader, adapter, &addresses[..mid], left_ticks)
                        .await;
                    let right = self
                        .sync_shard(reader, adapter, &addresses[mid..], right_ticks)
                        .await;
                    left.extend(right);
                    return left;
                }

                // a single entry over the limits will not fit on a retry either
                if oversized || !backoff.wait().await {
                    error!(shard = addresses.len(), %err, "giving up on shard");
                    return self.failed_shard(adapter, addresses.len(), &err);
                }
                warn!(shard = addresses.len(), %err, attempt = backoff.attempt, "retrying shard");
            }
        }
        .boxed()
    }

    // Sentinels for every entry of a shard that could not be synced
    fn failed_shard(&self, adapter: &PoolAdapter, len: usize, err: &BatchError) -> BatchResult {
        BatchResult {
            kind: adapter.kind(),
            pools: vec![None; len],
            diagnostics: self
                .config
                .diagnostics
                .then(|| vec![Some(err.to_string()); len]),
        }
    }

    /// Page every pair out of the factory of a v2 style `pool_type`
    pub async fn fetch_factory_pools<R: StateReader + ?Sized>(
        &self,
        reader: &R,
        pool_type: PoolType,
    ) -> Result<Vec<Address>, PoolSyncError> {
        if !pool_type.is_v2() {
            return Err(PoolSyncError::UnsupportedPoolType);
        }
        let factory = self
            .chain
            .factory(&pool_type)
            .ok_or(PoolSyncError::UnsupportedPoolType)?;
        let pager = FactoryPager::new(factory, self.config);
        let count = pager.pair_count(reader).await?;

        let page = self.shard_size as u64;
        let pages = (0..count)
            .step_by(self.shard_size)
            .map(|start| (start, start.saturating_add(page).min(count)));

        let progress_bar =
            create_progress_bar(count.div_ceil(page), format!("{pool_type} address sync"));
        let results: Vec<Result<Vec<Option<Address>>, BatchError>> = futures::stream::iter(pages)
            .map(|(start, end)| {
                let progress_bar = progress_bar.clone();
                let pager = &pager;
                async move {
                    let mut backoff = Backoff::new(self.max_retries, self.initial_backoff);
                    let result = loop {
                        let err = match pager.get_range(reader, start, end).await {
                            Ok(pairs) => break Ok(pairs),
                            Err(err) => err,
                        };
                        if !backoff.wait().await {
                            error!(start, end, %err, "giving up on pair range");
                            break Err(err);
                        }
                        warn!(start, end, %err, "retrying pair range");
                    };
                    progress_bar.inc(1);
                    result
                }
            })
            .buffered(self.rate_limit)
            .collect()
            .await;
        progress_bar.finish_and_clear();

        let mut addresses = Vec::new();
        for result in results {
            addresses.extend(result?.into_iter().flatten());
        }
        Ok(addresses)
    }
}
