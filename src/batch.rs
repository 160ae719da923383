//! Batch driver
//!
//! Runs one adapter over an ordered list of addresses, strictly in order and one entry at a time.
//! Every entry produces exactly one slot in the result: the populated record, or `None` when any
//! step of its pipeline was skipped. Only a `BatchError` stops the batch, and it stops all of it.

use alloy_primitives::Address;
use tracing::{debug, info};

use crate::errors::{BatchError, FetchError};
use crate::packer;
use crate::pools::{Pool, PoolAdapter, PoolKind};
use crate::reader::StateReader;
use crate::validator::{CallBudget, FetchContext, GasMeter};

/// Gas available to a whole batch by default
pub const DEFAULT_GAS_CEILING: u64 = 50_000_000;
/// Largest packed batch a caller accepts by default
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Limits and options for one batch invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Limits applied to each remote call
    pub budget: CallBudget,
    /// Shared gas ceiling for every call in the batch, None for no ceiling
    pub gas_ceiling: Option<u64>,
    /// Size limit of the packed output
    pub max_payload_bytes: usize,
    /// Record why each skipped entry was skipped
    pub diagnostics: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            budget: CallBudget::default(),
            gas_ceiling: Some(DEFAULT_GAS_CEILING),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            diagnostics: false,
        }
    }
}

impl BatchConfig {
    pub fn with_budget(mut self, budget: CallBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_gas_ceiling(mut self, gas_ceiling: Option<u64>) -> Self {
        self.gas_ceiling = gas_ceiling;
        self
    }

    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Input of one batch: the addresses and, for adapters that need them, the current ticks
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub addresses: &'a [Address],
    pub ticks: Option<&'a [i32]>,
}

impl<'a> BatchRequest<'a> {
    pub fn new(addresses: &'a [Address]) -> Self {
        Self {
            addresses,
            ticks: None,
        }
    }

    /// Supply the current tick of every address, index aligned with the addresses
    pub fn with_ticks(mut self, ticks: &'a [i32]) -> Self {
        self.ticks = Some(ticks);
        self
    }

    fn check_ticks(&self, adapter: &PoolAdapter) -> Result<(), BatchError> {
        let supplied = self.ticks.map(<[i32]>::len);
        let mismatch = match supplied {
            Some(len) => len != self.addresses.len(),
            None => adapter.needs_ticks() && !self.addresses.is_empty(),
        };
        if mismatch {
            return Err(BatchError::TickListMismatch {
                addresses: self.addresses.len(),
                ticks: supplied.unwrap_or(0),
            });
        }
        Ok(())
    }
}

/// Index aligned output of one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub kind: PoolKind,
    /// One slot per input address, None where the entry was skipped
    pub pools: Vec<Option<Pool>>,
    /// Why each entry was skipped, present when requested
    pub diagnostics: Option<Vec<Option<String>>>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn synced(&self) -> usize {
        self.pools.iter().filter(|p| p.is_some()).count()
    }

    /// The populated records, dropping the sentinels
    pub fn into_pools(self) -> Vec<Pool> {
        self.pools.into_iter().flatten().collect()
    }

    /// Append another result of the same kind, keeping index alignment
    pub(crate) fn extend(&mut self, other: BatchResult) {
        self.pools.extend(other.pools);
        match (&mut self.diagnostics, other.diagnostics) {
            (Some(ours), Some(theirs)) => ours.extend(theirs),
            (ours, _) => *ours = None,
        }
    }
}

/// Run `adapter` over every address in `request`
pub async fn execute_batch<R: StateReader + ?Sized>(
    reader: &R,
    adapter: &PoolAdapter,
    request: BatchRequest<'_>,
    config: &BatchConfig,
) -> Result<BatchResult, BatchError> {
    request.check_ticks(adapter)?;

    let mut meter = GasMeter::new(config.gas_ceiling);
    let mut ctx = FetchContext::new(reader, config.budget, &mut meter);

    let mut pools = Vec::with_capacity(request.addresses.len());
    let mut diagnostics = config
        .diagnostics
        .then(|| Vec::with_capacity(request.addresses.len()));

    for (index, address) in request.addresses.iter().enumerate() {
        let tick = request.ticks.and_then(|ticks| ticks.get(index).copied());
        match adapter.fetch(&mut ctx, *address, tick).await {
            Ok(pool) => {
                pools.push(Some(pool));
                if let Some(diagnostics) = diagnostics.as_mut() {
                    diagnostics.push(None);
                }
            }
            Err(FetchError::Skip(reason)) => {
                debug!(index, %address, %reason, "skipping entry");
                pools.push(None);
                if let Some(diagnostics) = diagnostics.as_mut() {
                    diagnostics.push(Some(reason.to_string()));
                }
            }
            Err(FetchError::Batch(err)) => return Err(err),
        }
    }

    let result = BatchResult {
        kind: adapter.kind(),
        pools,
        diagnostics,
    };
    info!(
        kind = ?result.kind,
        synced = result.synced(),
        skipped = result.len() - result.synced(),
        gas = meter.spent(),
        "batch complete"
    );
    Ok(result)
}

/// Pack a result, failing when the buffer exceeds the payload limit
pub fn pack_checked(result: &BatchResult, config: &BatchConfig) -> Result<Vec<u8>, BatchError> {
    let buffer = packer::pack(result);
    if buffer.len() > config.max_payload_bytes {
        return Err(BatchError::PayloadTooLarge {
            limit: config.max_payload_bytes,
            actual: buffer.len(),
        });
    }
    Ok(buffer)
}

/// Run a batch and return its packed result
pub async fn execute_packed<R: StateReader + ?Sized>(
    reader: &R,
    adapter: &PoolAdapter,
    request: BatchRequest<'_>,
    config: &BatchConfig,
) -> Result<Vec<u8>, BatchError> {
    let result = execute_batch(reader, adapter, request, config).await?;
    pack_checked(&result, config)
}
