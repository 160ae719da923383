//! Paging through the pairs of a Uniswap V2 style factory

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use tracing::debug;

use crate::batch::BatchConfig;
use crate::errors::{BatchError, FetchError};
use crate::pools::abi::IUniswapV2Factory;
use crate::reader::StateReader;
use crate::validator::{FetchContext, GasMeter};

/// Reads pair addresses out of a factory's `allPairs` list
#[derive(Debug, Clone, Copy)]
pub struct FactoryPager {
    factory: Address,
    config: BatchConfig,
}

impl FactoryPager {
    pub fn new(factory: Address, config: BatchConfig) -> Self {
        Self { factory, config }
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Number of pairs the factory has created
    pub async fn pair_count<R: StateReader + ?Sized>(&self, reader: &R) -> Result<u64, BatchError> {
        let mut meter = GasMeter::new(self.config.gas_ceiling);
        let mut ctx = FetchContext::new(reader, self.config.budget, &mut meter);
        self.read_pair_count(&mut ctx).await
    }

    async fn read_pair_count<R: StateReader + ?Sized>(
        &self,
        ctx: &mut FetchContext<'_, R>,
    ) -> Result<u64, BatchError> {
        let calldata = IUniswapV2Factory::allPairsLengthCall {}.abi_encode();
        match ctx.call_word(self.factory, calldata).await {
            Ok(word) => {
                let count = U256::from_be_bytes(word.0);
                if count.bit_len() > 64 {
                    debug!(factory = %self.factory, %count, "pair count out of range");
                    return Err(BatchError::FactoryUnavailable(self.factory));
                }
                Ok(count.to::<u64>())
            }
            Err(FetchError::Skip(reason)) => {
                debug!(factory = %self.factory, %reason, "pair count unavailable");
                Err(BatchError::FactoryUnavailable(self.factory))
            }
            Err(FetchError::Batch(err)) => Err(err),
        }
    }

    /// Pairs at `[start, end)`, with `end` clamped to the pair count. A pair that cannot be read
    /// leaves `None` at its position
    pub async fn get_range<R: StateReader + ?Sized>(
        &self,
        reader: &R,
        start: u64,
        end: u64,
    ) -> Result<Vec<Option<Address>>, BatchError> {
        let mut meter = GasMeter::new(self.config.gas_ceiling);
        let mut ctx = FetchContext::new(reader, self.config.budget, &mut meter);

        let end = end.min(self.read_pair_count(&mut ctx).await?);
        if start >= end {
            return Ok(Vec::new());
        }

        let mut pairs = Vec::new();
        for index in start..end {
            let calldata = IUniswapV2Factory::allPairsCall {
                index: U256::from(index),
            }
            .abi_encode();
            match ctx.call_address(self.factory, calldata).await {
                Ok(pair) => pairs.push(Some(pair)),
                Err(FetchError::Skip(reason)) => {
                    debug!(factory = %self.factory, index, %reason, "pair unavailable");
                    pairs.push(None);
                }
                Err(FetchError::Batch(err)) => return Err(err),
            }
        }
        Ok(pairs)
    }
}
