use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{address_array, as_b256, as_u8, as_uint, as_vec, fetch_token, uint_array, uint_value, PoolStructure};
use crate::errors::{FetchError, SkipReason};
use crate::pools::abi::{IBalancerPool, IBalancerVault};
use crate::pools::{Pool, PoolKind};
use crate::reader::StateReader;
use crate::validator::{decode_dynamic, FetchContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BalancerV2Pool {
    pub address: Address,
    pub pool_id: B256,
    pub tokens: Vec<Address>,
    pub decimals: Vec<u8>,
    pub balances: Vec<U256>,
    pub weights: Vec<U256>,
    pub swap_fee: U256,
}

impl BalancerV2Pool {
    pub fn get_token_index(&self, token: &Address) -> Option<usize> {
        self.tokens.iter().position(|t| t == token)
    }

    pub fn get_balance(&self, token: &Address) -> U256 {
        self.get_token_index(token)
            .and_then(|index| self.balances.get(index).copied())
            .unwrap_or(U256::ZERO)
    }

    pub(crate) async fn fetch<R: StateReader + ?Sized>(
        ctx: &mut FetchContext<'_, R>,
        address: Address,
        vault: Address,
    ) -> Result<Self, FetchError> {
        ctx.require_contract(address).await?;

        let pool_id = ctx
            .call_word(address, IBalancerPool::getPoolIdCall {}.abi_encode())
            .await?;
        let (tokens, balances) = read_pool_tokens(ctx, vault, pool_id).await?;

        // weights are optional, anything short of a batch failure degrades to zeros
        let weights = match read_weights(ctx, address, tokens.len()).await {
            Ok(weights) => weights,
            Err(FetchError::Skip(reason)) => {
                debug!(pool = %address, %reason, "weights unavailable, defaulting to zero");
                vec![U256::ZERO; tokens.len()]
            }
            Err(err @ FetchError::Batch(_)) => return Err(err),
        };

        let swap_fee = ctx
            .call_word(address, IBalancerPool::getSwapFeePercentageCall {}.abi_encode())
            .await?;

        let mut decimals = Vec::with_capacity(tokens.len());
        for token in &tokens {
            decimals.push(fetch_token(ctx, *token, false).await?.decimals);
        }

        Ok(Self {
            address,
            pool_id,
            tokens,
            decimals,
            balances,
            weights,
            swap_fee: U256::from_be_bytes(swap_fee.0),
        })
    }
}

async fn read_pool_tokens<R: StateReader + ?Sized>(
    ctx: &mut FetchContext<'_, R>,
    vault: Address,
    pool_id: B256,
) -> Result<(Vec<Address>, Vec<U256>), FetchError> {
    let calldata = IBalancerVault::getPoolTokensCall { poolId: pool_id }.abi_encode();
    let raw = ctx.call(vault, calldata).await?;

    let ty = DynSolType::Tuple(vec![
        DynSolType::Array(Box::new(DynSolType::Address)),
        DynSolType::Array(Box::new(DynSolType::Uint(256))),
        DynSolType::Uint(256),
    ]);
    let value = decode_dynamic(&raw, &ty, "getPoolTokens")?;
    let fields = value
        .as_tuple()
        .ok_or(SkipReason::MalformedReturn("getPoolTokens"))?;

    let tokens = fields
        .first()
        .and_then(|v| as_vec(v, DynSolValue::as_address))
        .ok_or(SkipReason::MalformedReturn("getPoolTokens"))?;
    let balances = fields
        .get(1)
        .and_then(|v| as_vec(v, as_uint))
        .ok_or(SkipReason::MalformedReturn("getPoolTokens"))?;
    if tokens.len() != balances.len() {
        return Err(SkipReason::TokenListMismatch.into());
    }
    Ok((tokens, balances))
}

async fn read_weights<R: StateReader + ?Sized>(
    ctx: &mut FetchContext<'_, R>,
    pool: Address,
    token_count: usize,
) -> Result<Vec<U256>, FetchError> {
    let raw = ctx
        .call(pool, IBalancerPool::getNormalizedWeightsCall {}.abi_encode())
        .await?;
    let ty = DynSolType::Tuple(vec![DynSolType::Array(Box::new(DynSolType::Uint(256)))]);
    let value = decode_dynamic(&raw, &ty, "getNormalizedWeights")?;
    let weights = value
        .as_tuple()
        .and_then(|fields| fields.first())
        .and_then(|v| as_vec(v, as_uint))
        .ok_or(SkipReason::MalformedReturn("getNormalizedWeights"))?;
    if weights.len() != token_count {
        return Err(SkipReason::TokenListMismatch.into());
    }
    Ok(weights)
}

impl PoolStructure for BalancerV2Pool {
    const KIND: PoolKind = PoolKind::Balancer;

    fn pool_repr() -> DynSolType {
        DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::FixedBytes(32),
            DynSolType::Array(Box::new(DynSolType::Address)),
            DynSolType::Array(Box::new(DynSolType::Uint(8))),
            DynSolType::Array(Box::new(DynSolType::Uint(256))),
            DynSolType::Array(Box::new(DynSolType::Uint(256))),
            DynSolType::Uint(256),
        ])
    }

    fn to_sol_values(&self) -> Vec<DynSolValue> {
        vec![
            DynSolValue::Address(self.address),
            DynSolValue::FixedBytes(self.pool_id, 32),
            address_array(&self.tokens),
            uint_array(self.decimals.iter().map(|d| U256::from(*d)), 8),
            uint_array(self.balances.iter().copied(), 256),
            uint_array(self.weights.iter().copied(), 256),
            uint_value(self.swap_fee, 256),
        ]
    }

    fn from_sol_values(data: &[DynSolValue]) -> Option<Self> {
        let [address, pool_id, tokens, decimals, balances, weights, swap_fee] = data else {
            return None;
        };
        let pool = Self {
            address: address.as_address()?,
            pool_id: as_b256(pool_id)?,
            tokens: as_vec(tokens, DynSolValue::as_address)?,
            decimals: as_vec(decimals, as_u8)?,
            balances: as_vec(balances, as_uint)?,
            weights: as_vec(weights, as_uint)?,
            swap_fee: as_uint(swap_fee)?,
        };
        let n = pool.tokens.len();
        (pool.decimals.len() == n && pool.balances.len() == n && pool.weights.len() == n).then_some(pool)
    }

    fn into_typed_pool(self) -> Pool {
        Pool::Balancer(self)
    }
}
