use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};

use super::{as_int, as_u128, as_uint, int_value, uint_value, PoolStructure};
use crate::errors::FetchError;
use crate::pools::abi::IUniswapV3Pool;
use crate::pools::{Pool, PoolKind, Slot0Layout};
use crate::reader::StateReader;
use crate::validator::{word_to_tick, word_to_tick_spacing, word_to_u128, word_to_uint, FetchContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UniswapV3Pool {
    pub address: Address,
    pub sqrt_price: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub fee: u32,
    pub tick_spacing: i32,
}

/// Read the sqrt price and current tick out of `slot0`
pub(crate) async fn read_slot0<R: StateReader + ?Sized>(
    ctx: &mut FetchContext<'_, R>,
    pool: Address,
    layout: Slot0Layout,
) -> Result<(U256, i32), FetchError> {
    let words = ctx
        .call_words(pool, IUniswapV3Pool::slot0Call {}.abi_encode(), layout.words())
        .await?;
    let sqrt_price = word_to_uint(&words[0], 160, "sqrtPriceX96")?;
    let tick = word_to_tick(&words[1])?;
    Ok((sqrt_price, tick))
}

pub(crate) async fn read_tick_spacing<R: StateReader + ?Sized>(
    ctx: &mut FetchContext<'_, R>,
    pool: Address,
) -> Result<i32, FetchError> {
    let word = ctx
        .call_word(pool, IUniswapV3Pool::tickSpacingCall {}.abi_encode())
        .await?;
    Ok(word_to_tick_spacing(&word)?)
}

impl UniswapV3Pool {
    pub(crate) async fn fetch<R: StateReader + ?Sized>(
        ctx: &mut FetchContext<'_, R>,
        address: Address,
        layout: Slot0Layout,
    ) -> Result<Self, FetchError> {
        ctx.require_contract(address).await?;

        let (sqrt_price, tick) = read_slot0(ctx, address, layout).await?;
        let liquidity = ctx
            .call_word(address, IUniswapV3Pool::liquidityCall {}.abi_encode())
            .await?;
        let liquidity = word_to_u128(&liquidity, 128, "liquidity")?;
        let fee = ctx
            .call_word(address, IUniswapV3Pool::feeCall {}.abi_encode())
            .await?;
        let fee = word_to_u128(&fee, 24, "fee")? as u32;
        let tick_spacing = read_tick_spacing(ctx, address).await?;

        Ok(Self {
            address,
            sqrt_price,
            tick,
            liquidity,
            fee,
            tick_spacing,
        })
    }
}

impl PoolStructure for UniswapV3Pool {
    const KIND: PoolKind = PoolKind::UniswapV3;

    fn pool_repr() -> DynSolType {
        DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Uint(160),
            DynSolType::Int(24),
            DynSolType::Uint(128),
            DynSolType::Uint(24),
            DynSolType::Int(24),
        ])
    }

    fn to_sol_values(&self) -> Vec<DynSolValue> {
        vec![
            DynSolValue::Address(self.address),
            uint_value(self.sqrt_price, 160),
            int_value(self.tick.into(), 24),
            uint_value(U256::from(self.liquidity), 128),
            uint_value(U256::from(self.fee), 24),
            int_value(self.tick_spacing.into(), 24),
        ]
    }

    fn from_sol_values(data: &[DynSolValue]) -> Option<Self> {
        let [address, sqrt_price, tick, liquidity, fee, tick_spacing] = data else {
            return None;
        };
        Some(Self {
            address: address.as_address()?,
            sqrt_price: as_uint(sqrt_price)?,
            tick: as_int(tick, 24)? as i32,
            liquidity: as_u128(liquidity)?,
            fee: u32::try_from(as_u128(fee)?).ok()?,
            tick_spacing: as_int(tick_spacing, 24)? as i32,
        })
    }

    fn into_typed_pool(self) -> Pool {
        Pool::UniswapV3(self)
    }
}
