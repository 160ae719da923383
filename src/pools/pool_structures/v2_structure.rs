use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};

use super::{as_name, as_u8, as_uint, fetch_token, name_value, uint_value, PoolStructure};
use crate::errors::FetchError;
use crate::pools::abi::IUniswapV2Pair;
use crate::pools::{Pool, PoolKind};
use crate::reader::StateReader;
use crate::validator::{word_to_uint, FetchContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UniswapV2Pool {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub token0_reserves: U256,
    pub token1_reserves: U256,
    pub token0_name: Option<String>,
    pub token1_name: Option<String>,
}

impl UniswapV2Pool {
    /// token0, token1 and getReserves on the pair, then the decimals (and names) of both tokens
    pub(crate) async fn fetch<R: StateReader + ?Sized>(
        ctx: &mut FetchContext<'_, R>,
        address: Address,
        resolve_names: bool,
    ) -> Result<Self, FetchError> {
        ctx.require_contract(address).await?;

        let token0 = ctx
            .call_address(address, IUniswapV2Pair::token0Call {}.abi_encode())
            .await?;
        let token1 = ctx
            .call_address(address, IUniswapV2Pair::token1Call {}.abi_encode())
            .await?;

        // reserve0, reserve1, blockTimestampLast
        let reserves = ctx
            .call_words(address, IUniswapV2Pair::getReservesCall {}.abi_encode(), 3)
            .await?;
        let token0_reserves = word_to_uint(&reserves[0], 112, "reserve0")?;
        let token1_reserves = word_to_uint(&reserves[1], 112, "reserve1")?;
        word_to_uint(&reserves[2], 32, "blockTimestampLast")?;

        let first = fetch_token(ctx, token0, resolve_names).await?;
        let second = fetch_token(ctx, token1, resolve_names).await?;

        Ok(Self {
            address,
            token0,
            token1,
            token0_decimals: first.decimals,
            token1_decimals: second.decimals,
            token0_reserves,
            token1_reserves,
            token0_name: first.name,
            token1_name: second.name,
        })
    }
}

impl PoolStructure for UniswapV2Pool {
    const KIND: PoolKind = PoolKind::UniswapV2;

    fn pool_repr() -> DynSolType {
        DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Address,
            DynSolType::Address,
            DynSolType::Uint(8),
            DynSolType::Uint(8),
            DynSolType::Uint(112),
            DynSolType::Uint(112),
            DynSolType::String,
            DynSolType::String,
        ])
    }

    fn to_sol_values(&self) -> Vec<DynSolValue> {
        vec![
            DynSolValue::Address(self.address),
            DynSolValue::Address(self.token0),
            DynSolValue::Address(self.token1),
            uint_value(U256::from(self.token0_decimals), 8),
            uint_value(U256::from(self.token1_decimals), 8),
            uint_value(self.token0_reserves, 112),
            uint_value(self.token1_reserves, 112),
            name_value(&self.token0_name),
            name_value(&self.token1_name),
        ]
    }

    fn from_sol_values(data: &[DynSolValue]) -> Option<Self> {
        let [address, token0, token1, dec0, dec1, res0, res1, name0, name1] = data else {
            return None;
        };
        Some(Self {
            address: address.as_address()?,
            token0: token0.as_address()?,
            token1: token1.as_address()?,
            token0_decimals: as_u8(dec0)?,
            token1_decimals: as_u8(dec1)?,
            token0_reserves: as_uint(res0)?,
            token1_reserves: as_uint(res1)?,
            token0_name: as_name(name0)?,
            token1_name: as_name(name1)?,
        })
    }

    fn into_typed_pool(self) -> Pool {
        Pool::UniswapV2(self)
    }
}
