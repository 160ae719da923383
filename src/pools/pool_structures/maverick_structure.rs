use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};

use super::{as_name, as_u8, fetch_token, name_value, uint_value, PoolStructure};
use crate::errors::FetchError;
use crate::pools::abi::IMaverickV2Pool;
use crate::pools::{Pool, PoolKind};
use crate::reader::StateReader;
use crate::validator::FetchContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MaverickPool {
    pub address: Address,
    pub token_a: Address,
    pub token_b: Address,
    pub token_a_decimals: u8,
    pub token_b_decimals: u8,
    pub token_a_name: Option<String>,
    pub token_b_name: Option<String>,
}

impl MaverickPool {
    pub(crate) async fn fetch<R: StateReader + ?Sized>(
        ctx: &mut FetchContext<'_, R>,
        address: Address,
        resolve_names: bool,
    ) -> Result<Self, FetchError> {
        ctx.require_contract(address).await?;

        let token_a = ctx
            .call_address(address, IMaverickV2Pool::tokenACall {}.abi_encode())
            .await?;
        let token_b = ctx
            .call_address(address, IMaverickV2Pool::tokenBCall {}.abi_encode())
            .await?;
        let a = fetch_token(ctx, token_a, resolve_names).await?;
        let b = fetch_token(ctx, token_b, resolve_names).await?;

        Ok(Self {
            address,
            token_a,
            token_b,
            token_a_decimals: a.decimals,
            token_b_decimals: b.decimals,
            token_a_name: a.name,
            token_b_name: b.name,
        })
    }
}

impl PoolStructure for MaverickPool {
    const KIND: PoolKind = PoolKind::Maverick;

    fn pool_repr() -> DynSolType {
        DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Address,
            DynSolType::Address,
            DynSolType::Uint(8),
            DynSolType::Uint(8),
            DynSolType::String,
            DynSolType::String,
        ])
    }

    fn to_sol_values(&self) -> Vec<DynSolValue> {
        vec![
            DynSolValue::Address(self.address),
            DynSolValue::Address(self.token_a),
            DynSolValue::Address(self.token_b),
            uint_value(U256::from(self.token_a_decimals), 8),
            uint_value(U256::from(self.token_b_decimals), 8),
            name_value(&self.token_a_name),
            name_value(&self.token_b_name),
        ]
    }

    fn from_sol_values(data: &[DynSolValue]) -> Option<Self> {
        let [address, token_a, token_b, dec_a, dec_b, name_a, name_b] = data else {
            return None;
        };
        Some(Self {
            address: address.as_address()?,
            token_a: token_a.as_address()?,
            token_b: token_b.as_address()?,
            token_a_decimals: as_u8(dec_a)?,
            token_b_decimals: as_u8(dec_b)?,
            token_a_name: as_name(name_a)?,
            token_b_name: as_name(name_b)?,
        })
    }

    fn into_typed_pool(self) -> Pool {
        Pool::Maverick(self)
    }
}
