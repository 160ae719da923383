use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};

use super::{address_array, as_name, as_u8, as_vec, fetch_token, uint_array, PoolStructure};
use crate::errors::FetchError;
use crate::pools::abi::ICurveFactory;
use crate::pools::{Pool, PoolKind};
use crate::reader::StateReader;
use crate::validator::{word_to_address, FetchContext};

/// How many coins a curve crypto pool holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveCoins {
    Two,
    Three,
}

impl CurveCoins {
    pub fn count(self) -> usize {
        match self {
            CurveCoins::Two => 2,
            CurveCoins::Three => 3,
        }
    }

    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            2 => Some(CurveCoins::Two),
            3 => Some(CurveCoins::Three),
            _ => None,
        }
    }
}

/// Curve crypto pool with two or three coins, resolved through its factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CurvePool {
    pub address: Address,
    pub tokens: Vec<Address>,
    pub decimals: Vec<u8>,
    pub names: Option<Vec<String>>,
}

impl CurvePool {
    pub(crate) async fn fetch<R: StateReader + ?Sized>(
        ctx: &mut FetchContext<'_, R>,
        address: Address,
        factory: Address,
        coins: CurveCoins,
        resolve_names: bool,
    ) -> Result<Self, FetchError> {
        let coins = coins.count();
        // get_coins returns a static address[coins], one word per coin
        let calldata = ICurveFactory::get_coinsCall { pool: address }.abi_encode();
        let words = ctx.call_words(factory, calldata, coins).await?;

        let mut tokens = Vec::with_capacity(coins);
        let mut decimals = Vec::with_capacity(coins);
        let mut names = Vec::with_capacity(coins);
        for word in &words {
            let token = fetch_token(ctx, word_to_address(word)?, resolve_names).await?;
            tokens.push(token.address);
            decimals.push(token.decimals);
            names.extend(token.name);
        }

        Ok(Self {
            address,
            tokens,
            decimals,
            names: resolve_names.then_some(names),
        })
    }
}

impl PoolStructure for CurvePool {
    const KIND: PoolKind = PoolKind::Curve;

    fn pool_repr() -> DynSolType {
        DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Array(Box::new(DynSolType::Address)),
            DynSolType::Array(Box::new(DynSolType::Uint(8))),
            DynSolType::Array(Box::new(DynSolType::String)),
        ])
    }

    fn to_sol_values(&self) -> Vec<DynSolValue> {
        let names = self.names.clone().unwrap_or_default();
        vec![
            DynSolValue::Address(self.address),
            address_array(&self.tokens),
            uint_array(self.decimals.iter().map(|d| U256::from(*d)), 8),
            DynSolValue::Array(names.into_iter().map(DynSolValue::String).collect()),
        ]
    }

    fn from_sol_values(data: &[DynSolValue]) -> Option<Self> {
        let [address, tokens, decimals, names] = data else {
            return None;
        };
        let tokens = as_vec(tokens, DynSolValue::as_address)?;
        let decimals = as_vec(decimals, as_u8)?;
        let names = as_vec(names, |n| as_name(n).flatten())?;
        CurveCoins::from_count(tokens.len())?;
        if tokens.len() != decimals.len() {
            return None;
        }
        Some(Self {
            address: address.as_address()?,
            tokens,
            decimals,
            names: (!names.is_empty()).then_some(names),
        })
    }

    fn into_typed_pool(self) -> Pool {
        Pool::Curve(self)
    }
}
