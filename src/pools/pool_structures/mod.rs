//! Defines the various structures that pools map into
//! Typically, one dex will engineer a new variant of
//! a pool representation and other protocols will fork it
//! and slap a new name on.
//!
//! These structures define common pool representations from
//! the original protocols which happen to map to various other protocols.
//! Each one carries the pipeline that populates it from chain state and
//! the tuple it is packed as.
pub mod balancer_v2_structure;
pub mod curve_structure;
pub mod maverick_structure;
pub mod tick_window_structure;
pub mod v2_structure;
pub mod v3_structure;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, I256, U256};

use crate::errors::FetchError;
use crate::names::resolve_symbol;
use crate::pools::{Pool, PoolKind};
use crate::reader::StateReader;
use crate::validator::{int_to_word, word_to_int, FetchContext};

// Standardized interface between a populated structure and its packed tuple
pub trait PoolStructure: Sized {
    const KIND: PoolKind;

    // Tuple type the structure is packed as
    fn pool_repr() -> DynSolType;

    // Fields of self in the order of pool_repr
    fn to_sol_values(&self) -> Vec<DynSolValue>;

    // Rebuild from decoded tuple fields, None if they do not match pool_repr
    fn from_sol_values(data: &[DynSolValue]) -> Option<Self>;

    // Consume self and construct a top level Pool
    fn into_typed_pool(self) -> Pool;
}

/// A token that passed the existence and decimals checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenInfo {
    pub address: Address,
    pub decimals: u8,
    pub name: Option<String>,
}

/// Require code at `token`, validate its decimals and optionally resolve its display name
pub(crate) async fn fetch_token<R: StateReader + ?Sized>(
    ctx: &mut FetchContext<'_, R>,
    token: Address,
    resolve_name: bool,
) -> Result<TokenInfo, FetchError> {
    ctx.require_contract(token).await?;
    let decimals = ctx.call_decimals(token).await?;
    let name = if resolve_name {
        Some(resolve_symbol(ctx, token).await?)
    } else {
        None
    };
    Ok(TokenInfo {
        address: token,
        decimals,
        name,
    })
}

// Conversions between record fields and abi values

pub(crate) fn uint_value(value: U256, bits: usize) -> DynSolValue {
    DynSolValue::Uint(value, bits)
}

pub(crate) fn int_value(value: i64, bits: usize) -> DynSolValue {
    DynSolValue::Int(I256::from_raw(U256::from_be_bytes(int_to_word(value).0)), bits)
}

pub(crate) fn name_value(name: &Option<String>) -> DynSolValue {
    DynSolValue::String(name.clone().unwrap_or_default())
}

pub(crate) fn address_array(values: &[Address]) -> DynSolValue {
    DynSolValue::Array(values.iter().map(|a| DynSolValue::Address(*a)).collect())
}

pub(crate) fn uint_array(values: impl IntoIterator<Item = U256>, bits: usize) -> DynSolValue {
    DynSolValue::Array(values.into_iter().map(|v| uint_value(v, bits)).collect())
}

pub(crate) fn as_uint(value: &DynSolValue) -> Option<U256> {
    value.as_uint().map(|(v, _)| v)
}

pub(crate) fn as_u8(value: &DynSolValue) -> Option<u8> {
    as_uint(value)
        .filter(|v| v.bit_len() <= 8)
        .map(|v| v.to::<u8>())
}

pub(crate) fn as_u128(value: &DynSolValue) -> Option<u128> {
    as_uint(value)
        .filter(|v| v.bit_len() <= 128)
        .map(|v| v.to::<u128>())
}

pub(crate) fn as_int(value: &DynSolValue, bits: u32) -> Option<i64> {
    let (raw, _) = value.as_int()?;
    let word = B256::from(raw.into_raw().to_be_bytes::<32>());
    word_to_int(&word, bits, "int").ok()
}

pub(crate) fn as_b256(value: &DynSolValue) -> Option<B256> {
    match value.as_fixed_bytes()? {
        (bytes, 32) if bytes.len() == 32 => Some(B256::from_slice(bytes)),
        _ => None,
    }
}

pub(crate) fn as_name(value: &DynSolValue) -> Option<Option<String>> {
    let name = value.as_str()?;
    Some((!name.is_empty()).then(|| name.to_string()))
}

pub(crate) fn as_vec<T>(
    value: &DynSolValue,
    each: impl Fn(&DynSolValue) -> Option<T>,
) -> Option<Vec<T>> {
    value.as_array()?.iter().map(each).collect()
}
