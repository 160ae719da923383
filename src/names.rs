//! Token display names
//!
//! Resolution never fails for an entry. `symbol()` is tried as a `string` return, then as a
//! `bytes32` return, and otherwise the token gets a placeholder derived from its address. Only a
//! batch level failure (transport, gas ceiling) escapes.

use alloy_dyn_abi::DynSolType;
use alloy_primitives::{hex, Address, Bytes};
use alloy_sol_types::SolCall;
use tracing::trace;

use crate::errors::BatchError;
use crate::pools::abi::IERC20;
use crate::reader::StateReader;
use crate::validator::{decode_dynamic, success_data, FetchContext, WORD};

/// Placeholder for a token without a usable symbol
pub fn placeholder_name(token: Address) -> String {
    format!("UNK_{}", hex::encode(token))
}

/// Resolve a non-empty display name for `token`
pub async fn resolve_symbol<R: StateReader + ?Sized>(
    ctx: &mut FetchContext<'_, R>,
    token: Address,
) -> Result<String, BatchError> {
    // both encodings answer the same selector, one call serves both attempts
    let outcome = ctx
        .bounded_call(token, IERC20::symbolCall {}.abi_encode())
        .await?;

    let name = success_data(outcome, ctx.budget().max_return_bytes)
        .ok()
        .and_then(|raw| symbol_from_string(&raw).or_else(|| symbol_from_bytes32(&raw)));

    Ok(name.unwrap_or_else(|| {
        trace!(%token, "no usable symbol, using placeholder");
        placeholder_name(token)
    }))
}

fn symbol_from_string(raw: &Bytes) -> Option<String> {
    let ty = DynSolType::Tuple(vec![DynSolType::String]);
    let value = decode_dynamic(raw, &ty, "symbol").ok()?;
    let symbol = value.as_tuple()?.first()?.as_str()?;
    (!symbol.is_empty()).then(|| symbol.to_string())
}

// bytes up to the first zero byte, or all 32 when there is none
fn symbol_from_bytes32(raw: &Bytes) -> Option<String> {
    if raw.len() != WORD {
        return None;
    }
    let end = raw.iter().position(|b| *b == 0).unwrap_or(WORD);
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&raw[..end]).into_owned())
}
