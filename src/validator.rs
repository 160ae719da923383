//! Defensive validation of remote calls
//!
//! Every counterparty is treated as hostile. Calls are capped in gas, wall time and return size,
//! fixed width returns must be exactly the declared width, and every decoded word is range checked
//! against the field it is destined for before it reaches a record.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use std::time::Duration;

use crate::errors::{BatchError, FetchError, SkipReason};
use crate::pools::abi::IERC20;
use crate::reader::{CallOutcome, StateReader};

/// Size of one ABI word
pub const WORD: usize = 32;

/// Default gas available to one call, enough for a getter but not a loop
pub const DEFAULT_GAS_CAP: u64 = 20_000;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETURN_BYTES: usize = 4096;

/// Gas charged against the batch ceiling for one code existence check
pub const CODE_CHECK_GAS: u64 = 2_600;

pub const MIN_TICK: i64 = -887_272;
pub const MAX_TICK: i64 = 887_272;

/// Limits applied to every single remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBudget {
    pub gas_cap: u64,
    pub timeout: Duration,
    pub max_return_bytes: usize,
}

impl Default for CallBudget {
    fn default() -> Self {
        Self {
            gas_cap: DEFAULT_GAS_CAP,
            timeout: DEFAULT_CALL_TIMEOUT,
            max_return_bytes: DEFAULT_MAX_RETURN_BYTES,
        }
    }
}

impl CallBudget {
    pub fn with_gas_cap(mut self, gas_cap: u64) -> Self {
        self.gas_cap = gas_cap;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_return_bytes(mut self, max_return_bytes: usize) -> Self {
        self.max_return_bytes = max_return_bytes;
        self
    }
}

/// Tracks gas spent by a batch against its shared ceiling
#[derive(Debug, Clone)]
pub struct GasMeter {
    ceiling: Option<u64>,
    spent: u64,
}

impl GasMeter {
    pub fn new(ceiling: Option<u64>) -> Self {
        Self { ceiling, spent: 0 }
    }

    /// Charge `gas` to the batch. Exceeding the ceiling fails the whole batch
    pub fn charge(&mut self, gas: u64) -> Result<(), BatchError> {
        self.spent = self.spent.saturating_add(gas);
        match self.ceiling {
            Some(ceiling) if self.spent > ceiling => Err(BatchError::GasCeilingExceeded { ceiling }),
            _ => Ok(()),
        }
    }

    pub fn spent(&self) -> u64 {
        self.spent
    }
}

/// Everything an adapter pipeline needs to talk to the chain for one batch
pub struct FetchContext<'a, R: ?Sized> {
    reader: &'a R,
    budget: CallBudget,
    meter: &'a mut GasMeter,
}

impl<'a, R: StateReader + ?Sized> FetchContext<'a, R> {
    pub fn new(reader: &'a R, budget: CallBudget, meter: &'a mut GasMeter) -> Self {
        Self {
            reader,
            budget,
            meter,
        }
    }

    pub fn budget(&self) -> CallBudget {
        self.budget
    }

    /// A target with no code is absent. Calling it would succeed with empty data
    pub async fn contract_exists(&mut self, target: Address) -> Result<bool, BatchError> {
        self.meter.charge(CODE_CHECK_GAS)?;
        self.reader.has_code(target).await
    }

    /// Skip the entry unless `target` has code
    pub async fn require_contract(&mut self, target: Address) -> Result<(), FetchError> {
        if self.contract_exists(target).await? {
            Ok(())
        } else {
            Err(SkipReason::NotAContract(target).into())
        }
    }

    /// Issue one call under the budget. Only a reader failure or the batch ceiling is an error here
    pub async fn bounded_call(
        &mut self,
        target: Address,
        calldata: Vec<u8>,
    ) -> Result<CallOutcome, BatchError> {
        self.meter.charge(self.budget.gas_cap)?;
        let call = self
            .reader
            .invoke(target, Bytes::from(calldata), Some(self.budget.gas_cap));
        match tokio::time::timeout(self.budget.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Ok(CallOutcome::TimedOut),
        }
    }

    /// Issue one call, skipping the entry on any failure
    pub async fn call(&mut self, target: Address, calldata: Vec<u8>) -> Result<Bytes, FetchError> {
        let outcome = self.bounded_call(target, calldata).await?;
        Ok(success_data(outcome, self.budget.max_return_bytes)?)
    }

    /// Issue one call whose return must be exactly `count` words
    pub async fn call_words(
        &mut self,
        target: Address,
        calldata: Vec<u8>,
        count: usize,
    ) -> Result<Vec<B256>, FetchError> {
        let raw = self.call(target, calldata).await?;
        Ok(split_words(&raw, count)?)
    }

    pub async fn call_word(&mut self, target: Address, calldata: Vec<u8>) -> Result<B256, FetchError> {
        let raw = self.call(target, calldata).await?;
        Ok(B256::from_slice(decode_fixed_width(&raw, WORD)?))
    }

    pub async fn call_address(
        &mut self,
        target: Address,
        calldata: Vec<u8>,
    ) -> Result<Address, FetchError> {
        let word = self.call_word(target, calldata).await?;
        Ok(word_to_address(&word)?)
    }

    /// Fetch and validate the decimals of an ERC20
    pub async fn call_decimals(&mut self, token: Address) -> Result<u8, FetchError> {
        let word = self
            .call_word(token, IERC20::decimalsCall {}.abi_encode())
            .await?;
        Ok(validate_decimals(U256::from_be_slice(word.as_slice()))?)
    }
}

/// Turn an outcome into its return data, rejecting failures and oversized payloads
pub fn success_data(outcome: CallOutcome, max_return_bytes: usize) -> Result<Bytes, SkipReason> {
    match outcome {
        CallOutcome::Success(data) if data.len() > max_return_bytes => {
            Err(SkipReason::ReturnDataTooLarge {
                limit: max_return_bytes,
                actual: data.len(),
            })
        }
        CallOutcome::Success(data) => Ok(data),
        CallOutcome::Reverted(_) => Err(SkipReason::RemoteCallReverted),
        CallOutcome::OutOfGas | CallOutcome::TimedOut => Err(SkipReason::RemoteCallExceededCap),
    }
}

/// Accept `raw` only if it is exactly `width` bytes
pub fn decode_fixed_width(raw: &[u8], width: usize) -> Result<&[u8], SkipReason> {
    if raw.len() != width {
        return Err(SkipReason::DecodeLengthMismatch {
            expected: width,
            actual: raw.len(),
        });
    }
    Ok(raw)
}

/// Split an exact `count` word return into its words
pub fn split_words(raw: &[u8], count: usize) -> Result<Vec<B256>, SkipReason> {
    let raw = decode_fixed_width(raw, count * WORD)?;
    Ok(raw.chunks_exact(WORD).map(B256::from_slice).collect())
}

/// Decode a dynamic return as the parameters of `ty`. The payload must be the canonical encoding
/// of what it decodes to, trailing or interleaved garbage is rejected
pub fn decode_dynamic(
    raw: &[u8],
    ty: &DynSolType,
    field: &'static str,
) -> Result<DynSolValue, SkipReason> {
    let value = ty
        .abi_decode_params(raw)
        .map_err(|_| SkipReason::MalformedReturn(field))?;
    if value.abi_encode_params().len() != raw.len() {
        return Err(SkipReason::MalformedReturn(field));
    }
    Ok(value)
}

/// Decimals must lie in 1..=255, anything else marks a non-conforming token
pub fn validate_decimals(value: U256) -> Result<u8, SkipReason> {
    if value.is_zero() || value > U256::from(u8::MAX) {
        return Err(SkipReason::DecimalsOutOfRange(value));
    }
    Ok(value.to::<u8>())
}

pub fn word_to_address(word: &B256) -> Result<Address, SkipReason> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(SkipReason::ValueOutOfRange("address"));
    }
    Ok(Address::from_slice(&word[12..]))
}

/// Read an unsigned word that must fit in `bits`
pub fn word_to_uint(word: &B256, bits: usize, field: &'static str) -> Result<U256, SkipReason> {
    let value = U256::from_be_slice(word.as_slice());
    if value.bit_len() > bits {
        return Err(SkipReason::ValueOutOfRange(field));
    }
    Ok(value)
}

pub fn word_to_u128(word: &B256, bits: usize, field: &'static str) -> Result<u128, SkipReason> {
    debug_assert!(bits <= 128);
    Ok(word_to_uint(word, bits, field)?.to::<u128>())
}

/// Read a sign extended word that must fit in a signed integer of `bits`
pub fn word_to_int(word: &B256, bits: u32, field: &'static str) -> Result<i64, SkipReason> {
    debug_assert!((1..=64).contains(&bits));
    let fill = if word[24] & 0x80 != 0 { 0xff } else { 0x00 };
    if word[..24].iter().any(|b| *b != fill) {
        return Err(SkipReason::ValueOutOfRange(field));
    }

    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    let value = i64::from_be_bytes(low);

    let max = (1i128 << (bits - 1)) - 1;
    let min = -(1i128 << (bits - 1));
    if !(min..=max).contains(&i128::from(value)) {
        return Err(SkipReason::ValueOutOfRange(field));
    }
    Ok(value)
}

/// A tick must be a valid int24 inside the protocol tick bounds
pub fn word_to_tick(word: &B256) -> Result<i32, SkipReason> {
    let tick = word_to_int(word, 24, "tick")?;
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(SkipReason::ValueOutOfRange("tick"));
    }
    Ok(tick as i32)
}

/// Tick spacing is a positive int24
pub fn word_to_tick_spacing(word: &B256) -> Result<i32, SkipReason> {
    let spacing = word_to_int(word, 24, "tick spacing")?;
    if spacing <= 0 {
        return Err(SkipReason::ValueOutOfRange("tick spacing"));
    }
    Ok(spacing as i32)
}

/// Sign extend `value` into a full ABI word
pub fn int_to_word(value: i64) -> B256 {
    let mut word = if value < 0 { [0xff; WORD] } else { [0u8; WORD] };
    word[24..].copy_from_slice(&value.to_be_bytes());
    B256::from(word)
}
