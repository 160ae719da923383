//! PoolSync Error Types
//!
//! Errors are split along the batch boundary. A `SkipReason` never leaves the entry that produced
//! it, the driver absorbs it into a sentinel. A `BatchError` always escapes the whole batch as a
//! single signal. `PoolSyncError` covers configuration and orchestration around the batches.

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Reasons a single entry is left as a sentinel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The target has no deployed code
    #[error("{0} is not a contract")]
    NotAContract(Address),

    /// Return data was not exactly the declared width
    #[error("expected {expected} bytes of return data, got {actual}")]
    DecodeLengthMismatch { expected: usize, actual: usize },

    /// A decimals field outside 1..=255
    #[error("decimals {0} out of range")]
    DecimalsOutOfRange(U256),

    #[error("remote call reverted")]
    RemoteCallReverted,

    /// The call ran out of its gas cap or its timeout
    #[error("remote call exceeded its cap")]
    RemoteCallExceededCap,

    #[error("return data of {actual} bytes exceeds the {limit} byte limit")]
    ReturnDataTooLarge { limit: usize, actual: usize },

    /// A decoded numeric value does not fit the field it is destined for
    #[error("{0} out of range")]
    ValueOutOfRange(&'static str),

    /// Dynamic return data that does not decode canonically
    #[error("malformed {0} return data")]
    MalformedReturn(&'static str),

    #[error("token and balance lists differ in length")]
    TokenListMismatch,
}

/// Failures of the batch as a whole
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The reader could not deliver an answer at all
    #[error("transport error: {0}")]
    Transport(String),

    #[error("batch exceeded its gas ceiling of {ceiling}")]
    GasCeilingExceeded { ceiling: u64 },

    #[error("packed batch of {actual} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize, actual: usize },

    #[error("{ticks} supplied ticks for {addresses} addresses")]
    TickListMismatch { addresses: usize, ticks: usize },

    #[error("factory {0} did not report a pair count")]
    FactoryUnavailable(Address),
}

/// Error produced by one step of an adapter pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error(transparent)]
    Skip(#[from] SkipReason),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Enumerates the various error types that can occur during PoolSync operations
#[derive(Error, Debug)]
pub enum PoolSyncError {
    /// Indicates that the chain was not set when it was required
    #[error("Chain not set")]
    ChainNotSet,

    /// Indicates that an unsupported pool type was encountered
    #[error("Pool not supported")]
    UnsupportedPoolType,

    /// Rpc endpoint is not set
    #[error("Rpc endpoint not set")]
    EndpointNotSet,

    // Unable to parse endpoint
    #[error("Failed to parse endpoint into URL")]
    ParseEndpointError,

    /// Chain name that does not match a supported chain
    #[error("Unknown chain {0}")]
    UnknownChain(String),

    #[error(transparent)]
    Batch(#[from] BatchError),

    /// A packed buffer that does not follow the wire format
    #[error("Failed to decode packed batch: {0}")]
    Decode(String),
}
