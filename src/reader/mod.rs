//! Remote read capability
//!
//! Everything the engine learns about a chain goes through a `StateReader`. The reader answers two
//! questions: does a target have code, and what does a read-only call against it return. A reader
//! that cannot answer at all (transport down, node error) reports a `BatchError`, which fails the
//! batch as a whole. A call that was answered but did not succeed is a `CallOutcome`.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::BatchError;

pub mod rpc;

pub use rpc::RpcReader;

/// Result of one bounded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call returned normally with this data
    Success(Bytes),
    /// The call reverted, possibly with revert data
    Reverted(Bytes),
    /// The call ran out of its gas cap
    OutOfGas,
    /// The call did not answer within its timeout
    TimedOut,
}

/// Read-only access to contract state
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Returns true when the target has deployed code
    async fn has_code(&self, target: Address) -> Result<bool, BatchError>;

    /// Perform a read-only call, optionally limited to `gas_cap` units of gas
    async fn invoke(
        &self,
        target: Address,
        calldata: Bytes,
        gas_cap: Option<u64>,
    ) -> Result<CallOutcome, BatchError>;
}

#[async_trait]
impl<R: StateReader + ?Sized> StateReader for Arc<R> {
    async fn has_code(&self, target: Address) -> Result<bool, BatchError> {
        (**self).has_code(target).await
    }

    async fn invoke(
        &self,
        target: Address,
        calldata: Bytes,
        gas_cap: Option<u64>,
    ) -> Result<CallOutcome, BatchError> {
        (**self).invoke(target, calldata, gas_cap).await
    }
}
