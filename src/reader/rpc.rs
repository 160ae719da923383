use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types::{BlockId, TransactionInput, TransactionRequest};
use alloy_transport::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

use super::{CallOutcome, StateReader};
use crate::errors::{BatchError, PoolSyncError};

// Gas charged by the node before the call frame starts
const INTRINSIC_GAS: u64 = 21_000;
const CALLDATA_GAS_PER_BYTE: u64 = 16;

/// Reader backed by `eth_call` and `eth_getCode` against an rpc endpoint
#[derive(Clone)]
pub struct RpcReader {
    provider: Arc<RootProvider>,
    block: Option<u64>,
}

impl RpcReader {
    pub fn new(provider: Arc<RootProvider>) -> Self {
        Self {
            provider,
            block: None,
        }
    }

    /// Construct a reader from the `ARCHIVE` endpoint in the environment
    pub fn from_env() -> Result<Self, PoolSyncError> {
        let endpoint = std::env::var("ARCHIVE").map_err(|_| PoolSyncError::EndpointNotSet)?;
        let provider = ProviderBuilder::default().connect_http(
            endpoint
                .parse()
                .map_err(|_| PoolSyncError::ParseEndpointError)?,
        );
        Ok(Self::new(Arc::new(provider)))
    }

    /// Pin every read to `block` so a whole batch observes one state
    pub fn at_block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }

    fn block_id(&self) -> BlockId {
        self.block.map(BlockId::number).unwrap_or_else(BlockId::latest)
    }
}

#[async_trait]
impl StateReader for RpcReader {
    async fn has_code(&self, target: Address) -> Result<bool, BatchError> {
        let code = self
            .provider
            .get_code_at(target)
            .block_id(self.block_id())
            .await
            .map_err(|e| BatchError::Transport(e.to_string()))?;
        Ok(!code.is_empty())
    }

    async fn invoke(
        &self,
        target: Address,
        calldata: Bytes,
        gas_cap: Option<u64>,
    ) -> Result<CallOutcome, BatchError> {
        let mut tx = TransactionRequest::default().to(target);
        if let Some(cap) = gas_cap {
            // the cap applies to the call frame, the node also charges the transaction overhead
            let overhead = INTRINSIC_GAS + calldata.len() as u64 * CALLDATA_GAS_PER_BYTE;
            tx = tx.gas_limit(overhead + cap);
        }
        let tx = tx.input(TransactionInput::new(calldata));

        match self.provider.call(tx).block(self.block_id()).await {
            Ok(data) => Ok(CallOutcome::Success(data)),
            Err(err) => classify_call_error(target, err),
        }
    }
}

// Only reverts and out of gas are answers about the call. Rate limits, pruned state and other
// node side errors are transport failures and fail the batch
fn classify_call_error(target: Address, err: TransportError) -> Result<CallOutcome, BatchError> {
    let Some(payload) = err.as_error_resp() else {
        return Err(BatchError::Transport(err.to_string()));
    };

    trace!(%target, code = payload.code, message = %payload.message, "call failed");
    classify_error_response(payload.code, &payload.message, payload.as_revert_data())
        .ok_or_else(|| BatchError::Transport(err.to_string()))
}

// Geth style nodes answer a revert with code 3, others only say so in the message
const REVERT_CODE: i64 = 3;

fn classify_error_response(
    code: i64,
    message: &str,
    revert_data: Option<Bytes>,
) -> Option<CallOutcome> {
    let message = message.to_lowercase();
    if message.contains("out of gas") || message.contains("gas required exceeds") {
        Some(CallOutcome::OutOfGas)
    } else if code == REVERT_CODE || message.contains("revert") || revert_data.is_some() {
        Some(CallOutcome::Reverted(revert_data.unwrap_or_default()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::bytes;

    #[test]
    fn reverts_are_call_outcomes() {
        assert_eq!(
            classify_error_response(3, "execution reverted", Some(bytes!("08c379a0"))),
            Some(CallOutcome::Reverted(bytes!("08c379a0")))
        );
        assert_eq!(
            classify_error_response(-32000, "execution reverted", None),
            Some(CallOutcome::Reverted(Bytes::new()))
        );
        assert_eq!(
            classify_error_response(-32015, "VM execution error: Reverted", None),
            Some(CallOutcome::Reverted(Bytes::new()))
        );
    }

    #[test]
    fn out_of_gas_is_a_call_outcome() {
        assert_eq!(
            classify_error_response(-32000, "out of gas", None),
            Some(CallOutcome::OutOfGas)
        );
        assert_eq!(
            classify_error_response(-32000, "gas required exceeds allowance (41000)", None),
            Some(CallOutcome::OutOfGas)
        );
    }

    #[test]
    fn node_failures_are_not_call_outcomes() {
        for (code, message) in [
            (-32000, "header not found"),
            (-32000, "missing trie node 1f2e... (path ) state is not available"),
            (
                429,
                "Your app has exceeded its compute units per second capacity",
            ),
            (-32005, "limit exceeded"),
            (-32603, "internal error"),
        ] {
            assert_eq!(classify_error_response(code, message, None), None, "{message}");
        }
    }
}
