use crate::types::{FeeData, GasEstimate, UserOperation, UserOperationReceipt};
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by an [`AccountConnection`]
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Endpoint unreachable, malformed response, or any non-chain failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Bundler refused the user operation during validation
    #[error("rejected ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// `eth_call` reached the contract and it reverted
    #[error("execution reverted: {message}")]
    Reverted { message: String, data: Bytes },
}

/// The chain and bundler request/response contract the SDK consumes.
/// Implemented over JSON-RPC by [`crate::core::http::JsonRpcConnection`] and
/// by in-memory chains in tests.
#[async_trait]
pub trait AccountConnection: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError>;

    async fn get_balance(&self, address: Address) -> Result<U256, RpcError>;

    /// Read-only contract call at the latest block
    async fn call(&self, from: Option<Address>, to: Address, data: Bytes)
        -> Result<Bytes, RpcError>;

    async fn fee_data(&self) -> Result<FeeData, RpcError>;

    async fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> Result<GasEstimate, RpcError>;

    /// Hand a signed operation to the bundler, returning its hash
    async fn send_user_operation(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> Result<B256, RpcError>;

    /// `None` while the operation has not been included
    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>, RpcError>;
}
