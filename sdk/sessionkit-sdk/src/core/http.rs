use crate::core::connection::{AccountConnection, RpcError};
use crate::types::{FeeData, GasEstimate, UserOperation, UserOperationReceipt};
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// JSON-RPC error code used by nodes for reverted `eth_call`s
const EXECUTION_REVERTED_CODE: i64 = 3;

/// ERC-4337 bundler validation error codes
const BUNDLER_REJECTION_CODES: std::ops::RangeInclusive<i64> = -32599..=-32500;

/// [`AccountConnection`] over an HTTP JSON-RPC endpoint that serves both the
/// standard `eth_*` methods and the ERC-4337 bundler methods.
#[derive(Debug)]
pub struct JsonRpcConnection {
    client: reqwest::Client,
    endpoint: Url,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    user_op_hash: B256,
    success: bool,
    #[serde(default)]
    reason: Option<String>,
    receipt: RawTransactionReceipt,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransactionReceipt {
    transaction_hash: B256,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    base_fee_per_gas: Option<U256>,
}

impl JsonRpcConnection {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::trace!(method, id, "json-rpc request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{}: {}", method, e)))?
            .error_for_status()
            .map_err(|e| RpcError::Transport(format!("{}: {}", method, e)))?
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| RpcError::Transport(format!("{}: invalid response: {}", method, e)))?;

        if let Some(error) = response.error {
            return Err(classify_error(error));
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| RpcError::Transport(format!("{}: unexpected result: {}", method, e)))
    }
}

fn classify_error(error: JsonRpcError) -> RpcError {
    if BUNDLER_REJECTION_CODES.contains(&error.code) {
        return RpcError::Rejected {
            code: error.code,
            message: error.message,
        };
    }

    let is_revert =
        error.code == EXECUTION_REVERTED_CODE || error.message.contains("execution reverted");
    if is_revert {
        let data = error
            .data
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Bytes>().ok())
            .unwrap_or_default();
        return RpcError::Reverted {
            message: error.message,
            data,
        };
    }

    RpcError::Transport(format!("rpc error {}: {}", error.code, error.message))
}

fn quantity_to_u64(raw: &str) -> Result<u64, RpcError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Transport(format!("invalid quantity {}: {}", raw, e)))
}

#[async_trait]
impl AccountConnection for JsonRpcConnection {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let raw: String = self.request("eth_chainId", json!([])).await?;
        quantity_to_u64(&raw)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        self.request("eth_getCode", json!([address, "latest"])).await
    }

    async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        self.request("eth_getBalance", json!([address, "latest"])).await
    }

    async fn call(
        &self,
        from: Option<Address>,
        to: Address,
        data: Bytes,
    ) -> Result<Bytes, RpcError> {
        let mut tx = json!({ "to": to, "data": data });
        if let Some(from) = from {
            tx["from"] = json!(from);
        }
        self.request("eth_call", json!([tx, "latest"])).await
    }

    async fn fee_data(&self) -> Result<FeeData, RpcError> {
        let block: RawBlock = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let priority: U256 = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        let base_fee = block.base_fee_per_gas.unwrap_or_default();

        Ok(FeeData {
            // Headroom for two full base fee increases
            max_fee_per_gas: base_fee * U256::from(2u64) + priority,
            max_priority_fee_per_gas: priority,
        })
    }

    async fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> Result<GasEstimate, RpcError> {
        self.request("eth_estimateUserOperationGas", json!([op, entry_point]))
            .await
    }

    async fn send_user_operation(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> Result<B256, RpcError> {
        self.request("eth_sendUserOperation", json!([op, entry_point]))
            .await
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>, RpcError> {
        let raw: Option<RawReceipt> = self
            .request("eth_getUserOperationReceipt", json!([user_op_hash]))
            .await?;
        Ok(raw.map(|r| UserOperationReceipt {
            user_op_hash: r.user_op_hash,
            transaction_hash: r.receipt.transaction_hash,
            success: r.success,
            reason: r.reason.filter(|s| !s.is_empty()),
        }))
    }
}
