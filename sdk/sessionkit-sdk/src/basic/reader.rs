use crate::advanced::calls::ICounter;
use crate::basic::client::ReadClient;
use crate::core::connection::RpcError;
use crate::error::{Result, SessionKitError};
use crate::types::Call;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

/// Read-only contract queries through a client's connection. Never consumes a nonce.
pub struct StateReader<'a, C: ReadClient> {
    client: &'a C,
}

impl<'a, C: ReadClient> StateReader<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Call `query` on `target` and decode its return values.
    ///
    /// A revert surfaces as [`SessionKitError::ContractReverted`]; an unreachable
    /// network as [`SessionKitError::QueryFailed`].
    pub async fn read<Q: SolCall>(&self, target: Address, query: &Q) -> Result<Q::Return> {
        let ctx = self.client.context();
        let raw = ctx
            .connection
            .call(
                Some(self.client.account_address()),
                target,
                query.abi_encode().into(),
            )
            .await
            .map_err(|e| match e {
                RpcError::Reverted { message, .. } => SessionKitError::ContractReverted(message),
                other => SessionKitError::QueryFailed(other.to_string()),
            })?;

        Q::abi_decode_returns(&raw, true)
            .map_err(|e| SessionKitError::InvalidEncoding(e.to_string()))
    }
}

/// The demo counter contract exercised by session keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterContract {
    pub address: Address,
}

impl CounterContract {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Counter value stored for `account`
    pub async fn count_of<C: ReadClient>(
        &self,
        reader: &StateReader<'_, C>,
        account: Address,
    ) -> Result<U256> {
        let result = reader
            .read(self.address, &ICounter::countCall { _0: account })
            .await?;
        Ok(result._0)
    }

    /// Call adding 1 to the caller's counter
    pub fn increment_one(&self) -> Call {
        Call::new(self.address, ICounter::increament1Call {}.abi_encode())
    }

    /// Call adding 2 to the caller's counter
    pub fn increment_two(&self) -> Call {
        Call::new(self.address, ICounter::increament2Call {}.abi_encode())
    }
}
