//! Account operation assembly: nonce, gas, signature, submission and confirmation.

use crate::advanced::calls::{self, IEntryPoint};
use crate::config::SessionKitConfig;
use crate::core::connection::{AccountConnection, RpcError};
use crate::core::constants::{DEFAULT_NONCE_KEY, DUMMY_SIGNATURE};
use crate::core::locks::AccountLocks;
use crate::core::signer::AccountSigner;
use crate::types::{UserOperation, UserOperationReceipt};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use std::sync::Arc;
use thiserror::Error;

/// Low-level failure of an account operation; callers map it onto their own error class
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    #[error("signing failed: {0}")]
    Signing(String),

    /// Bundler refused the operation before inclusion (validation, nonce, time range)
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("transport: {0}")]
    Transport(String),

    /// Included on chain, but execution reverted
    #[error("operation {user_op_hash} reverted: {reason}")]
    Reverted { user_op_hash: B256, reason: String },

    #[error("no receipt for {0} before timeout")]
    TimedOut(B256),
}

impl From<RpcError> for OperationError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Transport(msg) => OperationError::Transport(msg),
            RpcError::Rejected { code, message } => {
                OperationError::Rejected(format!("{} ({})", message, code))
            },
            RpcError::Reverted { message, .. } => OperationError::Rejected(message),
        }
    }
}

/// Shared plumbing every client uses to reach the network
#[derive(Clone)]
pub struct OperationContext {
    pub connection: Arc<dyn AccountConnection>,
    pub config: Arc<SessionKitConfig>,
    pub locks: AccountLocks,
    pub chain_id: u64,
}

/// Counterfactual deployment parameters of an account
#[derive(Debug, Clone)]
pub struct Deployment {
    pub factory: Address,
    pub salt: U256,
    pub owners: Vec<Address>,
}

impl Deployment {
    pub fn init_code(&self) -> Bytes {
        calls::init_code(self.factory, self.salt, self.owners.clone())
    }
}

/// Fluent builder for an unsigned [`UserOperation`]
pub struct UserOperationBuilder {
    sender: Address,
    call_data: Bytes,
    init_code: Bytes,
    nonce: Option<U256>,
}

impl UserOperationBuilder {
    pub fn new(sender: Address, call_data: Bytes) -> Self {
        Self {
            sender,
            call_data,
            init_code: Bytes::new(),
            nonce: None,
        }
    }

    pub fn with_init_code(mut self, init_code: Bytes) -> Self {
        self.init_code = init_code;
        self
    }

    /// Use a fixed nonce instead of reading it from the entry point
    pub fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Fill nonce, fees and gas limits. The result carries a placeholder signature.
    pub async fn build(self, ctx: &OperationContext) -> Result<UserOperation, OperationError> {
        let nonce = match self.nonce {
            Some(nonce) => nonce,
            None => fetch_nonce(ctx, self.sender).await?,
        };
        let fees = ctx.connection.fee_data().await?;

        let mut op = UserOperation {
            sender: self.sender,
            nonce,
            init_code: self.init_code,
            call_data: self.call_data,
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            paymaster_and_data: Bytes::new(),
            signature: Bytes::from(DUMMY_SIGNATURE.to_vec()),
        };

        let gas = ctx
            .connection
            .estimate_user_operation_gas(&op, ctx.config.entry_point)
            .await?;
        op.call_gas_limit = gas.call_gas_limit;
        op.verification_gas_limit = gas.verification_gas_limit;
        op.pre_verification_gas = gas.pre_verification_gas;

        Ok(op)
    }
}

/// Current entry point nonce of `sender` in the default key space
pub async fn fetch_nonce(ctx: &OperationContext, sender: Address) -> Result<U256, OperationError> {
    let data = calls::get_nonce(sender, DEFAULT_NONCE_KEY);
    let raw = ctx
        .connection
        .call(None, ctx.config.entry_point, data)
        .await?;
    let decoded = IEntryPoint::getNonceCall::abi_decode_returns(&raw, true)
        .map_err(|e| OperationError::Transport(format!("malformed getNonce result: {}", e)))?;
    Ok(decoded.nonce)
}

/// Replace the placeholder signature with `signer`'s signature over the operation hash
pub async fn sign_user_operation(
    ctx: &OperationContext,
    op: &mut UserOperation,
    signer: &dyn AccountSigner,
) -> Result<B256, OperationError> {
    let hash = op.hash(ctx.config.entry_point, ctx.chain_id);
    op.signature = signer
        .sign_message(hash.as_slice())
        .await
        .map_err(OperationError::Signing)?;
    Ok(hash)
}

/// Poll the bundler until the operation is included or the configured timeout elapses.
///
/// The operation is already with the bundler, so a failed poll is retried
/// rather than reported; an operation that never confirms ends as
/// [`OperationError::TimedOut`] carrying its hash.
pub async fn wait_for_receipt(
    ctx: &OperationContext,
    user_op_hash: B256,
) -> Result<UserOperationReceipt, OperationError> {
    let poll = async {
        loop {
            match ctx
                .connection
                .get_user_operation_receipt(user_op_hash)
                .await
            {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {},
                Err(e) => {
                    tracing::warn!(%user_op_hash, error = %e, "receipt poll failed, retrying");
                },
            }
            tokio::time::sleep(ctx.config.poll_interval).await;
        }
    };

    tokio::time::timeout(ctx.config.confirmation_timeout, poll)
        .await
        .map_err(|_| OperationError::TimedOut(user_op_hash))
}

/// Build, sign, send and confirm one operation for `sender`, holding the account's
/// lock for the whole sequence. `deployment` is consulted only while the account
/// has no code, so the init code is attached to at most one included operation.
pub async fn execute_operation(
    ctx: &OperationContext,
    sender: Address,
    call_data: Bytes,
    deployment: Option<&Deployment>,
    signer: &dyn AccountSigner,
) -> Result<UserOperationReceipt, OperationError> {
    let _guard = ctx.locks.acquire(sender).await;
    execute_operation_locked(ctx, sender, call_data, deployment, signer).await
}

/// Same as [`execute_operation`] for callers already holding `sender`'s lock
pub async fn execute_operation_locked(
    ctx: &OperationContext,
    sender: Address,
    call_data: Bytes,
    deployment: Option<&Deployment>,
    signer: &dyn AccountSigner,
) -> Result<UserOperationReceipt, OperationError> {
    let mut builder = UserOperationBuilder::new(sender, call_data);
    if let Some(deployment) = deployment {
        if ctx.connection.get_code(sender).await?.is_empty() {
            tracing::info!(account = %sender, "account not deployed, attaching init code");
            builder = builder.with_init_code(deployment.init_code());
        }
    }

    let mut op = builder.build(ctx).await?;
    let hash = sign_user_operation(ctx, &mut op, signer).await?;

    let sent = ctx
        .connection
        .send_user_operation(&op, ctx.config.entry_point)
        .await?;
    if sent != hash {
        tracing::warn!(expected = %hash, returned = %sent, "bundler returned a different operation hash");
    }
    tracing::debug!(account = %sender, user_op_hash = %sent, nonce = %op.nonce, "operation sent");

    let receipt = wait_for_receipt(ctx, sent).await?;
    if !receipt.success {
        let reason = receipt
            .reason
            .clone()
            .unwrap_or_else(|| "execution reverted".to_string());
        tracing::warn!(user_op_hash = %sent, %reason, "operation reverted");
        return Err(OperationError::Reverted {
            user_op_hash: sent,
            reason,
        });
    }

    tracing::info!(
        user_op_hash = %sent,
        transaction_hash = %receipt.transaction_hash,
        "operation confirmed"
    );
    Ok(receipt)
}
