use crate::advanced::builders::OperationError;
use crate::basic::client::{ReadClient, SessionClient};
use crate::error::{Result, SessionKitError};
use crate::types::{Call, OperationStatus, PendingOperation, SubmittedOperation};
use alloy_primitives::B256;
use std::sync::{Arc, Mutex};

/// Submits session key operations and keeps an append-only log of them.
///
/// Each submission holds its account's lock from nonce read through
/// confirmation, so overlapping calls against one account run one after the
/// other and log entries appear in the order the operations were included.
#[derive(Debug, Clone, Default)]
pub struct OperationSubmitter {
    log: Arc<Mutex<Vec<PendingOperation>>>,
}

impl OperationSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `calls` as one account operation signed by `client`'s session key
    /// and wait until it is included.
    ///
    /// Included operations are logged whether they succeeded or reverted; an
    /// operation that timed out is logged as pending since it may still land.
    #[tracing::instrument(skip_all, fields(account = %client.account_address(), calls = calls.len()))]
    pub async fn submit(&self, client: &SessionClient, calls: Vec<Call>) -> Result<SubmittedOperation> {
        if calls.is_empty() {
            return Err(SessionKitError::InvalidState("no calls to submit".into()));
        }

        let ctx = client.context();
        let _guard = ctx.locks.acquire(client.account_address()).await;
        let session_key = client.session_key_address();

        match client.execute_locked(&calls).await {
            Ok(receipt) => {
                self.append(PendingOperation {
                    calls,
                    session_key,
                    user_op_hash: receipt.user_op_hash,
                    transaction_hash: Some(receipt.transaction_hash),
                    status: OperationStatus::Confirmed,
                });
                Ok(SubmittedOperation {
                    user_op_hash: receipt.user_op_hash,
                    transaction_hash: receipt.transaction_hash,
                })
            },
            Err(OperationError::Reverted {
                user_op_hash,
                reason,
            }) => {
                self.append(PendingOperation {
                    calls,
                    session_key,
                    user_op_hash,
                    transaction_hash: None,
                    status: OperationStatus::Failed {
                        reason: reason.clone(),
                    },
                });
                Err(SessionKitError::ExecutionReverted {
                    user_op_hash: Some(user_op_hash),
                    reason,
                })
            },
            Err(OperationError::TimedOut(user_op_hash)) => {
                tracing::warn!(%user_op_hash, "gave up waiting for confirmation");
                self.append(PendingOperation {
                    calls,
                    session_key,
                    user_op_hash,
                    transaction_hash: None,
                    status: OperationStatus::Pending,
                });
                Err(SessionKitError::TimedOutWaitingForConfirmation(user_op_hash))
            },
            Err(OperationError::Rejected(reason)) => {
                tracing::warn!(%reason, "operation rejected by bundler");
                Err(SessionKitError::ExecutionReverted {
                    user_op_hash: None,
                    reason,
                })
            },
            Err(OperationError::Transport(msg)) => Err(SessionKitError::SubmissionFailed(msg)),
            Err(OperationError::Signing(msg)) => Err(SessionKitError::AuthorizationFailed(msg)),
        }
    }

    fn append(&self, op: PendingOperation) {
        let mut log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log.push(op);
    }

    /// Snapshot of the log, in submission order
    pub fn operations(&self) -> Vec<PendingOperation> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Hashes of confirmed operations, in submission order
    pub fn confirmed_hashes(&self) -> Vec<B256> {
        self.operations()
            .into_iter()
            .filter(PendingOperation::is_confirmed)
            .map(|op| op.user_op_hash)
            .collect()
    }
}
