use alloy_primitives::B256;
use thiserror::Error;

/// SDK-specific error types for SessionKit operations
#[derive(Debug, Error)]
pub enum SessionKitError {
    /// The smart account could not be resolved (transport unreachable)
    #[error("Attachment failed: {0}")]
    AttachmentFailed(String),

    /// Read-only query failed at the transport level
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Read-only query reached the contract, which reverted
    #[error("Contract reverted: {0}")]
    ContractReverted(String),

    /// Permission validity window is empty or out of range
    #[error("Invalid validity window: valid_from={valid_from}, valid_until={valid_until}")]
    InvalidWindow { valid_from: u64, valid_until: u64 },

    /// Signer refused or failed to produce a signature
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Capability install/update was rejected, reverted, or never confirmed
    #[error("Install failed: {0}")]
    InstallFailed(String),

    /// Network error while provisioning the session key
    #[error("Transport failed: {0}")]
    TransportFailed(String),

    /// The chain rejected or reverted the account operation
    #[error("Execution reverted: {reason}")]
    ExecutionReverted {
        user_op_hash: Option<B256>,
        reason: String,
    },

    /// Network error while submitting an account operation
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// The operation was submitted but no receipt arrived in time.
    /// It may still be included later.
    #[error("Timed out waiting for confirmation of {0}")]
    TimedOutWaitingForConfirmation(B256),

    /// A controller step was invoked out of order
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Encoded data could not be decoded
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but holds unusable values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SessionKitError {
    /// True for failures the chain itself produced, as opposed to transport or local errors.
    pub fn is_chain_rejection(&self) -> bool {
        matches!(
            self,
            SessionKitError::ExecutionReverted { .. } | SessionKitError::ContractReverted(_)
        )
    }
}

impl From<figment::Error> for SessionKitError {
    fn from(e: figment::Error) -> Self {
        SessionKitError::Config(Box::new(e))
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SessionKitError>;
