pub mod advanced;
pub mod basic;
pub mod config;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;

pub use crate::basic::account::AccountSessionManager;
pub use crate::basic::client::{PrimaryClient, ReadClient, SessionClient};
pub use crate::basic::permissions::{
    AccessPolicy, EncodedPermissions, PermissionDescriptor, PermissionsBuilder,
};
pub use crate::basic::reader::{CounterContract, StateReader};
pub use crate::basic::session::{ExistingCapabilityPolicy, SessionKeyController, SessionState};
pub use crate::basic::submitter::OperationSubmitter;
pub use crate::config::{Network, SessionKitConfig};
pub use crate::core::connection::{AccountConnection, RpcError};
pub use crate::core::http::JsonRpcConnection;
pub use crate::core::signer::{
    AccountSigner, BrowserWalletSigner, LocalSigner, PrimaryIdentity, SessionKey, WalletProvider,
};
pub use crate::error::{Result, SessionKitError};
pub use crate::types::{
    Call, CapabilityStatus, DeploymentStatus, OperationStatus, PendingOperation, SmartAccount,
    SubmittedOperation, UserOperation, UserOperationReceipt,
};
