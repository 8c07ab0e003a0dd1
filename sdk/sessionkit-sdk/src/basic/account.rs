use crate::advanced::builders::OperationContext;
use crate::advanced::calls::{self, IMultiOwnerAccountFactory};
use crate::basic::client::{PrimaryClient, SessionClient};
use crate::config::SessionKitConfig;
use crate::core::connection::AccountConnection;
use crate::core::http::JsonRpcConnection;
use crate::core::locks::AccountLocks;
use crate::core::signer::{PrimaryIdentity, SessionKey};
use crate::error::{Result, SessionKitError};
use crate::types::{DeploymentStatus, SmartAccount};
use crate::utils;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Entry point of the SDK: resolves smart accounts for primary identities and
/// hands out clients sharing one connection and one set of account locks.
#[derive(Clone)]
pub struct AccountSessionManager {
    config: Arc<SessionKitConfig>,
    connection: Arc<dyn AccountConnection>,
    locks: AccountLocks,
    chain_id: Arc<OnceCell<u64>>,
}

impl std::fmt::Debug for AccountSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSessionManager")
            .field("config", &self.config)
            .field("chain_id", &self.chain_id.get())
            .finish_non_exhaustive()
    }
}

impl AccountSessionManager {
    /// Fails with [`SessionKitError::InvalidConfig`] when `config` does not validate
    pub fn new(config: SessionKitConfig, connection: Arc<dyn AccountConnection>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            connection,
            locks: AccountLocks::new(),
            chain_id: Arc::new(OnceCell::new()),
        })
    }

    /// Manager talking JSON-RPC to the endpoint `config` resolves to
    pub fn connect(config: SessionKitConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        tracing::debug!(host = endpoint.host_str().unwrap_or_default(), "using json-rpc endpoint");
        Self::new(config, Arc::new(JsonRpcConnection::new(endpoint)))
    }

    pub fn config(&self) -> &SessionKitConfig {
        &self.config
    }

    pub fn connection(&self) -> Arc<dyn AccountConnection> {
        self.connection.clone()
    }

    async fn chain_id(&self) -> Result<u64> {
        let id = self
            .chain_id
            .get_or_try_init(|| async {
                self.connection
                    .chain_id()
                    .await
                    .map_err(|e| SessionKitError::AttachmentFailed(e.to_string()))
            })
            .await?;
        Ok(*id)
    }

    pub(crate) async fn context(&self) -> Result<OperationContext> {
        Ok(OperationContext {
            connection: self.connection.clone(),
            config: self.config.clone(),
            locks: self.locks.clone(),
            chain_id: self.chain_id().await?,
        })
    }

    /// Resolve the smart account owned by `owner`.
    ///
    /// The address is derived by the factory from the owner and the configured
    /// salt, so repeated calls return the same account. Nothing is deployed
    /// here: an undeployed account is reported as counterfactual and gets
    /// deployed by its first owner operation.
    pub async fn attach(&self, owner: &PrimaryIdentity) -> Result<SmartAccount> {
        self.chain_id().await?;

        let salt = U256::from(self.config.account_salt);
        let owners = vec![owner.address()];
        let raw = self
            .connection
            .call(
                None,
                self.config.account_factory,
                calls::factory_get_address(salt, owners),
            )
            .await
            .map_err(|e| SessionKitError::AttachmentFailed(e.to_string()))?;
        let address = IMultiOwnerAccountFactory::getAddressCall::abi_decode_returns(&raw, true)
            .map_err(|e| SessionKitError::AttachmentFailed(format!("malformed getAddress result: {}", e)))?
            ._0;

        let deployed = utils::has_code(self.connection.as_ref(), address)
            .await
            .map_err(|e| SessionKitError::AttachmentFailed(e.to_string()))?;
        let deployment = if deployed {
            DeploymentStatus::Deployed
        } else {
            DeploymentStatus::Counterfactual
        };

        tracing::info!(owner = %owner.address(), account = %address, ?deployment, "attached smart account");
        Ok(SmartAccount {
            address,
            owner: owner.address(),
            salt,
            deployment,
        })
    }

    /// Native token balance of `account`, in wei. Zero for undeployed accounts.
    pub async fn balance_of(&self, account: &SmartAccount) -> Result<U256> {
        self.connection
            .get_balance(account.address)
            .await
            .map_err(|e| SessionKitError::QueryFailed(e.to_string()))
    }

    /// Attach and return a client acting with `owner`'s authority
    pub async fn primary_client(&self, owner: &PrimaryIdentity) -> Result<PrimaryClient> {
        let account = self.attach(owner).await?;
        let ctx = self.context().await?;
        Ok(PrimaryClient::new(ctx, account, owner.clone()))
    }

    /// Client for a key already registered on `account`, e.g. one restored
    /// from the caller's own storage. Registration is not checked here.
    pub async fn session_client(&self, account: Address, key: SessionKey) -> Result<SessionClient> {
        let ctx = self.context().await?;
        Ok(SessionClient::new(ctx, account, key))
    }
}
