use crate::advanced::builders::{self, Deployment, OperationContext, OperationError};
use crate::advanced::calls::{self, IModularAccount, ISessionKeyPlugin};
use crate::basic::permissions::EncodedPermissions;
use crate::core::connection::RpcError;
use crate::core::constants::{OWNER_RUNTIME_VALIDATION_ID, OWNER_USER_OP_VALIDATION_ID};
use crate::core::signer::{PrimaryIdentity, SessionKey};
use crate::error::{Result, SessionKitError};
use crate::types::{CapabilityStatus, Call, SmartAccount, UserOperationReceipt};
use crate::utils;
use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::SolCall;

/// Anything that can issue read-only queries on behalf of an account
pub trait ReadClient {
    fn context(&self) -> &OperationContext;

    /// Account address used as the `from` of read calls
    fn account_address(&self) -> Address;
}

/// Maps a failed owner operation onto the provisioning error class
fn install_error(e: OperationError) -> SessionKitError {
    match e {
        OperationError::Signing(msg) => SessionKitError::AuthorizationFailed(msg),
        OperationError::Transport(msg) => SessionKitError::TransportFailed(msg),
        OperationError::Rejected(msg) => SessionKitError::InstallFailed(msg),
        OperationError::Reverted {
            user_op_hash,
            reason,
        } => SessionKitError::InstallFailed(format!("{} ({})", reason, user_op_hash)),
        OperationError::TimedOut(hash) => {
            SessionKitError::InstallFailed(format!("no confirmation for {}", hash))
        },
    }
}

/// Maps a failed capability read
fn capability_read_error(e: RpcError) -> SessionKitError {
    match e {
        RpcError::Reverted { message, .. } => SessionKitError::ContractReverted(message),
        other => SessionKitError::TransportFailed(other.to_string()),
    }
}

/// Client acting with the primary identity's full authority. The only client
/// able to install or reconfigure the session key capability.
#[derive(Clone)]
pub struct PrimaryClient {
    ctx: OperationContext,
    account: SmartAccount,
    identity: PrimaryIdentity,
}

impl std::fmt::Debug for PrimaryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryClient")
            .field("account", &self.account)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl ReadClient for PrimaryClient {
    fn context(&self) -> &OperationContext {
        &self.ctx
    }

    fn account_address(&self) -> Address {
        self.account.address
    }
}

impl PrimaryClient {
    pub(crate) fn new(ctx: OperationContext, account: SmartAccount, identity: PrimaryIdentity) -> Self {
        Self {
            ctx,
            account,
            identity,
        }
    }

    pub fn account(&self) -> &SmartAccount {
        &self.account
    }

    pub fn identity(&self) -> &PrimaryIdentity {
        &self.identity
    }

    fn deployment(&self) -> Deployment {
        Deployment {
            factory: self.ctx.config.account_factory,
            salt: self.account.salt,
            owners: vec![self.account.owner],
        }
    }

    /// Plugins installed on the account; empty while it is undeployed
    pub async fn installed_plugins(&self) -> Result<Vec<Address>> {
        let deployed = utils::has_code(self.ctx.connection.as_ref(), self.account.address)
            .await
            .map_err(capability_read_error)?;
        if !deployed {
            return Ok(Vec::new());
        }

        let raw = self
            .ctx
            .connection
            .call(None, self.account.address, calls::get_installed_plugins())
            .await
            .map_err(capability_read_error)?;
        let decoded = IModularAccount::getInstalledPluginsCall::abi_decode_returns(&raw, true)
            .map_err(|e| SessionKitError::InvalidEncoding(e.to_string()))?;
        Ok(decoded._0)
    }

    /// Session keys registered with the plugin, in list order
    pub async fn session_keys(&self) -> Result<Vec<Address>> {
        let raw = self
            .ctx
            .connection
            .call(
                None,
                self.ctx.config.session_key_plugin,
                calls::session_keys_of(self.account.address),
            )
            .await
            .map_err(capability_read_error)?;
        let decoded = ISessionKeyPlugin::sessionKeysOfCall::abi_decode_returns(&raw, true)
            .map_err(|e| SessionKitError::InvalidEncoding(e.to_string()))?;
        Ok(decoded._0)
    }

    /// Whether `key` is installed for the account and registered with the plugin
    pub async fn capability_status(&self, key: Address) -> Result<CapabilityStatus> {
        let plugins = self.installed_plugins().await?;
        let plugin_installed = plugins.contains(&self.ctx.config.session_key_plugin);
        if !plugin_installed {
            return Ok(CapabilityStatus::default());
        }

        let registered_keys = self.session_keys().await?;
        Ok(CapabilityStatus {
            plugin_installed,
            key_registered: registered_keys.contains(&key),
            registered_keys,
        })
    }

    /// Install the session key plugin with an initial set of keys. Deploys the
    /// account first if needed, in the same operation.
    pub async fn install_session_key_plugin(
        &self,
        keys: &[(Address, B256, EncodedPermissions)],
    ) -> Result<UserOperationReceipt> {
        let plugin = self.ctx.config.session_key_plugin;
        let manifest_hash = utils::fetch_manifest_hash(self.ctx.connection.as_ref(), plugin)
            .await
            .map_err(capability_read_error)?;

        let install_data = calls::session_key_install_data(
            keys.iter().map(|(key, _, _)| *key).collect(),
            keys.iter().map(|(_, tag, _)| *tag).collect(),
            keys.iter()
                .map(|(_, _, permissions)| permissions.updates().to_vec())
                .collect(),
        );
        let owner_plugin = self.ctx.config.owner_plugin;
        let dependencies = vec![
            utils::function_reference(owner_plugin, OWNER_USER_OP_VALIDATION_ID),
            utils::function_reference(owner_plugin, OWNER_RUNTIME_VALIDATION_ID),
        ];

        tracing::info!(account = %self.account.address, %plugin, keys = keys.len(), "installing session key plugin");
        let call_data = calls::install_plugin(plugin, manifest_hash, install_data, dependencies);
        self.send_owner_operation(call_data).await
    }

    /// Register one more key with an already installed plugin
    pub async fn add_session_key(
        &self,
        key: Address,
        tag: B256,
        permissions: &EncodedPermissions,
    ) -> Result<UserOperationReceipt> {
        tracing::info!(account = %self.account.address, session_key = %key, "adding session key");
        let inner = calls::add_session_key(key, tag, permissions.updates().to_vec());
        self.send_owner_operation(inner).await
    }

    /// Replace the permissions of a registered key
    pub async fn update_key_permissions(
        &self,
        key: Address,
        permissions: &EncodedPermissions,
    ) -> Result<UserOperationReceipt> {
        tracing::info!(account = %self.account.address, session_key = %key, "updating session key permissions");
        let inner = calls::update_key_permissions(key, permissions.updates().to_vec());
        self.send_owner_operation(inner).await
    }

    /// Revoke a registered key
    pub async fn remove_session_key(&self, key: Address) -> Result<UserOperationReceipt> {
        if !self.session_keys().await?.contains(&key) {
            return Err(SessionKitError::InvalidState(format!(
                "{} is not a registered session key",
                key
            )));
        }

        let raw = self
            .ctx
            .connection
            .call(
                None,
                self.ctx.config.session_key_plugin,
                calls::find_predecessor(self.account.address, key),
            )
            .await
            .map_err(capability_read_error)?;
        let predecessor = ISessionKeyPlugin::findPredecessorCall::abi_decode_returns(&raw, true)
            .map_err(|e| SessionKitError::InvalidEncoding(e.to_string()))?
            ._0;

        tracing::info!(account = %self.account.address, session_key = %key, "removing session key");
        let inner = calls::remove_session_key(key, predecessor);
        self.send_owner_operation(inner).await
    }

    /// Alias of [`PrimaryClient::remove_session_key`]
    pub async fn revoke(&self, key: Address) -> Result<UserOperationReceipt> {
        self.remove_session_key(key).await
    }

    /// Plugin execution functions are reached through the account's fallback,
    /// so plugin calls are sent as the operation call data directly
    async fn send_owner_operation(&self, call_data: Bytes) -> Result<UserOperationReceipt> {
        let deployment = self.deployment();
        builders::execute_operation(
            &self.ctx,
            self.account.address,
            call_data,
            Some(&deployment),
            self.identity.signer(),
        )
        .await
        .map_err(install_error)
    }
}

/// Client acting with a session key's bounded authority. It can only execute
/// calls through the session key plugin.
#[derive(Clone)]
pub struct SessionClient {
    ctx: OperationContext,
    account: Address,
    session_key: SessionKey,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("account", &self.account)
            .field("session_key", &self.session_key.address())
            .finish_non_exhaustive()
    }
}

impl ReadClient for SessionClient {
    fn context(&self) -> &OperationContext {
        &self.ctx
    }

    fn account_address(&self) -> Address {
        self.account
    }
}

impl SessionClient {
    pub(crate) fn new(ctx: OperationContext, account: Address, session_key: SessionKey) -> Self {
        Self {
            ctx,
            account,
            session_key,
        }
    }

    pub fn session_key_address(&self) -> Address {
        self.session_key.address()
    }

    pub(crate) fn call_data(&self, calls: &[Call]) -> Bytes {
        calls::execute_with_session_key(calls, self.session_key.address())
    }

    /// Run `calls` through `executeWithSessionKey`. The caller must hold the account lock.
    pub(crate) async fn execute_locked(
        &self,
        calls: &[Call],
    ) -> std::result::Result<UserOperationReceipt, OperationError> {
        builders::execute_operation_locked(
            &self.ctx,
            self.account,
            self.call_data(calls),
            None,
            self.session_key.signer(),
        )
        .await
    }
}
