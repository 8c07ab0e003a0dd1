use crate::basic::account::AccountSessionManager;
use crate::basic::client::{PrimaryClient, ReadClient, SessionClient};
use crate::basic::permissions::{EncodedPermissions, PermissionsBuilder};
use crate::core::signer::{PrimaryIdentity, SessionKey};
use crate::error::{Result, SessionKitError};
use crate::types::{CapabilityStatus, SmartAccount, UserOperationReceipt};
use alloy_primitives::{keccak256, Address, B256};

/// What to do when the session key plugin is already installed on the account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExistingCapabilityPolicy {
    /// Keep the key's current permissions. A key that is not yet registered is added.
    #[default]
    KeepExisting,

    /// Overwrite the key's permissions with a freshly built descriptor
    UpdatePermissions,

    /// Remove every other registered key, then add or update this one
    ReplaceKey,
}

/// Progress of a [`SessionKeyController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoAccount,
    AccountReady,
    CapabilityChecked {
        installed: bool,
        key_registered: bool,
    },
    CapabilityProvisioned,
    SessionClientReady,
}

/// Drives a primary identity from "no account" to a ready [`SessionClient`]:
/// attach the account, check for the session key plugin, provision the key,
/// then hand out the session client.
///
/// Every step is awaitable on its own and fails with `InvalidState` when called
/// out of order. A failed step leaves the state where it was; nothing is retried.
pub struct SessionKeyController {
    manager: AccountSessionManager,
    identity: PrimaryIdentity,
    session_key: SessionKey,
    permissions: PermissionsBuilder,
    tag: B256,
    policy: ExistingCapabilityPolicy,
    state: SessionState,
    primary: Option<PrimaryClient>,
    session: Option<SessionClient>,
}

impl std::fmt::Debug for SessionKeyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyController")
            .field("owner", &self.identity.address())
            .field("session_key", &self.session_key.address())
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionKeyController {
    pub fn new(
        manager: AccountSessionManager,
        identity: PrimaryIdentity,
        session_key: SessionKey,
        permissions: PermissionsBuilder,
    ) -> Self {
        Self {
            manager,
            identity,
            session_key,
            permissions,
            tag: B256::ZERO,
            policy: ExistingCapabilityPolicy::default(),
            state: SessionState::NoAccount,
            primary: None,
            session: None,
        }
    }

    pub fn with_policy(mut self, policy: ExistingCapabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Label the key is registered under; hashed into the plugin's `bytes32` tag
    pub fn with_label(mut self, label: &str) -> Self {
        self.tag = keccak256(label.as_bytes());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_key_address(&self) -> Address {
        self.session_key.address()
    }

    /// Client with the owner's authority, available once the account is attached
    pub fn primary_client(&self) -> Option<&PrimaryClient> {
        self.primary.as_ref()
    }

    /// Forget all progress and start over from `NoAccount`
    pub fn reset(&mut self) {
        self.primary = None;
        self.session = None;
        self.transition(SessionState::NoAccount);
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session controller transition");
        self.state = next;
    }

    fn out_of_order(&self, step: &str) -> SessionKitError {
        SessionKitError::InvalidState(format!("{} called in state {:?}", step, self.state))
    }

    fn attached(&self) -> Result<&PrimaryClient> {
        self.primary
            .as_ref()
            .ok_or_else(|| SessionKitError::InvalidState("no account attached".into()))
    }

    /// `NoAccount -> AccountReady`
    pub async fn attach(&mut self) -> Result<&SmartAccount> {
        if self.state != SessionState::NoAccount {
            return Err(self.out_of_order("attach"));
        }

        let primary = self.manager.primary_client(&self.identity).await?;
        self.transition(SessionState::AccountReady);
        Ok(self.primary.insert(primary).account())
    }

    /// `AccountReady -> CapabilityChecked`
    pub async fn check_capability(&mut self) -> Result<CapabilityStatus> {
        if self.state != SessionState::AccountReady {
            return Err(self.out_of_order("check_capability"));
        }

        let status = self
            .attached()?
            .capability_status(self.session_key.address())
            .await?;
        tracing::info!(
            plugin_installed = status.plugin_installed,
            key_registered = status.key_registered,
            "session key capability checked"
        );
        self.transition(SessionState::CapabilityChecked {
            installed: status.plugin_installed,
            key_registered: status.key_registered,
        });
        Ok(status)
    }

    /// `CapabilityChecked -> CapabilityProvisioned`.
    ///
    /// Returns the receipt of the last owner operation sent, or `None` when the
    /// existing capability was kept as is.
    pub async fn provision(&mut self) -> Result<Option<UserOperationReceipt>> {
        let (installed, key_registered) = match self.state {
            SessionState::CapabilityChecked {
                installed,
                key_registered,
            } => (installed, key_registered),
            _ => return Err(self.out_of_order("provision")),
        };

        let primary = self.attached()?.clone();
        let key = self.session_key.address();
        let permissions = self.permissions.clone().build()?.encode();

        let receipt = if !installed {
            Some(
                primary
                    .install_session_key_plugin(&[(key, self.tag, permissions)])
                    .await?,
            )
        } else {
            match self.policy {
                ExistingCapabilityPolicy::KeepExisting if key_registered => None,
                ExistingCapabilityPolicy::KeepExisting => Some(
                    primary
                        .add_session_key(key, self.tag, &permissions)
                        .await?,
                ),
                ExistingCapabilityPolicy::UpdatePermissions => {
                    Some(self.add_or_update(&primary, key_registered, &permissions).await?)
                },
                ExistingCapabilityPolicy::ReplaceKey => {
                    // Re-read so a retry after a partial failure sees what is left
                    let registered = primary.session_keys().await?;
                    for other in registered.iter().filter(|k| **k != key) {
                        primary.remove_session_key(*other).await?;
                    }
                    let still_registered = registered.contains(&key);
                    Some(self.add_or_update(&primary, still_registered, &permissions).await?)
                },
            }
        };

        self.transition(SessionState::CapabilityProvisioned);
        Ok(receipt)
    }

    async fn add_or_update(
        &self,
        primary: &PrimaryClient,
        registered: bool,
        permissions: &EncodedPermissions,
    ) -> Result<UserOperationReceipt> {
        let key = self.session_key.address();
        if registered {
            primary.update_key_permissions(key, permissions).await
        } else {
            primary.add_session_key(key, self.tag, permissions).await
        }
    }

    /// `CapabilityProvisioned -> SessionClientReady`. The client is bound to the
    /// attached account's address, never to one derived from the session key.
    pub async fn session_client(&mut self) -> Result<SessionClient> {
        if self.state != SessionState::CapabilityProvisioned {
            return Err(self.out_of_order("session_client"));
        }

        let account = self.attached()?.account().address;
        let client = self
            .manager
            .session_client(account, self.session_key.clone())
            .await?;
        self.transition(SessionState::SessionClientReady);
        self.session = Some(client.clone());
        Ok(client)
    }

    /// Run every remaining step and return the ready session client
    #[tracing::instrument(skip(self), fields(owner = %self.identity.address(), session_key = %self.session_key.address()))]
    pub async fn run(&mut self) -> Result<SessionClient> {
        loop {
            match self.state {
                SessionState::NoAccount => {
                    self.attach().await?;
                },
                SessionState::AccountReady => {
                    self.check_capability().await?;
                },
                SessionState::CapabilityChecked { .. } => {
                    self.provision().await?;
                },
                SessionState::CapabilityProvisioned => {
                    let client = self.session_client().await?;
                    tracing::info!(account = %client.account_address(), "session client ready");
                    return Ok(client);
                },
                SessionState::SessionClientReady => {
                    return self.session.clone().ok_or_else(|| {
                        SessionKitError::InvalidState("session client missing".into())
                    });
                },
            }
        }
    }
}
