use crate::error::{Result, SessionKitError};
use crate::utils;
use alloy_primitives::{eip191_hash_message, Address, Bytes};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Abstraction for an entity that can sign on behalf of an account owner.
/// This allows the SDK to work with:
/// 1. Local private keys (Backend/CLI)
/// 2. Browser-injected wallets (Frontend, via an EIP-1193 provider)
#[async_trait]
pub trait AccountSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign `message` as an EIP-191 personal message.
    /// Returns the 65-byte `r || s || v` signature, or Err if the signer refused or failed.
    async fn sign_message(&self, message: &[u8]) -> std::result::Result<Bytes, String>;
}

/// secp256k1 key held in process memory
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Parse a 32-byte key given as 64 hex characters, with or without `0x`
    pub fn from_private_key(private_key: &str) -> std::result::Result<Self, String> {
        let raw = private_key.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        if raw.len() != 64 {
            return Err(format!(
                "private key must be 64 hex characters, got {}",
                raw.len()
            ));
        }
        let bytes = hex::decode(raw).map_err(|e| format!("invalid private key hex: {}", e))?;
        let key = SigningKey::from_slice(&bytes).map_err(|e| e.to_string())?;
        Ok(Self::from_signing_key(key))
    }

    /// Fresh random key
    pub fn random() -> Self {
        loop {
            let bytes: [u8; 32] = rand::random();
            // Fails only for zero or values above the curve order
            if let Ok(key) = SigningKey::from_slice(&bytes) {
                return Self::from_signing_key(key);
            }
        }
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let address = utils::address_from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    /// Sign an EIP-191 personal message synchronously
    pub fn sign_message_sync(&self, message: &[u8]) -> std::result::Result<Bytes, String> {
        let digest = eip191_hash_message(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| e.to_string())?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&signature.to_bytes());
        out.push(27 + recovery_id.to_byte());
        Ok(Bytes::from(out))
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AccountSigner for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: &[u8]) -> std::result::Result<Bytes, String> {
        self.sign_message_sync(message)
    }
}

/// EIP-1193 style request interface of a browser-injected wallet
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, String>;
}

/// Signer backed by a connected browser wallet. Every signature goes through the
/// wallet's `personal_sign`, so the user may be prompted.
pub struct BrowserWalletSigner {
    provider: Arc<dyn WalletProvider>,
    address: Address,
}

impl BrowserWalletSigner {
    /// Ask the wallet for account access (`eth_requestAccounts`) and bind to the first account
    pub async fn connect(provider: Arc<dyn WalletProvider>) -> std::result::Result<Self, String> {
        let accounts = provider.request("eth_requestAccounts", json!([])).await?;
        let address = first_account(&accounts)?;
        tracing::debug!(%address, "browser wallet connected");
        Ok(Self { provider, address })
    }

    /// Bind to an account the wallet already exposes (`eth_accounts`) without
    /// prompting. `None` when the user has not granted access yet.
    pub async fn reconnect(
        provider: Arc<dyn WalletProvider>,
    ) -> std::result::Result<Option<Self>, String> {
        let accounts = provider.request("eth_accounts", json!([])).await?;
        let Some(address) = parse_accounts(&accounts)?.into_iter().next() else {
            return Ok(None);
        };
        tracing::debug!(%address, "browser wallet reconnected");
        Ok(Some(Self { provider, address }))
    }
}

impl fmt::Debug for BrowserWalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserWalletSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AccountSigner for BrowserWalletSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: &[u8]) -> std::result::Result<Bytes, String> {
        let params = json!([format!("0x{}", hex::encode(message)), self.address]);
        let result = self.provider.request("personal_sign", params).await?;
        let signature = result
            .as_str()
            .ok_or_else(|| "personal_sign returned a non-string result".to_string())?;
        let raw = signature.strip_prefix("0x").unwrap_or(signature);
        let bytes = hex::decode(raw).map_err(|e| format!("invalid signature hex: {}", e))?;
        if bytes.len() != 65 {
            return Err(format!("expected 65-byte signature, got {}", bytes.len()));
        }
        Ok(Bytes::from(bytes))
    }
}

fn parse_accounts(value: &Value) -> std::result::Result<Vec<Address>, String> {
    let list = value
        .as_array()
        .ok_or_else(|| "wallet returned a non-array account list".to_string())?;
    list.iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| "account entry is not a string".to_string())?
                .parse::<Address>()
                .map_err(|e| e.to_string())
        })
        .collect()
}

fn first_account(value: &Value) -> std::result::Result<Address, String> {
    parse_accounts(value)?
        .into_iter()
        .next()
        .ok_or_else(|| "wallet exposed no accounts".to_string())
}

/// The account owner's signing capability. Lives for the process, never persisted.
#[derive(Clone)]
pub struct PrimaryIdentity {
    signer: Arc<dyn AccountSigner>,
}

impl PrimaryIdentity {
    /// Owner backed by a raw private key (e.g. supplied through configuration)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer = LocalSigner::from_private_key(private_key)
            .map_err(SessionKitError::AuthorizationFailed)?;
        Ok(Self::from_signer(Arc::new(signer)))
    }

    /// Owner backed by a browser wallet; prompts the user for account access
    pub async fn from_wallet(provider: Arc<dyn WalletProvider>) -> Result<Self> {
        let signer = BrowserWalletSigner::connect(provider)
            .await
            .map_err(SessionKitError::AuthorizationFailed)?;
        Ok(Self::from_signer(Arc::new(signer)))
    }

    /// Owner backed by a browser wallet that was authorized earlier; never prompts.
    /// `None` when the wallet exposes no account, in which case
    /// [`PrimaryIdentity::from_wallet`] has to ask for access.
    pub async fn reconnect_wallet(provider: Arc<dyn WalletProvider>) -> Result<Option<Self>> {
        let signer = BrowserWalletSigner::reconnect(provider)
            .await
            .map_err(SessionKitError::AuthorizationFailed)?;
        Ok(signer.map(|signer| Self::from_signer(Arc::new(signer))))
    }

    pub fn from_signer(signer: Arc<dyn AccountSigner>) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &dyn AccountSigner {
        self.signer.as_ref()
    }
}

impl fmt::Debug for PrimaryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryIdentity")
            .field("address", &self.address())
            .finish()
    }
}

/// Secondary, lower-privilege key acting through the session key plugin.
/// Held in memory only; regenerate per session unless the caller persists it.
#[derive(Clone, Debug)]
pub struct SessionKey {
    signer: LocalSigner,
}

impl SessionKey {
    pub fn generate() -> Self {
        Self {
            signer: LocalSigner::random(),
        }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer = LocalSigner::from_private_key(private_key)
            .map_err(SessionKitError::AuthorizationFailed)?;
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub(crate) fn signer(&self) -> &LocalSigner {
        &self.signer
    }
}
