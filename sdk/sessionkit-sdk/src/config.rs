//! Explicit configuration for SessionKit clients.
//!
//! Credentials and endpoints are never read ad hoc from process state: a
//! [`SessionKitConfig`] is built once (from a TOML file and/or `SESSIONKIT_`
//! prefixed environment variables, or directly in code) and handed to the
//! [`crate::basic::account::AccountSessionManager`].

use crate::core::constants;
use crate::error::{Result, SessionKitError};
use alloy_primitives::Address;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Chains with a known bundler endpoint template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Mainnet,
    #[default]
    Sepolia,
    BaseSepolia,
    ArbitrumSepolia,
    PolygonAmoy,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
            Network::BaseSepolia => 84_532,
            Network::ArbitrumSepolia => 421_614,
            Network::PolygonAmoy => 80_002,
        }
    }

    fn endpoint_base(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://eth-mainnet.g.alchemy.com/v2/",
            Network::Sepolia => "https://eth-sepolia.g.alchemy.com/v2/",
            Network::BaseSepolia => "https://base-sepolia.g.alchemy.com/v2/",
            Network::ArbitrumSepolia => "https://arb-sepolia.g.alchemy.com/v2/",
            Network::PolygonAmoy => "https://polygon-amoy.g.alchemy.com/v2/",
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct SessionKitConfig {
    #[serde(default)]
    pub network: Network,

    /// API credential appended to the network's endpoint
    #[serde(default)]
    pub api_key: String,

    /// Explicit endpoint; overrides `network` + `api_key`
    #[serde(default)]
    pub rpc_url: Option<Url>,

    /// Owner private key for key-based primary identities
    #[serde(default)]
    pub private_key: Option<String>,

    #[serde(default = "default_entry_point")]
    pub entry_point: Address,

    #[serde(default = "default_account_factory")]
    pub account_factory: Address,

    #[serde(default = "default_owner_plugin")]
    pub owner_plugin: Address,

    #[serde(default = "default_session_key_plugin")]
    pub session_key_plugin: Address,

    /// Factory salt; together with the owner it fixes the account address
    #[serde(default)]
    pub account_salt: u64,

    /// Delay between receipt polls while awaiting confirmation
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// How long to await confirmation before giving up
    #[serde(default = "default_confirmation_timeout", with = "humantime_serde")]
    pub confirmation_timeout: Duration,
}

fn default_entry_point() -> Address {
    constants::ENTRY_POINT_V06
}

fn default_account_factory() -> Address {
    constants::MULTI_OWNER_ACCOUNT_FACTORY
}

fn default_owner_plugin() -> Address {
    constants::MULTI_OWNER_PLUGIN
}

fn default_session_key_plugin() -> Address {
    constants::SESSION_KEY_PLUGIN
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_confirmation_timeout() -> Duration {
    Duration::from_secs(120)
}

impl SessionKitConfig {
    /// Defaults for `network`, authenticated with `api_key`
    pub fn new(network: Network, api_key: impl Into<String>) -> Self {
        Self {
            network,
            api_key: api_key.into(),
            rpc_url: None,
            private_key: None,
            entry_point: default_entry_point(),
            account_factory: default_account_factory(),
            owner_plugin: default_owner_plugin(),
            session_key_plugin: default_session_key_plugin(),
            account_salt: 0,
            poll_interval: default_poll_interval(),
            confirmation_timeout: default_confirmation_timeout(),
        }
    }

    /// Load from an optional TOML file, overridden by `SESSIONKIT_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed("SESSIONKIT_")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks applied to every configuration a manager is built from
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(SessionKitError::InvalidConfig(
                "poll_interval must be greater than zero".into(),
            ));
        }
        if self.confirmation_timeout.is_zero() {
            return Err(SessionKitError::InvalidConfig(
                "confirmation_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id()
    }

    /// JSON-RPC endpoint serving both chain reads and bundler methods
    pub fn endpoint(&self) -> Result<Url> {
        if let Some(url) = &self.rpc_url {
            return Ok(url.clone());
        }
        if self.api_key.is_empty() {
            return Err(SessionKitError::InvalidConfig(
                "either rpc_url or api_key must be configured".into(),
            ));
        }
        let raw = format!("{}{}", self.network.endpoint_base(), self.api_key);
        Url::parse(&raw).map_err(|e| SessionKitError::InvalidConfig(e.to_string()))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_account_salt(mut self, salt: u64) -> Self {
        self.account_salt = salt;
        self
    }
}

impl fmt::Debug for SessionKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKitConfig")
            .field("network", &self.network)
            .field("api_key", &"<redacted>")
            .field("rpc_url", &self.rpc_url.as_ref().map(|u| u.host_str().unwrap_or("")))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("entry_point", &self.entry_point)
            .field("account_factory", &self.account_factory)
            .field("session_key_plugin", &self.session_key_plugin)
            .field("account_salt", &self.account_salt)
            .field("poll_interval", &self.poll_interval)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish()
    }
}
