use crate::advanced::calls::ISessionKeyPermissionsUpdates::{
    self, ISessionKeyPermissionsUpdatesCalls,
};
use crate::error::{Result, SessionKitError};
use alloy_primitives::aliases::U48;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolInterface};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest timestamp representable by the plugin's `uint48` time range
pub const MAX_TIMESTAMP: u64 = (1 << 48) - 1;

/// Access control type byte understood by the session key plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum AccessListType {
    AllowList = 0,
    DenyList = 1,
    AllowAll = 2,
}

/// Which targets a session key may call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessPolicy {
    AllowAll,
    /// Only these targets; sorted and de-duplicated
    AllowList(BTreeSet<Address>),
}

impl AccessPolicy {
    pub fn allow_list(targets: impl IntoIterator<Item = Address>) -> Self {
        AccessPolicy::AllowList(targets.into_iter().collect())
    }

    pub fn permits(&self, target: &Address) -> bool {
        match self {
            AccessPolicy::AllowAll => true,
            AccessPolicy::AllowList(list) => list.contains(target),
        }
    }
}

/// Immutable permission set for a session key. Build a new one to change any field.
///
/// Every descriptor passes [`PermissionsBuilder::build`], deserialized ones included,
/// so the window is non-empty and all bounds fit the plugin's `uint48` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedPermissions")]
pub struct PermissionDescriptor {
    spend_limit: U256,
    refresh_interval: u64,
    access: AccessPolicy,
    valid_from: u64,
    valid_until: u64,
}

/// Serialized form of a descriptor before its bounds are checked
#[derive(Deserialize)]
struct UncheckedPermissions {
    spend_limit: U256,
    refresh_interval: u64,
    access: AccessPolicy,
    valid_from: u64,
    valid_until: u64,
}

impl TryFrom<UncheckedPermissions> for PermissionDescriptor {
    type Error = SessionKitError;

    fn try_from(raw: UncheckedPermissions) -> Result<Self> {
        PermissionsBuilder::new()
            .spend_limit(raw.spend_limit)
            .refresh_interval(raw.refresh_interval)
            .access(raw.access)
            .time_range(raw.valid_from, raw.valid_until)
            .build()
    }
}

impl PermissionDescriptor {
    /// Native token spend limit, in wei
    pub fn spend_limit(&self) -> U256 {
        self.spend_limit
    }

    /// Seconds after which the spend limit resets; 0 means it never resets
    pub fn refresh_interval(&self) -> u64 {
        self.refresh_interval
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }

    pub fn valid_from(&self) -> u64 {
        self.valid_from
    }

    pub fn valid_until(&self) -> u64 {
        self.valid_until
    }

    pub fn is_active_at(&self, timestamp: u64) -> bool {
        self.valid_from <= timestamp && timestamp <= self.valid_until
    }

    /// Encode as the ordered list of permission update calls the plugin consumes
    pub fn encode(&self) -> EncodedPermissions {
        let mut updates: Vec<Bytes> = Vec::new();

        match &self.access {
            AccessPolicy::AllowAll => {
                updates.push(
                    ISessionKeyPermissionsUpdates::setAccessListTypeCall {
                        contractAccessControlType: AccessListType::AllowAll as u8,
                    }
                    .abi_encode()
                    .into(),
                );
            },
            AccessPolicy::AllowList(targets) => {
                updates.push(
                    ISessionKeyPermissionsUpdates::setAccessListTypeCall {
                        contractAccessControlType: AccessListType::AllowList as u8,
                    }
                    .abi_encode()
                    .into(),
                );
                for target in targets {
                    updates.push(
                        ISessionKeyPermissionsUpdates::updateAccessListAddressEntryCall {
                            contractAddress: *target,
                            isOnList: true,
                            checkSelectors: false,
                        }
                        .abi_encode()
                        .into(),
                    );
                }
            },
        }

        updates.push(
            ISessionKeyPermissionsUpdates::setNativeTokenSpendLimitCall {
                spendLimit: self.spend_limit,
                refreshInterval: U48::from(self.refresh_interval),
            }
            .abi_encode()
            .into(),
        );

        updates.push(
            ISessionKeyPermissionsUpdates::updateTimeRangeCall {
                validAfter: U48::from(self.valid_from),
                validUntil: U48::from(self.valid_until),
            }
            .abi_encode()
            .into(),
        );

        EncodedPermissions(updates)
    }
}

/// Encoded permission updates, ready to be passed to `installPlugin`, `addSessionKey`
/// or `updateKeyPermissions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPermissions(Vec<Bytes>);

impl EncodedPermissions {
    pub fn from_updates(updates: Vec<Bytes>) -> Self {
        Self(updates)
    }

    pub fn updates(&self) -> &[Bytes] {
        &self.0
    }

    pub fn into_updates(self) -> Vec<Bytes> {
        self.0
    }

    /// Rebuild the descriptor these updates describe
    pub fn decode(&self) -> Result<PermissionDescriptor> {
        let mut builder = PermissionsBuilder::new();
        let mut access_type: Option<u8> = None;
        let mut targets = BTreeSet::new();
        let mut window: Option<(u64, u64)> = None;

        for update in &self.0 {
            let call = ISessionKeyPermissionsUpdatesCalls::abi_decode(update, true)
                .map_err(|e| SessionKitError::InvalidEncoding(e.to_string()))?;
            match call {
                ISessionKeyPermissionsUpdatesCalls::setAccessListType(c) => {
                    access_type = Some(c.contractAccessControlType);
                },
                ISessionKeyPermissionsUpdatesCalls::updateAccessListAddressEntry(c) => {
                    if c.isOnList {
                        targets.insert(c.contractAddress);
                    } else {
                        targets.remove(&c.contractAddress);
                    }
                },
                ISessionKeyPermissionsUpdatesCalls::setNativeTokenSpendLimit(c) => {
                    let refresh = u64::try_from(c.refreshInterval).map_err(|_| {
                        SessionKitError::InvalidEncoding("refresh interval out of range".into())
                    })?;
                    builder = builder.spend_limit(c.spendLimit).refresh_interval(refresh);
                },
                ISessionKeyPermissionsUpdatesCalls::updateTimeRange(c) => {
                    let from = u64::try_from(c.validAfter).map_err(|_| {
                        SessionKitError::InvalidEncoding("validAfter out of range".into())
                    })?;
                    let until = u64::try_from(c.validUntil).map_err(|_| {
                        SessionKitError::InvalidEncoding("validUntil out of range".into())
                    })?;
                    window = Some((from, until));
                },
            }
        }

        builder = match access_type {
            Some(t) if t == AccessListType::AllowAll as u8 => builder.access(AccessPolicy::AllowAll),
            Some(t) if t == AccessListType::AllowList as u8 => {
                builder.access(AccessPolicy::AllowList(targets))
            },
            Some(other) => {
                return Err(SessionKitError::InvalidEncoding(format!(
                    "unsupported access list type {}",
                    other
                )))
            },
            None => {
                return Err(SessionKitError::InvalidEncoding(
                    "missing access list type".into(),
                ))
            },
        };

        let (from, until) = window
            .ok_or_else(|| SessionKitError::InvalidEncoding("missing time range".into()))?;
        builder.time_range(from, until).build()
    }
}

/// Fluent builder for [`PermissionDescriptor`]
#[derive(Debug, Clone)]
pub struct PermissionsBuilder {
    spend_limit: U256,
    refresh_interval: u64,
    access: AccessPolicy,
    window: Option<(u64, u64)>,
}

impl Default for PermissionsBuilder {
    fn default() -> Self {
        Self {
            spend_limit: U256::ZERO,
            refresh_interval: 0,
            access: AccessPolicy::AllowAll,
            window: None,
        }
    }
}

impl PermissionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Native token the key may spend, in wei
    pub fn spend_limit(mut self, wei: U256) -> Self {
        self.spend_limit = wei;
        self
    }

    pub fn refresh_interval(mut self, seconds: u64) -> Self {
        self.refresh_interval = seconds;
        self
    }

    pub fn access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn time_range(mut self, valid_from: u64, valid_until: u64) -> Self {
        self.window = Some((valid_from, valid_until));
        self
    }

    /// Window starting at `now` and lasting `seconds`
    pub fn valid_for(self, now: u64, seconds: u64) -> Self {
        self.time_range(now, now.saturating_add(seconds))
    }

    pub fn build(self) -> Result<PermissionDescriptor> {
        let (valid_from, valid_until) = self.window.unwrap_or((0, 0));
        if valid_from >= valid_until || valid_until > MAX_TIMESTAMP {
            return Err(SessionKitError::InvalidWindow {
                valid_from,
                valid_until,
            });
        }
        if self.refresh_interval > MAX_TIMESTAMP {
            return Err(SessionKitError::InvalidEncoding(
                "refresh interval exceeds 48 bits".into(),
            ));
        }

        Ok(PermissionDescriptor {
            spend_limit: self.spend_limit,
            refresh_interval: self.refresh_interval,
            access: self.access,
            valid_from,
            valid_until,
        })
    }
}
