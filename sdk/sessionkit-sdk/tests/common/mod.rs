#![allow(dead_code)]

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolInterface, SolValue};
use async_trait::async_trait;
use serde_json::{json, Value};
use sessionkit_sdk::advanced::calls::{
    ICounter::ICounterCalls, IEntryPoint::IEntryPointCalls, IModularAccount::IModularAccountCalls,
    IMultiOwnerAccountFactory::IMultiOwnerAccountFactoryCalls,
    ISessionKeyPlugin::ISessionKeyPluginCalls,
};
use sessionkit_sdk::core::constants::{
    ENTRY_POINT_V06, MULTI_OWNER_ACCOUNT_FACTORY, MULTI_OWNER_PLUGIN, SESSION_KEY_PLUGIN,
};
use sessionkit_sdk::types::{FeeData, GasEstimate};
use sessionkit_sdk::utils::recover_message_signer;
use sessionkit_sdk::{
    AccessPolicy, AccountConnection, AccountSessionManager, Call, EncodedPermissions,
    LocalSigner, Network, PermissionDescriptor, PermissionsBuilder, PrimaryIdentity, ReadClient,
    RpcError, SessionClient, SessionKey, SessionKeyController, SessionKitConfig, UserOperation,
    UserOperationReceipt, WalletProvider,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const CHAIN_ID: u64 = 11_155_111;

/// Block timestamp the chain starts at
pub const START_TIME: u64 = 1_700_000_000;

pub const COUNTER: Address = address!("c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0");

/// Contract whose every function reverts
pub const REVERTER: Address = address!("dededededededededededededededededededede");

// Well-known development keys (anvil accounts #0, #1, #2)
pub const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OTHER_OWNER_KEY: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const SESSION_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

const MANIFEST: &[u8] = b"session key plugin manifest";

pub fn test_config() -> SessionKitConfig {
    SessionKitConfig::new(Network::Sepolia, "test-key")
        .with_poll_interval(Duration::from_millis(5))
        .with_confirmation_timeout(Duration::from_secs(5))
}

pub fn owner() -> PrimaryIdentity {
    PrimaryIdentity::from_private_key(OWNER_KEY).unwrap()
}

pub fn session_key() -> SessionKey {
    SessionKey::from_private_key(SESSION_KEY).unwrap()
}

/// Counter-only access for an hour starting now
pub fn counter_permissions(chain: &TestChain) -> PermissionsBuilder {
    PermissionsBuilder::new()
        .access(AccessPolicy::allow_list([COUNTER]))
        .valid_for(chain.now(), 3600)
}

/// Run the controller for the default owner and session key; returns the
/// session client and the account address
pub async fn provisioned(
    chain: &Arc<TestChain>,
    permissions: PermissionsBuilder,
) -> anyhow::Result<(SessionClient, Address)> {
    let mut controller =
        SessionKeyController::new(chain.manager(), owner(), session_key(), permissions)
            .with_label("test session");
    let client = controller.run().await?;
    let account = client.account_address();
    Ok((client, account))
}

fn revert(reason: &str) -> RpcError {
    RpcError::Reverted {
        message: format!("execution reverted: {}", reason),
        data: Bytes::new(),
    }
}

fn counterfactual_address(salt: U256, owners: &[Address]) -> Address {
    let hash = keccak256((salt, owners.to_vec()).abi_encode_params());
    Address::from_slice(&hash[12..])
}

fn decode_init_code(init_code: &[u8]) -> Result<(U256, Vec<Address>), String> {
    if init_code.len() < 20 || Address::from_slice(&init_code[..20]) != MULTI_OWNER_ACCOUNT_FACTORY
    {
        return Err("AA13 initCode failed".into());
    }
    match IMultiOwnerAccountFactoryCalls::abi_decode(&init_code[20..], true) {
        Ok(IMultiOwnerAccountFactoryCalls::createAccount(c)) if !c.owners.is_empty() => {
            Ok((c.salt, c.owners))
        },
        _ => Err("AA13 initCode failed".into()),
    }
}

fn manifest_return() -> Bytes {
    (Bytes::from_static(MANIFEST),).abi_encode_params().into()
}

#[derive(Debug, Clone)]
struct SessionKeyEntry {
    key: Address,
    permissions: PermissionDescriptor,
    spent: U256,
}

#[derive(Debug, Clone)]
struct AccountState {
    owner: Address,
    plugins: Vec<Address>,
    /// Head of the plugin's linked list first
    session_keys: Vec<SessionKeyEntry>,
}

/// Contract state; cloned before each execution so a revert leaves it untouched
#[derive(Debug, Clone, Default)]
struct World {
    accounts: HashMap<Address, AccountState>,
    balances: HashMap<Address, U256>,
    counters: HashMap<Address, U256>,
}

impl World {
    fn account_mut(&mut self, account: Address) -> Result<&mut AccountState, String> {
        self.accounts
            .get_mut(&account)
            .ok_or_else(|| "account not deployed".to_string())
    }

    fn plugin_keys_mut(&mut self, account: Address) -> Result<&mut Vec<SessionKeyEntry>, String> {
        let state = self.account_mut(account)?;
        if !state.plugins.contains(&SESSION_KEY_PLUGIN) {
            return Err("session key plugin not installed".into());
        }
        Ok(&mut state.session_keys)
    }

    fn add_session_key(
        &mut self,
        account: Address,
        key: Address,
        updates: Vec<Bytes>,
    ) -> Result<(), String> {
        let permissions = EncodedPermissions::from_updates(updates)
            .decode()
            .map_err(|e| e.to_string())?;
        let keys = self.plugin_keys_mut(account)?;
        if key == Address::ZERO || keys.iter().any(|e| e.key == key) {
            return Err(format!("InvalidSessionKey({})", key));
        }
        keys.insert(
            0,
            SessionKeyEntry {
                key,
                permissions,
                spent: U256::ZERO,
            },
        );
        Ok(())
    }

    fn remove_session_key(
        &mut self,
        account: Address,
        key: Address,
        predecessor: B256,
    ) -> Result<(), String> {
        let keys = self.plugin_keys_mut(account)?;
        let index = keys
            .iter()
            .position(|e| e.key == key)
            .ok_or_else(|| format!("InvalidSessionKey({})", key))?;
        if predecessor_word(keys, index) != predecessor {
            return Err(format!("InvalidSessionKey({})", key));
        }
        keys.remove(index);
        Ok(())
    }

    fn update_permissions(
        &mut self,
        account: Address,
        key: Address,
        updates: Vec<Bytes>,
    ) -> Result<(), String> {
        let permissions = EncodedPermissions::from_updates(updates)
            .decode()
            .map_err(|e| e.to_string())?;
        let keys = self.plugin_keys_mut(account)?;
        let entry = keys
            .iter_mut()
            .find(|e| e.key == key)
            .ok_or_else(|| format!("InvalidSessionKey({})", key))?;
        entry.permissions = permissions;
        entry.spent = U256::ZERO;
        Ok(())
    }

    fn install_plugin(
        &mut self,
        account: Address,
        plugin: Address,
        manifest_hash: B256,
        install_data: &[u8],
    ) -> Result<(), String> {
        if plugin != SESSION_KEY_PLUGIN {
            return Err(format!("unknown plugin {}", plugin));
        }
        if manifest_hash != keccak256(manifest_return()) {
            return Err("InvalidPluginManifest".into());
        }
        let state = self.account_mut(account)?;
        if state.plugins.contains(&plugin) {
            return Err("PluginAlreadyInstalled".into());
        }
        state.plugins.push(plugin);

        let (keys, tags, permissions) =
            <(Vec<Address>, Vec<B256>, Vec<Vec<Bytes>>)>::abi_decode_params(install_data, true)
                .map_err(|e| e.to_string())?;
        if keys.len() != tags.len() || keys.len() != permissions.len() {
            return Err("LengthMismatch".into());
        }
        for (key, updates) in keys.into_iter().zip(permissions) {
            self.add_session_key(account, key, updates)?;
        }
        Ok(())
    }

    fn run_call(&mut self, from: Address, call: Call) -> Result<(), String> {
        if call.value > U256::ZERO {
            let balance = self.balances.entry(from).or_default();
            if *balance < call.value {
                return Err("insufficient balance".into());
            }
            *balance -= call.value;
            *self.balances.entry(call.target).or_default() += call.value;
        }

        if call.target == COUNTER {
            let step = match ICounterCalls::abi_decode(&call.data, true) {
                Ok(ICounterCalls::increament1(_)) => 1u64,
                Ok(ICounterCalls::increament2(_)) => 2u64,
                _ => return Err("counter: unsupported call".into()),
            };
            *self.counters.entry(from).or_default() += U256::from(step);
        } else if call.target == REVERTER {
            return Err("nope".into());
        }
        Ok(())
    }

    fn execute(&mut self, account: Address, call_data: &[u8]) -> Result<(), String> {
        if let Ok(call) = ISessionKeyPluginCalls::abi_decode(call_data, true) {
            return match call {
                ISessionKeyPluginCalls::executeWithSessionKey(c) => {
                    let total = c
                        .calls
                        .iter()
                        .fold(U256::ZERO, |acc, call| acc + call.value);
                    let keys = self.plugin_keys_mut(account)?;
                    let entry = keys
                        .iter_mut()
                        .find(|e| e.key == c.sessionKey)
                        .ok_or_else(|| "unknown session key".to_string())?;
                    entry.spent += total;
                    for call in c.calls {
                        self.run_call(account, call.into())?;
                    }
                    Ok(())
                },
                ISessionKeyPluginCalls::addSessionKey(c) => {
                    self.add_session_key(account, c.sessionKey, c.permissionUpdates)
                },
                ISessionKeyPluginCalls::removeSessionKey(c) => {
                    self.remove_session_key(account, c.sessionKey, c.predecessor)
                },
                ISessionKeyPluginCalls::updateKeyPermissions(c) => {
                    self.update_permissions(account, c.sessionKey, c.updates)
                },
                _ => Err("not an execution function".into()),
            };
        }

        match IModularAccountCalls::abi_decode(call_data, true) {
            Ok(IModularAccountCalls::execute(c)) => self.run_call(
                account,
                Call {
                    target: c.target,
                    value: c.value,
                    data: c.data,
                },
            ),
            Ok(IModularAccountCalls::executeBatch(c)) => {
                for call in c.calls {
                    self.run_call(account, call.into())?;
                }
                Ok(())
            },
            Ok(IModularAccountCalls::installPlugin(c)) => {
                self.install_plugin(account, c.plugin, c.manifestHash, &c.pluginInstallData)
            },
            _ => Err("unknown selector".into()),
        }
    }
}

/// Plugin linked-list predecessor: the sentinel `bytes32(uint256(1))` for the
/// head, otherwise the previous key left-aligned
fn predecessor_word(keys: &[SessionKeyEntry], index: usize) -> B256 {
    if index == 0 {
        B256::with_last_byte(1)
    } else {
        B256::right_padding_from(keys[index - 1].key.as_slice())
    }
}

struct Pending {
    hash: B256,
    op: UserOperation,
    polls: u32,
}

struct ChainState {
    now: u64,
    block: u64,
    world: World,
    nonces: HashMap<Address, U256>,
    pending: Vec<Pending>,
    receipts: HashMap<B256, UserOperationReceipt>,
    included: Vec<B256>,
    rejections: Vec<String>,
    deployments: usize,
    transport_down: bool,
    stalled: bool,
    /// Receipt polls an operation needs before it is included
    inclusion_polls: u32,
    /// Receipt polls still to fail with a transport error
    failing_receipt_polls: u32,
}

impl ChainState {
    fn nonce_of(&self, sender: Address) -> U256 {
        self.nonces.get(&sender).copied().unwrap_or_default()
    }

    fn has_code(&self, address: Address) -> bool {
        [
            ENTRY_POINT_V06,
            MULTI_OWNER_ACCOUNT_FACTORY,
            MULTI_OWNER_PLUGIN,
            SESSION_KEY_PLUGIN,
            COUNTER,
            REVERTER,
        ]
        .contains(&address)
            || self.world.accounts.contains_key(&address)
    }

    fn read(&self, to: Address, data: &[u8]) -> Result<Bytes, RpcError> {
        let encoded: Vec<u8> = if to == ENTRY_POINT_V06 {
            match IEntryPointCalls::abi_decode(data, true) {
                Ok(IEntryPointCalls::getNonce(c)) => (self.nonce_of(c.sender),).abi_encode_params(),
                Err(_) => return Err(revert("unknown selector")),
            }
        } else if to == MULTI_OWNER_ACCOUNT_FACTORY {
            match IMultiOwnerAccountFactoryCalls::abi_decode(data, true) {
                Ok(IMultiOwnerAccountFactoryCalls::getAddress(c)) => {
                    (counterfactual_address(c.salt, &c.owners),).abi_encode_params()
                },
                _ => return Err(revert("not a view")),
            }
        } else if to == SESSION_KEY_PLUGIN {
            let keys_of = |account: Address| -> Vec<SessionKeyEntry> {
                self.world
                    .accounts
                    .get(&account)
                    .map(|a| a.session_keys.clone())
                    .unwrap_or_default()
            };
            match ISessionKeyPluginCalls::abi_decode(data, true) {
                Ok(ISessionKeyPluginCalls::sessionKeysOf(c)) => {
                    let keys: Vec<Address> = keys_of(c.account).iter().map(|e| e.key).collect();
                    (keys,).abi_encode_params()
                },
                Ok(ISessionKeyPluginCalls::isSessionKeyOf(c)) => {
                    (keys_of(c.account).iter().any(|e| e.key == c.sessionKey),).abi_encode_params()
                },
                Ok(ISessionKeyPluginCalls::findPredecessor(c)) => {
                    let keys = keys_of(c.account);
                    let index = keys
                        .iter()
                        .position(|e| e.key == c.sessionKey)
                        .ok_or_else(|| revert("InvalidSessionKey"))?;
                    (predecessor_word(&keys, index),).abi_encode_params()
                },
                Ok(ISessionKeyPluginCalls::pluginManifest(_)) => return Ok(manifest_return()),
                _ => return Err(revert("not a view")),
            }
        } else if to == COUNTER {
            match ICounterCalls::abi_decode(data, true) {
                Ok(ICounterCalls::count(c)) => {
                    let value = self.world.counters.get(&c._0).copied().unwrap_or_default();
                    (value,).abi_encode_params()
                },
                _ => return Err(revert("not a view")),
            }
        } else if to == REVERTER {
            return Err(revert("nope"));
        } else if let Some(account) = self.world.accounts.get(&to) {
            match IModularAccountCalls::abi_decode(data, true) {
                Ok(IModularAccountCalls::getInstalledPlugins(_)) => {
                    (account.plugins.clone(),).abi_encode_params()
                },
                _ => return Err(revert("not a view")),
            }
        } else {
            // Calls to addresses without code succeed with empty output
            Vec::new()
        };
        Ok(encoded.into())
    }

    /// Bundler-side validation against the included state only
    fn validate(&self, op: &UserOperation, hash: B256) -> Result<(), (i64, String)> {
        let in_flight = self.pending.iter().filter(|p| p.op.sender == op.sender).count();
        let expected = self.nonce_of(op.sender) + U256::from(in_flight);
        if op.nonce != expected {
            return Err((
                -32500,
                format!("AA25 invalid account nonce: expected {}, got {}", expected, op.nonce),
            ));
        }

        let owner = match self.world.accounts.get(&op.sender) {
            Some(account) => {
                if !op.init_code.is_empty() {
                    return Err((-32500, "AA10 sender already constructed".into()));
                }
                account.owner
            },
            None => {
                if op.init_code.is_empty() {
                    return Err((-32500, "AA20 account not deployed".into()));
                }
                let (salt, owners) = decode_init_code(&op.init_code).map_err(|e| (-32500, e))?;
                if counterfactual_address(salt, &owners) != op.sender {
                    return Err((-32500, "AA14 initCode must return sender".into()));
                }
                owners[0]
            },
        };

        let signer = recover_message_signer(hash.as_slice(), &op.signature)
            .map_err(|e| (-32500, format!("AA24 signature error: {}", e)))?;

        match ISessionKeyPluginCalls::abi_decode(&op.call_data, true) {
            Ok(ISessionKeyPluginCalls::executeWithSessionKey(c)) => {
                self.validate_session_operation(op.sender, signer, c.sessionKey, &c.calls)
            },
            _ if signer == owner => Ok(()),
            _ => Err((-32500, "AA24 signature error".into())),
        }
    }

    fn validate_session_operation(
        &self,
        account: Address,
        signer: Address,
        session_key: Address,
        calls: &[sessionkit_sdk::advanced::calls::AbiCall],
    ) -> Result<(), (i64, String)> {
        if signer != session_key {
            return Err((-32500, "AA24 signature error".into()));
        }
        let state = self
            .world
            .accounts
            .get(&account)
            .ok_or((-32500, "AA20 account not deployed".to_string()))?;
        if !state.plugins.contains(&SESSION_KEY_PLUGIN) {
            return Err((-32500, "AA23 reverted: session key plugin not installed".into()));
        }
        let entry = state
            .session_keys
            .iter()
            .find(|e| e.key == session_key)
            .ok_or((-32500, "AA23 reverted: unknown session key".to_string()))?;

        if !entry.permissions.is_active_at(self.now) {
            return Err((-32503, "AA22 expired or not due".into()));
        }
        for call in calls {
            if !entry.permissions.access().permits(&call.target) {
                return Err((
                    -32500,
                    format!("AA23 reverted: target {} not allowed", call.target),
                ));
            }
        }
        let total = calls.iter().fold(U256::ZERO, |acc, call| acc + call.value);
        if entry.spent + total > entry.permissions.spend_limit() {
            return Err((-32500, "AA23 reverted: spend limit exceeded".into()));
        }
        Ok(())
    }

    fn include(&mut self, pending: Pending) {
        self.block += 1;
        let op = pending.op;
        *self.nonces.entry(op.sender).or_default() += U256::from(1u64);

        // Deployment happens during validation and survives an execution revert
        if !op.init_code.is_empty() {
            if let Ok((_, owners)) = decode_init_code(&op.init_code) {
                self.world.accounts.insert(
                    op.sender,
                    AccountState {
                        owner: owners[0],
                        plugins: vec![MULTI_OWNER_PLUGIN],
                        session_keys: Vec::new(),
                    },
                );
                self.deployments += 1;
            }
        }

        let mut world = self.world.clone();
        let (success, reason) = match world.execute(op.sender, &op.call_data) {
            Ok(()) => {
                self.world = world;
                (true, None)
            },
            Err(reason) => (false, Some(reason)),
        };

        self.receipts.insert(
            pending.hash,
            UserOperationReceipt {
                user_op_hash: pending.hash,
                transaction_hash: keccak256(self.block.to_be_bytes()),
                success,
                reason,
            },
        );
        self.included.push(pending.hash);
    }
}

/// In-memory chain plus bundler serving the entry point, the account factory,
/// modular accounts, the session key plugin and the counter contract.
///
/// Operations are validated when sent and included once their receipt has been
/// polled `inclusion_polls` times, together with every operation sent before them.
pub struct TestChain {
    state: Mutex<ChainState>,
}

impl TestChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                now: START_TIME,
                block: 0,
                world: World::default(),
                nonces: HashMap::new(),
                pending: Vec::new(),
                receipts: HashMap::new(),
                included: Vec::new(),
                rejections: Vec::new(),
                deployments: 0,
                transport_down: false,
                stalled: false,
                inclusion_polls: 2,
                failing_receipt_polls: 0,
            }),
        })
    }

    pub fn manager(self: &Arc<Self>) -> AccountSessionManager {
        self.manager_with(test_config())
    }

    pub fn manager_with(self: &Arc<Self>, config: SessionKitConfig) -> AccountSessionManager {
        AccountSessionManager::new(config, self.clone()).unwrap()
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    fn reachable(&self) -> Result<MutexGuard<'_, ChainState>, RpcError> {
        let state = self.lock();
        if state.transport_down {
            return Err(RpcError::Transport("connection refused".into()));
        }
        Ok(state)
    }

    pub fn now(&self) -> u64 {
        self.lock().now
    }

    pub fn advance_time(&self, seconds: u64) {
        self.lock().now += seconds;
    }

    pub fn set_transport_down(&self, down: bool) {
        self.lock().transport_down = down;
    }

    /// Stop including operations; receipts stay unavailable
    pub fn set_stalled(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    /// Make the next `count` receipt polls fail as if the endpoint dropped the request
    pub fn fail_receipt_polls(&self, count: u32) {
        self.lock().failing_receipt_polls = count;
    }

    pub fn fund(&self, address: Address, amount: U256) {
        *self.lock().world.balances.entry(address).or_default() += amount;
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.lock()
            .world
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn deployments(&self) -> usize {
        self.lock().deployments
    }

    pub fn is_deployed(&self, account: Address) -> bool {
        self.lock().world.accounts.contains_key(&account)
    }

    pub fn counter_of(&self, account: Address) -> U256 {
        self.lock()
            .world
            .counters
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub fn session_keys(&self, account: Address) -> Vec<Address> {
        self.lock()
            .world
            .accounts
            .get(&account)
            .map(|a| a.session_keys.iter().map(|e| e.key).collect())
            .unwrap_or_default()
    }

    pub fn permissions_of(&self, account: Address, key: Address) -> Option<PermissionDescriptor> {
        self.lock().world.accounts.get(&account).and_then(|a| {
            a.session_keys
                .iter()
                .find(|e| e.key == key)
                .map(|e| e.permissions.clone())
        })
    }

    pub fn nonce_of(&self, account: Address) -> U256 {
        self.lock().nonce_of(account)
    }

    /// Operation hashes in inclusion order
    pub fn included_hashes(&self) -> Vec<B256> {
        self.lock().included.clone()
    }

    /// Reasons of every operation the bundler refused
    pub fn rejections(&self) -> Vec<String> {
        self.lock().rejections.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }
}

#[async_trait]
impl AccountConnection for TestChain {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.reachable()?;
        Ok(CHAIN_ID)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        let state = self.reachable()?;
        Ok(if state.has_code(address) {
            Bytes::from_static(&[0xfe])
        } else {
            Bytes::new()
        })
    }

    async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        let state = self.reachable()?;
        Ok(state
            .world
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn call(
        &self,
        _from: Option<Address>,
        to: Address,
        data: Bytes,
    ) -> Result<Bytes, RpcError> {
        self.reachable()?.read(to, &data)
    }

    async fn fee_data(&self) -> Result<FeeData, RpcError> {
        self.reachable()?;
        Ok(FeeData {
            max_fee_per_gas: U256::from(2_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
        })
    }

    async fn estimate_user_operation_gas(
        &self,
        _op: &UserOperation,
        _entry_point: Address,
    ) -> Result<GasEstimate, RpcError> {
        self.reachable()?;
        Ok(GasEstimate {
            pre_verification_gas: U256::from(50_000u64),
            verification_gas_limit: U256::from(150_000u64),
            call_gas_limit: U256::from(200_000u64),
        })
    }

    async fn send_user_operation(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> Result<B256, RpcError> {
        let mut state = self.reachable()?;
        if entry_point != ENTRY_POINT_V06 {
            return Err(RpcError::Rejected {
                code: -32602,
                message: "unsupported entry point".into(),
            });
        }

        let hash = op.hash(entry_point, CHAIN_ID);
        if let Err((code, message)) = state.validate(op, hash) {
            state.rejections.push(message.clone());
            return Err(RpcError::Rejected { code, message });
        }
        state.pending.push(Pending {
            hash,
            op: op.clone(),
            polls: 0,
        });
        Ok(hash)
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>, RpcError> {
        let mut state = self.reachable()?;
        if state.failing_receipt_polls > 0 {
            state.failing_receipt_polls -= 1;
            return Err(RpcError::Transport("receipt request timed out".into()));
        }
        if let Some(receipt) = state.receipts.get(&user_op_hash) {
            return Ok(Some(receipt.clone()));
        }
        let Some(index) = state.pending.iter().position(|p| p.hash == user_op_hash) else {
            return Ok(None);
        };
        if state.stalled {
            return Ok(None);
        }

        state.pending[index].polls += 1;
        if state.pending[index].polls < state.inclusion_polls {
            return Ok(None);
        }
        let ready: Vec<Pending> = state.pending.drain(..=index).collect();
        for pending in ready {
            state.include(pending);
        }
        Ok(state.receipts.get(&user_op_hash).cloned())
    }
}

/// Browser wallet stand-in answering EIP-1193 requests with a local key
pub struct FakeWallet {
    signer: LocalSigner,
    pub refuse_connect: bool,
    pub refuse_sign: bool,
}

impl FakeWallet {
    pub fn new(private_key: &str) -> Self {
        Self {
            signer: LocalSigner::from_private_key(private_key).unwrap(),
            refuse_connect: false,
            refuse_sign: false,
        }
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, String> {
        use sessionkit_sdk::AccountSigner;

        match method {
            "eth_requestAccounts" if self.refuse_connect => {
                Err("User rejected the request.".into())
            },
            // Nothing exposed until the user grants access
            "eth_accounts" if self.refuse_connect => Ok(json!([])),
            "eth_requestAccounts" | "eth_accounts" => Ok(json!([self.signer.address()])),
            "personal_sign" => {
                if self.refuse_sign {
                    return Err("User denied message signature.".into());
                }
                let message = params[0]
                    .as_str()
                    .ok_or_else(|| "missing message".to_string())?;
                let raw = hex::decode(message.trim_start_matches("0x")).map_err(|e| e.to_string())?;
                let signature = self.signer.sign_message_sync(&raw)?;
                Ok(json!(signature))
            },
            other => Err(format!("unsupported method {}", other)),
        }
    }
}
