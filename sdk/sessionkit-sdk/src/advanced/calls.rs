//! ABI surface of the contracts the SDK talks to, and call-data encoders for them.

use crate::types::Call;
use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};

sol! {
    struct AbiCall {
        address target;
        uint256 value;
        bytes data;
    }

    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }

    interface IMultiOwnerAccountFactory {
        function createAccount(uint256 salt, address[] calldata owners) external returns (address addr);
        function getAddress(uint256 salt, address[] calldata owners) external view returns (address);
    }

    interface IModularAccount {
        function execute(address target, uint256 value, bytes calldata data) external payable returns (bytes memory);
        function executeBatch(AbiCall[] calldata calls) external payable returns (bytes[] memory);
        function installPlugin(
            address plugin,
            bytes32 manifestHash,
            bytes calldata pluginInstallData,
            bytes21[] calldata dependencies
        ) external;
        function getInstalledPlugins() external view returns (address[] memory);
    }

    interface ISessionKeyPlugin {
        function executeWithSessionKey(AbiCall[] calldata calls, address sessionKey) external returns (bytes[] memory);
        function addSessionKey(address sessionKey, bytes32 tag, bytes[] calldata permissionUpdates) external;
        function removeSessionKey(address sessionKey, bytes32 predecessor) external;
        function rotateSessionKey(address oldSessionKey, bytes32 predecessor, address newSessionKey) external;
        function updateKeyPermissions(address sessionKey, bytes[] calldata updates) external;
        function sessionKeysOf(address account) external view returns (address[] memory);
        function isSessionKeyOf(address account, address sessionKey) external view returns (bool);
        function findPredecessor(address account, address sessionKey) external view returns (bytes32);
        function pluginManifest() external pure returns (bytes memory);
    }

    interface ISessionKeyPermissionsUpdates {
        function setAccessListType(uint8 contractAccessControlType) external;
        function updateAccessListAddressEntry(address contractAddress, bool isOnList, bool checkSelectors) external;
        function setNativeTokenSpendLimit(uint256 spendLimit, uint48 refreshInterval) external;
        function updateTimeRange(uint48 validAfter, uint48 validUntil) external;
    }

    interface ICounter {
        function count(address) external view returns (uint256);
        function increament1() external;
        function increament2() external;
    }
}

impl From<&Call> for AbiCall {
    fn from(call: &Call) -> Self {
        AbiCall {
            target: call.target,
            value: call.value,
            data: call.data.clone(),
        }
    }
}

impl From<AbiCall> for Call {
    fn from(call: AbiCall) -> Self {
        Call {
            target: call.target,
            value: call.value,
            data: call.data,
        }
    }
}

//=============================================================================
// Entry point & factory
//=============================================================================

pub fn get_nonce(sender: Address, key: u64) -> Bytes {
    IEntryPoint::getNonceCall {
        sender,
        key: alloy_primitives::Uint::<192, 3>::from(key),
    }
    .abi_encode()
    .into()
}

pub fn factory_get_address(salt: U256, owners: Vec<Address>) -> Bytes {
    IMultiOwnerAccountFactory::getAddressCall { salt, owners }
        .abi_encode()
        .into()
}

/// `initCode` deploying the account: factory address followed by `createAccount` call data
pub fn init_code(factory: Address, salt: U256, owners: Vec<Address>) -> Bytes {
    let call = IMultiOwnerAccountFactory::createAccountCall { salt, owners }.abi_encode();
    let mut code = Vec::with_capacity(20 + call.len());
    code.extend_from_slice(factory.as_slice());
    code.extend_from_slice(&call);
    code.into()
}

//=============================================================================
// Modular account
//=============================================================================

/// Account call data for a list of calls; a single call uses `execute`, more use `executeBatch`
pub fn execute(calls: &[Call]) -> Bytes {
    match calls {
        [single] => IModularAccount::executeCall {
            target: single.target,
            value: single.value,
            data: single.data.clone(),
        }
        .abi_encode()
        .into(),
        _ => IModularAccount::executeBatchCall {
            calls: calls.iter().map(AbiCall::from).collect(),
        }
        .abi_encode()
        .into(),
    }
}

pub fn install_plugin(
    plugin: Address,
    manifest_hash: B256,
    install_data: Bytes,
    dependencies: Vec<FixedBytes<21>>,
) -> Bytes {
    IModularAccount::installPluginCall {
        plugin,
        manifestHash: manifest_hash,
        pluginInstallData: install_data,
        dependencies,
    }
    .abi_encode()
    .into()
}

pub fn get_installed_plugins() -> Bytes {
    IModularAccount::getInstalledPluginsCall {}.abi_encode().into()
}

//=============================================================================
// Session key plugin
//=============================================================================

/// Install data of the session key plugin: `abi.encode(address[] keys, bytes32[] tags, bytes[][] permissions)`
pub fn session_key_install_data(
    keys: Vec<Address>,
    tags: Vec<B256>,
    permissions: Vec<Vec<Bytes>>,
) -> Bytes {
    (keys, tags, permissions).abi_encode_params().into()
}

pub fn execute_with_session_key(calls: &[Call], session_key: Address) -> Bytes {
    ISessionKeyPlugin::executeWithSessionKeyCall {
        calls: calls.iter().map(AbiCall::from).collect(),
        sessionKey: session_key,
    }
    .abi_encode()
    .into()
}

pub fn add_session_key(session_key: Address, tag: B256, permissions: Vec<Bytes>) -> Bytes {
    ISessionKeyPlugin::addSessionKeyCall {
        sessionKey: session_key,
        tag,
        permissionUpdates: permissions,
    }
    .abi_encode()
    .into()
}

/// `predecessor` is the plugin's own linked-list entry preceding the key, see [`find_predecessor`]
pub fn remove_session_key(session_key: Address, predecessor: B256) -> Bytes {
    ISessionKeyPlugin::removeSessionKeyCall {
        sessionKey: session_key,
        predecessor,
    }
    .abi_encode()
    .into()
}

pub fn update_key_permissions(session_key: Address, permissions: Vec<Bytes>) -> Bytes {
    ISessionKeyPlugin::updateKeyPermissionsCall {
        sessionKey: session_key,
        updates: permissions,
    }
    .abi_encode()
    .into()
}

pub fn session_keys_of(account: Address) -> Bytes {
    ISessionKeyPlugin::sessionKeysOfCall { account }
        .abi_encode()
        .into()
}

pub fn is_session_key_of(account: Address, session_key: Address) -> Bytes {
    ISessionKeyPlugin::isSessionKeyOfCall {
        account,
        sessionKey: session_key,
    }
    .abi_encode()
    .into()
}

pub fn find_predecessor(account: Address, session_key: Address) -> Bytes {
    ISessionKeyPlugin::findPredecessorCall {
        account,
        sessionKey: session_key,
    }
    .abi_encode()
    .into()
}

pub fn plugin_manifest() -> Bytes {
    ISessionKeyPlugin::pluginManifestCall {}.abi_encode().into()
}
