use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// A single call executed by the smart account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Call {
    /// Call with no native value attached
    pub fn new(target: Address, data: impl Into<Bytes>) -> Self {
        Self {
            target,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Whether the account contract exists on chain yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    /// Address is known but no code is deployed; the first owner operation deploys it
    Counterfactual,
    Deployed,
}

/// The on-chain programmable account bound to a primary identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartAccount {
    /// Account address, deterministic given owner and salt
    pub address: Address,

    /// Address of the primary identity owning the account
    pub owner: Address,

    /// Factory salt the address was derived with
    pub salt: U256,

    /// Deployment status observed at attach time
    pub deployment: DeploymentStatus,
}

impl SmartAccount {
    pub fn is_deployed(&self) -> bool {
        self.deployment == DeploymentStatus::Deployed
    }
}

/// ERC-4337 (EntryPoint v0.6) user operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl UserOperation {
    /// Hash the entry point signs over: `keccak(abi.encode(keccak(pack(op)), entryPoint, chainId))`
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let packed = (
            self.sender,
            self.nonce,
            keccak256(&self.init_code),
            keccak256(&self.call_data),
            self.call_gas_limit,
            self.verification_gas_limit,
            self.pre_verification_gas,
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas,
            keccak256(&self.paymaster_and_data),
        )
            .abi_encode();

        keccak256((keccak256(packed), entry_point, U256::from(chain_id)).abi_encode())
    }
}

/// Gas limits returned by `eth_estimateUserOperationGas`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub pre_verification_gas: U256,
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
}

/// EIP-1559 fee parameters for a user operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeData {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Inclusion result of a user operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOperationReceipt {
    pub user_op_hash: B256,

    /// Hash of the bundle transaction that included the operation
    pub transaction_hash: B256,

    /// False when the operation was included but its execution reverted
    pub success: bool,

    /// Revert reason reported by the bundler, if any
    pub reason: Option<String>,
}

/// Confirmation status of a submitted operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Confirmed,
    Failed { reason: String },
}

/// One entry of the submitter's operation log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub calls: Vec<Call>,

    /// Session key that signed the operation
    pub session_key: Address,

    pub user_op_hash: B256,

    /// Set once the operation is included
    pub transaction_hash: Option<B256>,

    pub status: OperationStatus,
}

impl PendingOperation {
    pub fn is_confirmed(&self) -> bool {
        self.status == OperationStatus::Confirmed
    }
}

/// Identifiers of a confirmed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedOperation {
    pub user_op_hash: B256,
    pub transaction_hash: B256,
}

/// Session key capability observed on an account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityStatus {
    /// Session key plugin is in the account's installed plugin list
    pub plugin_installed: bool,

    /// The session key at hand is registered with the plugin
    pub key_registered: bool,

    /// Every session key registered on the account, in plugin list order
    pub registered_keys: Vec<Address>,
}
