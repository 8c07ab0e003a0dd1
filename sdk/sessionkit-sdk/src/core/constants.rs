use alloy_primitives::{address, Address};

/// ERC-4337 EntryPoint v0.6, same address on every supported chain
pub const ENTRY_POINT_V06: Address = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// Multi-owner modular account factory
pub const MULTI_OWNER_ACCOUNT_FACTORY: Address =
    address!("000000e92D78D90000007F0082006FDA09BD5f11");

/// Multi-owner plugin providing owner validation on the modular account
pub const MULTI_OWNER_PLUGIN: Address = address!("cE0000007B008F50d762D155002600004cD6c647");

/// Session key plugin (the capability module this SDK installs)
pub const SESSION_KEY_PLUGIN: Address = address!("0000003E0000a96de4058e1E02a62FaaeCf23d8d");

/// Function ids of the multi-owner plugin the session key plugin depends on
pub const OWNER_USER_OP_VALIDATION_ID: u8 = 0;
pub const OWNER_RUNTIME_VALIDATION_ID: u8 = 1;

/// Key space used for account operation nonces
pub const DEFAULT_NONCE_KEY: u64 = 0;

/// Placeholder signature used for gas estimation: `r = s = 0xff..`, `v = 28`
pub const DUMMY_SIGNATURE: [u8; 65] = {
    let mut sig = [0xffu8; 65];
    sig[64] = 0x1c;
    sig
};
