use crate::core::connection::{AccountConnection, RpcError};
use alloy_primitives::{eip191_hash_message, keccak256, Address, FixedBytes, B256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use std::time::{SystemTime, UNIX_EPOCH};

//=============================================================================
// Key & Signature Helpers
//=============================================================================

/// Ethereum address of a secp256k1 public key: last 20 bytes of `keccak(x || y)`
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recover the address that produced an EIP-191 `signature` over `message`
pub fn recover_message_signer(message: &[u8], signature: &[u8]) -> Result<Address, String> {
    if signature.len() != 65 {
        return Err(format!("expected 65-byte signature, got {}", signature.len()));
    }
    let sig = Signature::from_slice(&signature[..64]).map_err(|e| e.to_string())?;
    let v = signature[64];
    let recovery_id = RecoveryId::from_byte(v.wrapping_sub(27))
        .ok_or_else(|| format!("invalid recovery byte {}", v))?;

    let digest = eip191_hash_message(message);
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|e| e.to_string())?;
    Ok(address_from_verifying_key(&key))
}

//=============================================================================
// Encoding Helpers
//=============================================================================

/// Modular account function reference: plugin address followed by a one-byte function id
pub fn function_reference(plugin: Address, function_id: u8) -> FixedBytes<21> {
    let mut raw = [0u8; 21];
    raw[..20].copy_from_slice(plugin.as_slice());
    raw[20] = function_id;
    FixedBytes(raw)
}

/// Plugin manifest hash expected by `installPlugin`: keccak of the raw `pluginManifest()` return data
pub async fn fetch_manifest_hash(
    connection: &dyn AccountConnection,
    plugin: Address,
) -> Result<B256, RpcError> {
    let data = crate::advanced::calls::plugin_manifest();
    let manifest = connection.call(None, plugin, data).await?;
    Ok(keccak256(&manifest))
}

/// Whether any contract code lives at `address`
pub async fn has_code(
    connection: &dyn AccountConnection,
    address: Address,
) -> Result<bool, RpcError> {
    Ok(!connection.get_code(address).await?.is_empty())
}

//=============================================================================
// Time
//=============================================================================

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
