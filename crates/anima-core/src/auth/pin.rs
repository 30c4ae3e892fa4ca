//! PIN digests.
//!
//! Stored form is `<salt-hex>:<mac-hex>`, where the MAC is HMAC-SHA256 keyed
//! by a random 16-byte salt over the PIN bytes. The whole digest is one
//! settings value, so it is replaced in a single write.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::StoreError;
use crate::storage::SettingKey;

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;

/// Digest `pin` under a fresh salt.
pub fn digest(pin: &str) -> Result<String, StoreError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mac = mac_for(&salt, pin)?.finalize().into_bytes();
    Ok(format!("{}:{}", hex::encode(salt), hex::encode(mac)))
}

/// Constant-time comparison of `candidate` against a stored digest.
///
/// # Errors
/// A stored value that is not a well-formed digest is `StoreError::Corrupt`.
pub fn verify(stored: &str, candidate: &str) -> Result<bool, StoreError> {
    let corrupt = || StoreError::Corrupt {
        key: SettingKey::Pin.as_str().to_string(),
        value: "<malformed digest>".to_string(),
    };

    let (salt_hex, mac_hex) = stored.split_once(':').ok_or_else(corrupt)?;
    let salt = hex::decode(salt_hex).map_err(|_| corrupt())?;
    let expected = hex::decode(mac_hex).map_err(|_| corrupt())?;
    if salt.len() != SALT_LEN || expected.is_empty() {
        return Err(corrupt());
    }

    Ok(mac_for(&salt, candidate)?.verify_slice(&expected).is_ok())
}

fn mac_for(salt: &[u8], pin: &str) -> Result<HmacSha256, StoreError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(salt)
        .map_err(|e| StoreError::Unavailable(format!("HMAC init failed: {e}")))?;
    mac.update(pin.as_bytes());
    Ok(mac)
}
