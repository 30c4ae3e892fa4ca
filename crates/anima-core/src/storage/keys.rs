//! Master key provisioning for the encrypted settings store.
//!
//! The key lives in the OS keyring by default. Headless hosts can supply it
//! through an environment variable instead. There is no plaintext fallback:
//! if neither source yields a key the store is unavailable.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const SERVICE: &str = "anima";
const USER: &str = "settings-master-key";
pub const KEY_LEN: usize = 32;

/// Where the master key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// OS keyring; a key is generated and stored on first use.
    #[default]
    Keyring,
    /// Base64-encoded 32-byte key in an environment variable.
    Env,
}

/// 256-bit master key. `Debug` never prints the bytes.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, StoreError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| StoreError::Unavailable(format!("master key is not valid base64: {e}")))?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            StoreError::Unavailable(format!(
                "invalid master key length: {} (expected {KEY_LEN})",
                b.len()
            ))
        })?;
        Ok(Self(key))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Resolve the master key from the configured source.
pub fn load_master_key(source: KeySource, env_var: &str) -> Result<MasterKey, StoreError> {
    match source {
        KeySource::Keyring => get_or_create_keyring_key(),
        KeySource::Env => {
            let encoded = std::env::var(env_var).map_err(|_| {
                StoreError::Unavailable(format!("environment variable {env_var} is not set"))
            })?;
            MasterKey::from_base64(&encoded)
        }
    }
}

/// Retrieve the master key from the OS keyring, or generate and store a new
/// one if none exists.
fn get_or_create_keyring_key() -> Result<MasterKey, StoreError> {
    let entry = keyring::Entry::new(SERVICE, USER)
        .map_err(|e| StoreError::Unavailable(format!("keyring entry error: {e}")))?;

    match entry.get_password() {
        Ok(encoded) => {
            tracing::debug!("settings key loaded from keyring");
            MasterKey::from_base64(&encoded)
        }
        Err(keyring::Error::NoEntry) => {
            let key = MasterKey::generate();
            entry
                .set_password(&key.to_base64())
                .map_err(|e| StoreError::Unavailable(format!("failed to store key in keyring: {e}")))?;
            tracing::info!("new settings key generated and stored in keyring");
            Ok(key)
        }
        Err(e) => Err(StoreError::Unavailable(format!("failed to access keyring: {e}"))),
    }
}
