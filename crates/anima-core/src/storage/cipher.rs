use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::StoreError;

use super::keys::MasterKey;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const VALUE_KEY_LABEL: &[u8] = b"anima.settings.value.v1";
const NAME_KEY_LABEL: &[u8] = b"anima.settings.name.v1";

/// Seals settings values with AES-256-GCM and blinds key names with
/// HMAC-SHA256, both under subkeys derived from the master key.
///
/// The blinded key name is bound to each ciphertext as associated data, so a
/// value copied under a different key fails to open.
pub struct ValueCipher {
    cipher: Aes256Gcm,
    name_key: [u8; 32],
}

impl ValueCipher {
    pub fn new(master: &MasterKey) -> Result<Self, StoreError> {
        let value_key = derive(master.as_bytes(), VALUE_KEY_LABEL)?;
        let name_key = derive(master.as_bytes(), NAME_KEY_LABEL)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&value_key));
        Ok(Self { cipher, name_key })
    }

    /// Deterministic, hex-encoded stand-in for a key name.
    pub fn blind_key(&self, key: &str) -> Result<String, StoreError> {
        let mut mac = new_mac(&self.name_key)?;
        mac.update(key.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Encrypt plaintext → base64(nonce + ciphertext)
    pub fn seal(&self, blinded_key: &str, plaintext: &str) -> Result<String, StoreError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: blinded_key.as_bytes(),
                },
            )
            .map_err(|_| StoreError::Decrypt {
                key: blinded_key.to_string(),
            })?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(&combined))
    }

    pub fn open(&self, blinded_key: &str, sealed: &str) -> Result<String, StoreError> {
        let fail = || StoreError::Decrypt {
            key: blinded_key.to_string(),
        };

        let combined = BASE64.decode(sealed).map_err(|_| fail())?;
        if combined.len() < NONCE_LEN {
            return Err(fail());
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: blinded_key.as_bytes(),
                },
            )
            .map_err(|_| fail())?;

        String::from_utf8(plaintext).map_err(|_| fail())
    }
}

fn new_mac(key: &[u8]) -> Result<HmacSha256, StoreError> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| StoreError::Unavailable(format!("HMAC init failed: {e}")))
}

fn derive(master: &[u8], label: &[u8]) -> Result<[u8; 32], StoreError> {
    let mut mac = new_mac(master)?;
    mac.update(label);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}
