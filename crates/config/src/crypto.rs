//! Symmetric encryption of serialized configuration text
//!
//! When a source has encryption enabled, `save` runs the serialized text
//! through AES-256-GCM keyed by the SHA-256 digest of the configured key
//! string and stores the result as base64 (nonce prepended). `load` and
//! `reload` reverse it given the same key.
//!
//! Decryption failure deliberately degrades to an empty string rather than
//! an error; callers must treat an unexpectedly empty decrypted source as a
//! possible integrity failure.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::error::{ConfigError, ConfigResult};

/// The well-known placeholder key. Both encrypt and decrypt refuse to run
/// with it (compared case-insensitively): a shipped default is not a secret.
pub const DEFAULT_KEY: &str = "strata-default-key";

/// Length of the AES-GCM nonce prepended to the ciphertext.
const NONCE_LEN: usize = 12;

/// Encryption settings carried by every source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// Whether save/load pass text through the cipher.
    pub encrypt: bool,
    /// Key string the cipher key is derived from.
    pub key: String,
}

impl Default for Security {
    fn default() -> Self {
        Self {
            encrypt: false,
            key: DEFAULT_KEY.to_string(),
        }
    }
}

/// Encrypt text with the given key, producing base64.
pub fn encrypt(plain: &str, key: &str) -> ConfigResult<String> {
    ensure_real_key(key)?;
    let cipher = cipher_for(key);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let payload = cipher
        .encrypt(&nonce, plain.as_bytes())
        .map_err(|_| ConfigError::configuration("encryption failed"))?;
    let mut raw = nonce.as_slice().to_vec();
    raw.extend_from_slice(&payload);
    Ok(BASE64.encode(raw))
}

/// Decrypt base64 text with the given key. Any failure (bad base64, a
/// truncated payload, the wrong key, tampered ciphertext) yields an empty
/// string.
pub fn decrypt(text: &str, key: &str) -> ConfigResult<String> {
    ensure_real_key(key)?;
    Ok(try_decrypt(text, key).unwrap_or_default())
}

fn try_decrypt(text: &str, key: &str) -> Option<String> {
    let raw = BASE64.decode(text.trim().as_bytes()).ok()?;
    if raw.len() < NONCE_LEN {
        return None;
    }
    let (nonce, payload) = raw.split_at(NONCE_LEN);
    let cipher = cipher_for(key);
    let plain = cipher.decrypt(Nonce::from_slice(nonce), payload).ok()?;
    String::from_utf8(plain).ok()
}

fn cipher_for(key: &str) -> Aes256Gcm {
    let digest = Sha256::digest(key.as_bytes());
    Aes256Gcm::new_from_slice(digest.as_slice()).expect("SHA-256 digest is a valid AES-256 key")
}

fn ensure_real_key(key: &str) -> ConfigResult<()> {
    if key.is_empty() {
        return Err(ConfigError::configuration("encryption key is not set"));
    }
    if key.eq_ignore_ascii_case(DEFAULT_KEY) {
        return Err(ConfigError::configuration(
            "refusing to encrypt with the built-in placeholder key; configure a real key",
        ));
    }
    Ok(())
}
