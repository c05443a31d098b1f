//! Secret encryption.
//!
//! AES-256-GCM with a fresh 96-bit IV per call and no associated data.
//! Encrypted values are `base64(iv || tag || ciphertext)`, the layout the
//! generated runtime's bootstrap decryptor expects.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::trace;

mod key;

pub use key::SecretKey;

use crate::core::constants::{IV_LEN, TAG_LEN};
use crate::core::types::EncryptedSecret;
use crate::error::{CipherError, Result};

/// Encrypt `plaintext` under `key`.
///
/// Two calls with the same inputs produce different outputs.
///
/// # Errors
///
/// Returns `CipherError::EncryptionFailed` if the AEAD rejects the input
/// (only possible for plaintexts beyond the GCM length limit).
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<EncryptedSecret> {
    trace!(plaintext_len = plaintext.len(), "encrypting");

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let mut packed = Vec::with_capacity(IV_LEN + TAG_LEN + buffer.len());
    packed.extend_from_slice(&iv);
    packed.extend_from_slice(tag.as_slice());
    packed.extend_from_slice(&buffer);

    let encoded = STANDARD.encode(&packed);
    trace!(ciphertext_len = encoded.len(), "encrypted");
    Ok(encoded)
}

/// Decrypt a value produced by [`encrypt`].
///
/// # Errors
///
/// - `CipherError::Encoding` if the value is not base64
/// - `CipherError::Authentication` if it is shorter than 28 bytes once
///   decoded, was produced under another key, or was modified
pub fn decrypt(key: &SecretKey, value: &str) -> Result<Vec<u8>> {
    let packed = STANDARD.decode(value.trim()).map_err(CipherError::from)?;
    trace!(ciphertext_len = packed.len(), "decrypting");

    if packed.len() < IV_LEN + TAG_LEN {
        return Err(CipherError::Authentication.into());
    }

    let (iv, rest) = packed.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(iv),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| CipherError::Authentication)?;

    Ok(buffer)
}

/// Encrypt a UTF-8 string.
pub fn encrypt_str(key: &SecretKey, plaintext: &str) -> Result<EncryptedSecret> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypt into a UTF-8 string.
///
/// # Errors
///
/// As [`decrypt`], plus `CipherError::NotUtf8` for binary plaintexts.
pub fn decrypt_str(key: &SecretKey, value: &str) -> Result<String> {
    let bytes = decrypt(key, value)?;
    String::from_utf8(bytes).map_err(|_| CipherError::NotUtf8.into())
}

/// Whether `value` has the shape of an encrypted secret.
///
/// True for base64 text decoding to at least `iv || tag`. Says nothing about
/// which key produced it.
pub fn looks_encrypted(value: &str) -> bool {
    STANDARD
        .decode(value.trim())
        .map(|bytes| bytes.len() >= IV_LEN + TAG_LEN)
        .unwrap_or(false)
}
