//! Bootstrap secret key.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::constants::KEY_LEN;
use crate::error::{CipherError, Result};

/// A 32-byte AES-256 key, generated once per installation run.
///
/// Key material is zeroed on drop and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_LEN],
}

impl SecretKey {
    /// Draw a fresh key from the OS random number generator.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Build a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidKey` unless exactly 32 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
            .into());
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Parse the hex text embedded in generated environment files.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidKey` on bad hex or wrong length.
    pub fn from_hex(text: &str) -> Result<Self> {
        let mut decoded =
            hex::decode(text.trim()).map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        let key = Self::from_bytes(&decoded);
        decoded.zeroize();
        key
    }

    /// Hex text of the key. The result holds raw key material.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}
