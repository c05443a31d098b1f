//! Key generation and single-value encrypt/decrypt commands.

use std::io::Read;

use zeroize::Zeroizing;

use crate::core::cipher::{self, SecretKey};
use crate::error::Result;

/// Print a fresh hex key.
pub fn keygen() -> Result<()> {
    let key = SecretKey::generate();
    println!("{}", Zeroizing::new(key.to_hex()).as_str());
    Ok(())
}

/// Encrypt `value`, or stdin when absent.
pub fn encrypt(value: Option<String>, key: &str) -> Result<()> {
    let key = SecretKey::from_hex(key)?;
    let plaintext = Zeroizing::new(value_or_stdin(value)?);
    println!("{}", cipher::encrypt_str(&key, &plaintext)?);
    Ok(())
}

/// Decrypt `value`, or stdin when absent.
pub fn decrypt(value: Option<String>, key: &str) -> Result<()> {
    let key = SecretKey::from_hex(key)?;
    let encrypted = value_or_stdin(value)?;
    let plaintext = Zeroizing::new(cipher::decrypt_str(&key, encrypted.trim())?);
    println!("{}", plaintext.as_str());
    Ok(())
}

fn value_or_stdin(value: Option<String>) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }

    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    let trimmed = buf.trim_end_matches(['\r', '\n']).len();
    buf.truncate(trimmed);
    Ok(buf)
}
