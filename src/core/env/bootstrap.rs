//! First-startup decryption of an installed environment.
//!
//! The generated runtime calls [`bootstrap`] once before anything reads its
//! environment. The key variable is consumed and erased; every other
//! variable that decrypts under it is replaced by its plaintext.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::cipher::{self, SecretKey};
use crate::core::constants::KEY_VARIABLE;
use crate::core::types::Sensitive;
use crate::error::{Error, InstallError, Result};

/// How to treat values that fail to decrypt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecryptPolicy {
    /// Leave the value as it is and keep going.
    #[default]
    BestEffort,
    /// Fail on any value that looks encrypted but does not authenticate.
    /// Values that are plainly not ciphertext are still left alone.
    Strict,
}

/// A mutable variable table.
pub trait Environment {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str);
    fn remove(&mut self, name: &str);
    fn names(&self) -> Vec<String>;
}

/// The current process environment.
///
/// Variables whose name or value is not UTF-8 are invisible to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn set(&mut self, name: &str, value: &str) {
        std::env::set_var(name, value);
    }

    fn remove(&mut self, name: &str) {
        std::env::remove_var(name);
    }

    fn names(&self) -> Vec<String> {
        std::env::vars_os()
            .filter_map(|(name, _)| name.into_string().ok())
            .collect()
    }
}

/// An in-memory environment, for child processes and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEnvironment {
    vars: BTreeMap<String, String>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn into_vars(self) -> BTreeMap<String, String> {
        self.vars
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Environment for MemoryEnvironment {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    fn remove(&mut self, name: &str) {
        self.vars.remove(name);
    }

    fn names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }
}

/// Outcome of one bootstrap run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Whether a non-empty key was present.
    pub key_found: bool,
    /// Variables replaced by their plaintext.
    pub decrypted: Vec<String>,
    /// Variables left unchanged.
    pub skipped: Vec<String>,
}

/// Decrypts an environment in place with its embedded key.
#[derive(Debug, Clone)]
pub struct BootstrapDecryptor {
    key_variable: String,
    policy: DecryptPolicy,
}

impl Default for BootstrapDecryptor {
    fn default() -> Self {
        Self::new(KEY_VARIABLE, DecryptPolicy::default())
    }
}

impl BootstrapDecryptor {
    pub fn new(key_variable: impl Into<String>, policy: DecryptPolicy) -> Self {
        Self {
            key_variable: key_variable.into(),
            policy,
        }
    }

    pub fn policy(&self) -> DecryptPolicy {
        self.policy
    }

    /// Decrypt `env` in place.
    ///
    /// Without a key this is a no-op. Once read, the key variable is removed
    /// whether or not the rest succeeds.
    ///
    /// # Errors
    ///
    /// - `CipherError::InvalidKey` if the key variable is not 32 hex bytes
    /// - `InstallError::Decrypt` under [`DecryptPolicy::Strict`]; variables
    ///   visited before the failure stay decrypted
    pub fn run<E: Environment + ?Sized>(&self, env: &mut E) -> Result<BootstrapReport> {
        let Some(encoded) = env.get(&self.key_variable).map(Sensitive::new) else {
            debug!(variable = %self.key_variable, "no bootstrap key present");
            return Ok(BootstrapReport::default());
        };
        env.remove(&self.key_variable);

        if encoded.is_empty() {
            debug!(variable = %self.key_variable, "bootstrap key empty");
            return Ok(BootstrapReport::default());
        }

        let key = SecretKey::from_hex(&encoded)?;
        let mut report = BootstrapReport {
            key_found: true,
            ..BootstrapReport::default()
        };

        let mut names = env.names();
        names.sort();

        for name in names {
            let Some(value) = env.get(&name) else {
                continue;
            };

            match cipher::decrypt_str(&key, &value) {
                Ok(plain) => {
                    env.set(&name, &plain);
                    report.decrypted.push(name);
                }
                Err(Error::Cipher(source))
                    if self.policy == DecryptPolicy::Strict && cipher::looks_encrypted(&value) =>
                {
                    warn!(variable = %name, "encrypted variable failed to decrypt");
                    return Err(InstallError::Decrypt { name, source }.into());
                }
                Err(_) => report.skipped.push(name),
            }
        }

        debug!(
            decrypted = report.decrypted.len(),
            skipped = report.skipped.len(),
            "bootstrap complete"
        );
        Ok(report)
    }
}

/// Decrypt the process environment with the default key variable and
/// best-effort policy.
pub fn bootstrap() -> Result<BootstrapReport> {
    BootstrapDecryptor::default().run(&mut ProcessEnvironment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CipherError;

    fn installed(key: &SecretKey) -> MemoryEnvironment {
        [
            (KEY_VARIABLE.to_string(), key.to_hex()),
            ("main_db_conn".to_string(), cipher::encrypt_str(key, "mysql://u:p@h:1/s").unwrap()),
            ("mysql_port".to_string(), cipher::encrypt_str(key, "3306").unwrap()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_decrypts_and_erases_key() {
        let key = SecretKey::generate();
        let mut env = installed(&key);

        let report = BootstrapDecryptor::default().run(&mut env).unwrap();

        assert!(report.key_found);
        assert_eq!(report.decrypted, ["main_db_conn", "mysql_port"]);
        assert_eq!(report.skipped, ["PATH"]);
        assert_eq!(env.get("main_db_conn").unwrap(), "mysql://u:p@h:1/s");
        assert_eq!(env.get("mysql_port").unwrap(), "3306");
        assert_eq!(env.get("PATH").unwrap(), "/usr/bin");
        assert!(env.get(KEY_VARIABLE).is_none());
    }

    #[test]
    fn test_second_run_is_noop() {
        let key = SecretKey::generate();
        let mut env = installed(&key);
        let decryptor = BootstrapDecryptor::default();

        decryptor.run(&mut env).unwrap();
        let after_first = env.clone();
        let report = decryptor.run(&mut env).unwrap();

        assert_eq!(report, BootstrapReport::default());
        assert_eq!(env, after_first);
    }

    #[test]
    fn test_best_effort_leaves_foreign_ciphertext() {
        let key = SecretKey::generate();
        let other = SecretKey::generate();
        let mut env = installed(&key);
        let foreign = cipher::encrypt_str(&other, "elsewhere").unwrap();
        env.set("FOREIGN", &foreign);

        let report = BootstrapDecryptor::default().run(&mut env).unwrap();

        assert!(report.skipped.contains(&"FOREIGN".to_string()));
        assert_eq!(env.get("FOREIGN").unwrap(), foreign);
    }

    #[test]
    fn test_strict_fails_on_foreign_ciphertext() {
        let key = SecretKey::generate();
        let mut env = installed(&key);
        env.set("FOREIGN", &cipher::encrypt_str(&SecretKey::generate(), "x").unwrap());

        let err = BootstrapDecryptor::new(KEY_VARIABLE, DecryptPolicy::Strict)
            .run(&mut env)
            .unwrap_err();

        match err {
            Error::Install(InstallError::Decrypt { name, source }) => {
                assert_eq!(name, "FOREIGN");
                assert!(matches!(source, CipherError::Authentication));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(env.get(KEY_VARIABLE).is_none());
    }

    #[test]
    fn test_strict_ignores_plain_values() {
        let key = SecretKey::generate();
        let mut env = installed(&key);

        let report = BootstrapDecryptor::new(KEY_VARIABLE, DecryptPolicy::Strict)
            .run(&mut env)
            .unwrap();
        assert_eq!(report.skipped, ["PATH"]);
    }

    #[test]
    fn test_empty_key_is_removed() {
        let mut env: MemoryEnvironment = [(KEY_VARIABLE, ""), ("A", "b")].into_iter().collect();

        let report = BootstrapDecryptor::default().run(&mut env).unwrap();

        assert!(!report.key_found);
        assert!(env.get(KEY_VARIABLE).is_none());
        assert_eq!(env.get("A").unwrap(), "b");
    }

    #[test]
    fn test_invalid_key_is_removed_and_reported() {
        let mut env: MemoryEnvironment = [(KEY_VARIABLE, "not-hex")].into_iter().collect();

        let err = BootstrapDecryptor::default().run(&mut env).unwrap_err();

        assert!(matches!(err, Error::Cipher(CipherError::InvalidKey(_))));
        assert!(env.get(KEY_VARIABLE).is_none());
    }

    #[test]
    fn test_custom_key_variable() {
        let key = SecretKey::generate();
        let mut env: MemoryEnvironment = [
            ("BOOT".to_string(), key.to_hex()),
            ("X".to_string(), cipher::encrypt_str(&key, "y").unwrap()),
        ]
        .into_iter()
        .collect();

        BootstrapDecryptor::new("BOOT", DecryptPolicy::BestEffort)
            .run(&mut env)
            .unwrap();
        assert_eq!(env.get("X").unwrap(), "y");
    }

    #[test]
    fn test_policy_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: DecryptPolicy,
        }

        let w: Wrapper = toml::from_str("policy = \"best-effort\"").unwrap();
        assert_eq!(w.policy, DecryptPolicy::BestEffort);
        let w: Wrapper = toml::from_str("policy = \"strict\"").unwrap();
        assert_eq!(w.policy, DecryptPolicy::Strict);
    }
}
