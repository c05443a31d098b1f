//! Configuration file management.
//!
//! Handles reading and validating `dbseal.toml`. Every field has a default,
//! so a missing file or an empty one yields the stock layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::constants;
use crate::core::credentials::CredentialMaterializer;
use crate::core::env::template::is_variable_name;
use crate::core::env::{Anchors, BootstrapDecryptor, DecryptPolicy, InstallLayout};
use crate::error::{ConfigError, Result};

/// Project configuration stored in `dbseal.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub installer: InstallerConfig,
    pub anchors: Anchors,
    pub bootstrap: BootstrapConfig,
    pub credentials: CredentialsConfig,
    pub tunnel: TunnelConfig,
}

/// Reserved variable names in generated files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Receives the hex bootstrap key
    pub key_variable: String,
    /// Receives the encrypted main connection string
    pub connection_variable: String,
    /// Receives the encrypted UID generation method
    pub uid_variable: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            key_variable: constants::KEY_VARIABLE.to_string(),
            connection_variable: constants::CONNECTION_VARIABLE.to_string(),
            uid_variable: constants::UID_VARIABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub policy: DecryptPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Where temporary PEM files are written. Defaults to the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Local address SSH tunnels listen on
    pub bind_host: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            bind_host: constants::TUNNEL_BIND_HOST.to_string(),
        }
    }
}

impl Config {
    /// Path to the configuration file in the current directory
    pub fn config_path() -> PathBuf {
        PathBuf::from(constants::CONFIG_FILE)
    }

    /// Load and validate configuration from `path`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadFile` if the file can't be read,
    /// `ConfigError::Parse` if the TOML is malformed, or
    /// `ConfigError::InvalidValue` if validation fails.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");

        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;
        config.validate()?;

        debug!(policy = ?config.bootstrap.policy, "config loaded");
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate names and addresses
    ///
    /// Checks:
    /// - Reserved variable names are valid identifiers and pairwise distinct
    /// - Anchor texts are non-empty and pairwise distinct
    /// - The tunnel bind host and credentials dir are non-empty
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let installer = &self.installer;
        let names = [
            ("installer.key_variable", &installer.key_variable),
            ("installer.connection_variable", &installer.connection_variable),
            ("installer.uid_variable", &installer.uid_variable),
        ];
        for (field, name) in names {
            if !is_variable_name(name) {
                return Err(invalid(field, format!("'{}' is not a valid variable name", name)));
            }
        }
        if installer.key_variable == installer.connection_variable
            || installer.key_variable == installer.uid_variable
            || installer.connection_variable == installer.uid_variable
        {
            return Err(invalid("installer", "reserved variable names must differ".into()));
        }

        let anchors = [
            ("anchors.database_start", &self.anchors.database_start),
            ("anchors.database_connection", &self.anchors.database_connection),
            ("anchors.uid_generation", &self.anchors.uid_generation),
        ];
        for (field, text) in anchors {
            if text.trim().is_empty() {
                return Err(invalid(field, "anchor text cannot be empty".into()));
            }
        }
        if self.anchors.database_start == self.anchors.database_connection
            || self.anchors.database_start == self.anchors.uid_generation
            || self.anchors.database_connection == self.anchors.uid_generation
        {
            return Err(invalid("anchors", "anchor texts must differ".into()));
        }

        if self.tunnel.bind_host.trim().is_empty() {
            return Err(invalid("tunnel.bind_host", "cannot be empty".into()));
        }
        if matches!(&self.credentials.dir, Some(dir) if dir.as_os_str().is_empty()) {
            return Err(invalid("credentials.dir", "cannot be empty".into()));
        }

        Ok(())
    }

    /// Installer layout described by this config
    pub fn layout(&self) -> InstallLayout {
        InstallLayout {
            key_variable: self.installer.key_variable.clone(),
            connection_variable: self.installer.connection_variable.clone(),
            uid_variable: self.installer.uid_variable.clone(),
            anchors: self.anchors.clone(),
        }
    }

    /// Credential materializer honoring `[credentials]` and `[tunnel]`
    pub fn materializer(&self) -> CredentialMaterializer {
        let materializer = match &self.credentials.dir {
            Some(dir) => CredentialMaterializer::new(dir),
            None => CredentialMaterializer::default(),
        };
        materializer.with_bind_host(&self.tunnel.bind_host)
    }

    /// Bootstrap decryptor honoring `[installer]` and `[bootstrap]`
    pub fn decryptor(&self) -> BootstrapDecryptor {
        BootstrapDecryptor::new(&self.installer.key_variable, self.bootstrap.policy)
    }
}

fn invalid(field: &'static str, reason: String) -> crate::error::Error {
    ConfigError::InvalidValue { field, reason }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.installer.key_variable, "CYPHER_TEXT");
        assert_eq!(config.installer.connection_variable, "main_db_conn");
        assert_eq!(config.installer.uid_variable, "id_generation_method");
        assert_eq!(config.bootstrap.policy, DecryptPolicy::BestEffort);
        assert_eq!(config.tunnel.bind_host, "127.0.0.1");
        assert!(config.credentials.dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
[installer]
key_variable = "BOOT_KEY"

[bootstrap]
policy = "strict"

[credentials]
dir = "/var/run/dbseal"
"#,
        )
        .unwrap();

        assert_eq!(config.installer.key_variable, "BOOT_KEY");
        assert_eq!(config.installer.uid_variable, "id_generation_method");
        assert_eq!(config.bootstrap.policy, DecryptPolicy::Strict);
        assert_eq!(config.credentials.dir, Some(PathBuf::from("/var/run/dbseal")));
        assert_eq!(config.anchors, Anchors::default());

        assert_eq!(config.layout().key_variable, "BOOT_KEY");
        assert_eq!(config.materializer().dir(), Path::new("/var/run/dbseal"));
        assert_eq!(config.decryptor().policy(), DecryptPolicy::Strict);
    }

    #[test]
    fn test_invalid_variable_name() {
        let mut config = Config::default();
        config.installer.uid_variable = "uid-method".into();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "installer.uid_variable",
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = Config::default();
        config.installer.connection_variable = "CYPHER_TEXT".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_anchors_rejected() {
        let mut config = Config::default();
        config.anchors.uid_generation = config.anchors.database_start.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_bind_host_rejected() {
        let mut config = Config::default();
        config.tunnel.bind_host = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_or_default(&tmp.path().join("dbseal.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dbseal.toml");
        std::fs::write(&path, "[bootstrap]\npolicy = \"sometimes\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file_errors() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
    }
}
