//! Error types for dbseal.
//!
//! Each subsystem owns an error enum; [`Error`] wraps them so callers can
//! propagate with `?` and still match on the failing layer.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed transport error carried by [`ConnectionError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connection-string parsing failures.
#[derive(Error, Debug)]
pub enum GrammarError {
    /// No grammar for the scheme accepted the input.
    #[error("invalid {scheme} connection string format{}", format_hint(.hint))]
    Mismatch {
        scheme: String,
        hint: Option<String>,
    },

    /// A path-form grammar matched but the referenced file is unreadable.
    #[error("failed to read {field} from {}: {source}", .path.display())]
    ReadFile {
        field: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An inline `*_bytes` blob is not valid base64.
    #[error("{field} is not valid base64: {source}")]
    InvalidBase64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A secure channel was paired with an endpoint that cannot use it.
    #[error("{channel} parameters cannot be combined with a {endpoint} connection")]
    UnsupportedCombination {
        channel: &'static str,
        endpoint: &'static str,
    },
}

fn format_hint(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!(". {}", h))
        .unwrap_or_default()
}

impl GrammarError {
    pub(crate) fn mismatch_with_hint(scheme: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Mismatch {
            scheme: scheme.into(),
            hint: Some(hint.into()),
        }
    }
}

/// Secret encryption and decryption failures.
#[derive(Error, Debug)]
pub enum CipherError {
    /// The tag did not verify: wrong key, truncated or tampered input.
    #[error("decryption failed: authentication tag verification failed")]
    Authentication,

    #[error("invalid secret key: {0}")]
    InvalidKey(String),

    #[error("encrypted value is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("decrypted value is not valid UTF-8")]
    NotUtf8,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Temporary credential file failures.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to write credential file {name}: {source}")]
    Write {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to delete credential file {}: {source}", .path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// SSH tunnel failures. Never retried.
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("failed to reach ssh server {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("ssh authentication failed for {user}: {reason}")]
    Auth { user: String, reason: String },

    #[error("invalid ssh private key: {0}")]
    InvalidKey(String),

    #[error("failed to bind local tunnel address {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh session error: {0}")]
    Session(#[from] ssh2::Error),
}

/// Database connect failure, tagged with the descriptor variant.
#[derive(Error, Debug)]
#[error("{variant} connection failed: {source}")]
pub struct ConnectionError {
    pub variant: &'static str,
    #[source]
    pub source: BoxError,
}

impl ConnectionError {
    pub fn new(variant: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            variant,
            source: source.into(),
        }
    }
}

/// Environment file installation and bootstrap failures.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("template has no `{0}` assignment to receive the bootstrap key")]
    MissingKeySlot(String),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("variable {name} could not be decrypted: {source}")]
    Decrypt {
        name: String,
        #[source]
        source: CipherError,
    },

    #[error("invalid parameter `{0}`: expected NAME=value")]
    InvalidParam(String),
}

/// Configuration file failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
