//! Typed connection descriptors produced by the grammar parser.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::core::types::{OrderedParams, Sensitive};
use crate::error::{GrammarError, Result};

/// `user:password@host:port/schema` endpoint shared by MySQL, MariaDB and
/// SQL Server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub user: String,
    pub password: Sensitive<String>,
    pub host: String,
    pub port: u16,
    pub schema: String,
}

/// PostgreSQL endpoint with its `search_path` schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresEndpoint {
    pub user: String,
    pub password: Sensitive<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: String,
}

/// Raw (decoded) TLS material plus the hostname to verify against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslParams {
    pub hostname: String,
    pub ca: Vec<u8>,
    pub cert: Vec<u8>,
    pub key: Sensitive<Vec<u8>>,
}

/// SSH jump host reached with a private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyParams {
    pub user: String,
    pub host: String,
    pub port: u16,
    /// Key file contents (usually PEM text).
    pub private_key: Sensitive<Vec<u8>>,
    /// `0` lets the OS pick a free port.
    pub local_bind_port: u16,
}

/// SSH jump host reached with a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshPasswordParams {
    pub user: String,
    pub password: Sensitive<String>,
    pub host: String,
    pub port: u16,
    pub local_bind_port: u16,
}

/// Parameters parsed from an `ssl://` or `ssh://` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecureChannel {
    Ssl(SslParams),
    SshPublicKey(SshKeyParams),
    SshPassword(SshPasswordParams),
}

impl SecureChannel {
    pub fn scheme(&self) -> &'static str {
        match self {
            SecureChannel::Ssl(_) => "ssl",
            SecureChannel::SshPublicKey(_) | SecureChannel::SshPassword(_) => "ssh",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SecureChannel::Ssl(_) => "SSL",
            SecureChannel::SshPublicKey(_) => "SSHPublicKey",
            SecureChannel::SshPassword(_) => "SSHPassword",
        }
    }

    /// Variables the generated runtime reads to rebuild this channel.
    ///
    /// Byte fields are base64 text so they survive an environment file.
    pub fn env_params(&self) -> OrderedParams {
        match self {
            SecureChannel::Ssl(ssl) => vec![
                ("ssl_ca_bytes".into(), STANDARD.encode(&ssl.ca)),
                ("ssl_cert_bytes".into(), STANDARD.encode(&ssl.cert)),
                ("ssl_key_bytes".into(), STANDARD.encode(ssl.key.expose())),
                ("ssl_hostname".into(), ssl.hostname.clone()),
            ],
            SecureChannel::SshPublicKey(ssh) => vec![
                ("ssh_user".into(), ssh.user.clone()),
                ("ssh_host".into(), ssh.host.clone()),
                ("ssh_port".into(), ssh.port.to_string()),
                ("ssh_key_bytes".into(), STANDARD.encode(ssh.private_key.expose())),
                ("ssh_local_bind_port".into(), ssh.local_bind_port.to_string()),
            ],
            SecureChannel::SshPassword(ssh) => vec![
                ("ssh_user".into(), ssh.user.clone()),
                ("ssh_password".into(), ssh.password.expose().clone()),
                ("ssh_host".into(), ssh.host.clone()),
                ("ssh_port".into(), ssh.port.to_string()),
                ("ssh_local_bind_port".into(), ssh.local_bind_port.to_string()),
            ],
        }
    }
}

/// Everything needed to open one database connection.
///
/// Exactly one variant is active per connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    PlainMySql(ServerEndpoint),
    SslMySql {
        endpoint: ServerEndpoint,
        ssl: SslParams,
    },
    SshPublicKeyMySql {
        endpoint: ServerEndpoint,
        ssh: SshKeyParams,
    },
    SshPasswordMySql {
        endpoint: ServerEndpoint,
        ssh: SshPasswordParams,
    },
    Postgres(PostgresEndpoint),
    SqlServer(ServerEndpoint),
    MariaDb(ServerEndpoint),
}

impl ConnectionDescriptor {
    /// Stable variant tag used in errors and logs.
    pub fn variant(&self) -> &'static str {
        match self {
            ConnectionDescriptor::PlainMySql(_) => "PlainMySQL",
            ConnectionDescriptor::SslMySql { .. } => "SSLMySQL",
            ConnectionDescriptor::SshPublicKeyMySql { .. } => "SSHPublicKeyMySQL",
            ConnectionDescriptor::SshPasswordMySql { .. } => "SSHPasswordMySQL",
            ConnectionDescriptor::Postgres(_) => "Postgres",
            ConnectionDescriptor::SqlServer(_) => "SQLServer",
            ConnectionDescriptor::MariaDb(_) => "MariaDB",
        }
    }

    /// URI scheme the descriptor was parsed from.
    pub fn scheme(&self) -> &'static str {
        match self {
            ConnectionDescriptor::PlainMySql(_)
            | ConnectionDescriptor::SslMySql { .. }
            | ConnectionDescriptor::SshPublicKeyMySql { .. }
            | ConnectionDescriptor::SshPasswordMySql { .. } => "mysql",
            ConnectionDescriptor::Postgres(_) => "postgresql",
            ConnectionDescriptor::SqlServer(_) => "mssql",
            ConnectionDescriptor::MariaDb(_) => "mariadb",
        }
    }

    /// Attach a secure channel to a plain MySQL descriptor.
    ///
    /// # Errors
    ///
    /// Returns `GrammarError::UnsupportedCombination` for any other variant.
    pub fn secure(self, channel: SecureChannel) -> Result<Self> {
        let endpoint = match self {
            ConnectionDescriptor::PlainMySql(endpoint) => endpoint,
            other => {
                return Err(GrammarError::UnsupportedCombination {
                    channel: channel.scheme(),
                    endpoint: other.variant(),
                }
                .into())
            }
        };

        Ok(match channel {
            SecureChannel::Ssl(ssl) => ConnectionDescriptor::SslMySql { endpoint, ssl },
            SecureChannel::SshPublicKey(ssh) => {
                ConnectionDescriptor::SshPublicKeyMySql { endpoint, ssh }
            }
            SecureChannel::SshPassword(ssh) => {
                ConnectionDescriptor::SshPasswordMySql { endpoint, ssh }
            }
        })
    }

    /// The secure channel carried by this descriptor, if any.
    pub fn channel(&self) -> Option<SecureChannel> {
        match self {
            ConnectionDescriptor::SslMySql { ssl, .. } => Some(SecureChannel::Ssl(ssl.clone())),
            ConnectionDescriptor::SshPublicKeyMySql { ssh, .. } => {
                Some(SecureChannel::SshPublicKey(ssh.clone()))
            }
            ConnectionDescriptor::SshPasswordMySql { ssh, .. } => {
                Some(SecureChannel::SshPassword(ssh.clone()))
            }
            _ => None,
        }
    }

    /// Per-parameter database variables for the generated environment.
    pub fn db_params(&self) -> OrderedParams {
        match self {
            ConnectionDescriptor::PlainMySql(endpoint)
            | ConnectionDescriptor::SslMySql { endpoint, .. }
            | ConnectionDescriptor::SshPublicKeyMySql { endpoint, .. }
            | ConnectionDescriptor::SshPasswordMySql { endpoint, .. } => {
                server_params("mysql", endpoint)
            }
            ConnectionDescriptor::SqlServer(endpoint) => server_params("mssql", endpoint),
            ConnectionDescriptor::MariaDb(endpoint) => server_params("mariadb", endpoint),
            ConnectionDescriptor::Postgres(pg) => vec![
                ("pgsql_user".into(), pg.user.clone()),
                ("pgsql_password".into(), pg.password.expose().clone()),
                ("pgsql_host".into(), pg.host.clone()),
                ("pgsql_port".into(), pg.port.to_string()),
                ("pgsql_database_name".into(), pg.database.clone()),
                ("pgsql_schema".into(), pg.schema.clone()),
            ],
        }
    }

    /// Secure-channel variables, `None` for direct connections.
    pub fn secure_params(&self) -> Option<OrderedParams> {
        self.channel().map(|channel| channel.env_params())
    }
}

fn server_params(prefix: &str, endpoint: &ServerEndpoint) -> OrderedParams {
    vec![
        (format!("{}_user", prefix), endpoint.user.clone()),
        (format!("{}_password", prefix), endpoint.password.expose().clone()),
        (format!("{}_host", prefix), endpoint.host.clone()),
        (format!("{}_port", prefix), endpoint.port.to_string()),
        (format!("{}_schema", prefix), endpoint.schema.clone()),
    ]
}

/// Outcome of parsing one connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedUri {
    Database(ConnectionDescriptor),
    Secure(SecureChannel),
}
