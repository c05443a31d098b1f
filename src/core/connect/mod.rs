//! Secure connection factory.
//!
//! Dispatches on the descriptor variant, materializes whatever credentials
//! that variant needs, and hands back a caller-owned [`ConnectionHandle`].
//! The drivers are async; each handle owns a current-thread runtime so the
//! public API stays blocking.

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use crate::core::credentials::{CredentialMaterializer, SshAuth, TunnelHandle};
use crate::core::grammar::{ConnectionDescriptor, PostgresEndpoint, ServerEndpoint};
use crate::error::{BoxError, ConnectionError, Result};

/// SQL Server client type used by [`DatabaseSession::SqlServer`].
pub type SqlServerClient = tiberius::Client<Compat<tokio::net::TcpStream>>;

/// The live driver connection inside a handle.
pub enum DatabaseSession {
    /// MySQL and MariaDB.
    MySql(MySqlConnection),
    Postgres(PgConnection),
    SqlServer(Box<SqlServerClient>),
}

impl std::fmt::Debug for DatabaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            DatabaseSession::MySql(_) => "MySql",
            DatabaseSession::Postgres(_) => "Postgres",
            DatabaseSession::SqlServer(_) => "SqlServer",
        };
        f.debug_tuple("DatabaseSession").field(&kind).finish()
    }
}

/// An open database connection, plus the tunnel it travels through if any.
///
/// The tunnel lives exactly as long as the handle.
#[derive(Debug)]
pub struct ConnectionHandle {
    variant: &'static str,
    session: DatabaseSession,
    tunnel: Option<TunnelHandle>,
    runtime: Runtime,
}

impl ConnectionHandle {
    /// Descriptor variant this handle was opened for.
    pub fn variant(&self) -> &'static str {
        self.variant
    }

    /// The tunnel carrying this connection, for SSH variants.
    pub fn tunnel(&self) -> Option<&TunnelHandle> {
        self.tunnel.as_ref()
    }

    /// Runtime and session, for driving queries:
    ///
    /// ```ignore
    /// let (rt, session) = handle.parts_mut();
    /// if let DatabaseSession::MySql(conn) = session {
    ///     rt.block_on(sqlx::query("SELECT 1").execute(conn))?;
    /// }
    /// ```
    pub fn parts_mut(&mut self) -> (&Runtime, &mut DatabaseSession) {
        (&self.runtime, &mut self.session)
    }

    /// Round-trip to the server.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` tagged with the variant.
    pub fn ping(&mut self) -> Result<()> {
        let variant = self.variant;
        let (runtime, session) = self.parts_mut();

        let result: std::result::Result<(), BoxError> = runtime.block_on(async {
            match session {
                DatabaseSession::MySql(conn) => conn.ping().await?,
                DatabaseSession::Postgres(conn) => conn.ping().await?,
                DatabaseSession::SqlServer(client) => {
                    client.simple_query("SELECT 1").await?.into_results().await?;
                }
            }
            Ok(())
        });

        result.map_err(|e| ConnectionError::new(variant, e).into())
    }

    /// Close the database session, then the tunnel.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the driver reports a failure while
    /// closing. The tunnel is closed regardless.
    pub fn close(self) -> Result<()> {
        let Self {
            variant,
            session,
            tunnel,
            runtime,
        } = self;

        let result = runtime.block_on(close_session(session));
        if let Some(tunnel) = tunnel {
            tunnel.close();
        }

        debug!(variant, "connection closed");
        result.map_err(|e| ConnectionError::new(variant, e).into())
    }
}

async fn close_session(session: DatabaseSession) -> std::result::Result<(), BoxError> {
    match session {
        DatabaseSession::MySql(conn) => conn.close().await?,
        DatabaseSession::Postgres(conn) => conn.close().await?,
        DatabaseSession::SqlServer(client) => client.close().await?,
    }
    Ok(())
}

/// Opens connections for descriptors.
#[derive(Debug, Clone, Default)]
pub struct SecureConnectionFactory {
    materializer: CredentialMaterializer,
}

impl SecureConnectionFactory {
    pub fn new(materializer: CredentialMaterializer) -> Self {
        Self { materializer }
    }

    pub fn materializer(&self) -> &CredentialMaterializer {
        &self.materializer
    }

    /// Open a connection for `descriptor`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError` tagged with the variant when the driver fails
    /// - `TunnelError` when an SSH tunnel cannot be opened
    /// - `CredentialError` when PEM files cannot be written or removed
    pub fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<ConnectionHandle> {
        let variant = descriptor.variant();
        debug!(variant, "connecting");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ConnectionError::new(variant, e))?;

        let connect_err = |e: sqlx::Error| ConnectionError::new(variant, e);
        let mut tunnel = None;

        let session = match descriptor {
            ConnectionDescriptor::PlainMySql(endpoint)
            | ConnectionDescriptor::MariaDb(endpoint) => {
                let options = mysql_options(endpoint, &endpoint.host, endpoint.port);
                DatabaseSession::MySql(runtime.block_on(options.connect()).map_err(connect_err)?)
            }

            ConnectionDescriptor::SslMySql { endpoint, ssl } => {
                let material =
                    self.materializer
                        .materialize_ssl(&ssl.ca, &ssl.cert, ssl.key.expose())?;

                let options = mysql_options(endpoint, &ssl.hostname, endpoint.port)
                    .ssl_mode(MySqlSslMode::VerifyIdentity)
                    .ssl_ca(material.ca_path())
                    .ssl_client_cert(material.cert_path())
                    .ssl_client_key(material.key_path());

                let connected = runtime.block_on(options.connect());
                let released = material.release();

                let conn = connected.map_err(connect_err)?;
                released?;
                DatabaseSession::MySql(conn)
            }

            ConnectionDescriptor::SshPublicKeyMySql { endpoint, ssh } => {
                let opened = self.materializer.open_ssh_tunnel(
                    &ssh.host,
                    ssh.port,
                    &ssh.user,
                    SshAuth::PrivateKey(ssh.private_key.clone()),
                    &endpoint.host,
                    endpoint.port,
                    ssh.local_bind_port,
                )?;
                let conn = connect_through(&runtime, endpoint, &opened).map_err(connect_err)?;
                tunnel = Some(opened);
                DatabaseSession::MySql(conn)
            }

            ConnectionDescriptor::SshPasswordMySql { endpoint, ssh } => {
                let opened = self.materializer.open_ssh_tunnel(
                    &ssh.host,
                    ssh.port,
                    &ssh.user,
                    SshAuth::Password(ssh.password.clone()),
                    &endpoint.host,
                    endpoint.port,
                    ssh.local_bind_port,
                )?;
                let conn = connect_through(&runtime, endpoint, &opened).map_err(connect_err)?;
                tunnel = Some(opened);
                DatabaseSession::MySql(conn)
            }

            ConnectionDescriptor::Postgres(pg) => {
                let conn = runtime
                    .block_on(postgres_options(pg).connect())
                    .map_err(connect_err)?;
                DatabaseSession::Postgres(conn)
            }

            ConnectionDescriptor::SqlServer(endpoint) => {
                let client = runtime
                    .block_on(connect_sql_server(endpoint))
                    .map_err(|e| ConnectionError::new(variant, e))?;
                DatabaseSession::SqlServer(Box::new(client))
            }
        };

        debug!(variant, tunneled = tunnel.is_some(), "connected");

        Ok(ConnectionHandle {
            variant,
            session,
            tunnel,
            runtime,
        })
    }
}

fn mysql_options(endpoint: &ServerEndpoint, host: &str, port: u16) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(&endpoint.user)
        .password(endpoint.password.expose())
        .database(&endpoint.schema)
}

fn postgres_options(pg: &PostgresEndpoint) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&pg.host)
        .port(pg.port)
        .username(&pg.user)
        .password(pg.password.expose())
        .database(&pg.database)
        .options([("search_path", format!("{},public", pg.schema))])
}

fn connect_through(
    runtime: &Runtime,
    endpoint: &ServerEndpoint,
    tunnel: &TunnelHandle,
) -> std::result::Result<MySqlConnection, sqlx::Error> {
    let local = tunnel.local_addr();
    let host = if local.ip().is_unspecified() {
        "127.0.0.1".to_string()
    } else {
        local.ip().to_string()
    };

    let result = runtime.block_on(mysql_options(endpoint, &host, local.port()).connect());
    if let Err(e) = &result {
        warn!(error = %e, local = %local, "connect through tunnel failed");
    }
    result
}

async fn connect_sql_server(
    endpoint: &ServerEndpoint,
) -> std::result::Result<SqlServerClient, BoxError> {
    let mut config = tiberius::Config::new();
    config.host(&endpoint.host);
    config.port(endpoint.port);
    config.database(&endpoint.schema);
    config.authentication(tiberius::AuthMethod::sql_server(
        &endpoint.user,
        endpoint.password.expose(),
    ));
    config.trust_cert();

    let tcp = tokio::net::TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;

    Ok(tiberius::Client::connect(config, tcp.compat_write()).await?)
}

/// A caller-owned connection opened on first use.
///
/// Replaces a process-wide cached connection: whoever holds the value owns
/// the connection, and `&mut` access rules out racing initializers.
#[derive(Debug)]
pub struct LazyConnection {
    factory: SecureConnectionFactory,
    descriptor: ConnectionDescriptor,
    handle: Option<ConnectionHandle>,
}

impl LazyConnection {
    pub fn new(factory: SecureConnectionFactory, descriptor: ConnectionDescriptor) -> Self {
        Self {
            factory,
            descriptor,
            handle: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// The open connection, connecting first if needed.
    ///
    /// # Errors
    ///
    /// Fails as [`SecureConnectionFactory::connect`]; a failed attempt leaves
    /// nothing cached, so the next call tries again.
    pub fn get(&mut self) -> Result<&mut ConnectionHandle> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => self.factory.connect(&self.descriptor)?,
        };
        Ok(self.handle.insert(handle))
    }

    /// Close the cached connection, if any.
    pub fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.close(),
            None => Ok(()),
        }
    }
}
