//! Ephemeral credential material.
//!
//! Turns descriptor bytes into what a driver can actually use: PEM files on
//! disk for TLS, or a forwarded local port for SSH. Every artifact is owned
//! by a guard and disappears when the guard goes away.

pub mod files;
pub mod pem;
pub mod tunnel;

use std::path::{Path, PathBuf};

use tracing::debug;

pub use files::{CredentialFile, SslMaterial};
pub use pem::{format_pem, PemLabel};
pub use tunnel::{open_ssh_tunnel, SshAuth, TunnelHandle, TunnelSpec};

use crate::core::constants::TUNNEL_BIND_HOST;
use crate::error::Result;

/// Writes PEM files and opens tunnels on behalf of one connection attempt.
#[derive(Debug, Clone)]
pub struct CredentialMaterializer {
    dir: PathBuf,
    bind_host: String,
}

impl Default for CredentialMaterializer {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl CredentialMaterializer {
    /// Materialize files under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            bind_host: TUNNEL_BIND_HOST.to_string(),
        }
    }

    /// Listen for tunnel clients on `host` instead of loopback.
    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bind_host(&self) -> &str {
        &self.bind_host
    }

    /// Write the CA, client certificate and client key as PEM files.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Write`; files written before the failure
    /// are deleted.
    pub fn materialize_ssl(&self, ca: &[u8], cert: &[u8], key: &[u8]) -> Result<SslMaterial> {
        let ca = CredentialFile::write(&self.dir, "ca", ca, PemLabel::Certificate)?;
        let cert = CredentialFile::write(&self.dir, "cert", cert, PemLabel::Certificate)?;
        let key = CredentialFile::write(&self.dir, "key", key, PemLabel::PrivateKey)?;

        debug!(dir = %self.dir.display(), "ssl material written");
        Ok(SslMaterial::new(ca, cert, key))
    }

    /// Open a tunnel to `remote_host:remote_port` through `ssh_host`.
    ///
    /// # Errors
    ///
    /// Returns `TunnelError` as described on [`open_ssh_tunnel`].
    #[allow(clippy::too_many_arguments)]
    pub fn open_ssh_tunnel(
        &self,
        ssh_host: &str,
        ssh_port: u16,
        ssh_user: &str,
        auth: SshAuth,
        remote_host: &str,
        remote_port: u16,
        local_bind_port: u16,
    ) -> Result<TunnelHandle> {
        open_ssh_tunnel(&TunnelSpec {
            ssh_host: ssh_host.to_string(),
            ssh_port,
            ssh_user: ssh_user.to_string(),
            auth,
            remote_host: remote_host.to_string(),
            remote_port,
            bind_host: self.bind_host.clone(),
            local_bind_port,
        })
    }
}
