//! Scoped temporary credential files.
//!
//! Each file is created with owner-only permissions and deleted when its
//! guard is released or dropped, whichever comes first.

use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use super::pem::{format_pem, is_armored, PemLabel};
use crate::error::{CredentialError, Result};

/// A PEM file on disk that lives exactly as long as this guard.
#[derive(Debug)]
pub struct CredentialFile {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl CredentialFile {
    /// Write `bytes` into a fresh file under `dir`.
    ///
    /// Armored input is written unchanged so bundles and key labels such as
    /// `RSA PRIVATE KEY` survive; raw DER is framed with `label`.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Write`; nothing is left on disk.
    pub fn write(dir: &Path, name: &'static str, bytes: &[u8], label: PemLabel) -> Result<Self> {
        let write_err = |source| CredentialError::Write { name, source };

        let mut file = Builder::new()
            .prefix(&format!("dbseal-{}-", name))
            .suffix(".pem")
            .tempfile_in(dir)
            .map_err(write_err)?;

        let contents = if is_armored(bytes) {
            Cow::Borrowed(bytes)
        } else {
            Cow::Owned(format_pem(bytes, label).into_bytes())
        };
        file.write_all(&contents).map_err(write_err)?;
        file.flush().map_err(write_err)?;

        let path = file.path().to_path_buf();
        debug!(name, path = %path.display(), "credential file written");

        Ok(Self {
            file: Some(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Delete` if removal fails.
    pub fn release(mut self) -> Result<()> {
        self.delete()
    }

    fn delete(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        file.close().map_err(|source| {
            CredentialError::Delete {
                path: self.path.clone(),
                source,
            }
            .into()
        })
    }
}

impl Drop for CredentialFile {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            warn!(error = %e, "credential file cleanup failed");
        }
    }
}

/// The CA, client certificate and client key PEM files for one TLS connect.
#[derive(Debug)]
pub struct SslMaterial {
    ca: CredentialFile,
    cert: CredentialFile,
    key: CredentialFile,
}

impl SslMaterial {
    pub(crate) fn new(ca: CredentialFile, cert: CredentialFile, key: CredentialFile) -> Self {
        Self { ca, cert, key }
    }

    pub fn ca_path(&self) -> &Path {
        self.ca.path()
    }

    pub fn cert_path(&self) -> &Path {
        self.cert.path()
    }

    pub fn key_path(&self) -> &Path {
        self.key.path()
    }

    /// Delete all three files.
    ///
    /// Every file is attempted; the first failure is returned.
    pub fn release(self) -> Result<()> {
        let results = [self.ca.release(), self.cert.release(), self.key.release()];
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }
}
