//! Install-time secret encryption.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::template::{AnchorSlot, Assignment, EnvTemplate, InstallLayout, Quote, TemplateLine};
use crate::core::cipher::{self, SecretKey};
use crate::core::grammar::ConnectionDescriptor;
use crate::core::types::OrderedParams;
use crate::error::{InstallError, Result};

/// Plaintext values to encrypt into a generated file.
#[derive(Clone, Default)]
pub struct InstallSecrets {
    pub connection_string: String,
    /// Emitted in this order after the database connection anchor.
    pub db_params: OrderedParams,
    /// Emitted after `db_params` when present and non-empty.
    pub secure_db_params: Option<OrderedParams>,
    pub uid_generation_method: String,
}

impl InstallSecrets {
    /// Secrets for `descriptor`, with variables named the way the generated
    /// runtime expects them.
    pub fn from_descriptor(
        connection_string: impl Into<String>,
        descriptor: &ConnectionDescriptor,
        uid_generation_method: impl Into<String>,
    ) -> Self {
        Self {
            connection_string: connection_string.into(),
            db_params: descriptor.db_params(),
            secure_db_params: descriptor.secure_params(),
            uid_generation_method: uid_generation_method.into(),
        }
    }
}

impl std::fmt::Debug for InstallSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |params: &OrderedParams| -> Vec<String> {
            params.iter().map(|(name, _)| name.clone()).collect()
        };
        f.debug_struct("InstallSecrets")
            .field("db_params", &names(&self.db_params))
            .field("secure_db_params", &self.secure_db_params.as_ref().map(names))
            .finish_non_exhaustive()
    }
}

/// What a render changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Template literals replaced by their encrypted form.
    pub encrypted_literals: usize,
    /// Assignment lines appended after anchors.
    pub appended: usize,
}

/// Result of [`EnvironmentSecretInstaller::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub output: PathBuf,
    pub stats: RenderStats,
}

/// Renders a template into its installed form.
pub struct EnvWriter<'a> {
    layout: &'a InstallLayout,
    key: &'a SecretKey,
}

impl<'a> EnvWriter<'a> {
    pub fn new(layout: &'a InstallLayout, key: &'a SecretKey) -> Self {
        Self { layout, key }
    }

    /// Render `template`.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::MissingKeySlot` if the template has no
    /// assignment for the key variable.
    pub fn render(
        &self,
        template: &EnvTemplate,
        secrets: &InstallSecrets,
    ) -> Result<(String, RenderStats)> {
        if !template.has_key_slot() {
            return Err(InstallError::MissingKeySlot(self.layout.key_variable.clone()).into());
        }

        let mut out = String::new();
        let mut stats = RenderStats::default();

        for line in template.lines() {
            match line {
                TemplateLine::Verbatim(text) => out.push_str(text),

                TemplateLine::KeySlot(slot) => {
                    out.push_str(&slot.with_value(self.key.to_hex()).render());
                }

                TemplateLine::Assignment(assignment) => {
                    let encrypted = cipher::encrypt_str(self.key, &assignment.value)?;
                    out.push_str(&assignment.with_value(encrypted).render());
                    stats.encrypted_literals += 1;
                }

                TemplateLine::Anchor { slot, text } => {
                    out.push_str(text);
                    let statements = self.statements(*slot, secrets);
                    if statements.is_empty() {
                        continue;
                    }
                    let eol = if text.ends_with("\r\n") { "\r\n" } else { "\n" };
                    if !text.ends_with('\n') {
                        out.push_str(eol);
                    }
                    let indent = &text[..text.len() - text.trim_start().len()];
                    for (name, value) in statements {
                        out.push_str(&self.statement(indent, name, value, eol)?);
                        stats.appended += 1;
                    }
                }
            }
        }

        Ok((out, stats))
    }

    fn statements<'s>(
        &self,
        slot: AnchorSlot,
        secrets: &'s InstallSecrets,
    ) -> Vec<(&'s str, &'s str)>
    where
        'a: 's,
    {
        let pairs = |params: &'s OrderedParams| {
            params
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect::<Vec<_>>()
        };

        match slot {
            AnchorSlot::DatabaseStart => {
                vec![(self.layout.connection_variable.as_str(), secrets.connection_string.as_str())]
            }
            AnchorSlot::DatabaseConnection => {
                let mut all = pairs(&secrets.db_params);
                if let Some(secure) = &secrets.secure_db_params {
                    all.extend(pairs(secure));
                }
                all
            }
            AnchorSlot::UidGeneration => {
                vec![(self.layout.uid_variable.as_str(), secrets.uid_generation_method.as_str())]
            }
        }
    }

    fn statement(&self, indent: &str, name: &str, value: &str, eol: &str) -> Result<String> {
        let encrypted = cipher::encrypt_str(self.key, value)?;
        let line = Assignment {
            indent: indent.to_string(),
            name: name.to_string(),
            separator: " = ".to_string(),
            quote: Quote::Single,
            value: encrypted,
            tail: eol.to_string(),
        };
        Ok(line.render())
    }
}

/// Writes encrypted environment files from templates.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSecretInstaller {
    layout: InstallLayout,
}

impl EnvironmentSecretInstaller {
    pub fn new(layout: InstallLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Render template text without touching the filesystem.
    pub fn render(
        &self,
        template: &str,
        key: &SecretKey,
        secrets: &InstallSecrets,
    ) -> Result<(String, RenderStats)> {
        let template = EnvTemplate::parse(template, &self.layout);
        EnvWriter::new(&self.layout, key).render(&template, secrets)
    }

    /// Read `template`, encrypt it, and atomically replace `output`.
    ///
    /// `template` and `output` may be the same path.
    ///
    /// # Errors
    ///
    /// - `InstallError::Read` if the template cannot be read
    /// - `InstallError::MissingKeySlot` if the key variable is absent
    /// - `InstallError::Persist` if the output cannot be written
    pub fn install(
        &self,
        template: &Path,
        output: &Path,
        key: &SecretKey,
        secrets: &InstallSecrets,
    ) -> Result<InstallReport> {
        debug!(
            template = %template.display(),
            output = %output.display(),
            "installing environment"
        );

        let text = std::fs::read_to_string(template).map_err(|source| InstallError::Read {
            path: template.to_path_buf(),
            source,
        })?;

        let (rendered, stats) = self.render(&text, key, secrets)?;
        write_atomic(output, rendered.as_bytes())?;

        info!(
            output = %output.display(),
            encrypted = stats.encrypted_literals,
            appended = stats.appended,
            "environment installed"
        );

        Ok(InstallReport {
            output: output.to_path_buf(),
            stats,
        })
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let persist_err = |source: std::io::Error| InstallError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".dbseal-")
        .tempfile_in(dir)
        .map_err(persist_err)?;
    tmp.write_all(contents).map_err(persist_err)?;

    // Set before the rename so a failure leaves the target untouched
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(persist_err)?;
    }

    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;

    Ok(())
}

/// Read the quoted assignments of a generated file, in file order.
///
/// # Errors
///
/// Returns `InstallError::Read` if the file cannot be read.
pub fn load_assignments(path: &Path) -> Result<OrderedParams> {
    let text = std::fs::read_to_string(path).map_err(|source| InstallError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(text
        .lines()
        .filter_map(Assignment::parse)
        .map(|a| (a.name, a.value))
        .collect())
}
