//! Install command.
//!
//! Generates a fresh key, encrypts the template, and writes the result.

use std::path::Path;

use crate::cli::output;
use crate::core::cipher::SecretKey;
use crate::core::config::Config;
use crate::core::env::{EnvironmentSecretInstaller, InstallSecrets};
use crate::core::env::template::is_variable_name;
use crate::core::grammar;
use crate::error::{InstallError, Result};

/// Arguments of `dbseal install`.
pub struct InstallArgs<'a> {
    pub template: &'a Path,
    pub output: &'a Path,
    pub connection: &'a str,
    pub secure: Option<&'a str>,
    pub uid: &'a str,
    pub params: &'a [String],
}

pub fn execute(config: &Config, args: InstallArgs<'_>) -> Result<()> {
    let descriptor = grammar::parse_connection(args.connection, args.secure)?;

    let mut secrets = InstallSecrets::from_descriptor(args.connection, &descriptor, args.uid);
    for param in args.params {
        secrets.db_params.push(parse_param(param)?);
    }

    let key = SecretKey::generate();
    let report = EnvironmentSecretInstaller::new(config.layout()).install(
        args.template,
        args.output,
        &key,
        &secrets,
    )?;

    output::success(&format!("installed {}", output::path(report.output.display())));
    output::kv("variant", descriptor.variant());
    output::kv("appended", report.stats.appended);
    output::kv("encrypted literals", report.stats.encrypted_literals);
    Ok(())
}

/// Split a `NAME=value` argument.
pub fn parse_param(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((name, value)) if is_variable_name(name) => Ok((name.to_string(), value.to_string())),
        _ => Err(InstallError::InvalidParam(arg.to_string()).into()),
    }
}
