//! Run command.
//!
//! Decrypts a generated environment file the way the generated runtime
//! would at startup, then runs a command with the result in its env.

use std::path::Path;

use tracing::debug;
use zeroize::Zeroizing;

use crate::core::config::Config;
use crate::core::env::{load_assignments, MemoryEnvironment};
use crate::error::Result;

/// Run `command` and exit with its status.
pub fn execute(config: &Config, env_file: &Path, command: &[String]) -> Result<()> {
    let exit_code = run_with_env(config, env_file, command)?;
    std::process::exit(exit_code);
}

/// Run `command` with the decrypted variables of `env_file` added to its env.
pub fn run_with_env(config: &Config, env_file: &Path, command: &[String]) -> Result<i32> {
    let Some((program, args)) = command.split_first() else {
        return Ok(0);
    };

    let mut env: MemoryEnvironment = load_assignments(env_file)?.into_iter().collect();
    let report = config.decryptor().run(&mut env)?;
    debug!(
        key_found = report.key_found,
        decrypted = report.decrypted.len(),
        "environment prepared"
    );

    let mut cmd = std::process::Command::new(program);
    cmd.args(args);
    for (name, value) in env.into_vars() {
        let value = Zeroizing::new(value);
        cmd.env(name, value.as_str());
    }

    let status = cmd.status()?;
    Ok(status.code().unwrap_or(1))
}
