//! Command-line interface.

pub mod completions;
pub mod install;
pub mod output;
pub mod parse;
pub mod probe;
pub mod run;
pub mod secret;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::core::config::Config;
use crate::error::Result;

/// dbseal - secure database connection provisioning.
#[derive(Parser)]
#[command(
    name = "dbseal",
    about = "Parse connection strings, open secured database connections, and seal secrets into generated environments",
    version
)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to dbseal.toml (defaults to ./dbseal.toml, then the user config dir)
    #[arg(long, global = true, env = "DBSEAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Parse a connection string and show what it describes
    Parse {
        /// Connection string (mysql://, postgresql://, mssql://, mariadb://, ssl://, ssh://)
        uri: String,
        /// ssl:// or ssh:// string to combine with a mysql:// URI
        #[arg(long)]
        secure: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Print passwords and key material instead of masking them
        #[arg(long)]
        show_secrets: bool,
    },

    /// Generate a fresh 32-byte key as hex
    Keygen,

    /// Encrypt a value (read from stdin when omitted)
    Encrypt {
        value: Option<String>,
        /// Hex key
        #[arg(long, env = "DBSEAL_KEY", hide_env_values = true)]
        key: String,
    },

    /// Decrypt a value (read from stdin when omitted)
    Decrypt {
        value: Option<String>,
        /// Hex key
        #[arg(long, env = "DBSEAL_KEY", hide_env_values = true)]
        key: String,
    },

    /// Encrypt a template into a generated environment file
    Install {
        /// Template to read
        #[arg(long)]
        template: PathBuf,
        /// File to write (defaults to rewriting the template in place)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Main database connection string
        #[arg(long)]
        connection: String,
        /// ssl:// or ssh:// string for the connection
        #[arg(long)]
        secure: Option<String>,
        /// UID generation method embedded for the generated runtime
        #[arg(long, default_value = "uuid")]
        uid: String,
        /// Extra NAME=value parameter appended after the database parameters
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },

    /// Open a connection, ping it, and close it
    Probe {
        /// Connection string
        uri: String,
        /// ssl:// or ssh:// string to combine with a mysql:// URI
        #[arg(long)]
        secure: Option<String>,
    },

    /// Run a command with a generated environment file decrypted into its env
    Run {
        /// Generated environment file
        #[arg(long)]
        env_file: PathBuf,
        /// Command and arguments to run
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Resolve and load the configuration.
///
/// An explicit path must exist. Otherwise `./dbseal.toml` is tried, then
/// `dbseal/dbseal.toml` under the user config dir, then the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path);
    }

    let local = Config::config_path();
    if local.exists() {
        return Config::load(&local);
    }

    let user_config = dirs::config_dir()
        .map(|dir| dir.join("dbseal").join(crate::core::constants::CONFIG_FILE));
    match user_config {
        Some(path) => Config::load_or_default(&path),
        None => {
            debug!("no user config dir, using defaults");
            Ok(Config::default())
        }
    }
}

/// Execute a command.
pub fn execute(command: Command, config: &Config) -> Result<()> {
    use Command::*;

    match command {
        Parse {
            uri,
            secure,
            json,
            show_secrets,
        } => parse::execute(&uri, secure.as_deref(), json, show_secrets),
        Keygen => secret::keygen(),
        Encrypt { value, key } => secret::encrypt(value, &key),
        Decrypt { value, key } => secret::decrypt(value, &key),
        Install {
            template,
            output,
            connection,
            secure,
            uid,
            params,
        } => {
            let output = output.unwrap_or_else(|| template.clone());
            install::execute(
                config,
                install::InstallArgs {
                    template: &template,
                    output: &output,
                    connection: &connection,
                    secure: secure.as_deref(),
                    uid: &uid,
                    params: &params,
                },
            )
        }
        Probe { uri, secure } => probe::execute(config, &uri, secure.as_deref()),
        Run { env_file, command } => run::execute(config, &env_file, &command),
        Completions { shell } => completions::execute(shell),
    }
}
