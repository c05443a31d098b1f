//! dbseal - secure database connection provisioning.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dbseal::cli::output;
use dbseal::cli::{execute, load_config, Cli};
use dbseal::error::{CipherError, ConfigError, Error, GrammarError, InstallError, TunnelError};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("DBSEAL_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("dbseal=debug")
        } else {
            EnvFilter::new("dbseal=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    let result =
        load_config(cli.config.as_deref()).and_then(|config| execute(cli.command, &config));

    if let Err(e) = result {
        output::error(&e.to_string());
        if let Some(hint) = suggestion(&e) {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}

fn suggestion(e: &Error) -> Option<&'static str> {
    match e {
        Error::Cipher(CipherError::InvalidKey(_)) => Some("generate a key with: dbseal keygen"),
        Error::Cipher(CipherError::Authentication) => {
            Some("check that the key matches the one the value was encrypted with")
        }
        Error::Install(InstallError::MissingKeySlot(_)) => {
            Some("add an empty key assignment to the template, e.g. CYPHER_TEXT = ''")
        }
        Error::Grammar(GrammarError::UnsupportedCombination { .. }) => {
            Some("ssl:// and ssh:// strings only combine with mysql://")
        }
        Error::Tunnel(TunnelError::Auth { .. }) => Some("check the ssh user and credentials"),
        Error::Config(ConfigError::Parse(_)) => Some("check the syntax of dbseal.toml"),
        _ => None,
    }
}
