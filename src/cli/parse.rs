//! Parse command.
//!
//! Shows the descriptor a connection string produces and the variables it
//! would contribute to a generated environment.

use crate::cli::output;
use crate::core::grammar::{self, ParsedUri};
use crate::core::types::OrderedParams;
use crate::error::Result;

const MASK: &str = "********";

/// Parse `uri`, optionally combined with a secure channel string.
pub fn execute(uri: &str, secure: Option<&str>, json: bool, show_secrets: bool) -> Result<()> {
    let (kind, scheme, params) = match secure {
        Some(secure) => {
            let descriptor = grammar::parse_connection(uri, Some(secure))?;
            let mut params = descriptor.db_params();
            params.extend(descriptor.secure_params().unwrap_or_default());
            (descriptor.variant(), descriptor.scheme(), params)
        }
        None => match grammar::parse(uri)? {
            ParsedUri::Database(descriptor) => {
                (descriptor.variant(), descriptor.scheme(), descriptor.db_params())
            }
            ParsedUri::Secure(channel) => (channel.kind(), channel.scheme(), channel.env_params()),
        },
    };

    let params = if show_secrets { params } else { masked(params) };

    if json {
        let params: Vec<_> = params
            .iter()
            .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
            .collect();
        let output = serde_json::json!({
            "variant": kind,
            "scheme": scheme,
            "params": params,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    output::header(kind);
    for (name, value) in &params {
        output::kv(name, value);
    }
    Ok(())
}

/// Whether a variable carries a password or key material.
pub fn is_secret_param(name: &str) -> bool {
    name.ends_with("_password") || name.ends_with("_bytes")
}

fn masked(params: OrderedParams) -> OrderedParams {
    params
        .into_iter()
        .map(|(name, value)| {
            if is_secret_param(&name) {
                (name, MASK.to_string())
            } else {
                (name, value)
            }
        })
        .collect()
}
