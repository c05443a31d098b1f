//! Probe command.
//!
//! Opens a real connection through whatever credentials the string needs,
//! pings it, and closes it again.

use crate::cli::output;
use crate::core::config::Config;
use crate::core::connect::SecureConnectionFactory;
use crate::core::grammar;
use crate::error::Result;

pub fn execute(config: &Config, uri: &str, secure: Option<&str>) -> Result<()> {
    let descriptor = grammar::parse_connection(uri, secure)?;
    let factory = SecureConnectionFactory::new(config.materializer());

    let mut handle = factory.connect(&descriptor)?;
    if let Some(tunnel) = handle.tunnel() {
        let (host, port) = tunnel.remote();
        output::kv("tunnel", format!("{} -> {}:{}", tunnel.local_addr(), host, port));
    }

    let pinged = handle.ping();
    let closed = handle.close();
    pinged?;
    closed?;

    output::success(&format!("{} connection ok", descriptor.variant()));
    Ok(())
}
