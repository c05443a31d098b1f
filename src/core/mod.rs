//! Core library components.
//!
//! Everything here is usable without the CLI: parse a connection string,
//! open a connection through whatever credentials it needs, and encrypt the
//! secrets a generated runtime will read back at startup.

pub mod cipher;
pub mod config;
pub mod connect;
pub mod constants;
pub mod credentials;
pub mod env;
pub mod grammar;
pub mod types;
