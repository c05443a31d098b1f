//! Constants used throughout dbseal.
//!
//! Centralizes reserved names, anchors and wire-format sizes.

/// Configuration file name (dbseal.toml).
pub const CONFIG_FILE: &str = "dbseal.toml";

/// Environment variable holding the hex bootstrap key in generated files.
pub const KEY_VARIABLE: &str = "CYPHER_TEXT";

/// Environment variable receiving the encrypted main connection string.
pub const CONNECTION_VARIABLE: &str = "main_db_conn";

/// Environment variable receiving the encrypted UID-generation mode.
pub const UID_VARIABLE: &str = "id_generation_method";

/// Anchor after which the main connection string is appended.
pub const ANCHOR_DATABASE_START: &str = "# Database start configuration #";

/// Anchor after which per-parameter database variables are appended.
pub const ANCHOR_DATABASE_CONNECTION: &str = "# Configuration for database connection #";

/// Anchor after which the UID-generation mode is appended.
pub const ANCHOR_UID_GENERATION: &str = "# UID Generation Type #";

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Width of base64 body lines in PEM output.
pub const PEM_LINE_WIDTH: usize = 64;

/// SSH keepalive interval in seconds.
pub const TUNNEL_KEEPALIVE_SECS: u32 = 10;

/// Default local address tunnels listen on.
pub const TUNNEL_BIND_HOST: &str = "127.0.0.1";
