//! Shared CLI output helpers.
//!
//! Color scheme (off when NO_COLOR is set or the stream is not a terminal):
//! - Green: success
//! - Red: errors
//! - Cyan: paths, hints
//! - Bold: headers, values
//! - Dim: labels

use console::{style, Term};
use std::fmt::Display;

fn colors_enabled(term: &Term) -> bool {
    std::env::var_os("NO_COLOR").is_none() && term.features().colors_supported()
}

fn stdout_colors() -> bool {
    colors_enabled(&Term::stdout())
}

/// Print a success message with checkmark.
///
/// Example: `✓ installed env.py`
pub fn success(msg: &str) {
    if stdout_colors() {
        println!("{} {}", style("✓").green(), msg);
    } else {
        println!("✓ {}", msg);
    }
}

/// Print an error message to stderr.
pub fn error(msg: &str) {
    if colors_enabled(&Term::stderr()) {
        eprintln!("{} {}", style("✗").red(), msg);
    } else {
        eprintln!("✗ {}", msg);
    }
}

/// Print a hint to stderr, under an error.
///
/// Example: `→ generate one with: dbseal keygen`
pub fn hint(msg: &str) {
    if colors_enabled(&Term::stderr()) {
        eprintln!("{} {}", style("→").cyan(), style(msg).cyan());
    } else {
        eprintln!("→ {}", msg);
    }
}

/// Print a bold header.
pub fn header(title: &str) {
    if stdout_colors() {
        println!("{}", style(title).bold());
    } else {
        println!("{}", title);
    }
}

/// Print a key-value pair (label dim, value bold).
///
/// Example: `  mysql_host  db.internal`
pub fn kv(label: &str, value: impl Display) {
    if stdout_colors() {
        println!("  {}  {}", style(label).dim(), style(value).bold());
    } else {
        println!("  {}  {}", label, value);
    }
}

/// Format a path for inline use.
pub fn path(p: impl Display) -> String {
    if stdout_colors() {
        style(p).cyan().to_string()
    } else {
        p.to_string()
    }
}
