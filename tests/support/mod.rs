//! Test support utilities for dbseal integration tests.
//!
//! Provides an isolated environment and helper commands.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;

use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Child processes run with `.current_dir()` and their own HOME, so no
/// process-global state is shared and tests can run in parallel.
pub struct Test {
    /// Working directory for the command
    pub dir: TempDir,
    /// Temporary home directory
    pub home: TempDir,
}

impl Test {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");

        Self { dir, home }
    }

    /// Create a test environment with `dbseal.toml` written.
    pub fn with_config(contents: &str) -> Self {
        let t = Self::new();
        t.write("dbseal.toml", contents);
        t
    }

    /// Write a file relative to the working directory.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("failed to write fixture");
        path
    }

    /// Read a file relative to the working directory.
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("failed to read file")
    }
}
