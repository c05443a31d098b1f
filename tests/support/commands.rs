//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// Create a dbseal command isolated to this test.
    ///
    /// HOME points at the temp home, the working directory at the temp dir,
    /// and inherited dbseal variables are cleared.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("dbseal").expect("failed to find dbseal binary");
        cmd.env("HOME", self.home.path());
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("XDG_CONFIG_HOME", self.home.path().join(".config"));
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("DBSEAL_KEY");
        cmd.env_remove("DBSEAL_CONFIG");
        cmd.env_remove("DBSEAL_LOG");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Run dbseal with `args`.
    pub fn dbseal(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run dbseal")
    }

    /// Shortcut for `dbseal keygen`, returning the key.
    pub fn keygen(&self) -> String {
        let output = self.dbseal(&["keygen"]);
        assert!(output.status.success(), "keygen failed");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Shortcut for `dbseal encrypt --key KEY VALUE`.
    pub fn encrypt(&self, key: &str, value: &str) -> Output {
        self.dbseal(&["encrypt", "--key", key, value])
    }

    /// Shortcut for `dbseal decrypt --key KEY VALUE`.
    pub fn decrypt(&self, key: &str, value: &str) -> Output {
        self.dbseal(&["decrypt", "--key", key, value])
    }

    /// Shortcut for `dbseal parse URI`.
    pub fn parse(&self, uri: &str) -> Output {
        self.dbseal(&["parse", uri])
    }

    /// Shortcut for `dbseal run --env-file FILE -- CMD...`.
    pub fn run(&self, env_file: &str, command: &[&str]) -> Output {
        let mut args = vec!["run", "--env-file", env_file, "--"];
        args.extend_from_slice(command);
        self.dbseal(&args)
    }
}
