//! Error output and hints.

use crate::support::*;

#[test]
fn test_malformed_mysql_names_scheme() {
    let t = Test::new();
    let output = t.parse("mysql://user@host/schema");

    assert_failure(&output);
    assert_stderr_contains(&output, "invalid MySQL connection string format");
}

#[test]
fn test_postgres_without_search_path_shows_pattern() {
    let t = Test::new();
    let output = t.parse("postgresql://u:p@h:5432/db");

    assert_failure(&output);
    assert_stderr_contains(&output, "PostgreSQL");
    assert_stderr_contains(&output, "search_path={schema},public");
}

#[test]
fn test_unknown_scheme() {
    let t = Test::new();
    let output = t.parse("redis://localhost:6379");

    assert_failure(&output);
    assert_stderr_contains(&output, "invalid redis connection string format");
}

#[test]
fn test_secure_with_postgres_is_unsupported() {
    let t = Test::new();
    let output = t.dbseal(&["parse", POSTGRES_URI, "--secure", SSH_PASSWORD_URI]);

    assert_failure(&output);
    assert_stderr_contains(&output, "only combine with mysql://");
}

#[test]
fn test_invalid_key_hint() {
    let t = Test::new();
    let output = t.encrypt("abc", "value");

    assert_failure(&output);
    assert_stderr_contains(&output, "invalid secret key");
    assert_stderr_contains(&output, "dbseal keygen");
}

#[test]
fn test_bad_config_hint() {
    let t = Test::with_config("[bootstrap\npolicy = ");
    let output = t.dbseal(&["keygen"]);

    assert_failure(&output);
    assert_stderr_contains(&output, "dbseal.toml");
}

#[test]
fn test_explicit_missing_config() {
    let t = Test::new();
    let output = t.dbseal(&["--config", "nope.toml", "keygen"]);

    assert_failure(&output);
    assert_stderr_contains(&output, "failed to read config");
}

#[test]
fn test_completions() {
    let t = Test::new();
    let output = t.dbseal(&["completions", "bash"]);

    assert_success(&output);
    assert_stdout_contains(&output, "dbseal");
}
