//! Tests for `dbseal keygen`, `encrypt` and `decrypt`.

use crate::support::*;

#[test]
fn test_keygen_is_64_hex_chars() {
    let t = Test::new();
    let key = t.keygen();

    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(key, t.keygen());
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let t = Test::new();
    let key = t.keygen();

    let output = t.encrypt(&key, "hunter2");
    assert_success(&output);
    let encrypted = stdout(&output).trim().to_string();
    assert_ne!(encrypted, "hunter2");

    let output = t.decrypt(&key, &encrypted);
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), "hunter2");
}

#[test]
fn test_key_from_environment() {
    let t = Test::new();
    let key = t.keygen();

    let output = t
        .cmd()
        .env("DBSEAL_KEY", &key)
        .args(["encrypt", "value"])
        .output()
        .unwrap();
    assert_success(&output);
}

#[test]
fn test_encrypt_reads_stdin() {
    let t = Test::new();
    let key = t.keygen();

    let output = t
        .cmd()
        .args(["encrypt", "--key", &key])
        .write_stdin("from stdin\n")
        .output()
        .unwrap();
    assert_success(&output);

    let encrypted = stdout(&output).trim().to_string();
    let output = t.decrypt(&key, &encrypted);
    assert_eq!(stdout(&output).trim(), "from stdin");
}

#[test]
fn test_decrypt_with_wrong_key_fails() {
    let t = Test::new();
    let encrypted = stdout(&t.encrypt(&t.keygen(), "secret")).trim().to_string();

    let output = t.decrypt(&t.keygen(), &encrypted);
    assert_failure(&output);
    assert_stderr_contains(&output, "authentication tag");
}

#[test]
fn test_encrypt_requires_key() {
    let t = Test::new();
    let output = t.dbseal(&["encrypt", "value"]);
    assert_failure(&output);
}
