//! Tests for `dbseal parse`.

use crate::support::*;

#[test]
fn test_parse_mysql_masks_password() {
    let t = Test::new();
    let output = t.parse(MYSQL_URI);

    assert_success(&output);
    assert_stdout_contains(&output, "PlainMySQL");
    assert_stdout_contains(&output, "mysql_host");
    assert_stdout_contains(&output, "db.internal");
    assert_stdout_excludes(&output, "s3cret");
}

#[test]
fn test_parse_show_secrets() {
    let t = Test::new();
    let output = t.dbseal(&["parse", MYSQL_URI, "--show-secrets"]);

    assert_success(&output);
    assert_stdout_contains(&output, "s3cret");
}

#[test]
fn test_parse_postgres_json() {
    let t = Test::new();
    let output = t.dbseal(&["parse", POSTGRES_URI, "--json"]);
    assert_success(&output);

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["variant"], "Postgres");
    assert_eq!(json["scheme"], "postgresql");

    let params = json["params"].as_array().unwrap();
    let schema = params
        .iter()
        .find(|p| p["name"] == "pgsql_schema")
        .unwrap();
    assert_eq!(schema["value"], "tenant1");
    let password = params
        .iter()
        .find(|p| p["name"] == "pgsql_password")
        .unwrap();
    assert_eq!(password["value"], "********");
}

#[test]
fn test_parse_secure_channel_alone() {
    let t = Test::new();
    let output = t.parse(SSH_PASSWORD_URI);

    assert_success(&output);
    assert_stdout_contains(&output, "SSHPassword");
    assert_stdout_contains(&output, "bastion.internal");
    assert_stdout_excludes(&output, "tunnelpw");
}

#[test]
fn test_parse_combined() {
    let t = Test::new();
    let output = t.dbseal(&["parse", MYSQL_URI, "--secure", SSH_PASSWORD_URI]);

    assert_success(&output);
    assert_stdout_contains(&output, "SSHPasswordMySQL");
    assert_stdout_contains(&output, "mysql_schema");
    assert_stdout_contains(&output, "ssh_host");
}

#[test]
fn test_parse_ssl_path_form() {
    let t = Test::new();
    let ca = t.write("ca.pem", "-----BEGIN CERTIFICATE-----\nQUJD\n-----END CERTIFICATE-----\n");
    let cert = t.write("cert.der", "raw-cert");
    let key = t.write("key.der", "raw-key");
    let uri = format!(
        "ssl://ssl_ca={}?ssl_cert={}?ssl_key={}?hostname=db.internal",
        ca.display(),
        cert.display(),
        key.display()
    );

    let output = t.dbseal(&["parse", &uri, "--json", "--show-secrets"]);
    assert_success(&output);

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["variant"], "SSL");
    let ca_bytes = json["params"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "ssl_ca_bytes")
        .unwrap();
    // "QUJD" is the PEM body; the descriptor holds its decoded DER bytes "ABC".
    assert_eq!(ca_bytes["value"], "QUJD");
}
