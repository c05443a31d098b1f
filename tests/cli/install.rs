//! Tests for `dbseal install`.

use crate::support::*;

fn assignment_value<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (lhs, rhs) = line.split_once('=')?;
        (lhs.trim() == name).then(|| rhs.trim().trim_matches(|c| c == '\'' || c == '"'))
    })
}

#[test]
fn test_install_in_place() {
    let t = Test::new();
    t.write("env.py", TEMPLATE);

    let output = t.dbseal(&["install", "--template", "env.py", "--connection", MYSQL_URI]);
    assert_success(&output);
    assert_stdout_contains(&output, "installed");

    let installed = t.read("env.py");
    let key = assignment_value(&installed, "CYPHER_TEXT").unwrap();
    assert_eq!(key.len(), 64);

    assert!(!installed.contains("s3cret"));
    assert!(!installed.contains("%Y-%m-%d"));

    let conn = assignment_value(&installed, "main_db_conn").unwrap();
    let output = t.decrypt(key, conn);
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), MYSQL_URI);
}

#[test]
fn test_install_to_separate_output() {
    let t = Test::new();
    t.write("env.template", TEMPLATE);

    let output = t.dbseal(&[
        "install",
        "--template",
        "env.template",
        "--output",
        "env.generated",
        "--connection",
        MYSQL_URI,
        "--secure",
        SSH_PASSWORD_URI,
        "--uid",
        "sequence",
        "--param",
        "region=eu-west-1",
    ]);
    assert_success(&output);

    assert_eq!(t.read("env.template"), TEMPLATE);
    let installed = t.read("env.generated");
    for name in ["mysql_user", "mysql_schema", "ssh_host", "ssh_password", "region"] {
        assert!(
            assignment_value(&installed, name).is_some(),
            "missing {name} in:\n{installed}"
        );
    }

    let key = assignment_value(&installed, "CYPHER_TEXT").unwrap();
    let uid = assignment_value(&installed, "id_generation_method").unwrap();
    assert_eq!(stdout(&t.decrypt(key, uid)).trim(), "sequence");
}

#[test]
fn test_install_uses_configured_names() {
    let t = Test::with_config(
        "[installer]\nkey_variable = \"BOOT_KEY\"\nconnection_variable = \"DB_URL\"\n",
    );
    t.write("env.py", "BOOT_KEY = ''\n# Database start configuration #\n");

    let output = t.dbseal(&["install", "--template", "env.py", "--connection", MYSQL_URI]);
    assert_success(&output);

    let installed = t.read("env.py");
    assert!(assignment_value(&installed, "BOOT_KEY").is_some());
    assert!(assignment_value(&installed, "DB_URL").is_some());
}

#[test]
fn test_install_without_key_slot_fails() {
    let t = Test::new();
    t.write("env.py", "# Database start configuration #\n");

    let output = t.dbseal(&["install", "--template", "env.py", "--connection", MYSQL_URI]);
    assert_failure(&output);
    assert_stderr_contains(&output, "CYPHER_TEXT");
    assert_eq!(t.read("env.py"), "# Database start configuration #\n");
}

#[test]
fn test_install_rejects_bad_param() {
    let t = Test::new();
    t.write("env.py", TEMPLATE);

    let output = t.dbseal(&[
        "install",
        "--template",
        "env.py",
        "--connection",
        MYSQL_URI,
        "--param",
        "no-equals",
    ]);
    assert_failure(&output);
    assert_stderr_contains(&output, "NAME=value");
}
