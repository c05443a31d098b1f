//! Tests for `dbseal run`.

use crate::support::*;

fn installed(t: &Test) {
    t.write("env.py", TEMPLATE);
    let output = t.dbseal(&["install", "--template", "env.py", "--connection", MYSQL_URI]);
    assert_success(&output);
}

#[cfg(unix)]
#[test]
fn test_run_injects_decrypted_vars() {
    let t = Test::new();
    installed(&t);

    let output = t.run("env.py", &["sh", "-c", "echo \"$mysql_host|$main_db_conn|$DATE_MASKS\""]);
    assert_success(&output);
    assert_stdout_contains(
        &output,
        &format!("db.internal|{}|%Y-%m-%d, %d-%m-%Y", MYSQL_URI),
    );
}

#[cfg(unix)]
#[test]
fn test_run_removes_key_variable() {
    let t = Test::new();
    installed(&t);

    let output = t.run("env.py", &["sh", "-c", "echo \"key=[${CYPHER_TEXT:-}]\""]);
    assert_success(&output);
    assert_stdout_contains(&output, "key=[]");
}

#[cfg(unix)]
#[test]
fn test_run_exit_code_passthrough() {
    let t = Test::new();
    installed(&t);

    let output = t.run("env.py", &["sh", "-c", "exit 42"]);
    assert_eq!(output.status.code(), Some(42));
}

#[test]
fn test_run_missing_env_file() {
    let t = Test::new();
    let output = t.run("absent.py", &["true"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "absent.py");
}

#[test]
fn test_run_requires_command() {
    let t = Test::new();
    installed(&t);
    let output = t.dbseal(&["run", "--env-file", "env.py"]);
    assert_failure(&output);
}
