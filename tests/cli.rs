mod common;

use predicates::prelude::*;

#[test]
fn test_locate_prints_nested_name() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir(), home.path())
        .args(["locate", "src/cart.test.js:11:7"])
        .assert()
        .success()
        .stdout("Cart with items sums quantities\n");
}

#[test]
fn test_locate_outside_tests_fails() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir(), home.path())
        .args(["locate", "src/cart.test.js:1"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("No test at"));
}

#[test]
fn test_locate_rejects_bad_location() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir(), home.path())
        .args(["locate", "src/cart.test.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_LOCATION"));
}

#[test]
fn test_command_for_nearest() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir(), home.path())
        .args(["command", "nearest", "src/cart.test.js:5", "--", "--ci", "--colors"])
        .assert()
        .success()
        .stdout("npx --no-install jest --ci --colors=true src/cart.test.js --testNamePattern 'Cart starts empty'\n");
}

#[test]
fn test_command_quotes_name_filter() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir(), home.path())
        .args(["command", "project", "--", "-t", "adds items", "--testPathPattern=src/cart"])
        .assert()
        .success()
        .stdout("npx --no-install jest -t 'adds items' --testPathPattern=src/cart --colors=false\n");
}

#[test]
fn test_command_from_subdirectory_uses_project_root() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir().join("src"), home.path())
        .args(["command", "file", "cart.test.js"])
        .assert()
        .success()
        .stdout("npx --no-install jest --colors=false src/cart.test.js\n");
}

#[test]
fn test_command_dwim_finds_tests_dir() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir(), home.path())
        .args(["command", "dwim", "src/util/money.ts"])
        .assert()
        .success()
        .stdout("npx --no-install jest --colors=false src/__tests__/money.ts\n");
}

#[test]
fn test_command_dwim_without_test_file() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir(), home.path())
        .args(["command", "dwim", "src/orphan.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NO_TEST_FILE"));
}

#[test]
fn test_command_debug_last_failed() {
    let home = tempfile::tempdir().unwrap();
    common::jestrun(&common::fixture_dir(), home.path())
        .args(["command", "last-failed", "--debug"])
        .assert()
        .success()
        .stdout("npx --node-options=--inspect-brk --no-install jest --onlyFailures --colors=false --runInBand\n");
}

#[test]
fn test_project_settings_override_executable() {
    let project = common::shop_project();
    let home = tempfile::tempdir().unwrap();
    common::write_settings(project.path(), r#"{"runner.executable": "yarn jest"}"#);
    common::jestrun(project.path(), home.path())
        .args(["command", "project"])
        .assert()
        .success()
        .stdout("yarn jest --colors=false\n");
}

#[test]
fn test_run_streams_output_and_exit_code() {
    let project = common::shop_project();
    let home = tempfile::tempdir().unwrap();
    common::write_settings(project.path(), r#"{"runner.executable": "echo fake-jest"}"#);
    common::jestrun(project.path(), home.path())
        .args(["run", "file", "src/cart.test.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fake-jest --colors=false src/cart.test.js\n"))
        .stdout(predicate::str::contains("exited with code 0"));
}

#[test]
fn test_run_propagates_failure_status() {
    let project = common::shop_project();
    let home = tempfile::tempdir().unwrap();
    common::write_settings(project.path(), r#"{"runner.executable": "sh -c 'exit 3'"}"#);
    common::jestrun(project.path(), home.path())
        .args(["run", "project"])
        .assert()
        .code(3);
}

#[test]
fn test_shell_session_flow() {
    let project = common::shop_project();
    let home = tempfile::tempdir().unwrap();
    common::write_settings(project.path(), r#"{"runner.executable": "echo fake-jest"}"#);
    common::jestrun(project.path(), home.path())
        .arg("shell")
        .write_stdin("repeat\nfile src/cart.test.js\nhistory\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("NO_HISTORY"))
        .stdout(predicate::str::contains("[*jest*] echo fake-jest --colors=false src/cart.test.js"))
        .stdout(predicate::str::contains("  0  echo fake-jest --colors=false src/cart.test.js"));
}
