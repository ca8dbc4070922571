//! Integration tests for the satchat CLI.

use assert_cmd::Command;

fn satchat() -> Command {
    Command::cargo_bin("satchat").expect("binary builds")
}

#[test]
fn test_help_lists_subcommands() {
    satchat()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("chat"))
        .stdout(predicates::str::contains("rooms"))
        .stdout(predicates::str::contains("session"))
        .stdout(predicates::str::contains("completion"));
}

#[test]
fn test_chat_help_shows_flags() {
    satchat()
        .arg("chat")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Start an interactive chat session"))
        .stdout(predicates::str::contains("--room"))
        .stdout(predicates::str::contains("--server"))
        .stdout(predicates::str::contains("--config"));
}

#[test]
fn test_chat_requires_login() {
    let dir = tempfile::tempdir().unwrap();
    satchat()
        .env("SATCHAT_CONFIG_DIR", dir.path())
        .arg("chat")
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicates::str::contains(
            "not logged in; run `satchat session login` first",
        ));
}

#[test]
fn test_rooms_list_requires_login() {
    let dir = tempfile::tempdir().unwrap();
    satchat()
        .env("SATCHAT_CONFIG_DIR", dir.path())
        .args(["rooms", "list"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicates::str::contains("not logged in"));
}

#[test]
fn test_rooms_list_rejects_invalid_sort() {
    let dir = tempfile::tempdir().unwrap();
    satchat()
        .env("SATCHAT_CONFIG_DIR", dir.path())
        .args(["rooms", "list", "--sort", "recent"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid sort order"));
}

#[test]
fn test_rooms_rename_requires_name_argument() {
    satchat()
        .args(["rooms", "rename", "--room", "r1"])
        .assert()
        .failure()
        .stderr(predicates::str::contains(
            "the following required arguments were not provided",
        ));
}

#[test]
fn test_session_show_without_login() {
    let dir = tempfile::tempdir().unwrap();
    satchat()
        .env("SATCHAT_CONFIG_DIR", dir.path())
        .args(["session", "show"])
        .assert()
        .success()
        .stdout(predicates::str::contains("not logged in"));
}

#[test]
fn test_config_generates_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    satchat()
        .current_dir(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicates::str::contains("generated successfully"));
    let generated = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(generated.contains("server_url"));
    assert!(generated.contains("page_size"));
}

#[test]
fn test_config_rejects_unknown_format() {
    satchat()
        .args(["config", "--format", "toml"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Unsupported format"));
}

#[test]
fn test_completion_generates_bash_script() {
    satchat()
        .args(["completion", "--shell", "bash"])
        .assert()
        .success()
        .stdout(predicates::str::contains("satchat"));
}
