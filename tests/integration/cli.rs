use assert_cmd::Command;
use erp_migrate::config::MigrationSettings;
use predicates::prelude::*;
use tempfile::TempDir;

fn erp_migrate() -> Command {
    let mut cmd = Command::cargo_bin("erp-migrate").unwrap();
    cmd.env("ERP_MIGRATE_NO_PROGRESS", "1").env_remove("RUST_LOG");
    cmd
}

/// Settings file whose log directory lives in `temp`.
fn settings_in(temp: &TempDir) -> std::path::PathBuf {
    let path = temp.path().join("config.toml");
    let log_dir = temp.path().join("logs");
    std::fs::write(&path, format!("log_dir = \"{}\"\n", log_dir.display())).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    erp_migrate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("hostname"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("init-config"));
}

#[test]
fn test_version() {
    erp_migrate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_password_is_never_a_flag() {
    erp_migrate()
        .args(["run", "--password", "secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn test_init_config_writes_private_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("etc/config.toml");

    erp_migrate()
        .args(["init-config", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default settings"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# erp-migrate settings"));
    let parsed: MigrationSettings = toml::from_str(&content).unwrap();
    assert_eq!(parsed, MigrationSettings::default());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "service_name = \"custom.service\"\n").unwrap();

    erp_migrate()
        .args(["init-config", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"))
        .stderr(predicate::str::contains("--force"));
    assert!(std::fs::read_to_string(&path).unwrap().contains("custom.service"));

    erp_migrate()
        .args(["init-config", "--force", "--path"])
        .arg(&path)
        .assert()
        .success();
    assert!(!std::fs::read_to_string(&path).unwrap().contains("custom.service"));
}

#[test]
fn test_malformed_settings_are_fatal() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "sync_paths = \"not a list\"\n").unwrap();

    erp_migrate()
        .arg("--config")
        .arg(&path)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("init-config --force"));
}

#[test]
fn test_missing_explicit_settings_file_is_fatal() {
    let temp = TempDir::new().unwrap();

    erp_migrate()
        .arg("--config")
        .arg(temp.path().join("absent.toml"))
        .arg("check")
        .assert()
        .failure()
        .code(1);
}

/// Without a terminal the questions cannot be asked; the failure lands in the run log too.
#[test]
fn test_check_without_terminal_fails_and_is_logged() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(&temp);

    erp_migrate()
        .arg("-c")
        .arg(&settings)
        .arg("check")
        .write_stdin("")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("stdin is not a terminal"));

    let logs: Vec<_> = std::fs::read_dir(temp.path().join("logs"))
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    assert_eq!(logs.len(), 1, "{logs:?}");
    let name = logs[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("migration_") && name.ends_with(".log"), "{name}");
    let content = std::fs::read_to_string(&logs[0]).unwrap();
    assert!(content.contains("stdin is not a terminal"), "{content}");
}

/// Every answer comes from flags, so no terminal is needed and the checks run.
#[test]
fn test_check_with_all_answers_as_flags_needs_no_terminal() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(&temp);

    let assert = erp_migrate()
        .arg("-c")
        .arg(&settings)
        .args([
            "check",
            "--remote-host",
            "127.0.0.1",
            "--remote-user",
            "nobody",
            "--export-path",
            "/tmp/erp-migrate-absent.dmp",
            "--auth",
            "key",
        ])
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .stderr(predicate::str::contains("stdin is not a terminal").not());

    let output = assert.get_output();
    let logs: Vec<_> = std::fs::read_dir(temp.path().join("logs"))
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "log"))
        .collect();
    assert_eq!(logs.len(), 1, "{logs:?}");
    let content = std::fs::read_to_string(&logs[0]).unwrap();
    assert!(content.contains("Checking ssh access to nobody@127.0.0.1"), "{content}\n{output:?}");
}
