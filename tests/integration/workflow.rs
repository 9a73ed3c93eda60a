use erp_migrate::config::{HostIdentity, MigrationConfig};
use erp_migrate::process::CommandOutput;
use erp_migrate::report::{RunReport, RunStatus, StepOutcome};
use erp_migrate::test_utils::{RecordingRunner, ScriptedPrompter, TestHost, init_test_logging};
use erp_migrate::workflow::{Migration, Plan};

const STAMP: &str = "20261018_093000";

/// A service that stops when asked and is active again after the start.
fn cooperative_service() -> RecordingRunner {
    RecordingRunner::new().respond_once("systemctl is-active", CommandOutput::failed(3, ""))
}

fn config_for(host: &TestHost, short: &str, domain: &str) -> MigrationConfig {
    let mut config = host.config().unwrap();
    config.identity = Some(HostIdentity::new(short, domain).unwrap());
    config
}

/// Complete run with a domain: identity, mirror, delegates and restart all happen in order.
#[tokio::test]
async fn test_complete_migration_runs_every_step_in_order() {
    init_test_logging(None);
    let host = TestHost::new().unwrap();
    let config = config_for(&host, "erp01", "corp.example.com");
    let runner = cooperative_service()
        .respond("hostname", CommandOutput::ok("oldbox\n"))
        .respond("ip -4 route get", CommandOutput::ok("1.1.1.1 via 10.0.0.1 dev eth0 src 10.0.0.42 uid 0\n"));
    let prompter = ScriptedPrompter::new();

    let mut migration = Migration::new(&runner, &prompter, &config, STAMP, RunReport::default());
    migration.run(Plan::Full).await.unwrap();

    let hosts = host.hosts_content().unwrap();
    assert!(hosts.starts_with("127.0.0.1 localhost\n"));
    assert!(!hosts.contains("oldbox.corp.local"), "old hostname line must be gone:\n{hosts}");
    assert!(hosts.contains("10.0.0.5 oldboxdb"), "unrelated alias must survive:\n{hosts}");
    assert!(hosts.contains("10.0.0.42 erp01.corp.example.com erp01"));
    assert_eq!(host.hosts_backups().unwrap().len(), 1);

    let order = [
        "hostnamectl set-hostname erp01.corp.example.com",
        "root@old true",
        "test -f",
        "systemctl stop erp.service",
        "rsync ",
        "chown -R erp:erp",
        "chmod -R",
        "bash RUN_DBRestore.sh",
        "bash RUN_SyncDB.sh",
        "systemctl start erp.service",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|p| runner.position(p).unwrap_or_else(|| panic!("'{p}' was never run")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "out of order: {:?}", runner.lines());

    let report = migration.report();
    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(report.matching("sync ").count(), 6);
}

/// One directory missing on the old server, no alternate given.
#[tokio::test]
async fn test_missing_directory_is_skipped_and_the_rest_continues() {
    let host = TestHost::new().unwrap();
    let config = host.config().unwrap();
    let reports = config.sync_paths[3].clone();
    let runner = cooperative_service().respond(
        &format!("test -d '{}'", reports.display()),
        CommandOutput::failed(1, ""),
    );
    let prompter = ScriptedPrompter::new().text("");

    let mut migration = Migration::new(&runner, &prompter, &config, STAMP, RunReport::default());
    migration.run(Plan::Full).await.unwrap();
    let report = migration.into_report();

    assert!(matches!(
        report.outcome(&format!("sync {}", reports.display())),
        Some(StepOutcome::Skipped(_))
    ));
    assert!(!reports.exists());
    assert_eq!(runner.count("rsync "), 5);
    assert_eq!(report.outcome("permissions"), Some(&StepOutcome::Succeeded));
    assert_eq!(runner.count("bash "), 2);
    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(prompter.remaining(), 0);
}

/// The operator points a missing directory at another remote path.
#[tokio::test]
async fn test_alternate_remote_path_is_mirrored() {
    let host = TestHost::new().unwrap();
    let config = host.config().unwrap();
    let data = config.sync_paths[0].clone();
    let runner = cooperative_service().respond_once(
        &format!("test -d '{}'", data.display()),
        CommandOutput::failed(1, ""),
    );
    let prompter = ScriptedPrompter::new().text("/srv/erp/data");

    let mut migration = Migration::new(&runner, &prompter, &config, STAMP, RunReport::default());
    migration.run(Plan::Sync).await.unwrap();

    assert_eq!(runner.count("root@old:/srv/erp/data/"), 1);
    assert!(data.is_dir());
    assert_eq!(runner.count("bash "), 0, "sync does not run the delegates");
}

/// A delegate exiting non-zero is a warning, not an abort.
#[tokio::test]
async fn test_failing_delegate_finishes_with_warnings() {
    let host = TestHost::new().unwrap();
    let config = host.config().unwrap();
    let runner = cooperative_service().respond("bash RUN_DBRestore.sh", CommandOutput::failed(2, "ORA-01017"));
    let prompter = ScriptedPrompter::new();

    let mut migration = Migration::new(&runner, &prompter, &config, STAMP, RunReport::default());
    migration.run(Plan::Full).await.unwrap();
    let report = migration.report();

    assert_eq!(
        report.outcome("restore RUN_DBRestore.sh"),
        Some(&StepOutcome::Failed("exited with code 2".to_string()))
    );
    assert_eq!(report.outcome("restore RUN_SyncDB.sh"), Some(&StepOutcome::Succeeded));
    assert_eq!(report.outcome("start service"), Some(&StepOutcome::Succeeded));
    assert_eq!(report.status(), RunStatus::CompletedWithWarnings);
}

/// Missing export accepted by the operator: the run goes on and says so.
#[tokio::test]
async fn test_missing_export_can_be_overridden() {
    let host = TestHost::new().unwrap();
    let config = host.config().unwrap();
    let runner = cooperative_service().respond("test -f", CommandOutput::failed(1, ""));
    let prompter = ScriptedPrompter::new().confirm(true);

    let mut migration = Migration::new(&runner, &prompter, &config, STAMP, RunReport::default());
    migration.run(Plan::Full).await.unwrap();

    assert!(matches!(migration.report().outcome("export"), Some(StepOutcome::Skipped(_))));
    assert_eq!(runner.count("systemctl start"), 1);
}

/// Running the mirror twice issues the same commands and ends in the same state.
#[tokio::test]
async fn test_sync_is_repeatable() {
    let host = TestHost::new().unwrap();
    let config = host.config().unwrap();
    let prompter = ScriptedPrompter::new();

    let first = cooperative_service();
    let mut migration = Migration::new(&first, &prompter, &config, STAMP, RunReport::default());
    migration.run(Plan::Sync).await.unwrap();
    let first_report = migration.into_report();

    let second = cooperative_service();
    let mut migration = Migration::new(&second, &prompter, &config, STAMP, RunReport::default());
    migration.run(Plan::Sync).await.unwrap();
    let second_report = migration.into_report();

    assert_eq!(first.lines(), second.lines());
    assert_eq!(first_report.steps(), second_report.steps());
    assert!(config.sync_paths.iter().all(|p| p.is_dir()));
}

/// `check` never stops the service or writes locally.
#[tokio::test]
async fn test_check_plan_is_read_only() {
    let host = TestHost::new().unwrap();
    let config = host.config().unwrap();
    let runner = RecordingRunner::new().respond("stat -c", CommandOutput::ok("1048576 bytes, modified 2026-10-17\n"));
    let prompter = ScriptedPrompter::new();

    let mut migration = Migration::new(&runner, &prompter, &config, STAMP, RunReport::default());
    migration.run(Plan::Check).await.unwrap();

    assert_eq!(runner.count("systemctl"), 0);
    assert_eq!(runner.count("rsync"), 0);
    assert_eq!(host.hosts_content().unwrap(), erp_migrate::test_utils::DEFAULT_HOSTS);
    assert!(host.hosts_backups().unwrap().is_empty());
    assert_eq!(migration.report().steps().len(), 3);
}
