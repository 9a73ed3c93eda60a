use erp_migrate::logging::{RunLog, subscriber};
use erp_migrate::process::{CommandOutput, SystemCommand};
use erp_migrate::report::RunReport;
use erp_migrate::test_utils::{RecordingRunner, ScriptedPrompter, TestHost};
use erp_migrate::workflow::{Migration, Plan};
use std::io::Write;

/// Re-opening the log of the same run appends instead of truncating.
#[test]
fn test_run_log_is_append_only() {
    let host = TestHost::new().unwrap();
    let dir = &host.settings.log_dir;

    let (log, mut file) = RunLog::create(dir, "20261018_093000").unwrap();
    writeln!(file, "first line").unwrap();
    drop(file);

    let (again, mut file) = RunLog::create(dir, "20261018_093000").unwrap();
    writeln!(file, "second line").unwrap();
    drop(file);

    assert_eq!(log, again);
    let content = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(content, "first line\nsecond line\n");
}

/// The JSON report carries the overall status and every step outcome.
#[tokio::test]
async fn test_json_report_next_to_log() {
    let host = TestHost::new().unwrap();
    let config = host.config().unwrap();
    let (log, _file) = RunLog::create(&host.settings.log_dir, "20261018_093000").unwrap();

    let runner = RecordingRunner::new()
        .respond_once("systemctl is-active", CommandOutput::failed(3, ""))
        .respond("bash RUN_SyncDB.sh", CommandOutput::failed(1, ""));
    let prompter = ScriptedPrompter::new();
    let report = RunReport::new(Some(log.path().to_path_buf()));

    let mut migration = Migration::new(&runner, &prompter, &config, log.stamp(), report);
    migration.run(Plan::Full).await.unwrap();
    migration.report().write_json(&log.report_path()).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(log.report_path()).unwrap()).unwrap();
    assert_eq!(json["status"], "completed_with_warnings");
    assert!(json["fatal"].is_null());
    assert_eq!(json["log_file"], log.path().display().to_string());

    let steps = json["steps"].as_array().unwrap();
    let sync_db = steps.iter().find(|s| s["step"] == "restore RUN_SyncDB.sh").unwrap();
    assert_eq!(sync_db["outcome"]["status"], "failed");
    assert_eq!(sync_db["outcome"]["detail"], "exited with code 1");
    assert_eq!(steps.last().unwrap()["step"], "start service");
}

/// An aborted run records the failing step and the fatal message.
#[tokio::test]
async fn test_json_report_of_aborted_run() {
    let host = TestHost::new().unwrap();
    host.remove_utils_dir().unwrap();
    let config = host.config().unwrap();
    let (log, _file) = RunLog::create(&host.settings.log_dir, "20261018_093000").unwrap();
    let runner = RecordingRunner::new().respond_once("systemctl is-active", CommandOutput::failed(3, ""));
    let prompter = ScriptedPrompter::new();

    let mut migration = Migration::new(&runner, &prompter, &config, log.stamp(), RunReport::default());
    assert!(migration.run(Plan::Full).await.is_err());
    migration.report().write_json(&log.report_path()).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(log.report_path()).unwrap()).unwrap();
    assert_eq!(json["status"], "aborted");
    assert!(json["fatal"].as_str().unwrap().contains("utils"));
    assert_eq!(json["steps"].as_array().unwrap().last().unwrap()["step"], "restore");
}

/// Output of a captured command reaches the log file even at the default level.
#[tokio::test]
async fn test_captured_output_lands_in_log_file() {
    let host = TestHost::new().unwrap();
    let (log, file) = RunLog::create(&host.settings.log_dir, "20261018_110000").unwrap();
    let subscriber = subscriber("info", Some(file)).unwrap();
    let guard = tracing::subscriber::set_default(subscriber);

    let output = SystemCommand::new("echo")
        .arg("captured-output-marker")
        .execute()
        .await
        .unwrap();
    drop(guard);

    assert!(output.success());
    let content = std::fs::read_to_string(log.path()).unwrap();
    assert!(content.contains("captured-output-marker"), "{content}");
    assert!(content.contains("Executing command: echo captured-output-marker"), "{content}");
}
