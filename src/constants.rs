//! Global constants used throughout the erp-migrate codebase.
//!
//! Default filesystem locations, unit and script names, and the timeouts
//! applied to external commands. Everything path-like here is only a default:
//! the settings file can override it (see [`crate::config::MigrationSettings`]).

use std::time::Duration;

/// Systemd unit that runs the ERP application.
pub const DEFAULT_SERVICE_NAME: &str = "erp.service";

/// Root of the application install; ownership and mode are reset here after syncing.
pub const DEFAULT_APP_ROOT: &str = "/opt/erp";

/// `user:group` that owns the application tree.
pub const DEFAULT_APP_OWNER: &str = "erp:erp";

/// Symbolic mode applied recursively with `chmod -R`.
pub const DEFAULT_APP_MODE: &str = "u=rwX,g=rX,o=rX";

/// Directory holding the database delegate scripts on the new host.
pub const DEFAULT_UTILS_DIR: &str = "/opt/erp/utils";

/// Database restore delegate, run first.
pub const DEFAULT_RESTORE_SCRIPT: &str = "RUN_DBRestore.sh";

/// Schema/data sync delegate, run after the restore.
pub const DEFAULT_SYNC_SCRIPT: &str = "RUN_SyncDB.sh";

/// Export delegate the operator runs on the old host; only mentioned in guidance.
pub const DEFAULT_EXPORT_SCRIPT: &str = "RUN_DBExport.sh";

/// Database export produced on the old host by the export delegate.
pub const DEFAULT_EXPORT_PATH: &str = "/opt/erp/backups/db_export.dmp";

/// Directories mirrored from the old host, in the order they are processed.
pub const DEFAULT_SYNC_PATHS: [&str; 6] = [
    "/opt/erp/data",
    "/opt/erp/filestore",
    "/opt/erp/attachments",
    "/opt/erp/reports",
    "/opt/erp/custom",
    "/opt/erp/backups",
];

/// System hosts file.
pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";

/// Directory receiving one timestamped log file per run.
pub const DEFAULT_LOG_DIR: &str = "/var/log/erp-migrate";

/// Settings file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/erp-migrate/config.toml";

/// Address written to the hosts file when no usable primary IPv4 is detected.
pub const FALLBACK_HOST_IP: &str = "127.0.1.1";

/// Loopback address that must keep its `localhost` mapping.
pub const LOOPBACK_IP: &str = "127.0.0.1";

/// Target used for the routing-table probe (`ip route get`). No packet is sent.
pub const ROUTE_PROBE_TARGET: &str = "1.1.1.1";

/// Credential-injecting SSH helper used for password authentication.
pub const PASSWORD_HELPER: &str = "sshpass";

/// Environment variable `sshpass -e` reads the password from.
pub const PASSWORD_ENV_VAR: &str = "SSHPASS";

/// Environment variable that disables spinners when set.
pub const NO_PROGRESS_ENV_VAR: &str = "ERP_MIGRATE_NO_PROGRESS";

/// Seconds to wait after `systemctl start` before checking `is-active`.
pub const DEFAULT_RESTART_SETTLE_SECS: u64 = 5;

/// Journal lines shown when the service fails to come back.
pub const DEFAULT_JOURNAL_LINES: u32 = 50;

/// `ConnectTimeout` passed to ssh.
pub const DEFAULT_SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Timeout for short remote probes (reachability, `test -d`, `stat`).
pub const REMOTE_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for local service-manager and package-manager commands.
pub const SYSTEM_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);
