use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pgcharm_admin::{
    AdminError, CommandRunner, HookToolPorts, PortController, PsqlAdministrator,
    ResourceAdministrator,
};
use pgcharm_config::Settings;
use pgcharm_core::SecretSource;
use tempfile::TempDir;

const VERSION_OUTPUT: &str = "                                version\n\
    ---------------------------------------------------------------------\n \
    PostgreSQL 10.23 (Ubuntu 10.23-0ubuntu0.18.04.2) on x86_64-pc-linux-gnu\n(1 row)\n";

/// Records every invocation and fails any whose last argument contains
/// `fail_on`.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingRunner {
    fn failing_on(pattern: &str) -> Self {
        let runner = Self::default();
        *runner.fail_on.lock().unwrap() = Some(pattern.to_string());
        runner
    }

    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    fn statements(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(program, _)| program == "sudo")
            .filter_map(|(_, args)| args.last().cloned())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String]) -> pgcharm_admin::Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        let last = args.last().cloned().unwrap_or_default();
        if let Some(pattern) = self.fail_on.lock().unwrap().as_deref() {
            if last.contains(pattern) {
                return Err(AdminError::command_failed(program, Some(1), "boom"));
            }
        }
        if last == "SELECT version()" {
            return Ok(VERSION_OUTPUT.as_bytes().to_vec());
        }
        Ok(Vec::new())
    }
}

struct FixedSecret;

impl SecretSource for FixedSecret {
    fn generate(&self, length: usize) -> String {
        "HH88buR4".chars().cycle().take(length).collect()
    }
}

fn settings(base: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.postgres.host = "10.216.12.252".into();
    settings.postgres.conf_base_dir = base.to_path_buf();
    settings.credentials.secret_length = 8;
    settings
}

fn administrator(runner: Arc<RecordingRunner>, base: &Path) -> PsqlAdministrator {
    PsqlAdministrator::new(&settings(base), runner).with_secrets(Arc::new(FixedSecret))
}

#[tokio::test]
async fn test_create_issues_statements_in_order() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let admin = administrator(runner.clone(), dir.path());

    let resource = admin.create_database_and_user("fermi_dev_db").await.unwrap();

    assert_eq!(resource.name, "fermi_dev_db");
    assert_eq!(resource.username, "juju_HH88buR4");
    assert_eq!(resource.password, "HH88buR4");
    assert_eq!(resource.host, "10.216.12.252");
    assert_eq!(resource.port, 5432);

    assert_eq!(
        runner.statements(),
        vec![
            "CREATE DATABASE \"fermi_dev_db\"".to_string(),
            "CREATE USER \"juju_HH88buR4\" WITH ENCRYPTED PASSWORD 'HH88buR4'".to_string(),
            "GRANT ALL PRIVILEGES ON DATABASE \"fermi_dev_db\" TO \"juju_HH88buR4\"".to_string(),
        ]
    );

    let (program, args) = &runner.calls()[0];
    assert_eq!(program, "sudo");
    assert_eq!(&args[..6], ["-u", "postgres", "psql", "-p", "5432", "-c"]);
}

#[tokio::test]
async fn test_identifiers_are_quoted() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let admin = administrator(runner.clone(), dir.path());

    admin.drop_database("odd\"name").await.unwrap();
    admin.drop_user("juju_x").await.unwrap();

    assert_eq!(
        runner.statements(),
        vec![
            "DROP DATABASE IF EXISTS \"odd\"\"name\"".to_string(),
            "DROP USER IF EXISTS \"juju_x\"".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failed_grant_rolls_back() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::failing_on("GRANT"));
    let admin = administrator(runner.clone(), dir.path());

    let err = admin.create_database_and_user("app").await.unwrap_err();
    assert!(matches!(err, AdminError::Query { .. }));

    let statements = runner.statements();
    assert_eq!(
        &statements[3..],
        [
            "DROP USER IF EXISTS \"juju_HH88buR4\"".to_string(),
            "DROP DATABASE IF EXISTS \"app\"".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failed_user_creation_hides_password() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::failing_on("CREATE USER"));
    let admin = administrator(runner.clone(), dir.path());

    let err = admin.create_database_and_user("app").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("********"));
    assert!(!message.contains("'HH88buR4'"));

    assert_eq!(
        runner.statements().last().map(String::as_str),
        Some("DROP DATABASE IF EXISTS \"app\"")
    );
}

#[tokio::test]
async fn test_version_is_cached() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let admin = administrator(runner.clone(), dir.path());

    assert_eq!(admin.get_version().await.unwrap(), "10.23");
    assert_eq!(admin.get_version().await.unwrap(), "10.23");
    assert_eq!(runner.statements(), vec!["SELECT version()".to_string()]);
}

#[tokio::test]
async fn test_reconfigure_patches_files_and_moves_port() {
    let dir = TempDir::new().unwrap();
    let conf_dir = dir.path().join("10").join("main");
    std::fs::create_dir_all(&conf_dir).unwrap();
    std::fs::write(
        conf_dir.join("postgresql.conf"),
        "data_directory = '/var/lib/postgresql/10/main'\nport = 5432\n",
    )
    .unwrap();
    std::fs::write(conf_dir.join("pg_hba.conf"), "local all postgres peer\n").unwrap();

    let runner = Arc::new(RecordingRunner::default());
    let admin = administrator(runner.clone(), dir.path());

    admin.reconfigure_listen_port(5433).await.unwrap();
    admin.restart_service().await.unwrap();
    assert_eq!(admin.port(), 5433);

    let conf = std::fs::read_to_string(conf_dir.join("postgresql.conf")).unwrap();
    assert_eq!(
        conf,
        "data_directory = '/var/lib/postgresql/10/main'\n\
         # JUJU SECTION\n\
         listen_addresses = '*'\n\
         port = 5433\n\
         # JUJU END SECTION\n"
    );

    let hba = std::fs::read_to_string(conf_dir.join("pg_hba.conf")).unwrap();
    assert!(hba.starts_with("local all postgres peer\n"));
    assert!(hba.contains("host all all 0.0.0.0/0 md5\n"));

    let (program, args) = runner.calls().last().cloned().unwrap();
    assert_eq!(program, "systemctl");
    assert_eq!(args, vec!["restart".to_string(), "postgresql".to_string()]);

    // New resources are advertised on the new port.
    let resource = admin.create_database_and_user("later").await.unwrap();
    assert_eq!(resource.port, 5433);
}

#[tokio::test]
async fn test_reconfigure_without_config_files_fails() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let admin = administrator(runner, dir.path());

    let err = admin.reconfigure_listen_port(5433).await.unwrap_err();
    assert!(matches!(err, AdminError::Config(_)));
    assert_eq!(admin.port(), 5432);
}

#[tokio::test]
async fn test_hook_tool_ports() {
    let runner = Arc::new(RecordingRunner::default());
    let ports = HookToolPorts::new(runner.clone());

    ports.open_port(5433).await.unwrap();
    ports.close_port(5432).await.unwrap();

    assert_eq!(
        runner.calls(),
        vec![
            ("open-port".to_string(), vec!["5433/tcp".to_string()]),
            ("close-port".to_string(), vec!["5432/tcp".to_string()]),
        ]
    );
}
