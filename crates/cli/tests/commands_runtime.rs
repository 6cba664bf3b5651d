use std::env;
use std::sync::{Mutex, OnceLock};

use assetflow_cli::commands::{config, doctor, migrate, seed, CommandResult, GlobalOptions};
use assetflow_cli::{dispatch, Cli};
use clap::Parser;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("ASSETFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(&GlobalOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["versions"], serde_json::json!([1, 2]));
    });
}

#[test]
fn invalid_env_override_is_a_config_failure() {
    with_env(&[("ASSETFLOW_WORKFLOW_MAX_ATTEMPTS", "many")], || {
        let result = migrate::run(&GlobalOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn unreachable_database_is_a_connectivity_failure() {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("missing/nested/assetflow.db").display());
    with_env(&[("ASSETFLOW_DATABASE_URL", &url)], || {
        let result = migrate::run(&GlobalOptions::default());
        assert_eq!(result.exit_code, 4, "{}", result.output);
        assert_eq!(parse_payload(&result.output)["error_class"], "db_connectivity");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("temp dir");
    let options = file_database(&dir);
    with_env(&[], || {
        let first = seed::run(&options);
        assert_eq!(first.exit_code, 0, "{}", first.output);
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["data"]["inserted_users"], 6);
        assert_eq!(first_payload["data"]["users"].as_array().map(Vec::len), Some(6));

        let second = seed::run(&options);
        assert_eq!(second.exit_code, 0, "{}", second.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["data"]["inserted_users"], 0);
        assert_eq!(first_payload["data"]["users"], second_payload["data"]["users"]);
    });
}

#[test]
fn config_reports_flag_and_env_sources() {
    with_env(&[("ASSETFLOW_LOG_LEVEL", "debug")], || {
        let options = GlobalOptions {
            database_url: Some("sqlite::memory:".to_string()),
            ..GlobalOptions::default()
        };
        let result = config::run(&options);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let fields = &parse_payload(&result.output)["data"]["fields"];
        assert_eq!(fields["database.url"]["value"], "sqlite::memory:");
        assert_eq!(fields["database.url"]["source"], "flag");
        assert_eq!(fields["logging.level"]["value"], "debug");
        assert_eq!(fields["logging.level"]["source"], "env (ASSETFLOW_LOG_LEVEL)");
        assert_eq!(fields["workflow.manager_scope"]["source"], "default");
    });
}

#[test]
fn doctor_warns_until_the_directory_has_managers() {
    let dir = TempDir::new().expect("temp dir");
    let options = file_database(&dir);
    with_env(&[], || {
        let before = doctor::run(&options, true);
        assert_eq!(before.exit_code, 0, "{}", before.output);
        let report = parse_payload(&before.output);
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(check_status(&report, "approver_directory"), "warn");

        assert_eq!(seed::run(&options).exit_code, 0);
        let after = parse_payload(&doctor::run(&options, true).output);
        assert_eq!(check_status(&after, "approver_directory"), "pass");
    });
}

#[test]
fn asset_travels_the_full_approval_chain_and_accrues_maintenance_value() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    with_env(&[], || {
        assert_eq!(invoke(&url, &["seed"]).exit_code, 0);

        let created = invoke(&url, &[
            "asset",
            "create",
            "--actor",
            "1",
            "--name",
            "Laptop",
            "--category",
            "IT",
            "--subcategory",
            "Hardware",
        ]);
        let created = ok_data(&created);
        assert_eq!(created["id"], "AST-001");
        assert_eq!(created["status"], "new");
        assert_eq!(created["value"], "0.00");

        let review = ok_data(&invoke(&url, &["asset", "review", "AST-001", "--actor", "1"]));
        assert_eq!(review["review_cycle"], 1);
        assert_eq!(review["approvals"].as_array().map(Vec::len), Some(1));

        let supervisor = ok_data(&invoke(
            &url,
            &["approval", "submit", "AST-001", "--approver", "10", "--approve"],
        ));
        assert_eq!(supervisor["asset_status"], "under_review");
        assert_eq!(supervisor["created_approvals"].as_array().map(Vec::len), Some(2));

        let pending = ok_data(&invoke(&url, &["approval", "pending", "--approver", "21"]));
        assert_eq!(pending.as_array().map(Vec::len), Some(1));

        let manager = ok_data(&invoke(&url, &[
            "approval",
            "submit",
            "AST-001",
            "--approver",
            "21",
            "--approve",
            "--comments",
            "budget ok",
        ]));
        assert_eq!(manager["asset_status"], "assigned");

        let late =
            invoke(&url, &["approval", "submit", "AST-001", "--approver", "20", "--reject"]);
        assert_eq!(late.exit_code, 6);
        let late = parse_payload(&late.output);
        assert_eq!(late["error_class"], "no_pending_approval");
        assert!(late["correlation_id"].is_string());

        for cost in ["45.50", "4.50"] {
            let added = invoke(&url, &[
                "maintenance",
                "add",
                "AST-001",
                "--actor",
                "1",
                "--cost",
                cost,
                "--type",
                "Repair",
                "--vendor",
                "Acme",
                "--date",
                "2026-03-14",
            ]);
            assert_eq!(added.exit_code, 0, "{}", added.output);
        }

        let shown = ok_data(&invoke(&url, &["asset", "show", "AST-001"]));
        assert_eq!(shown["status"], "assigned");
        assert_eq!(shown["value"], "50.00");

        let recomputed = ok_data(&invoke(&url, &["maintenance", "recompute", "AST-001"]));
        assert_eq!(recomputed["rollup"]["value"], "50.00");
        assert_eq!(recomputed["rollup"]["record_count"], 2);
    });
}

#[test]
fn viewers_in_the_shared_department_see_their_colleagues_assets() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    with_env(&[("ASSETFLOW_WORKFLOW_SHARED_VIEW_DEPARTMENT", "3")], || {
        assert_eq!(invoke(&url, &["seed"]).exit_code, 0);
        for actor in ["30", "31", "1"] {
            let created = invoke(&url, &[
                "asset",
                "create",
                "--actor",
                actor,
                "--name",
                "Monitor",
                "--category",
                "IT",
                "--subcategory",
                "Peripherals",
            ]);
            assert_eq!(created.exit_code, 0, "{}", created.output);
        }

        let shared = ok_data(&invoke(&url, &["asset", "mine", "--actor", "30"]));
        let ids: Vec<&str> = shared
            .as_array()
            .map(|assets| assets.iter().filter_map(|asset| asset["id"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec!["AST-001", "AST-002"]);

        let own = ok_data(&invoke(&url, &["asset", "mine", "--actor", "1"]));
        assert_eq!(own.as_array().map(Vec::len), Some(1));
        assert_eq!(own[0]["id"], "AST-003");

        let unknown = invoke(&url, &["asset", "mine", "--actor", "99"]);
        assert_eq!(unknown.exit_code, 6);
        assert_eq!(parse_payload(&unknown.output)["error_class"], "not_found");
    });
}

#[test]
fn directory_users_lists_ids_and_names() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    with_env(&[], || {
        assert_eq!(invoke(&url, &["seed"]).exit_code, 0);

        let users = ok_data(&invoke(&url, &["directory", "users"]));
        assert_eq!(users.as_array().map(Vec::len), Some(6));
        assert_eq!(users[0], serde_json::json!({ "id": 1, "name": "riley.requester" }));
        assert_eq!(users[5], serde_json::json!({ "id": 31, "name": "jo.selflead" }));
    });
}

#[test]
fn operation_failures_exit_with_the_operation_code() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    with_env(&[], || {
        let missing = invoke(&url, &["asset", "show", "AST-404"]);
        assert_eq!(missing.exit_code, 6);
        assert_eq!(parse_payload(&missing.output)["error_class"], "not_found");

        let negative = invoke(
            &url,
            &[
                "maintenance",
                "add",
                "AST-404",
                "--actor",
                "1",
                "--cost=-1.00",
                "--type",
                "Repair",
                "--vendor",
                "Acme",
                "--date",
                "2026-03-14",
            ],
        );
        assert_eq!(negative.exit_code, 6);
        assert_eq!(parse_payload(&negative.output)["error_class"], "domain_validation");
    });
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("assetflow.db").display())
}

fn file_database(dir: &TempDir) -> GlobalOptions {
    GlobalOptions { database_url: Some(database_url(dir)), ..GlobalOptions::default() }
}

fn invoke(url: &str, args: &[&str]) -> CommandResult {
    let argv = ["assetflow", "--database-url", url].into_iter().chain(args.iter().copied());
    dispatch(Cli::try_parse_from(argv).expect("arguments should parse"))
}

fn ok_data(result: &CommandResult) -> Value {
    assert_eq!(result.exit_code, 0, "{}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "ok");
    payload["data"].clone()
}

fn check_status(report: &Value, name: &str) -> String {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ASSETFLOW_DATABASE_URL",
        "ASSETFLOW_DATABASE_MAX_CONNECTIONS",
        "ASSETFLOW_DATABASE_TIMEOUT_SECS",
        "ASSETFLOW_WORKFLOW_MANAGER_SCOPE",
        "ASSETFLOW_WORKFLOW_MAX_ATTEMPTS",
        "ASSETFLOW_WORKFLOW_RETRY_BACKOFF_MS",
        "ASSETFLOW_WORKFLOW_SHARED_VIEW_DEPARTMENT",
        "ASSETFLOW_LOGGING_LEVEL",
        "ASSETFLOW_LOGGING_FORMAT",
        "ASSETFLOW_LOG_LEVEL",
        "ASSETFLOW_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
