use assetflow_core::config::AppConfig;
use assetflow_core::domain::directory::ManagerScope;
use assetflow_core::store::{DirectoryReader, Store};
use assetflow_db::{connect, migrations, DbPool, SqlStore};
use serde::Serialize;

use crate::commands::{
    CommandResult, GlobalOptions, EXIT_CONFIG, EXIT_DB_CONNECTIVITY, EXIT_MIGRATION,
    EXIT_RUNTIME,
};
use crate::logging;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
    #[serde(skip)]
    exit_code: u8,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into(), exit_code: 0 }
    }

    fn fail(name: &'static str, details: impl Into<String>, exit_code: u8) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into(), exit_code }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: reason.to_string(), exit_code: 0 }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn exit_code(&self) -> u8 {
        self.checks
            .iter()
            .find(|check| check.status == CheckStatus::Fail)
            .map_or(0, |check| check.exit_code)
    }
}

pub fn run(options: &GlobalOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &GlobalOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.load_options()) {
        Ok(config) => {
            logging::init(&config.logging);
            checks
                .push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            let reason = "skipped because configuration did not load";
            checks.push(DoctorCheck::fail("config_validation", error.to_string(), EXIT_CONFIG));
            checks.push(DoctorCheck::skipped("database_connectivity", reason));
            checks.push(DoctorCheck::skipped("schema_migrations", reason));
            checks.push(DoctorCheck::skipped("approver_directory", reason));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )];
        }
    };

    runtime.block_on(async {
        let pool = match connect(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                let reason = "skipped because the database is unreachable";
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                        EXIT_DB_CONNECTIVITY,
                    ),
                    DoctorCheck::skipped("schema_migrations", reason),
                    DoctorCheck::skipped("approver_directory", reason),
                ];
            }
        };

        let mut checks = vec![DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        )];
        match migrations::run_pending(&pool).await {
            Ok(()) => {
                checks.push(DoctorCheck::pass("schema_migrations", "schema is up to date"));
                checks.push(check_approver_directory(&pool).await);
            }
            Err(error) => {
                checks.push(DoctorCheck::fail(
                    "schema_migrations",
                    error.to_string(),
                    EXIT_MIGRATION,
                ));
                checks.push(DoctorCheck::skipped(
                    "approver_directory",
                    "skipped because migrations did not apply",
                ));
            }
        }
        pool.close().await;
        checks
    })
}

/// Without any asset manager every review start fails with `no_approver_available`.
async fn check_approver_directory(pool: &DbPool) -> DoctorCheck {
    let store = SqlStore::new(pool.clone());
    let managers = match store.begin().await {
        Ok(mut session) => session.list_asset_managers(ManagerScope::Global).await,
        Err(error) => Err(error),
    };

    match managers {
        Ok(managers) if managers.is_empty() => DoctorCheck {
            name: "approver_directory",
            status: CheckStatus::Warn,
            details: "no asset managers in the directory; run `assetflow seed`".to_string(),
            exit_code: 0,
        },
        Ok(managers) => DoctorCheck::pass(
            "approver_directory",
            format!("{} asset manager(s) available", managers.len()),
        ),
        Err(error) => {
            DoctorCheck::fail("approver_directory", error.to_string(), EXIT_DB_CONNECTIVITY)
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
