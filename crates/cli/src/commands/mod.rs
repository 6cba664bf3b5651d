pub mod approval;
pub mod args;
pub mod asset;
pub mod config;
pub mod directory;
pub mod doctor;
pub mod maintenance;
pub mod migrate;
pub mod seed;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use assetflow_core::audit::{AuditContext, AuditSink, TracingAuditSink};
use assetflow_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use assetflow_core::domain::directory::UserId;
use assetflow_core::errors::ApplicationError;
use assetflow_core::rollup::MaintenanceLedger;
use assetflow_core::workflow::WorkflowSettings;
use assetflow_core::{ApprovalWorkflow, AssetService, DirectoryService};
use assetflow_db::{connect, migrations, DbPool, SqlStore};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::logging;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DB_CONNECTIVITY: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_OPERATION: u8 = 6;

/// Options shared by every subcommand.
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
}

impl GlobalOptions {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        CommandFailure::new(error_class, message, exit_code).into_result(command)
    }
}

/// A command that did not complete, with the exit code it maps to.
#[derive(Debug)]
pub struct CommandFailure {
    pub error_class: String,
    pub message: String,
    pub exit_code: u8,
    pub correlation_id: Option<String>,
}

impl CommandFailure {
    pub fn new(error_class: &str, message: impl Into<String>, exit_code: u8) -> Self {
        Self {
            error_class: error_class.to_string(),
            message: message.into(),
            exit_code,
            correlation_id: None,
        }
    }

    pub fn operation(error: ApplicationError, context: Option<&AuditContext>) -> Self {
        Self {
            error_class: error.class().to_string(),
            message: error.to_string(),
            exit_code: EXIT_OPERATION,
            correlation_id: context.map(|context| context.correlation_id.clone()),
        }
    }

    pub fn into_result(self, command: &str) -> CommandResult {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(self.error_class),
            message: self.message,
            correlation_id: self.correlation_id,
            data: None,
        };
        CommandResult { exit_code: self.exit_code, output: serialize_payload(payload) }
    }
}

/// What a successful operation command reports.
pub struct CommandSuccess {
    pub message: String,
    pub data: Option<Value>,
}

impl CommandSuccess {
    pub fn new(message: impl Into<String>, data: Value) -> Self {
        Self { message: message.into(), data: Some(data) }
    }
}

/// Wired services over one migrated pool.
pub struct Runtime {
    pub config: AppConfig,
    pub pool: DbPool,
    pub settings: WorkflowSettings,
    pub store: SqlStore,
    audit: Arc<dyn AuditSink>,
}

impl Runtime {
    pub fn assets(&self) -> AssetService<SqlStore> {
        AssetService::new(self.store.clone(), self.settings, self.audit.clone())
    }

    pub fn workflow(&self) -> ApprovalWorkflow<SqlStore> {
        ApprovalWorkflow::new(self.store.clone(), self.settings, self.audit.clone())
    }

    pub fn ledger(&self) -> MaintenanceLedger<SqlStore> {
        MaintenanceLedger::new(self.store.clone(), self.settings.retry, self.audit.clone())
    }

    pub fn directory(&self) -> DirectoryService<SqlStore> {
        DirectoryService::new(self.store.clone(), self.settings.retry)
    }
}

/// Fresh correlation id for an operation performed by `actor`.
pub fn actor_context(actor: UserId) -> AuditContext {
    AuditContext::new(Uuid::new_v4().to_string(), format!("user:{actor}"))
}

/// `map_err` adapter for reads that carry no correlation id.
pub fn failed(error: ApplicationError) -> CommandFailure {
    CommandFailure::operation(error, None)
}

/// `map_err` adapter tagging the failure with the operation's correlation id.
pub fn failed_in(context: &AuditContext) -> impl Fn(ApplicationError) -> CommandFailure + '_ {
    move |error| CommandFailure::operation(error, Some(context))
}

pub fn to_data<T: Serialize>(value: &T) -> Result<Value, CommandFailure> {
    serde_json::to_value(value)
        .map_err(|error| CommandFailure::new("serialization", error.to_string(), EXIT_OPERATION))
}

pub fn load_config(options: &GlobalOptions) -> Result<AppConfig, CommandFailure> {
    let config = AppConfig::load(options.load_options()).map_err(|error| {
        CommandFailure::new(
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })?;
    logging::init(&config.logging);
    Ok(config)
}

pub async fn open_pool(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    let pool = connect(&config.database).await.map_err(|error| {
        CommandFailure::new("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY)
    })?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| CommandFailure::new("migration", error.to_string(), EXIT_MIGRATION))?;
    Ok(pool)
}

/// Loads config, opens and migrates the database, then runs `operation` on a current-thread
/// runtime. The pool is closed before returning.
pub fn execute<F, Fut>(command: &str, options: &GlobalOptions, operation: F) -> CommandResult
where
    F: FnOnce(Runtime) -> Fut,
    Fut: Future<Output = Result<CommandSuccess, CommandFailure>>,
{
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return failure.into_result(command),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let settings = WorkflowSettings::from_config(&config.workflow);
        let services = Runtime {
            store: SqlStore::new(pool.clone()),
            pool: pool.clone(),
            settings,
            config,
            audit: Arc::new(TracingAuditSink),
        };
        let outcome = operation(services).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(success) => {
            tracing::debug!(event_name = "cli.command.completed", command, "command succeeded");
            CommandResult::success_with_data(command, success.message, success.data)
        }
        Err(failure) => {
            tracing::warn!(
                event_name = "cli.command.failed",
                command,
                error_class = %failure.error_class,
                exit_code = failure.exit_code,
                correlation_id = failure.correlation_id.as_deref().unwrap_or("none"),
                "command failed"
            );
            failure.into_result(command)
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
