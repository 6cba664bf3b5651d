use std::env;
use std::fs;
use std::path::Path;

use assetflow_core::config::{resolve_config_path, AppConfig};
use serde_json::{json, Map, Value as JsonValue};
use toml::Value;

use crate::commands::{CommandFailure, CommandResult, GlobalOptions, EXIT_CONFIG};

/// Effective value of one config field plus where it came from.
struct ConfigField {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: JsonValue,
    flag: bool,
}

pub fn run(options: &GlobalOptions) -> CommandResult {
    let config = match AppConfig::load(options.load_options()) {
        Ok(config) => config,
        Err(error) => {
            return CommandFailure::new(
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            )
            .into_result("config");
        }
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut fields = Map::new();
    for field in effective_fields(&config, options) {
        let source = if field.flag {
            "flag".to_string()
        } else {
            field_source(
                field.key_path,
                field.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            )
        };
        fields.insert(
            field.key_path.to_string(),
            json!({ "value": field.value, "source": source }),
        );
    }

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: flag > env > file > default)",
        Some(json!({
            "config_file": config_file_path.map(|path| path.display().to_string()),
            "fields": fields,
        })),
    )
}

fn effective_fields(config: &AppConfig, options: &GlobalOptions) -> Vec<ConfigField> {
    let scope = serde_json::to_value(config.workflow.manager_scope).unwrap_or(JsonValue::Null);
    let format = serde_json::to_value(config.logging.format).unwrap_or(JsonValue::Null);

    vec![
        ConfigField {
            key_path: "database.url",
            env_keys: &["ASSETFLOW_DATABASE_URL"],
            value: json!(config.database.url),
            flag: options.database_url.is_some(),
        },
        ConfigField {
            key_path: "database.max_connections",
            env_keys: &["ASSETFLOW_DATABASE_MAX_CONNECTIONS"],
            value: json!(config.database.max_connections),
            flag: false,
        },
        ConfigField {
            key_path: "database.timeout_secs",
            env_keys: &["ASSETFLOW_DATABASE_TIMEOUT_SECS"],
            value: json!(config.database.timeout_secs),
            flag: false,
        },
        ConfigField {
            key_path: "workflow.manager_scope",
            env_keys: &["ASSETFLOW_WORKFLOW_MANAGER_SCOPE"],
            value: scope,
            flag: false,
        },
        ConfigField {
            key_path: "workflow.max_attempts",
            env_keys: &["ASSETFLOW_WORKFLOW_MAX_ATTEMPTS"],
            value: json!(config.workflow.max_attempts),
            flag: false,
        },
        ConfigField {
            key_path: "workflow.retry_backoff_ms",
            env_keys: &["ASSETFLOW_WORKFLOW_RETRY_BACKOFF_MS"],
            value: json!(config.workflow.retry_backoff_ms),
            flag: false,
        },
        ConfigField {
            key_path: "workflow.shared_view_department",
            env_keys: &["ASSETFLOW_WORKFLOW_SHARED_VIEW_DEPARTMENT"],
            value: json!(config.workflow.shared_view_department),
            flag: false,
        },
        ConfigField {
            key_path: "logging.level",
            env_keys: &["ASSETFLOW_LOGGING_LEVEL", "ASSETFLOW_LOG_LEVEL"],
            value: json!(config.logging.level),
            flag: false,
        },
        ConfigField {
            key_path: "logging.format",
            env_keys: &["ASSETFLOW_LOGGING_FORMAT", "ASSETFLOW_LOG_FORMAT"],
            value: format,
            flag: false,
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
