use assetflow_db::migrations::MIGRATOR;
use serde_json::json;

use crate::commands::{execute, CommandResult, CommandSuccess, GlobalOptions};

pub fn run(options: &GlobalOptions) -> CommandResult {
    execute("migrate", options, |runtime| async move {
        let versions: Vec<i64> = MIGRATOR
            .iter()
            .filter(|migration| migration.migration_type.is_up_migration())
            .map(|migration| migration.version)
            .collect();
        Ok(CommandSuccess::new(
            "applied pending migrations",
            json!({ "database_url": runtime.config.database.url, "versions": versions }),
        ))
    })
}
