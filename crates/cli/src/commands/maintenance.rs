use chrono::NaiveDate;
use clap::Subcommand;
use rust_decimal::Decimal;
use serde_json::json;

use assetflow_core::audit::AuditContext;
use assetflow_core::domain::asset::AssetId;
use assetflow_core::domain::directory::UserId;
use assetflow_core::domain::maintenance::{
    MaintenanceRecordId, MaintenanceUpdate, NewMaintenanceRecord,
};
use assetflow_core::rollup::ledger::LedgerChange;

use crate::commands::args;
use crate::commands::{
    actor_context, execute, failed, failed_in, to_data, CommandFailure, CommandResult,
    CommandSuccess, GlobalOptions,
};

#[derive(Debug, Subcommand)]
pub enum MaintenanceCommand {
    #[command(about = "Log a maintenance cost against an asset and refresh its value")]
    Add {
        #[arg(value_parser = args::asset_id)]
        asset: AssetId,
        #[arg(long, value_parser = args::user_id)]
        actor: UserId,
        #[arg(long, allow_negative_numbers = true, value_parser = args::money)]
        cost: Decimal,
        #[arg(long = "type")]
        maintenance_type: String,
        #[arg(long)]
        vendor: String,
        #[arg(long, default_value = "")]
        comments: String,
        #[arg(long, value_parser = args::date)]
        date: NaiveDate,
    },
    #[command(about = "Edit a maintenance record and refresh the asset value")]
    Update {
        #[arg(value_parser = args::record_id)]
        id: MaintenanceRecordId,
        #[arg(long, value_parser = args::user_id)]
        actor: UserId,
        #[arg(long, allow_negative_numbers = true, value_parser = args::money)]
        cost: Option<Decimal>,
        #[arg(long = "type")]
        maintenance_type: Option<String>,
        #[arg(long)]
        vendor: Option<String>,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long, value_parser = args::date)]
        date: Option<NaiveDate>,
    },
    #[command(about = "Remove a maintenance record and refresh the asset value")]
    Delete {
        #[arg(value_parser = args::record_id)]
        id: MaintenanceRecordId,
        #[arg(long, value_parser = args::user_id)]
        actor: UserId,
    },
    #[command(about = "List the maintenance history of an asset")]
    List {
        #[arg(value_parser = args::asset_id)]
        asset: AssetId,
    },
    #[command(about = "Recompute an asset value from its maintenance history")]
    Recompute {
        #[arg(value_parser = args::asset_id)]
        asset: AssetId,
        #[arg(long, value_parser = args::user_id)]
        actor: Option<UserId>,
    },
}

impl MaintenanceCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "maintenance add",
            Self::Update { .. } => "maintenance update",
            Self::Delete { .. } => "maintenance delete",
            Self::List { .. } => "maintenance list",
            Self::Recompute { .. } => "maintenance recompute",
        }
    }
}

pub fn run(options: &GlobalOptions, command: MaintenanceCommand) -> CommandResult {
    let label = command.name();
    execute(label, options, |runtime| async move {
        let ledger = runtime.ledger();
        match command {
            MaintenanceCommand::Add {
                asset,
                actor,
                cost,
                maintenance_type,
                vendor,
                comments,
                date,
            } => {
                let context = actor_context(actor);
                let record = NewMaintenanceRecord {
                    asset_id: asset,
                    cost,
                    maintenance_type,
                    vendor,
                    comments,
                    maintenance_date: date,
                };
                let change =
                    ledger.add_record(&context, actor, record).await.map_err(failed_in(&context))?;
                change_success("logged maintenance", &change)
            }
            MaintenanceCommand::Update {
                id,
                actor,
                cost,
                maintenance_type,
                vendor,
                comments,
                date,
            } => {
                let context = actor_context(actor);
                let current = ledger.get_record(id).await.map_err(failed_in(&context))?;
                let update = MaintenanceUpdate {
                    id,
                    cost: cost.unwrap_or(current.cost),
                    maintenance_type: maintenance_type.unwrap_or(current.maintenance_type),
                    vendor: vendor.unwrap_or(current.vendor),
                    comments: comments.unwrap_or(current.comments),
                    maintenance_date: date.unwrap_or(current.maintenance_date),
                };
                let change = ledger
                    .update_record(&context, actor, update)
                    .await
                    .map_err(failed_in(&context))?;
                change_success("updated maintenance", &change)
            }
            MaintenanceCommand::Delete { id, actor } => {
                let context = actor_context(actor);
                let change = ledger.delete_record(&context, id).await.map_err(failed_in(&context))?;
                change_success("deleted maintenance", &change)
            }
            MaintenanceCommand::List { asset } => {
                let records = ledger.list_records(&asset).await.map_err(failed)?;
                Ok(CommandSuccess::new(
                    format!("{} maintenance record(s) for {asset}", records.len()),
                    to_data(&records)?,
                ))
            }
            MaintenanceCommand::Recompute { asset, actor } => {
                let context = actor.map_or_else(AuditContext::default, actor_context);
                let rollup = ledger
                    .record_maintenance_change(&context, &asset)
                    .await
                    .map_err(failed_in(&context))?;
                let message = match &rollup {
                    Some(result) => format!("asset {asset} value is {}", result.value),
                    None => format!("asset {asset} no longer exists; nothing to recompute"),
                };
                Ok(CommandSuccess::new(message, json!({ "rollup": rollup })))
            }
        }
    })
}

fn change_success(verb: &str, change: &LedgerChange) -> Result<CommandSuccess, CommandFailure> {
    let message = match &change.rollup {
        Some(rollup) => format!(
            "{verb}; asset {} value is {} over {} record(s)",
            rollup.asset_id, rollup.value, rollup.record_count
        ),
        None => verb.to_string(),
    };
    Ok(CommandSuccess::new(message, to_data(change)?))
}
