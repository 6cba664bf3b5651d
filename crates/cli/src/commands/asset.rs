use clap::Subcommand;
use serde_json::json;

use assetflow_core::domain::asset::{AssetFilter, AssetId, AssetStatus, AssetUpdate, NewAsset};
use assetflow_core::domain::directory::UserId;

use crate::commands::args;
use crate::commands::{
    actor_context, execute, failed, failed_in, to_data, CommandResult, CommandSuccess,
    GlobalOptions,
};

#[derive(Debug, Subcommand)]
pub enum AssetCommand {
    #[command(about = "Register a new asset owned by the acting user")]
    Create {
        #[arg(long, value_parser = args::user_id)]
        actor: UserId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_parser = args::user_id, help = "Defaults to the acting user")]
        responsible: Option<UserId>,
    },
    #[command(about = "Show one asset")]
    Show {
        #[arg(value_parser = args::asset_id)]
        id: AssetId,
    },
    #[command(about = "List assets, optionally filtered by requester and status")]
    List {
        #[arg(long, value_parser = args::user_id)]
        requester: Option<UserId>,
        #[arg(long, value_parser = args::asset_status)]
        status: Option<AssetStatus>,
    },
    #[command(about = "List the assets visible to the acting user")]
    Mine {
        #[arg(long, value_parser = args::user_id)]
        actor: UserId,
    },
    #[command(about = "Edit asset details; a status of under_review starts a review")]
    Update {
        #[arg(value_parser = args::asset_id)]
        id: AssetId,
        #[arg(long, value_parser = args::user_id)]
        actor: UserId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long, value_parser = args::user_id)]
        responsible: Option<UserId>,
        #[arg(long, value_parser = args::asset_status)]
        status: Option<AssetStatus>,
    },
    #[command(about = "Submit the asset for approval on behalf of its requester")]
    Review {
        #[arg(value_parser = args::asset_id)]
        id: AssetId,
        #[arg(long, value_parser = args::user_id)]
        actor: UserId,
    },
    #[command(about = "Delete the asset with its approval and maintenance history")]
    Delete {
        #[arg(value_parser = args::asset_id)]
        id: AssetId,
        #[arg(long, value_parser = args::user_id)]
        actor: UserId,
    },
}

impl AssetCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "asset create",
            Self::Show { .. } => "asset show",
            Self::List { .. } => "asset list",
            Self::Mine { .. } => "asset mine",
            Self::Update { .. } => "asset update",
            Self::Review { .. } => "asset review",
            Self::Delete { .. } => "asset delete",
        }
    }
}

pub fn run(options: &GlobalOptions, command: AssetCommand) -> CommandResult {
    let label = command.name();
    execute(label, options, |runtime| async move {
        let assets = runtime.assets();
        match command {
            AssetCommand::Create {
                actor,
                name,
                category,
                subcategory,
                description,
                responsible,
            } => {
                let context = actor_context(actor);
                let new_asset = NewAsset {
                    name,
                    description,
                    category,
                    subcategory,
                    responsible_person_id: responsible.unwrap_or(actor),
                };
                let asset = assets
                    .create_asset(&context, actor, new_asset)
                    .await
                    .map_err(failed_in(&context))?;
                Ok(CommandSuccess::new(format!("created asset {}", asset.id), to_data(&asset)?))
            }
            AssetCommand::Show { id } => {
                let asset = assets.get_asset(&id).await.map_err(failed)?;
                Ok(CommandSuccess::new(format!("asset {id}"), to_data(&asset)?))
            }
            AssetCommand::List { requester, status } => {
                let filter =
                    AssetFilter { requester_id: requester, status, ..AssetFilter::default() };
                let listed = assets
                    .list_assets(&filter)
                    .await
                    .map_err(failed)?;
                let summaries: Vec<_> = listed.iter().map(|asset| asset.summary()).collect();
                Ok(CommandSuccess::new(
                    format!("{} asset(s)", summaries.len()),
                    to_data(&summaries)?,
                ))
            }
            AssetCommand::Mine { actor } => {
                let visible = assets.list_assets_for(actor).await.map_err(failed)?;
                let summaries: Vec<_> = visible.iter().map(|asset| asset.summary()).collect();
                Ok(CommandSuccess::new(
                    format!("{} asset(s) visible to user {actor}", summaries.len()),
                    to_data(&summaries)?,
                ))
            }
            AssetCommand::Update {
                id,
                actor,
                name,
                description,
                category,
                subcategory,
                responsible,
                status,
            } => {
                let context = actor_context(actor);
                let current = assets.get_asset(&id).await.map_err(failed_in(&context))?;
                let update = AssetUpdate {
                    id: id.clone(),
                    name: name.unwrap_or(current.name),
                    description: description.unwrap_or(current.description),
                    category: category.unwrap_or(current.category),
                    subcategory: subcategory.unwrap_or(current.subcategory),
                    requester_id: current.requester_id,
                    responsible_person_id: responsible.unwrap_or(current.responsible_person_id),
                    status: status.unwrap_or(current.status),
                };
                let asset = assets
                    .update_asset(&context, actor, update)
                    .await
                    .map_err(failed_in(&context))?;
                Ok(CommandSuccess::new(format!("updated asset {id}"), to_data(&asset)?))
            }
            AssetCommand::Review { id, actor } => {
                let context = actor_context(actor);
                let started = runtime
                    .workflow()
                    .start_review(&context, &id, actor)
                    .await
                    .map_err(failed_in(&context))?;
                Ok(CommandSuccess::new(
                    format!(
                        "asset {id} under review (cycle {}, {} approval(s) opened)",
                        started.review_cycle,
                        started.approvals.len()
                    ),
                    to_data(&started)?,
                ))
            }
            AssetCommand::Delete { id, actor } => {
                let context = actor_context(actor);
                assets.delete_asset(&context, &id).await.map_err(failed_in(&context))?;
                Ok(CommandSuccess::new(format!("deleted asset {id}"), json!({ "id": id })))
            }
        }
    })
}
