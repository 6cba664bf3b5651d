use clap::Subcommand;
use serde::Serialize;

use assetflow_core::domain::directory::UserId;

use crate::commands::{execute, failed, to_data, CommandResult, CommandSuccess, GlobalOptions};

#[derive(Debug, Subcommand)]
pub enum DirectoryCommand {
    #[command(about = "List directory users by id and name")]
    Users,
}

#[derive(Debug, Serialize)]
struct UserListing {
    id: UserId,
    name: String,
}

pub fn run(options: &GlobalOptions, command: DirectoryCommand) -> CommandResult {
    match command {
        DirectoryCommand::Users => execute("directory users", options, |runtime| async move {
            let users = runtime.directory().list_users().await.map_err(failed)?;
            let listing: Vec<UserListing> = users
                .into_iter()
                .map(|entry| UserListing { id: entry.id, name: entry.name })
                .collect();
            Ok(CommandSuccess::new(format!("{} user(s)", listing.len()), to_data(&listing)?))
        }),
    }
}
