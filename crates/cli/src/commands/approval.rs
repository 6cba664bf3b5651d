use clap::{ArgGroup, Subcommand};

use assetflow_core::domain::asset::AssetId;
use assetflow_core::domain::directory::UserId;

use crate::commands::args;
use crate::commands::{
    actor_context, execute, failed, failed_in, to_data, CommandResult, CommandSuccess,
    GlobalOptions,
};

#[derive(Debug, Subcommand)]
pub enum ApprovalCommand {
    #[command(
        about = "Record an approve or reject decision on a pending approval",
        group(ArgGroup::new("decision").required(true).args(["approve", "reject"]))
    )]
    Submit {
        #[arg(value_parser = args::asset_id)]
        asset: AssetId,
        #[arg(long, value_parser = args::user_id)]
        approver: UserId,
        #[arg(long)]
        approve: bool,
        #[arg(long)]
        reject: bool,
        #[arg(long)]
        comments: Option<String>,
    },
    #[command(about = "List assets awaiting a decision from the approver")]
    Pending {
        #[arg(long, value_parser = args::user_id)]
        approver: UserId,
    },
}

pub fn run(options: &GlobalOptions, command: ApprovalCommand) -> CommandResult {
    match command {
        ApprovalCommand::Submit { asset, approver, approve, reject: _, comments } => {
            execute("approval submit", options, |runtime| async move {
                let context = actor_context(approver);
                let outcome = runtime
                    .workflow()
                    .submit_approval(&context, &asset, approver, approve, comments)
                    .await
                    .map_err(failed_in(&context))?;
                Ok(CommandSuccess::new(
                    format!(
                        "{} recorded on {asset}: {}",
                        outcome.decision.status().as_str(),
                        outcome.verdict.label()
                    ),
                    to_data(&outcome)?,
                ))
            })
        }
        ApprovalCommand::Pending { approver } => {
            execute("approval pending", options, |runtime| async move {
                let pending =
                    runtime.workflow().list_pending_approvals(approver).await.map_err(failed)?;
                Ok(CommandSuccess::new(
                    format!("{} asset(s) awaiting user {approver}", pending.len()),
                    to_data(&pending)?,
                ))
            })
        }
    }
}
