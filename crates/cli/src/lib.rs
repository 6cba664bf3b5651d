pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::approval::ApprovalCommand;
use commands::asset::AssetCommand;
use commands::directory::DirectoryCommand;
use commands::maintenance::MaintenanceCommand;
use commands::{CommandResult, GlobalOptions};

#[derive(Debug, Parser)]
#[command(
    name = "assetflow",
    about = "Assetflow operator CLI",
    long_about = "Register assets, drive their approval chain, log maintenance costs and operate the backing database.",
    after_help = "Examples:\n  assetflow seed\n  assetflow asset create --actor 1 --name Laptop --category IT --subcategory Hardware\n  assetflow asset review AST-001 --actor 1\n  assetflow approval submit AST-001 --approver 10 --approve\n  assetflow maintenance add AST-001 --actor 1 --cost 45.00 --type Repair --vendor Acme --date 2026-03-14"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an assetflow TOML config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the configured database URL")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo directory: departments, supervisors and asset managers")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, schema and approver availability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Create, inspect, edit and submit assets")]
    Asset(AssetCommand),
    #[command(subcommand, about = "Decide pending approvals")]
    Approval(ApprovalCommand),
    #[command(subcommand, about = "Maintain the cost history that drives asset values")]
    Maintenance(MaintenanceCommand),
    #[command(subcommand, about = "Browse the organisational directory")]
    Directory(DirectoryCommand),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = dispatch(cli);

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

pub fn dispatch(cli: Cli) -> CommandResult {
    let options = GlobalOptions { config_path: cli.config, database_url: cli.database_url };

    match cli.command {
        Command::Migrate => commands::migrate::run(&options),
        Command::Seed => commands::seed::run(&options),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Asset(command) => commands::asset::run(&options, command),
        Command::Approval(command) => commands::approval::run(&options, command),
        Command::Maintenance(command) => commands::maintenance::run(&options, command),
        Command::Directory(command) => commands::directory::run(&options, command),
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::Cli;

    #[test]
    fn command_tree_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn approval_submit_requires_exactly_one_decision() {
        let base = ["assetflow", "approval", "submit", "AST-001", "--approver", "10"];

        assert!(Cli::try_parse_from(base).is_err());
        assert!(Cli::try_parse_from(base.iter().chain(&["--approve", "--reject"])).is_err());
        assert!(Cli::try_parse_from(base.iter().chain(&["--reject"])).is_ok());
    }

    #[test]
    fn viewer_scoped_listing_needs_an_actor() {
        assert!(Cli::try_parse_from(["assetflow", "asset", "mine"]).is_err());
        assert!(Cli::try_parse_from(["assetflow", "asset", "mine", "--actor", "1"]).is_ok());
        assert!(Cli::try_parse_from(["assetflow", "directory", "users"]).is_ok());
    }

    #[test]
    fn malformed_identifiers_are_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["assetflow", "asset", "show", "AST-1"]).is_err());
        assert!(Cli::try_parse_from(["assetflow", "asset", "show", "AST-001"]).is_ok());
        assert!(Cli::try_parse_from([
            "assetflow",
            "maintenance",
            "add",
            "AST-001",
            "--actor",
            "1",
            "--cost",
            "ten",
            "--type",
            "Repair",
            "--vendor",
            "Acme",
            "--date",
            "2026-03-14",
        ])
        .is_err());
    }
}
