use std::process::ExitCode;

fn main() -> ExitCode {
    assetflow_cli::run()
}
