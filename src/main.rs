use clap::Parser;
use std::process::ExitCode;
use tms_timesheet_bot::{
    cli::{self, Cli},
    logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    cli::run(cli).await
}
