use std::process::ExitCode;

use clap::Parser;
use raft_cmdline::{error_chain, logging, AppConfig, Cli, RunOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            report(&err);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.logging);

    println!("\nRaftCmdLine - version: {}", env!("CARGO_PKG_VERSION"));

    match raft_cmdline::run(&cli, &config).await {
        Ok(RunOutcome::NoRecognizedOptions) => {
            eprintln!("\nNo recognized options");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Imported | RunOutcome::Parsed(_)) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &dyn std::error::Error) {
    for line in error_chain(err) {
        eprintln!("{line}");
    }
}
