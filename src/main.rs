use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use sensor_lander::{Cli, Commands, commands, logging};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        Commands::Process(args) => {
            let result = commands::process::run(args).await?;
            Ok(ExitCode::from(exit_code_for(result.status_code)))
        }
        Commands::Completions { shell } => {
            Commands::generate_completions(shell);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Maps an invocation status code onto a process exit code.
fn exit_code_for(status_code: u16) -> u8 {
    match status_code {
        200 => 0,
        207 => 2,
        499 => 130,
        _ => 1,
    }
}
