use crate::commands::{Cli, Commands};
use anyhow::Result;
use clap::Parser;

mod audio;
mod commands;
mod efm;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode(cmd) => efm::encode_file(&cmd).await?,
        Commands::Decode(cmd) => efm::decode_file(&cmd).await?,
    }

    Ok(())
}
