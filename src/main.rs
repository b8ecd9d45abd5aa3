use clap::Parser;
use log::*;
use portcullis::commands::Command;
use service::{config::Config, logging::Logger};

#[derive(Debug, Parser)]
#[command(author, version, about = "Administration tasks for portcullis authentication", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = Logger::init_logger(&cli.config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    debug!("Running in {} mode", cli.config.runtime_env());

    match cli.command.run(&cli.config).await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
