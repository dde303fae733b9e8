mod cli;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    match &cli.command {
        Commands::Models { config } => match command::models(config) {
            Ok(filename) => println!("File saved to `{}`", filename),
            Err(e) => fail(e),
        },
        Commands::Observed {
            config,
            station,
            reanalysis,
        } => match command::observed(config, station.as_deref(), reanalysis.as_deref()) {
            Ok(filename) => println!("File saved to `{}`", filename),
            Err(e) => fail(e),
        },
        Commands::Resolve { config } => match command::resolve(config) {
            Ok(summary) => println!("{}", summary),
            Err(e) => fail(e),
        },
    }

    Ok(())
}

fn fail(e: Error) -> ! {
    eprintln!("Error: {:#}", e);
    std::process::exit(1)
}
