use clap::Parser;
use mgcap::cli::{self, Cli};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Starting mgdump v{}", mgcap::VERSION);

    let result = cli::check(&cli).and_then(|()| cli::run(&cli));
    match result {
        Ok(packets) => {
            println!("\n{} packets captured", packets);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
