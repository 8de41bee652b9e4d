use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zacc::cli::{Cli, run};

fn main() {
    let cli = Cli::parse();

    let default_directive = if cli.verbose { "zacc=debug" } else { "zacc=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let stdout = std::io::stdout();
    if let Err(err) = run(cli, &mut stdout.lock()) {
        let zacc_error = err.downcast_ref::<zacc::Error>();
        eprintln!("Error: {:#}", err);
        if let Some(hint) = zacc_error.and_then(zacc::Error::hint) {
            eprintln!("Hint: {}", hint);
        }
        process::exit(zacc_error.map_or(1, zacc::Error::exit_code));
    }
}
