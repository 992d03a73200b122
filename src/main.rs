//! Endless CLI - Auditory Illusion Synthesizer
//!
//! Command-line interface for rendering Shepard tones, Risset rhythms and
//! control ramps to WAV.

use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use endless::cli::commands;
use endless::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Endless v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => commands::run(cmd, &cli.output).map_err(|err| {
            for suggestion in err.recovery_suggestions() {
                warn!("hint: {}", suggestion);
            }
            let code = err.error_code();
            anyhow::Error::new(err).context(format!("rendering failed [{}]", code))
        }),
        None => {
            println!("Endless v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}
