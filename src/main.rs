use std::path::Path;

use clap::Parser;
use docflow::cli::commands::run::RunOverrides;
use docflow::cli::{Cli, Commands};
use docflow::{Settings, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force, path } => {
            let path = path.as_deref().or(cli.config.as_deref());
            docflow::cli::commands::init::run_init(path, force);
        }

        Commands::Config => {
            let config = load_settings(cli.config.as_deref());
            docflow::cli::commands::init::run_config(&config);
        }

        Commands::Run {
            watch_dir,
            saved_dir,
            error_dir,
            once,
        } => {
            let mut config = load_settings(cli.config.as_deref());
            RunOverrides {
                watch_dir,
                saved_dir,
                error_dir,
            }
            .apply(&mut config);

            logging::init_with_config(&config.logging);

            match docflow::cli::commands::run::run(&config, once).await {
                Ok(stats) => println!("{stats}"),
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Load configuration or exit with a message.
fn load_settings(path: Option<&Path>) -> Settings {
    Settings::load(path).unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    })
}
