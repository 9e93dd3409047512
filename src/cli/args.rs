//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

const AFTER_HELP: &str = "\
Quick Start:
  $ docflow init                          # Write docflow.toml
  $ docflow run                           # Process the inbox, then watch it
  $ docflow run --once                    # Process what is there and exit
  $ docflow run --watch-dir /data/in      # Override a configured root

Environment variables prefixed with DOCFLOW_ override the config file,
e.g. DOCFLOW_RETRY__MAX_ATTEMPTS=5.";

/// File lifecycle engine
#[derive(Parser)]
#[command(
    name = "docflow",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch a directory and route every arriving file to a saved or error tree",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Path to a docflow.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    #[command(about = "Write a default docflow.toml")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,

        /// Where to write the file (defaults to --config or ./docflow.toml)
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Start the engine
    #[command(about = "Process existing files, then watch for new ones")]
    Run {
        /// Directory to watch (overrides config)
        #[arg(long, value_name = "DIR")]
        watch_dir: Option<PathBuf>,

        /// Destination for processed files (overrides config)
        #[arg(long, value_name = "DIR")]
        saved_dir: Option<PathBuf>,

        /// Destination for failed files (overrides config)
        #[arg(long, value_name = "DIR")]
        error_dir: Option<PathBuf>,

        /// Process the current contents and exit without watching
        #[arg(long)]
        once: bool,
    },

    /// Display active settings
    #[command(about = "Print the effective configuration")]
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::parse_from([
            "docflow",
            "-c",
            "/etc/docflow.toml",
            "run",
            "--watch-dir",
            "/in",
            "--once",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/docflow.toml")));
        match cli.command {
            Commands::Run {
                watch_dir,
                saved_dir,
                once,
                ..
            } => {
                assert_eq!(watch_dir, Some(PathBuf::from("/in")));
                assert_eq!(saved_dir, None);
                assert!(once);
            }
            _ => panic!("expected run"),
        }
    }
}
