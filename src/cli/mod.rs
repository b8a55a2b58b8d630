use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod error;
pub mod handler;
pub mod output;

/// mediaq - media download queue for a yt-dlp style backend
#[derive(Parser, Debug)]
#[command(name = "mediaq")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Override config directory path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (TRACE level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use the in-process simulated backend instead of HTTP
    #[arg(long, global = true)]
    pub sim: bool,

    /// Subcommand to execute; without one the terminal UI starts
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze links and list their formats
    Analyze {
        /// Links to analyze
        urls: Vec<String>,

        /// File containing links (one per line)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download one link and follow it until it finishes
    Download {
        /// Link to download
        url: String,

        /// Format id from `analyze` (default from config)
        #[arg(long, short)]
        format: Option<String>,

        /// Print progress as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Start several links with one format and follow them
    Batch {
        /// Links to download
        urls: Vec<String>,

        /// File containing links (one per line)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Format id applied to every link
        #[arg(long, short)]
        format: Option<String>,

        /// Print progress as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        /// Configuration action
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show all configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the settings file location
    Path,

    /// Reset configuration to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download() {
        let cli = Cli::parse_from(["mediaq", "--sim", "download", "https://a", "-f", "720p"]);
        assert!(cli.sim);
        match cli.command {
            Some(Commands::Download { url, format, json }) => {
                assert_eq!(url, "https://a");
                assert_eq!(format.as_deref(), Some("720p"));
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_no_command_means_tui() {
        let cli = Cli::parse_from(["mediaq", "--verbose"]);
        assert!(cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["mediaq", "config", "path", "--config", "/tmp/x"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Path
            })
        ));
    }
}
