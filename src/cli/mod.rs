//! CLI module for Tubechat.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Tubechat - chat with YouTube videos
///
/// Scrapes transcripts from a video, playlist or channel URL, indexes them under a
/// session, and answers questions from that session's videos only.
#[derive(Parser, Debug)]
#[command(name = "tubechat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Scrape and index the transcripts behind a YouTube URL
    Ingest {
        /// Video, shorts, youtu.be, playlist or channel URL
        url: String,

        /// Session to ingest into (a new one is created if omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Ask a question about a session's videos
    Ask {
        /// Session id printed by `ingest`
        session: String,

        /// The question to ask
        question: String,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from([
            "tubechat",
            "-vv",
            "ingest",
            "https://www.youtube.com/playlist?list=PL1",
            "--session",
            "abc",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ingest { url, session } => {
                assert_eq!(url, "https://www.youtube.com/playlist?list=PL1");
                assert_eq!(session.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_defaults_to_settings() {
        let cli = Cli::parse_from(["tubechat", "serve"]);
        assert!(matches!(cli.command, Commands::Serve { host: None, port: None }));
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from(["tubechat", "--config", "/tmp/c.toml", "ask", "s1", "What is Rust?"]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
        assert!(matches!(cli.command, Commands::Ask { .. }));
    }
}
