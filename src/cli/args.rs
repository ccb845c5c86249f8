//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// meeting-agent - Meeting summaries and streaming meeting chat backed by an LLM
#[derive(Parser, Debug)]
#[command(name = "meeting-agent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on (overrides server.bind_address)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Summarize a meeting payload file and store the meeting
    Create {
        /// JSON file of the form {"contents": [...]}
        payload: PathBuf,
    },

    /// List stored meetings
    List,

    /// Show a meeting's summary, computing it if needed
    Summary {
        /// Meeting ID
        meeting_id: String,

        /// Recompute and overwrite the stored summary
        #[arg(short, long)]
        refresh: bool,
    },

    /// Ask a question about a meeting; the answer streams to stdout
    Chat {
        /// Meeting ID
        meeting_id: String,

        /// Chat session to continue
        #[arg(short, long, default_value = "cli")]
        session: String,

        /// The question
        message: String,
    },

    /// List a meeting's todos
    Todos {
        /// Meeting ID
        meeting_id: String,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}
