//! meeting-agent - Meeting summaries and streaming meeting chat backed by an LLM
//!
//! Entry point for the meeting-agent CLI and server.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meeting_agent::cli::{commands, Cli, Commands};
use meeting_agent::config::Settings;

fn init_logging(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("info"))
        }))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            meeting_agent::cli::completions::print(shell);
        }
        command => {
            // Load configuration only for runtime commands.
            let settings = Settings::load()?;
            let level = if cli.verbose {
                "debug"
            } else {
                settings.general.log_level.as_str()
            };
            init_logging(level);

            match command {
                Commands::Serve { bind } => commands::serve(&settings, bind).await?,
                Commands::Create { payload } => commands::create_meeting(&settings, &payload).await?,
                Commands::List => commands::list_meetings(&settings)?,
                Commands::Summary {
                    meeting_id,
                    refresh,
                } => commands::show_summary(&settings, &meeting_id, refresh).await?,
                Commands::Chat {
                    meeting_id,
                    session,
                    message,
                } => commands::chat(&settings, &meeting_id, &session, &message).await?,
                Commands::Todos { meeting_id } => commands::list_todos(&settings, &meeting_id)?,
                Commands::Config(config_cmd) => commands::config_command(&settings, config_cmd)?,
                Commands::Completions { .. } => unreachable!(),
            }
        }
    }

    Ok(())
}
