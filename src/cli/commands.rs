//! CLI command implementations

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use crate::chat::TurnOutcome;
use crate::cli::args::ConfigCommand;
use crate::config::Settings;
use crate::llm::{build_model, ChatModel};
use crate::server::{self, AppState};
use crate::storage::Repository;
use crate::summarization::MeetingPayload;

fn app_state(settings: &Settings) -> Result<AppState> {
    settings.ensure_dirs()?;
    let model: Arc<dyn ChatModel> = Arc::from(build_model(settings)?);
    AppState::new(settings, model)
}

/// Run the HTTP server
pub async fn serve(settings: &Settings, bind: Option<String>) -> Result<()> {
    server::serve(settings, bind.as_deref()).await
}

/// Summarize a payload file and store the meeting
pub async fn create_meeting(settings: &Settings, payload_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(payload_path)
        .with_context(|| format!("Failed to read {}", payload_path.display()))?;
    let payload = MeetingPayload::from_json(&raw)?;

    let state = app_state(settings)?;
    let meeting = state.meetings.create_meeting(&payload).await?;

    println!("Meeting created: {}", meeting.id);
    println!("  Title: {}", meeting.title);
    println!("  Participants: {}", meeting.participants.join(", "));

    Ok(())
}

/// List stored meetings
pub fn list_meetings(settings: &Settings) -> Result<()> {
    let repo = Repository::new(settings)?;
    let meetings = repo.list_meetings()?;

    if meetings.is_empty() {
        println!("No meetings found");
        return Ok(());
    }

    println!("{:<24} {:<30} {:<18} {:<20}", "ID", "Title", "Start", "Participants");
    println!("{}", "-".repeat(92));

    for meeting in meetings {
        println!(
            "{:<24} {:<30} {:<18} {:<20}",
            meeting.id,
            truncate(&meeting.title, 28),
            truncate(&meeting.start_time, 16),
            truncate(&meeting.participants.join(","), 20)
        );
    }

    Ok(())
}

/// Print a meeting's summary
pub async fn show_summary(settings: &Settings, meeting_id: &str, refresh: bool) -> Result<()> {
    let state = app_state(settings)?;
    let summary = state.meetings.summary(meeting_id, refresh).await?;

    println!("{}", summary.content);
    if !summary.todos.is_empty() {
        println!();
        println!("Todos:");
        for todo in &summary.todos {
            println!("  - {}", todo);
        }
    }

    Ok(())
}

/// Ask about a meeting, streaming the answer. Ctrl-C or the chat timeout
/// cancels the turn, including while it waits for the session or the model.
pub async fn chat(settings: &Settings, meeting_id: &str, session_id: &str, message: &str) -> Result<()> {
    let state = app_state(settings)?;
    let meeting = state.repo.require_meeting(meeting_id)?;
    let session = state.sessions.get_or_create(meeting_id, session_id)?;

    let timeout = state.chat_timeout;
    let cancel = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = tokio::time::sleep(timeout) => {}
        }
    };
    tokio::pin!(cancel);

    let turn = tokio::select! {
        biased;
        _ = &mut cancel => {
            eprintln!("(cancelled, nothing was saved to session {})", session_id);
            return Ok(());
        }
        turn = state.chat.start_turn(&session, &meeting.transcript, message) => turn?,
    };

    let outcome = turn
        .relay(
            |chunk| {
                let mut stdout = io::stdout();
                let written = write!(stdout, "{}", chunk.content)
                    .and_then(|_| stdout.flush())
                    .is_ok();
                async move { written }
            },
            cancel,
        )
        .await;
    println!();

    match outcome? {
        TurnOutcome::Completed { .. } => Ok(()),
        TurnOutcome::Cancelled => {
            eprintln!("(cancelled, nothing was saved to session {})", session_id);
            Ok(())
        }
    }
}

/// List a meeting's todos
pub fn list_todos(settings: &Settings, meeting_id: &str) -> Result<()> {
    let repo = Repository::new(settings)?;
    repo.require_meeting(meeting_id)?;
    let todos = repo.list_todos(meeting_id)?;

    if todos.is_empty() {
        println!("No todos for {}", meeting_id);
        return Ok(());
    }

    for todo in todos {
        let mark = if todo.is_completed() { "x" } else { " " };
        match todo.assignee.as_deref() {
            Some(who) => println!("[{}] {} (@{})", mark, todo.title, who),
            None => println!("[{}] {}", mark, todo.title),
        }
    }

    Ok(())
}

/// Handle config subcommands
pub fn config_command(settings: &Settings, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let mut shown = settings.clone();
            if !shown.llm.api_key.is_empty() {
                shown.llm.api_key = "********".to_string();
            }
            let toml = toml::to_string_pretty(&shown)?;
            println!("{}", toml);
        }
        ConfigCommand::Path => {
            let path = Settings::config_path()?;
            println!("{}", path.display());
        }
        ConfigCommand::Init { force } => {
            let path = Settings::config_path()?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Settings::write_default(&path)?;
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
