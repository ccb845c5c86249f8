//! meeting-agent - Meeting summaries and streaming meeting chat backed by an LLM
//!
//! A transcript goes through a three-stage summarization pipeline into a stored
//! meeting record; users can then chat about the meeting with answers streamed
//! back chunk by chunk.

pub mod chat;
pub mod cli;
pub mod config;
pub mod llm;
pub mod server;
pub mod storage;
pub mod summarization;
pub mod tools;

use thiserror::Error;

use crate::llm::TaskKind;

/// Main error type for meeting-agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// A required field was missing or malformed; the operation was not attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Template error: {0}")]
    Template(String),

    /// A model call failed during one summarization stage.
    #[error("Generation failed at {stage} stage: {message}")]
    Generation { stage: TaskKind, message: String },

    /// The model stream failed in the middle of a chat turn.
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Machine-readable code surfaced to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Template(_) => "template_error",
            Self::Generation { .. } => "generation_error",
            Self::Stream(_) => "stream_error",
            Self::NotFound(_) => "not_found",
            Self::Config(_) | Self::Database(_) | Self::Io(_) | Self::Other(_) => "internal_error",
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(e: anyhow::Error) -> Self {
        // Keep typed errors that were wrapped in anyhow on the way up.
        match e.downcast::<AgentError>() {
            Ok(agent) => agent,
            Err(other) => Self::Other(format!("{:#}", other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "meeting-agent";
