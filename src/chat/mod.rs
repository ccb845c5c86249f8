//! Chat module for meeting-agent
//!
//! Session histories, the streaming relay, and the glue that runs one chat
//! turn: lock the session, render the prompt, open the model stream, relay the
//! chunks, and commit the exchange only if the stream completed.

mod relay;
mod session;

pub use relay::{relay, RelayOutcome, RelayState, StreamRelay};
pub use session::{ChatSession, SessionBacking, SessionKey, SessionStore, Turn};

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::PromptSettings;
use crate::llm::{ChatModel, ChunkStream, Message, PromptContext, StreamChunk, TaskKind, TemplateEngine};
use crate::{AgentError, Result};

/// How a chat turn ended when it did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Both messages were appended to the session.
    Completed { user: Message, assistant: Message },
    /// Nothing was appended.
    Cancelled,
}

/// Model, templates and persona shared by all chat turns.
#[derive(Clone)]
pub struct ChatService {
    model: Arc<dyn ChatModel>,
    engine: TemplateEngine,
    role: String,
    style: String,
}

impl ChatService {
    pub fn new(model: Arc<dyn ChatModel>, prompt: &PromptSettings) -> Self {
        Self {
            model,
            engine: TemplateEngine::new(),
            role: prompt.role.clone(),
            style: prompt.style.clone(),
        }
    }

    /// Begin a turn on `session`. Waits for any turn already running on the
    /// same session, renders the prompt over its committed history, and opens
    /// the model stream. Errors here leave the session untouched.
    pub async fn start_turn(
        &self,
        session: &ChatSession,
        transcript: &str,
        user_text: &str,
    ) -> Result<PendingTurn> {
        if user_text.trim().is_empty() {
            return Err(AgentError::Validation("message is required".to_string()));
        }

        let turn = session.begin_turn(Message::user(user_text)).await;

        let ctx = PromptContext::new(&self.role, &self.style)
            .with_transcript(transcript)
            .with_question(user_text)
            .with_history(turn.history().to_vec());
        let messages = self.engine.render(TaskKind::Chat, &ctx)?;

        debug!(
            session = %session.key(),
            prompt_messages = messages.len(),
            "opening model stream"
        );

        let chunks = self
            .model
            .stream(&messages)
            .await
            .map_err(|e| AgentError::Stream(format!("{:#}", e)))?;

        Ok(PendingTurn { turn, chunks })
    }
}

/// A turn whose model stream is open but not yet consumed. Holds the session
/// lock until it is relayed or dropped.
pub struct PendingTurn {
    turn: Turn,
    chunks: ChunkStream,
}

impl PendingTurn {
    /// Relay the reply to `on_chunk` and commit the exchange on completion.
    pub async fn relay<F, Fut, C>(self, on_chunk: F, cancel: C) -> Result<TurnOutcome>
    where
        F: FnMut(StreamChunk) -> Fut,
        Fut: Future<Output = bool>,
        C: Future<Output = ()>,
    {
        let PendingTurn { turn, chunks } = self;

        match relay(chunks, on_chunk, cancel).await? {
            RelayOutcome::Completed(assistant) => {
                let (user, assistant) = turn.commit(assistant)?;
                info!(chars = assistant.content.chars().count(), "chat turn committed");
                Ok(TurnOutcome::Completed { user, assistant })
            }
            RelayOutcome::Cancelled => Ok(TurnOutcome::Cancelled),
        }
    }
}
