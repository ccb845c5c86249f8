use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::Settings;
use crate::llm::openai::OpenAiCompatClient;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => anyhow::bail!("unknown message role '{}'", other),
        }
    }
}

/// One message of a conversation; ordering within a sequence is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A fragment of a streamed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: String,
}

impl StreamChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Lazy, finite sequence of reply fragments. Dropping it releases the
/// underlying model connection.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// Chat-completion capability of the external model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Blocking completion: returns the whole assistant message.
    async fn generate(&self, messages: &[Message]) -> Result<Message>;

    /// Streaming completion: yields the assistant message in fragments.
    async fn stream(&self, messages: &[Message]) -> Result<ChunkStream>;
}

/// Build the chat model from runtime settings.
pub fn build_model(settings: &Settings) -> Result<Box<dyn ChatModel>> {
    match settings.llm.provider.to_lowercase().as_str() {
        "ark" | "openai" => Ok(Box::new(OpenAiCompatClient::from_settings(settings)?)),
        other => anyhow::bail!(
            "Unsupported llm.provider '{}'. Supported providers: ark, openai",
            other
        ),
    }
}
