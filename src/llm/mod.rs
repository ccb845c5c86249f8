//! LLM module for meeting-agent
//!
//! Prompt templates plus access to an OpenAI-compatible chat model
//! (blocking and streaming completions).

mod client;
mod openai;
mod prompts;

pub use client::{build_model, ChatModel, ChunkStream, Message, Role, StreamChunk};
pub use openai::OpenAiCompatClient;
pub use prompts::{PromptContext, TaskKind, TemplateEngine};
