//! Shared application state injected into every handler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::chat::{ChatService, SessionStore};
use crate::config::Settings;
use crate::llm::ChatModel;
use crate::storage::Repository;
use crate::summarization::{MeetingService, SummarizationPipeline};
use crate::tools::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub meetings: MeetingService,
    pub chat: ChatService,
    pub sessions: SessionStore,
    pub tools: ToolRegistry,
    pub repo: Repository,
    /// Upper bound on one streamed chat turn
    pub chat_timeout: Duration,
}

impl AppState {
    /// State over the configured database
    pub fn new(settings: &Settings, model: Arc<dyn ChatModel>) -> Result<Self> {
        let repo = Repository::new(settings)?;
        Ok(Self::with_repository(settings, model, repo))
    }

    pub fn with_repository(settings: &Settings, model: Arc<dyn ChatModel>, repo: Repository) -> Self {
        let pipeline = SummarizationPipeline::new(Arc::clone(&model), &settings.prompt);
        Self {
            meetings: MeetingService::new(pipeline, repo.clone()),
            chat: ChatService::new(model, &settings.prompt),
            sessions: SessionStore::with_backing(Arc::new(repo.clone())),
            tools: ToolRegistry::new(repo.clone()),
            repo,
            chat_timeout: settings.chat_timeout(),
        }
    }
}
