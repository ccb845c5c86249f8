//! Title, description and summary generation for one transcript.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PromptSettings;
use crate::llm::{ChatModel, PromptContext, TaskKind, TemplateEngine};
use crate::storage::TASK_MARKER;
use crate::{AgentError, Result};

/// Everything the pipeline produces for a meeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryDraft {
    pub title: String,
    pub description: String,
    pub summary: String,
    pub todos: Vec<String>,
}

/// Summary stage output alone, as used for lazy or forced recomputation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryText {
    pub content: String,
    pub todos: Vec<String>,
}

#[derive(Clone)]
pub struct SummarizationPipeline {
    model: Arc<dyn ChatModel>,
    engine: TemplateEngine,
    role: String,
    style: String,
}

impl SummarizationPipeline {
    pub fn new(model: Arc<dyn ChatModel>, prompt: &PromptSettings) -> Self {
        Self {
            model,
            engine: TemplateEngine::new(),
            role: prompt.role.clone(),
            style: prompt.style.clone(),
        }
    }

    /// Run all three stages. Title and description run concurrently; the
    /// summary runs once both have succeeded. Any failure discards everything.
    pub async fn summarize(&self, transcript: &str, start: &str, end: &str) -> Result<SummaryDraft> {
        let (title, description) = tokio::try_join!(
            self.run_stage(TaskKind::Title, transcript.to_string()),
            self.run_stage(TaskKind::Description, transcript.to_string()),
        )?;

        let summary = self.summary(transcript, start, end).await?;

        info!(
            title = %title,
            todos = summary.todos.len(),
            "meeting summarized"
        );

        Ok(SummaryDraft {
            title,
            description,
            summary: summary.content,
            todos: summary.todos,
        })
    }

    /// Summary stage only, with todos extracted from its text.
    pub async fn summary(&self, transcript: &str, start: &str, end: &str) -> Result<SummaryText> {
        let content = self
            .run_stage(TaskKind::Summary, summary_input(start, end, transcript))
            .await?;
        let todos = extract_todos(&content);
        Ok(SummaryText { content, todos })
    }

    async fn run_stage(&self, stage: TaskKind, input: String) -> Result<String> {
        let ctx = PromptContext::new(&self.role, &self.style).with_transcript(input);
        let messages = self.engine.render(stage, &ctx)?;

        debug!(%stage, "running summarization stage");
        let reply = self.model.generate(&messages).await.map_err(|e| {
            warn!(%stage, error = %format!("{:#}", e), "summarization stage failed");
            AgentError::Generation {
                stage,
                message: format!("{:#}", e),
            }
        })?;

        let text = reply.content.trim();
        if text.is_empty() {
            return Err(AgentError::Generation {
                stage,
                message: "model returned empty output".to_string(),
            });
        }
        Ok(text.to_string())
    }
}

/// Input of the summary stage: meeting times followed by the transcript.
pub fn summary_input(start: &str, end: &str, transcript: &str) -> String {
    format!(
        "会议开始时间是{}，会议结束时间是{}，会议内容是{}",
        start, end, transcript
    )
}

/// Action items from summary text: every line stating `<someone>的任务是...`,
/// with list markers and emphasis removed, in order of appearance.
pub fn extract_todos(summary: &str) -> Vec<String> {
    summary
        .lines()
        .map(strip_list_marker)
        .filter(|line| line.contains(TASK_MARKER))
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '+' | '•' | '·'))
        .trim_start();

    let after_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let line = if after_digits.len() < line.len() {
        after_digits
            .strip_prefix(|c: char| matches!(c, '.' | '、' | ')' | '）'))
            .unwrap_or(line)
    } else {
        line
    };

    line.trim().trim_matches('*').trim()
}
