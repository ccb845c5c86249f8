//! Summarization module for meeting-agent
//!
//! Turns a meeting payload into a stored meeting: transcript assembly, the
//! three-stage model pipeline, and lazy summary (re)computation.

mod pipeline;
mod transcript;

pub use pipeline::{extract_todos, summary_input, SummarizationPipeline, SummaryDraft, SummaryText};
pub use transcript::{MeetingPayload, Utterance, UtteranceContent};

use chrono::Local;
use tracing::info;

use crate::storage::{Meeting, NewMeeting, Repository, Summary};
use crate::{AgentError, Result};

/// Meeting creation and summary lookup on top of the pipeline and the store
#[derive(Clone)]
pub struct MeetingService {
    pipeline: SummarizationPipeline,
    repo: Repository,
}

impl MeetingService {
    pub fn new(pipeline: SummarizationPipeline, repo: Repository) -> Self {
        Self { pipeline, repo }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Summarize the payload and store the meeting. Nothing is stored unless
    /// every pipeline stage succeeded.
    pub async fn create_meeting(&self, payload: &MeetingPayload) -> Result<Meeting> {
        let transcript = payload.require_transcript()?;
        let (start, end) = payload.time_range();

        let draft = self.pipeline.summarize(&transcript, &start, &end).await?;

        let meeting = self.repo.create_meeting(
            NewMeeting {
                title: draft.title,
                description: draft.description,
                participants: payload.participants(),
                start_time: start,
                end_time: end,
                transcript,
            },
            &draft.summary,
            &draft.todos,
            Local::now().naive_local(),
        )?;

        info!(meeting_id = %meeting.id, "meeting created");
        Ok(meeting)
    }

    /// The stored summary, computed first if the meeting has none or
    /// `refresh` is set. A recomputed summary replaces the old text; its todo
    /// list stays the meeting's todo records plus any new action items.
    pub async fn summary(&self, meeting_id: &str, refresh: bool) -> Result<Summary> {
        if meeting_id.trim().is_empty() {
            return Err(AgentError::Validation("meeting_id is required".to_string()));
        }

        let meeting = self.repo.require_meeting(meeting_id)?;

        if !refresh {
            if let Some(summary) = self.repo.get_summary(meeting_id)? {
                if !summary.content.is_empty() {
                    return Ok(summary);
                }
            }
        }

        let text = self
            .pipeline
            .summary(&meeting.transcript, &meeting.start_time, &meeting.end_time)
            .await?;
        let summary = self
            .repo
            .replace_summary(meeting_id, &text.content, &text.todos)?;

        info!(meeting_id = %meeting_id, refresh, "summary computed");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptSettings;
    use crate::llm::{ChatModel, ChunkStream, Message};
    use crate::storage::Todo;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Fails every description call while `fail_description` is set.
    #[derive(Default)]
    struct FlakyModel {
        fail_description: AtomicBool,
        summaries: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for FlakyModel {
        async fn generate(&self, messages: &[Message]) -> anyhow::Result<Message> {
            let system = &messages[0].content;
            if system.contains("总结核心议程") {
                if self.fail_description.load(Ordering::SeqCst) {
                    anyhow::bail!("description backend down");
                }
                return Ok(Message::assistant("议程"));
            }
            if system.contains("提炼会议摘要") {
                let n = self.summaries.fetch_add(1, Ordering::SeqCst) + 1;
                return Ok(Message::assistant(format!("第{}版摘要\nAlice的任务是上线", n)));
            }
            Ok(Message::assistant("标题"))
        }

        async fn stream(&self, _messages: &[Message]) -> anyhow::Result<ChunkStream> {
            anyhow::bail!("not used")
        }
    }

    fn service(model: Arc<FlakyModel>) -> (tempfile::TempDir, MeetingService) {
        let tmp = tempdir().unwrap();
        let repo = Repository::open_path(&tmp.path().join("meetings.db")).unwrap();
        let pipeline = SummarizationPipeline::new(model, &PromptSettings::default());
        (tmp, MeetingService::new(pipeline, repo))
    }

    fn alice_payload() -> MeetingPayload {
        MeetingPayload::from_json(
            r#"{"contents": [{"user": "Alice", "time_from": "2025-01-01 10:00",
                "time_to": "2025-01-01 10:30", "content": {"text": "我们下周上线。"}}]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn alice_meeting_is_created_with_all_parts() {
        let (_tmp, service) = service(Arc::new(FlakyModel::default()));

        let meeting = service.create_meeting(&alice_payload()).await.unwrap();

        let id = meeting.id.strip_prefix("meeting_").unwrap();
        assert_eq!(id.len(), 14);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(meeting.title, "标题");
        assert_eq!(meeting.description, "议程");
        assert_eq!(meeting.participants, vec!["Alice"]);
        assert_eq!(meeting.transcript, "Alice说：我们下周上线。");

        let summary = service.summary(&meeting.id, false).await.unwrap();
        assert_eq!(summary.content, "第1版摘要\nAlice的任务是上线");
        assert_eq!(summary.todos, vec!["Alice的任务是上线"]);
    }

    #[tokio::test]
    async fn description_failure_stores_nothing() {
        let model = Arc::new(FlakyModel::default());
        model.fail_description.store(true, Ordering::SeqCst);
        let (_tmp, service) = service(model);

        let err = service.create_meeting(&alice_payload()).await.unwrap_err();

        assert!(matches!(err, AgentError::Generation { .. }));
        assert!(service.repository().list_meetings().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_recomputes_and_overwrites() {
        let model = Arc::new(FlakyModel::default());
        let (_tmp, service) = service(model.clone());
        let meeting = service.create_meeting(&alice_payload()).await.unwrap();

        let cached = service.summary(&meeting.id, false).await.unwrap();
        assert_eq!(model.summaries.load(Ordering::SeqCst), 1);
        assert!(cached.content.starts_with("第1版"));

        let refreshed = service.summary(&meeting.id, true).await.unwrap();
        assert!(refreshed.content.starts_with("第2版"));
        let stored = service.repository().get_summary(&meeting.id).unwrap().unwrap();
        assert_eq!(stored.content, refreshed.content);
    }

    #[tokio::test]
    async fn refresh_keeps_caller_added_todos() {
        let (_tmp, service) = service(Arc::new(FlakyModel::default()));
        let meeting = service.create_meeting(&alice_payload()).await.unwrap();
        let repo = service.repository();
        repo.create_todo(&Todo::new(meeting.id.clone(), "通知客户"))
            .unwrap();
        repo.sync_summary_todos(&meeting.id).unwrap();

        let refreshed = service.summary(&meeting.id, true).await.unwrap();

        assert!(refreshed.content.starts_with("第2版"));
        assert_eq!(refreshed.todos, vec!["Alice的任务是上线", "通知客户"]);
        let titles: Vec<String> = repo
            .list_todos(&meeting.id)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, refreshed.todos);
    }

    #[tokio::test]
    async fn summary_lookup_errors() {
        let (_tmp, service) = service(Arc::new(FlakyModel::default()));

        assert!(matches!(
            service.summary("", false).await,
            Err(AgentError::Validation(_))
        ));
        assert!(matches!(
            service.summary("meeting_20990101000000", false).await,
            Err(AgentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_before_any_model_call() {
        let model = Arc::new(FlakyModel::default());
        let (_tmp, service) = service(model.clone());

        let err = service
            .create_meeting(&MeetingPayload::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Validation(_)));
        assert_eq!(model.summaries.load(Ordering::SeqCst), 0);
    }
}
