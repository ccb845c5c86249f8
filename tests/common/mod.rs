#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tempfile::TempDir;

use meeting_agent::llm::{ChatModel, ChunkStream, Message, StreamChunk};

pub const ALICE_PAYLOAD: &str = r#"{
    "contents": [
        {"user": "Alice", "time_from": "2025-01-01 10:00", "time_to": "2025-01-01 10:30",
         "content": {"text": "我们下周上线。"}}
    ]
}"#;

pub fn run_meeting_agent(args: &[&str]) -> Output {
    TestEnv::new().run(args)
}

pub struct TestEnv {
    home: TempDir,
    config: TempDir,
    data: TempDir,
    runtime: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            home: tempfile::tempdir().expect("create temporary HOME dir"),
            config: tempfile::tempdir().expect("create temporary XDG config dir"),
            data: tempfile::tempdir().expect("create temporary XDG data dir"),
            runtime: tempfile::tempdir().expect("create temporary XDG runtime dir"),
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_meeting-agent"))
            .args(args)
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.config.path())
            .env("XDG_DATA_HOME", self.data.path())
            .env("XDG_RUNTIME_DIR", self.runtime.path())
            .env_remove("MEETING_AGENT_API_KEY")
            .env_remove("MEETING_AGENT_MODEL")
            .env_remove("MEETING_AGENT_ENDPOINT")
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to execute meeting-agent binary")
    }

    pub fn config_path(&self) -> PathBuf {
        let output = self.run(&["config", "path"]);
        assert!(
            output.status.success(),
            "config path should succeed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );

        let path = String::from_utf8_lossy(&output.stdout);
        PathBuf::from(path.trim())
    }

    pub fn write_config(&self, contents: &str) {
        let config_path = self.config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).expect("create config parent directory");
        }
        std::fs::write(&config_path, contents).expect("write config file");
    }

    pub fn home(&self) -> &std::path::Path {
        self.home.path()
    }
}

/// Sets its flag when the model stream holding it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Fake model. `generate` answers per summarization stage; `stream` replays
/// `chunks`, then optionally fails or hangs forever. The first `hang_on_open`
/// calls to `stream` never return a stream at all.
pub struct ScriptedModel {
    pub chunks: Vec<String>,
    pub chunk_delay: Option<Duration>,
    pub fail_stream_after: Option<usize>,
    pub hang_after_chunks: bool,
    pub hang_on_open: AtomicUsize,
    pub fail_stage: Option<&'static str>,
    pub prompts: Mutex<Vec<Vec<Message>>>,
    pub stream_dropped: Arc<AtomicBool>,
}

impl ScriptedModel {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            chunk_delay: None,
            fail_stream_after: None,
            hang_after_chunks: false,
            hang_on_open: AtomicUsize::new(0),
            fail_stage: None,
            prompts: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stream_prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }
}

pub fn stage_of(messages: &[Message]) -> &'static str {
    let system = &messages[0].content;
    if system.contains("总结会议主题") {
        "title"
    } else if system.contains("总结核心议程") {
        "description"
    } else if system.contains("提炼会议摘要") {
        "summary"
    } else {
        "chat"
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(&self, messages: &[Message]) -> anyhow::Result<Message> {
        let stage = stage_of(messages);
        if self.fail_stage == Some(stage) {
            anyhow::bail!("{} backend unavailable", stage);
        }
        Ok(Message::assistant(match stage {
            "title" => "上线计划",
            "description" => "讨论下周上线安排",
            "summary" => "会议决定下周上线。\n- Alice的任务是发布版本",
            _ => "好的",
        }))
    }

    async fn stream(&self, messages: &[Message]) -> anyhow::Result<ChunkStream> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        if self
            .hang_on_open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            futures::future::pending::<()>().await;
        }

        let mut items: Vec<anyhow::Result<StreamChunk>> = self
            .chunks
            .iter()
            .map(|c| Ok(StreamChunk::new(c.clone())))
            .collect();
        if let Some(n) = self.fail_stream_after {
            items.truncate(n);
            items.push(Err(anyhow::anyhow!("connection reset by model")));
        }

        let delay = self.chunk_delay;
        let head = stream::iter(items).then(move |item| async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            item
        });
        let tail = if self.hang_after_chunks {
            stream::pending().boxed()
        } else {
            stream::empty().boxed()
        };

        let flag = DropFlag(Arc::clone(&self.stream_dropped));
        Ok(head
            .chain(tail)
            .map(move |item| {
                let _held = &flag;
                item
            })
            .boxed())
    }
}
