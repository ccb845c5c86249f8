use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Settings;
use crate::llm::client::{ChatModel, ChunkStream, Message, StreamChunk};

const DEFAULT_ARK_ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3";
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Client for OpenAI-compatible chat-completion APIs (Volcengine Ark, OpenAI).
pub struct OpenAiCompatClient {
    http: Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let provider = settings.llm.provider.to_lowercase();

        let api_key = settings.llm.api_key.trim().to_string();
        if api_key.is_empty() {
            anyhow::bail!(
                "LLM API key is missing. Set llm.api_key in config or MEETING_AGENT_API_KEY."
            );
        }

        let model = match settings.llm.model.trim() {
            "" if provider == "openai" => DEFAULT_OPENAI_MODEL.to_string(),
            "" => anyhow::bail!(
                "LLM model is missing. Set llm.model in config or MEETING_AGENT_MODEL."
            ),
            model => model.to_string(),
        };

        let endpoint = match settings.llm.endpoint.trim() {
            "" if provider == "openai" => DEFAULT_OPENAI_ENDPOINT.to_string(),
            "" => DEFAULT_ARK_ENDPOINT.to_string(),
            endpoint => endpoint.trim_end_matches('/').to_string(),
        };

        Ok(Self {
            http: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .context("Failed to build LLM HTTP client")?,
            api_key,
            model,
            endpoint,
            timeout: Duration::from_secs(settings.llm.timeout_secs.max(1)),
        })
    }

    fn request_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    fn request_body<'a>(&'a self, messages: &'a [Message], stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages,
            stream,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn generate(&self, messages: &[Message]) -> Result<Message> {
        let response = self
            .http
            .post(self.request_url())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&self.request_body(messages, false))
            .send()
            .await
            .context("LLM request failed")?;

        let response = response
            .error_for_status()
            .context("LLM returned an error status")?;

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let content = payload
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .find(|t| !t.trim().is_empty())
            .context("LLM response did not contain any text")?;

        Ok(Message::assistant(content.trim()))
    }

    async fn stream(&self, messages: &[Message]) -> Result<ChunkStream> {
        let response = self
            .http
            .post(self.request_url())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, true))
            .send()
            .await
            .context("LLM streaming request failed")?;

        let response = response
            .error_for_status()
            .context("LLM returned an error status")?;

        debug!(model = %self.model, "LLM stream opened");

        let body = response
            .bytes_stream()
            .map(|r| r.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(sse_chunks(body))
    }
}

/// Incremental decoder state for a server-sent-events body.
struct SseDecoder {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn an SSE byte stream into reply fragments. The HTTP response lives inside
/// the returned stream, so dropping the stream closes the connection.
fn sse_chunks(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> ChunkStream {
    let decoder = SseDecoder {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(decoder, |mut dec| async move {
        loop {
            if let Some(text) = dec.pending.pop_front() {
                return Some((Ok(StreamChunk::new(text)), dec));
            }
            if dec.finished {
                return None;
            }

            match dec.body.next().await {
                Some(Ok(bytes)) => {
                    dec.buffer.extend(bytes.into_iter().filter(|b| *b != b'\r'));
                    match drain_events(&mut dec.buffer, &mut dec.pending) {
                        Ok(done) => dec.finished = done,
                        Err(e) => {
                            dec.finished = true;
                            return Some((Err(e), dec));
                        }
                    }
                }
                Some(Err(e)) => {
                    dec.finished = true;
                    return Some((Err(anyhow::Error::new(e).context("LLM stream interrupted")), dec));
                }
                None => {
                    // Body ended without [DONE]; flush a trailing unterminated event.
                    dec.finished = true;
                    if !dec.buffer.is_empty() {
                        dec.buffer.extend_from_slice(b"\n\n");
                        if let Err(e) = drain_events(&mut dec.buffer, &mut dec.pending) {
                            return Some((Err(e), dec));
                        }
                    }
                }
            }
        }
    })
    .boxed()
}

/// Parse every complete event in `buffer` (terminated by a blank line),
/// queueing non-empty content deltas. Returns `true` once `[DONE]` is seen.
fn drain_events(buffer: &mut Vec<u8>, pending: &mut VecDeque<String>) -> Result<bool> {
    while let Some(end) = find_event_end(buffer) {
        let event: Vec<u8> = buffer.drain(..end + 2).collect();
        let event = String::from_utf8_lossy(&event[..end]);

        for line in event.lines() {
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                return Ok(true);
            }

            let chunk: StreamChatChunk = serde_json::from_str(data)
                .with_context(|| format!("Malformed LLM stream event: {}", data))?;

            if let Some(error) = chunk.error {
                anyhow::bail!("LLM stream reported an error: {}", error.message);
            }

            for choice in chunk.choices {
                if let Some(content) = choice.delta.and_then(|d| d.content) {
                    if !content.is_empty() {
                        pending.push_back(content);
                    }
                }
            }
        }
    }

    Ok(false)
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChatChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
        )
    }

    fn body(parts: Vec<Vec<u8>>) -> BoxStream<'static, reqwest::Result<Vec<u8>>> {
        stream::iter(parts.into_iter().map(Ok)).boxed()
    }

    #[test]
    fn drains_only_complete_events() {
        let mut buffer = format!("{}data: {{\"choi", delta("你好")).into_bytes();
        let mut pending = VecDeque::new();

        let done = drain_events(&mut buffer, &mut pending).unwrap();
        assert!(!done);
        assert_eq!(pending, VecDeque::from(vec!["你好".to_string()]));
        assert_eq!(buffer, b"data: {\"choi");
    }

    #[test]
    fn done_marker_and_error_payloads() {
        let mut buffer = b"data: [DONE]\n\n".to_vec();
        assert!(drain_events(&mut buffer, &mut VecDeque::new()).unwrap());

        let mut buffer = b"data: {\"error\":{\"message\":\"quota\"}}\n\n".to_vec();
        let err = drain_events(&mut buffer, &mut VecDeque::new()).unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    #[tokio::test]
    async fn multibyte_text_split_across_network_chunks() {
        let event = delta("会议纪要").into_bytes();
        let (head, tail) = event.split_at(event.len() / 2 + 1);
        let parts = vec![
            head.to_vec(),
            tail.to_vec(),
            delta("已生成").into_bytes(),
            b"data: [DONE]\n\n".to_vec(),
            delta("ignored").into_bytes(),
        ];

        let chunks: Vec<String> = sse_chunks(body(parts))
            .map(|c| c.unwrap().content)
            .collect()
            .await;
        assert_eq!(chunks, vec!["会议纪要", "已生成"]);
    }

    #[tokio::test]
    async fn crlf_framing_and_missing_done_marker() {
        let parts = vec![delta("a").replace('\n', "\r\n").into_bytes(), delta("b").into_bytes()];

        let chunks: Vec<String> = sse_chunks(body(parts))
            .map(|c| c.unwrap().content)
            .collect()
            .await;
        assert_eq!(chunks, vec!["a", "b"]);
    }
}
