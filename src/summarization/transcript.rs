//! Meeting payloads as sent by the recording frontend.

use serde::{Deserialize, Serialize};

use crate::{AgentError, Result};

/// `{"contents": [utterance, ...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingPayload {
    #[serde(default)]
    pub contents: Vec<Utterance>,
}

/// One speaker turn. Fields are optional on the wire; incomplete entries are
/// skipped when building the transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Utterance {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub time_from: Option<String>,
    #[serde(default)]
    pub time_to: Option<String>,
    #[serde(default)]
    pub content: Option<UtteranceContent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtteranceContent {
    #[serde(default)]
    pub text: Option<String>,
}

impl Utterance {
    fn text(&self) -> Option<&str> {
        self.content.as_ref()?.text.as_deref()
    }
}

impl MeetingPayload {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AgentError::Validation(format!("invalid meeting payload: {}", e)))
    }

    /// Distinct speakers in order of first appearance.
    pub fn participants(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for user in self.contents.iter().filter_map(|u| u.user.as_deref()) {
            if !seen.iter().any(|s: &String| s == user) {
                seen.push(user.to_string());
            }
        }
        seen
    }

    /// `time_from` of the first utterance and `time_to` of the last; empty
    /// strings when either is missing.
    pub fn time_range(&self) -> (String, String) {
        match (self.contents.first(), self.contents.last()) {
            (Some(first), Some(last)) => match (&first.time_from, &last.time_to) {
                (Some(from), Some(to)) => (from.clone(), to.clone()),
                _ => (String::new(), String::new()),
            },
            _ => (String::new(), String::new()),
        }
    }

    /// Every complete utterance as `<user>说：<text>`, concatenated.
    pub fn transcript(&self) -> String {
        self.contents
            .iter()
            .filter_map(|u| Some(format!("{}说：{}", u.user.as_deref()?, u.text()?)))
            .collect()
    }

    /// Transcript, failing with a validation error when nothing usable was sent.
    pub fn require_transcript(&self) -> Result<String> {
        let transcript = self.transcript();
        if transcript.trim().is_empty() {
            return Err(AgentError::Validation(
                "meeting payload has no usable utterances".to_string(),
            ));
        }
        Ok(transcript)
    }
}
