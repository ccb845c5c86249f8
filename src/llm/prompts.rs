//! Prompt templates for the four meeting tasks.
//!
//! Every render produces `[system, ..prior_history, user]`. The system text is
//! a fixed template per [`TaskKind`] with `{role}` and `{style}` filled in from
//! the [`PromptContext`].

use std::fmt;
use std::str::FromStr;

use crate::llm::Message;
use crate::{AgentError, Result};

const TITLE_TEMPLATE: &str = "你是一个{role}，你需要用{style}的语言总结会议主题。请注意，直接输出会议主题，前面不需要前缀（如会议主题：），会议内容可能会包含一些技术术语和行业术语，你需要根据上下文进行理解和总结。";

const DESCRIPTION_TEMPLATE: &str = "你是一个{role}，你需要用{style}的语言总结核心议程。请注意，直接输出核心议程，前面不需要前缀（如核心议程：），会议内容可能会包含一些技术术语和行业术语，你需要根据上下文进行理解和总结。";

const SUMMARY_TEMPLATE: &str = "你是一个{role}，你需要用{style}的语言提炼会议摘要。至少包括以下内容1. 会议主题 2. 会议参与者3. 会议时间4. 会议内容5. 关键任务提取(这部分必须以以下格式总结，小红的任务是扫地，把其中的人称代词转换成具体的负责人，且需要把相同人们的做的事组合在一起，比如小红的任务是扫地、拖地)。请注意，直接输出会议摘要，前面不需要前缀（如会议摘要：），会议内容可能会包含一些技术术语和行业术语，你需要根据上下文进行理解和总结。";

const CHAT_TEMPLATE: &str = "你是一个{role}，你需要用{style}的语言。请注意，你需要结合会议的全文，回答用户问题，会议内容可能会包含一些技术术语和行业术语，你需要根据上下文进行理解和总结。";

/// Appended to the chat system message when the meeting transcript is known.
const CHAT_TRANSCRIPT_PREFIX: &str = "\n这是会议的全文：";

/// Joins a trailing question onto a transcript for the non-chat tasks.
const QUESTION_SEPARATOR: &str = "下面是我的问题：";

/// The task a prompt is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Title,
    Description,
    Summary,
    Chat,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [Self::Title, Self::Description, Self::Summary, Self::Chat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Summary => "summary",
            Self::Chat => "chat",
        }
    }

    fn system_template(&self) -> &'static str {
        match self {
            Self::Title => TITLE_TEMPLATE,
            Self::Description => DESCRIPTION_TEMPLATE,
            Self::Summary => SUMMARY_TEMPLATE,
            Self::Chat => CHAT_TEMPLATE,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(Self::Title),
            "description" => Ok(Self::Description),
            "summary" => Ok(Self::Summary),
            "chat" => Ok(Self::Chat),
            other => Err(AgentError::Template(format!("unknown task kind '{}'", other))),
        }
    }
}

/// Per-invocation inputs of a render. Not persisted.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub role: String,
    pub style: String,
    /// Free-form user text for chat; an optional trailing question otherwise.
    pub question: String,
    /// Meeting transcript the task works on.
    pub transcript: Option<String>,
    pub prior_history: Vec<Message>,
}

impl PromptContext {
    pub fn new(role: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            style: style.into(),
            ..Default::default()
        }
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.prior_history = history;
        self
    }
}

/// Renders prompts. Holds no state; output depends only on the arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, kind: TaskKind, ctx: &PromptContext) -> Result<Vec<Message>> {
        let mut system = fill_placeholders(kind.system_template(), ctx)?;

        let question = match kind {
            TaskKind::Chat => {
                if let Some(transcript) = ctx.transcript.as_deref() {
                    system.push_str(CHAT_TRANSCRIPT_PREFIX);
                    system.push_str(transcript);
                }
                if ctx.question.trim().is_empty() {
                    return Err(AgentError::Template(
                        "chat prompt requires a non-empty question".to_string(),
                    ));
                }
                ctx.question.clone()
            }
            TaskKind::Title | TaskKind::Description | TaskKind::Summary => {
                let transcript = ctx.transcript.as_deref().ok_or_else(|| {
                    AgentError::Template(format!("{} prompt requires a transcript", kind))
                })?;
                let mut question = transcript.to_string();
                if !ctx.question.is_empty() {
                    question.push_str(QUESTION_SEPARATOR);
                    question.push_str(&ctx.question);
                }
                question
            }
        };

        let mut messages = Vec::with_capacity(ctx.prior_history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(ctx.prior_history.iter().cloned());
        messages.push(Message::user(question));
        Ok(messages)
    }
}

/// Single-pass `{name}` substitution; values are never re-scanned.
fn fill_placeholders(template: &str, ctx: &PromptContext) -> Result<String> {
    let mut out = String::with_capacity(template.len() + ctx.role.len() + ctx.style.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            AgentError::Template("unterminated placeholder in template".to_string())
        })?;
        let value = match &after[..end] {
            "role" => &ctx.role,
            "style" => &ctx.style,
            other => {
                return Err(AgentError::Template(format!(
                    "unknown placeholder '{{{}}}'",
                    other
                )))
            }
        };
        if value.trim().is_empty() {
            return Err(AgentError::Template(format!(
                "placeholder '{{{}}}' has no value",
                &after[..end]
            )));
        }
        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn ctx() -> PromptContext {
        PromptContext::new("会议总结助手", "专业").with_transcript("Alice说：我们下周上线。")
    }

    #[test]
    fn system_message_has_substitutions_for_every_kind() {
        let engine = TemplateEngine::new();
        for kind in TaskKind::ALL {
            let messages = engine
                .render(kind, &ctx().with_question("进度如何？"))
                .unwrap();
            let system = &messages[0];
            assert_eq!(system.role, Role::System);
            assert!(system.content.contains("你是一个会议总结助手"));
            assert!(system.content.contains("用专业的语言"));
            assert!(!system.content.contains("{role}"));
            assert!(!system.content.contains("{style}"));
        }
    }

    #[test]
    fn prior_history_is_reproduced_in_order() {
        let history = vec![
            Message::user("一"),
            Message::assistant("二"),
            Message::user("一"),
            Message::assistant("三"),
        ];
        let messages = TemplateEngine::new()
            .render(TaskKind::Chat, &ctx().with_question("四").with_history(history.clone()))
            .unwrap();

        assert_eq!(messages.len(), history.len() + 2);
        assert_eq!(&messages[1..messages.len() - 1], history.as_slice());
        assert_eq!(messages.last().unwrap(), &Message::user("四"));
    }

    #[test]
    fn chat_with_two_history_messages_renders_four() {
        let history = vec![Message::user("你好"), Message::assistant("您好")];
        let messages = TemplateEngine::new()
            .render(
                TaskKind::Chat,
                &ctx().with_question("总结一下").with_history(history),
            )
            .unwrap();
        assert_eq!(messages.len(), 4);
        assert!(messages[0].content.contains("我们下周上线"));
    }

    #[test]
    fn non_chat_question_is_transcript_plus_trailing_question() {
        let engine = TemplateEngine::new();

        let plain = engine.render(TaskKind::Title, &ctx()).unwrap();
        assert_eq!(plain[1].content, "Alice说：我们下周上线。");

        let asked = engine
            .render(TaskKind::Summary, &ctx().with_question("谁负责上线？"))
            .unwrap();
        assert_eq!(
            asked[1].content,
            "Alice说：我们下周上线。下面是我的问题：谁负责上线？"
        );
    }

    #[test]
    fn role_values_are_not_rescanned() {
        let ctx = PromptContext::new("{style}", "简洁").with_transcript("x");
        let messages = TemplateEngine::new().render(TaskKind::Title, &ctx).unwrap();
        assert!(messages[0].content.starts_with("你是一个{style}"));
    }

    #[test]
    fn unresolvable_inputs_are_template_errors() {
        let engine = TemplateEngine::new();

        let missing_role = PromptContext::new("", "专业").with_transcript("x");
        assert!(matches!(
            engine.render(TaskKind::Title, &missing_role),
            Err(AgentError::Template(_))
        ));

        let missing_transcript = PromptContext::new("助手", "专业");
        assert!(matches!(
            engine.render(TaskKind::Description, &missing_transcript),
            Err(AgentError::Template(_))
        ));

        assert!(matches!(
            engine.render(TaskKind::Chat, &ctx()),
            Err(AgentError::Template(_))
        ));

        assert!(matches!(
            "agenda".parse::<TaskKind>(),
            Err(AgentError::Template(_))
        ));
    }
}
