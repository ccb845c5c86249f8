//! Tools module for meeting-agent
//!
//! Invocable tools described by name, description and a JSON schema for their
//! arguments. The registry ships the task-list tools.

mod todo;

pub use todo::{add_todos, CompleteTodo, CreateTodo, ListTodos, TodoInput};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::storage::Repository;
use crate::{AgentError, Result};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Description shown to callers choosing a tool
    fn description(&self) -> &str;

    /// JSON schema of the `arguments` object
    fn parameters_schema(&self) -> Value;

    async fn invoke(&self, arguments: Value) -> Result<Value>;
}

/// Public description of a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the task-list tools
    pub fn new(repo: Repository) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(CreateTodo::new(repo.clone())),
            Arc::new(ListTodos::new(repo.clone())),
            Arc::new(CompleteTodo::new(repo)),
        ];
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::NotFound(format!("tool {}", name)))?;
        debug!(tool = %name, "invoking tool");
        tool.invoke(arguments).await
    }
}
