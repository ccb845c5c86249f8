//! Task-list tools backed by the meeting store.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::storage::{Repository, Todo};
use crate::tools::Tool;
use crate::{AgentError, Result};

/// A todo as supplied by a caller
#[derive(Debug, Clone, Deserialize)]
pub struct TodoInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub list: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

impl TodoInput {
    fn into_todo(self, meeting_id: &str) -> Result<Todo> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AgentError::Validation("todo title is required".to_string()));
        }

        let mut todo = Todo::new(meeting_id, title);
        todo.description = self.description;
        if let Some(list) = self.list.filter(|l| !l.trim().is_empty()) {
            todo.list = list;
        }
        todo.assignee = self.assignee.filter(|a| !a.trim().is_empty());
        Ok(todo)
    }
}

/// Store todos for a meeting and make its summary's todo list match the
/// titles of all of the meeting's todos. All inputs are validated first.
pub fn add_todos(repo: &Repository, meeting_id: &str, inputs: Vec<TodoInput>) -> Result<Vec<Todo>> {
    if meeting_id.trim().is_empty() {
        return Err(AgentError::Validation("meeting_id is required".to_string()));
    }
    repo.require_meeting(meeting_id)?;

    let todos = inputs
        .into_iter()
        .map(|input| input.into_todo(meeting_id))
        .collect::<Result<Vec<_>>>()?;

    for todo in &todos {
        repo.create_todo(todo)?;
    }
    let titles = repo.sync_summary_todos(meeting_id)?;

    info!(meeting_id = %meeting_id, added = todos.len(), total = titles.len(), "todos stored");
    Ok(todos)
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| AgentError::Validation(format!("invalid arguments for {}: {}", tool, e)))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| AgentError::Other(e.to_string()))
}

/// `create_todo`
pub struct CreateTodo {
    repo: Repository,
}

impl CreateTodo {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[derive(Deserialize)]
struct CreateTodoArgs {
    meeting_id: String,
    #[serde(flatten)]
    todo: TodoInput,
}

#[async_trait]
impl Tool for CreateTodo {
    fn name(&self) -> &str {
        "create_todo"
    }

    fn description(&self) -> &str {
        "Create a todo for a meeting"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "meeting_id": { "type": "string", "description": "Meeting the todo belongs to" },
                "title": { "type": "string" },
                "description": { "type": "string" },
                "list": { "type": "string", "description": "List name" },
                "assignee": { "type": "string", "description": "Person responsible" }
            },
            "required": ["meeting_id", "title"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: CreateTodoArgs = parse_args(self.name(), arguments)?;
        let mut created = add_todos(&self.repo, &args.meeting_id, vec![args.todo])?;
        match created.pop() {
            Some(todo) => to_value(&todo),
            None => Err(AgentError::Other("todo was not created".to_string())),
        }
    }
}

/// `list_todos`
pub struct ListTodos {
    repo: Repository,
}

impl ListTodos {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[derive(Deserialize)]
struct ListTodosArgs {
    meeting_id: String,
    #[serde(default = "default_true")]
    include_completed: bool,
}

fn default_true() -> bool {
    true
}

#[async_trait]
impl Tool for ListTodos {
    fn name(&self) -> &str {
        "list_todos"
    }

    fn description(&self) -> &str {
        "List the todos of a meeting"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "meeting_id": { "type": "string" },
                "include_completed": { "type": "boolean", "default": true }
            },
            "required": ["meeting_id"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: ListTodosArgs = parse_args(self.name(), arguments)?;
        self.repo.require_meeting(&args.meeting_id)?;

        let todos: Vec<Todo> = self
            .repo
            .list_todos(&args.meeting_id)?
            .into_iter()
            .filter(|t| args.include_completed || !t.is_completed())
            .collect();
        Ok(json!({ "todos": to_value(&todos)? }))
    }
}

/// `complete_todo`
pub struct CompleteTodo {
    repo: Repository,
}

impl CompleteTodo {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[derive(Deserialize)]
struct CompleteTodoArgs {
    id: String,
}

#[async_trait]
impl Tool for CompleteTodo {
    fn name(&self) -> &str {
        "complete_todo"
    }

    fn description(&self) -> &str {
        "Mark a todo as completed"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Todo id" }
            },
            "required": ["id"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: CompleteTodoArgs = parse_args(self.name(), arguments)?;
        let todo = self.repo.complete_todo(&args.id)?;
        to_value(&todo)
    }
}
