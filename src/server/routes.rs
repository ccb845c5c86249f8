//! HTTP routes.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::chat::TurnOutcome;
use crate::server::error::ServerError;
use crate::server::extract::{ApiJson, ApiQuery};
use crate::server::schemas::{
    ChatQuery, CreateMeetingResponse, CreateTodosRequest, InvokeToolRequest, MeetingEntry,
    MeetingList, SummaryQuery, SummaryResponse, TodoList, TodoQuery, ToolList,
};
use crate::server::state::AppState;
use crate::summarization::MeetingPayload;
use crate::tools::add_todos;
use crate::AgentError;

/// Outbound SSE events buffered per chat stream before the relay waits.
const CHAT_EVENT_BUFFER: usize = 32;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/meeting", post(create_meeting).get(list_meetings))
        .route("/summary", get(get_summary))
        .route("/chat", get(chat))
        .route("/todo", get(list_todos).post(create_todos))
        .route("/tools", get(list_tools))
        .route("/tools/invoke", post(invoke_tool))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

fn required(value: Option<String>, name: &str) -> Result<String, ServerError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ServerError::bad_request(format!("{} is required", name))),
    }
}

async fn create_meeting(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<MeetingPayload>,
) -> Result<Json<CreateMeetingResponse>, ServerError> {
    let meeting = state.meetings.create_meeting(&payload).await?;
    Ok(Json(CreateMeetingResponse { id: meeting.id }))
}

async fn list_meetings(State(state): State<AppState>) -> Result<Json<MeetingList>, ServerError> {
    let meetings = state
        .repo
        .list_meetings()?
        .into_iter()
        .map(MeetingEntry::from)
        .collect();
    Ok(Json(MeetingList { meetings }))
}

async fn get_summary(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ServerError> {
    let meeting_id = required(query.meeting_id, "meeting_id")?;
    let summary = state.meetings.summary(&meeting_id, query.refresh).await?;
    Ok(Json(SummaryResponse {
        content: summary.content,
        todos: summary.todos,
    }))
}

/// Streams the assistant reply as one `{"data": chunk}` event per model chunk.
///
/// Failures before the first chunk are ordinary JSON errors. A failure
/// mid-stream sends one `error` event and closes. A disconnect or the chat
/// timeout closes without one; the timeout runs from the moment the request
/// starts waiting for the session, not from the first chunk.
async fn chat(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ChatQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    let meeting_id = required(query.meeting_id, "meeting_id")?;
    let session_id = required(query.session_id, "session_id")?;
    let message = required(query.message, "message")?;

    let meeting = state.repo.require_meeting(&meeting_id)?;
    let session = state.sessions.get_or_create(&meeting_id, &session_id)?;

    let deadline = Instant::now() + state.chat_timeout;
    let (tx, rx) = mpsc::channel::<Event>(CHAT_EVENT_BUFFER);
    let events = ReceiverStream::new(rx).map(Ok::<_, Infallible>);

    let started = tokio::time::timeout_at(
        deadline,
        state.chat.start_turn(&session, &meeting.transcript, &message),
    )
    .await;
    let turn = match started {
        Ok(turn) => turn?,
        Err(_) => {
            warn!(meeting_id = %meeting_id, session_id = %session_id, "chat turn timed out before streaming");
            drop(tx);
            return Ok(Sse::new(events).keep_alive(KeepAlive::default()));
        }
    };

    tokio::spawn(async move {
        let sender = tx.clone();
        let watcher = tx.clone();
        let cancel = async move {
            tokio::select! {
                _ = watcher.closed() => debug!("chat client disconnected"),
                _ = tokio::time::sleep_until(deadline) => warn!("chat turn timed out"),
            }
        };

        let outcome = turn
            .relay(
                move |chunk| {
                    let sender = sender.clone();
                    async move {
                        let event = Event::default().data(json!({ "data": chunk.content }).to_string());
                        sender.send(event).await.is_ok()
                    }
                },
                cancel,
            )
            .await;

        match outcome {
            Ok(TurnOutcome::Completed { .. }) => {
                info!(meeting_id = %meeting_id, session_id = %session_id, "chat turn completed")
            }
            Ok(TurnOutcome::Cancelled) => {
                info!(meeting_id = %meeting_id, session_id = %session_id, "chat turn cancelled")
            }
            Err(e) => {
                warn!(meeting_id = %meeting_id, session_id = %session_id, error = %e, "chat turn failed");
                let event = Event::default().event("error").data(error_payload(&e).to_string());
                let _ = tx.send(event).await;
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Body of the in-band `error` event for a turn that failed after streaming began.
fn error_payload(e: &AgentError) -> Value {
    let message = match e {
        AgentError::Stream(_) => "model stream failed",
        AgentError::Template(_) => "prompt rendering failed",
        _ => "internal server error",
    };
    json!({ "error": { "code": e.code(), "message": message } })
}

async fn list_todos(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TodoQuery>,
) -> Result<Json<TodoList>, ServerError> {
    let meeting_id = required(query.meeting_id, "meeting_id")?;
    state.repo.require_meeting(&meeting_id)?;
    Ok(Json(TodoList {
        todos: state.repo.list_todos(&meeting_id)?,
    }))
}

async fn create_todos(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTodosRequest>,
) -> Result<Json<TodoList>, ServerError> {
    if request.todos.is_empty() {
        return Err(ServerError::bad_request("todos must not be empty"));
    }
    let todos = add_todos(&state.repo, &request.meeting_id, request.todos)?;
    Ok(Json(TodoList { todos }))
}

async fn list_tools(State(state): State<AppState>) -> Json<ToolList> {
    Json(ToolList {
        tools: state.tools.specs(),
    })
}

async fn invoke_tool(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<InvokeToolRequest>,
) -> Result<Json<Value>, ServerError> {
    let result = state.tools.invoke(&request.name, request.arguments).await?;
    Ok(Json(result))
}
