use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{MessageStatus, TodoItem, TodoList};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// --- Reply generation ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRequest {
    pub chat_id: String,
    /// Local id of the message the reply answers; also the abort handle.
    pub message_id: String,
    pub content: String,
    pub user: String,
    /// The message is the chat's first, so the backend has not seen the chat.
    pub opens_chat: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPayload {
    pub content: String,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Completed(ReplyPayload),
    Failed(String),
    Aborted,
}

// --- Wire types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    User,
    Agent,
}

#[derive(Debug, Serialize)]
pub struct CreateChatBody<'a> {
    pub message: &'a str,
    pub user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CreateMessageBody<'a> {
    pub message: &'a str,
    pub user: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub content: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub role: Option<WireRole>,
    #[serde(default)]
    pub status: Option<MessageStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChat {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatEnvelope {
    pub chat: WireChat,
}

#[derive(Debug, Deserialize)]
pub struct MessagesEnvelope {
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessBody {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTodoListBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CreateTodoItemBody<'a> {
    pub task: &'a str,
    pub list_id: &'a str,
    pub order_key: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TodoListEnvelope {
    #[serde(rename = "todoList")]
    pub todo_list: TodoList,
}

#[derive(Debug, Deserialize)]
pub struct TodoItemEnvelope {
    #[serde(rename = "todoItem")]
    pub todo_item: TodoItem,
}

/// The agent's answer among the messages a backend call returned.
pub fn agent_reply(messages: &[WireMessage]) -> Result<ReplyPayload, BackendError> {
    let reply = messages
        .iter()
        .rev()
        .find(|m| m.role == Some(WireRole::Agent))
        .ok_or_else(|| BackendError::InvalidResponse("No agent message in response".to_string()))?;

    match reply.status {
        Some(MessageStatus::Failed) => Err(BackendError::RequestFailed(format!(
            "Agent message {} failed",
            reply.id
        ))),
        Some(MessageStatus::Aborted) => Err(BackendError::RequestFailed(format!(
            "Agent message {} was aborted",
            reply.id
        ))),
        _ if reply.content.is_empty() => Err(BackendError::InvalidResponse(
            "No content in response".to_string(),
        )),
        _ => Ok(ReplyPayload {
            content: reply.content.clone(),
            sender: reply.user_name.clone(),
        }),
    }
}
