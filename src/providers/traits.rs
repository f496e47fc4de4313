use async_trait::async_trait;

use super::types::{BackendError, ReplyPayload, ReplyRequest};
use crate::models::{TodoItem, TodoItemPatch, TodoList};

#[async_trait]
pub trait ReplyBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: ReplyRequest) -> Result<ReplyPayload, BackendError>;

    /// Tell the backend to stop working on the reply for `message_id`.
    async fn abort(&self, message_id: &str) -> Result<(), BackendError>;
}

/// Server-side todo lists. Deletions report whether the server removed
/// anything.
#[async_trait]
pub trait TodoApi: Send + Sync {
    async fn create_todo_list(&self, name: &str, id: Option<&str>) -> Result<TodoList, BackendError>;

    async fn delete_todo_list(&self, list_id: &str) -> Result<bool, BackendError>;

    async fn create_todo_item(
        &self,
        list_id: &str,
        task: &str,
        order_key: &str,
    ) -> Result<TodoItem, BackendError>;

    async fn update_todo_item(&self, item_id: &str, patch: &TodoItemPatch) -> Result<TodoItem, BackendError>;

    async fn delete_todo_item(&self, item_id: &str) -> Result<bool, BackendError>;
}
