use std::sync::Arc;

use crate::models::{order_key_at, TodoCommand, TodoEvent, TodoItemPatch};
use crate::providers::{BackendError, TodoApi};

use super::store::now;

/// Carry out one todo command against the server.
pub async fn run_todo(api: Arc<dyn TodoApi>, command: TodoCommand) -> Result<TodoEvent, BackendError> {
    match command {
        TodoCommand::CreateList { name } => {
            let list = api.create_todo_list(&name, None).await?;
            Ok(TodoEvent::ListCreated(list))
        }
        TodoCommand::DeleteList { list_id } => {
            if !api.delete_todo_list(&list_id).await? {
                return Err(BackendError::RequestFailed(format!(
                    "Todo list {} was not deleted",
                    list_id
                )));
            }
            Ok(TodoEvent::Deleted { id: list_id })
        }
        TodoCommand::AddItem { list_id, task } => {
            let item = api
                .create_todo_item(&list_id, &task, &order_key_at(now()))
                .await?;
            Ok(TodoEvent::ItemSaved(item))
        }
        TodoCommand::SetDone { item_id, done } => {
            let patch = TodoItemPatch {
                done: Some(done),
                ..Default::default()
            };
            let item = api.update_todo_item(&item_id, &patch).await?;
            Ok(TodoEvent::ItemSaved(item))
        }
        TodoCommand::DeleteItem { item_id } => {
            if !api.delete_todo_item(&item_id).await? {
                return Err(BackendError::RequestFailed(format!(
                    "Todo item {} was not deleted",
                    item_id
                )));
            }
            Ok(TodoEvent::Deleted { id: item_id })
        }
    }
}
