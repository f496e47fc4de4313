pub mod chat;
pub mod message;
pub mod todo;

pub use chat::{Chat, ChatSummary};
pub use message::{Message, MessageStatus};
pub use todo::{order_key_at, TodoCommand, TodoEvent, TodoItem, TodoItemPatch, TodoList};
