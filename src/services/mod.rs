pub mod chat;
pub mod database;
pub mod export;
pub mod json_store;
pub mod persistence;
pub mod reconcile;
pub mod settings;
pub mod store;
pub mod summaries;
pub mod todos;
pub mod view;

pub use database::Database;
pub use json_store::JsonFileStore;
pub use persistence::{ChatRepository, PersistenceError};
pub use reconcile::{Reconciler, Reconciliation, ReplyTicket};
pub use settings::{AppSettings, SettingsService};
pub use store::{ChatError, ChatStore};
pub use summaries::{ChatSummarySource, SummaryFeed};
pub use view::SidebarState;
