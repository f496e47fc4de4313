//! Chat client core: an optimistic local view of one chat, write-through
//! persistence, and reconciliation of asynchronously generated replies.

pub mod app;
pub mod config;
pub mod models;
pub mod providers;
pub mod services;
