use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::persistence::{format_timestamp, parse_timestamp, ChatRepository, PersistenceError};
use crate::models::{Chat, ChatSummary, Message, MessageStatus};

#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;

        tracing::debug!("Opened chat database at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database (used for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE chats (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE messages (
                    id TEXT PRIMARY KEY,
                    chat_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    sender TEXT NOT NULL,
                    is_ai INTEGER NOT NULL DEFAULT 0,
                    status TEXT NOT NULL DEFAULT 'completed',
                    timestamp TEXT NOT NULL,
                    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
                );

                CREATE INDEX idx_chats_created ON chats(created_at);
                CREATE INDEX idx_messages_chat ON messages(chat_id, position);

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                UPDATE schema_version SET version = 2;",
            )?;
        }

        if version < 3 {
            conn.execute_batch(
                "ALTER TABLE chats ADD COLUMN pinned INTEGER NOT NULL DEFAULT 0;

                 UPDATE schema_version SET version = 3;",
            )?;
        }

        Ok(())
    }

    // --- Settings ---

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let conn = self.lock()?;
        let result: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Row helpers ---

    fn load_messages(conn: &Connection, chat_id: &str) -> Result<Vec<Message>, PersistenceError> {
        let mut stmt = conn.prepare(
            "SELECT id, content, sender, is_ai, status, timestamp
             FROM messages WHERE chat_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt
            .query_map(params![chat_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, content, sender, is_ai, status, timestamp)| {
                Ok(Message {
                    id,
                    content,
                    sender,
                    timestamp: parse_timestamp(&timestamp)?,
                    is_ai: is_ai != 0,
                    status: MessageStatus::from_str(&status)
                        .ok_or(PersistenceError::UnknownStatus(status))?,
                })
            })
            .collect()
    }

    fn row_to_chat(conn: &Connection, row: (String, String, String, String)) -> Result<Chat, PersistenceError> {
        let (id, title, created_str, updated_str) = row;
        let messages = Self::load_messages(conn, &id)?;
        Ok(Chat {
            id,
            title,
            messages,
            created_at: parse_timestamp(&created_str)?,
            updated_at: parse_timestamp(&updated_str)?,
        })
    }
}

impl ChatRepository for Database {
    fn read_all(&self) -> Result<Vec<Chat>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, created_at, updated_at FROM chats ORDER BY created_at ASC, id ASC",
        )?;
        let rows: Vec<(String, String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| Self::row_to_chat(&conn, row))
            .collect()
    }

    fn read(&self, id: &str) -> Result<Option<Chat>, PersistenceError> {
        let conn = self.lock()?;
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT id, title, created_at, updated_at FROM chats WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        row.map(|row| Self::row_to_chat(&conn, row)).transpose()
    }

    fn write(&self, chat: &Chat) -> Result<(), PersistenceError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO chats (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET title = ?2, created_at = ?3, updated_at = ?4",
            params![
                chat.id,
                chat.title,
                format_timestamp(&chat.created_at),
                format_timestamp(&chat.updated_at),
            ],
        )?;

        tx.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat.id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (id, chat_id, position, content, sender, is_ai, status, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (position, msg) in chat.messages.iter().enumerate() {
                stmt.execute(params![
                    msg.id,
                    chat.id,
                    position as i64,
                    msg.content,
                    msg.sender,
                    msg.is_ai as i32,
                    msg.status.as_str(),
                    format_timestamp(&msg.timestamp),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn set_pinned(&self, id: &str, pinned: bool) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE chats SET pinned = ?1 WHERE id = ?2",
            params![pinned as i32, id],
        )?;
        if changed == 0 {
            return Err(PersistenceError::UnknownChat(id.to_string()));
        }
        Ok(())
    }

    fn summaries(&self) -> Result<Vec<ChatSummary>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, pinned, created_at FROM chats ORDER BY pinned DESC, created_at DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, pinned, created_str)| {
                Ok(ChatSummary {
                    id,
                    name,
                    pinned: pinned != 0,
                    created_at: parse_timestamp(&created_str)?,
                })
            })
            .collect()
    }
}
