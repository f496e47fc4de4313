use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use url::Url;

pub const APP_ID: &str = "com.electric.Chat";
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Http,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub api_url: Url,
    pub store: StoreKind,
    pub backend: BackendKind,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("XDG_DATA_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("Neither XDG_DATA_HOME nor HOME is set")?;
                PathBuf::from(home).join(".local/share")
            }
        }
        .join("electric-chat");

        let api_url = lookup("ELECTRIC_CHAT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&api_url).with_context(|| format!("Invalid API URL: {}", api_url))?;

        let store = match lookup("ELECTRIC_CHAT_STORE").as_deref() {
            None | Some("sqlite") => StoreKind::Sqlite,
            Some("json") => StoreKind::Json,
            Some(other) => bail!("Unknown store kind: {}", other),
        };

        let backend = match lookup("ELECTRIC_CHAT_BACKEND").as_deref() {
            None | Some("simulated") => BackendKind::Simulated,
            Some("http") => BackendKind::Http,
            Some(other) => bail!("Unknown backend kind: {}", other),
        };

        Ok(Self {
            data_dir,
            api_url,
            store,
            backend,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("electric-chat.db")
    }

    pub fn chats_json_path(&self) -> PathBuf {
        self.data_dir.join("chats.json")
    }
}
