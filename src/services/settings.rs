use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::database::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub username: String,
    pub simulated_delay_ms: u64,
    #[serde(default)]
    pub viewport_width: Option<u32>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            username: "User".to_string(),
            simulated_delay_ms: 1000,
            viewport_width: None,
        }
    }
}

pub struct SettingsService;

impl SettingsService {
    pub fn load(db: &Database) -> AppSettings {
        match db.get_setting("app_settings") {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_default(),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    pub fn save(db: &Database, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        db.set_setting("app_settings", &json)?;
        Ok(())
    }
}
