//! Persistent application settings (JSON file next to the binary or under
//! `MANDATUM_CONFIG_DIR`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mandatum_core::EngineConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub wake_words: Vec<String>,
    pub attention_timeout_secs: u64,
    pub amplitude_threshold: u32,
    pub min_phrase_secs: f32,
    pub preferred_input_device: Option<String>,
    pub phrase_dump_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            wake_words: vec!["computer".into()],
            attention_timeout_secs: 5,
            amplitude_threshold: 675,
            min_phrase_secs: 0.3,
            preferred_input_device: None,
            phrase_dump_dir: None,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.wake_words = self
            .wake_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if self.wake_words.is_empty() {
            self.wake_words = vec!["computer".into()];
        }
        self.attention_timeout_secs = self.attention_timeout_secs.clamp(1, 120);
        self.amplitude_threshold = self.amplitude_threshold.clamp(1, 65_535);
        self.min_phrase_secs = self.min_phrase_secs.clamp(0.1, 5.0);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            amplitude_threshold: self.amplitude_threshold,
            min_phrase_secs: self.min_phrase_secs,
            wake_words: self.wake_words.clone(),
            attention_timeout: Duration::from_secs(self.attention_timeout_secs),
            phrase_dump_dir: self.phrase_dump_dir.clone(),
            ..EngineConfig::default()
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    std::env::var_os("MANDATUM_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mandatum-settings.json")
}

/// Load settings, falling back to defaults when the file is missing or
/// malformed (a broken settings file must not brick startup).
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<AppSettings>(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("settings file unreadable ({e}), using defaults");
                AppSettings::default()
            }
        },
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let settings = AppSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.wake_words, vec!["computer"]);
        assert_eq!(back.attention_timeout_secs, 5);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"wakeWords":["jarvis"]}"#).unwrap();
        assert_eq!(settings.wake_words, vec!["jarvis"]);
        assert_eq!(settings.amplitude_threshold, 675);
    }

    #[test]
    fn normalize_repairs_empty_wake_words() {
        let mut settings = AppSettings {
            wake_words: vec!["  ".into()],
            attention_timeout_secs: 0,
            ..AppSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.wake_words, vec!["computer"]);
        assert_eq!(settings.attention_timeout_secs, 1);
    }

    #[test]
    fn engine_config_carries_settings_through() {
        let mut settings = AppSettings::default();
        settings.attention_timeout_secs = 8;
        settings.amplitude_threshold = 900;
        let config = settings.engine_config();
        assert_eq!(config.attention_timeout, Duration::from_secs(8));
        assert_eq!(config.amplitude_threshold, 900);
        assert_eq!(config.target_sample_rate, 16_000);
    }
}
