use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::jfa::seeds::CATALOG_LEN;

/// Persisted viewer settings.
#[derive(Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Display the computed distance field (false = raw seed texture).
    #[serde(default = "default_true")]
    pub use_algorithm: bool,
    /// Catalog shape loaded at startup (1-based).
    #[serde(default = "default_shape")]
    pub start_shape: u8,
}

fn default_true() -> bool {
    true
}
fn default_shape() -> u8 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_algorithm: true,
            start_shape: 1,
        }
    }
}

impl Settings {
    fn config_dir() -> Option<PathBuf> {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config").join("jumpflood"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.json"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(data) = fs::read_to_string(&path) else {
            return Self::default();
        };
        let mut settings: Settings = serde_json::from_str(&data).unwrap_or_default();
        if !(1..=CATALOG_LEN).contains(&settings.start_shape) {
            settings.start_shape = default_shape();
        }
        settings
    }

    /// Best-effort save; settings are not worth failing the app over.
    pub fn save(&self) {
        let Some(dir) = Self::config_dir() else {
            return;
        };
        if fs::create_dir_all(&dir).is_err() {
            return;
        }
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.use_algorithm);
        assert_eq!(settings.start_shape, 1);
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(settings.use_algorithm);
        assert_eq!(settings.start_shape, 1);
    }

    #[test]
    fn test_roundtrip() {
        let settings = Settings {
            use_algorithm: false,
            start_shape: 3,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert!(!back.use_algorithm);
        assert_eq!(back.start_shape, 3);
    }
}
