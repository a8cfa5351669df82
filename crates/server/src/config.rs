use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

const SETTINGS_FILE: &str = "scoreboard.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub scoreboard_path: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scoreboard_path: "scoreboards.json".into(),
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `scoreboard.toml` in the working directory, then the
/// environment.
pub fn load_settings() -> Settings {
    let file_cfg = fs::read_to_string(SETTINGS_FILE).ok();
    resolve_settings(file_cfg.as_deref(), |key| std::env::var(key).ok())
}

fn resolve_settings(file_cfg: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_cfg {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
            if let Some(v) = file_cfg.get("scoreboard_path") {
                settings.scoreboard_path = v.clone();
            }
            if let Some(v) = file_cfg.get("log_filter") {
                settings.log_filter = v.clone();
            }
        }
    }

    if let Some(v) = env("SCOREBOARD_PATH") {
        settings.scoreboard_path = v;
    }
    if let Some(v) = env("APP__SCOREBOARD_PATH") {
        settings.scoreboard_path = v;
    }

    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    settings
}

/// Resolves the configured file path and makes sure its directory exists.
pub fn prepare_scoreboard_path(raw_path: &str) -> anyhow::Result<PathBuf> {
    let path = normalize_scoreboard_path(raw_path);
    ensure_parent_dir_exists(&path)?;
    Ok(path)
}

fn normalize_scoreboard_path(raw_path: &str) -> PathBuf {
    let raw_path = raw_path.trim();
    if raw_path.is_empty() {
        return PathBuf::from(Settings::default().scoreboard_path);
    }
    PathBuf::from(raw_path)
}

fn ensure_parent_dir_exists(path: &Path) -> anyhow::Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for scoreboard file '{}'",
            parent.display(),
            path.display()
        )
    })?;

    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
