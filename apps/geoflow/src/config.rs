use std::{collections::HashMap, fs, path::Path, path::PathBuf};

use anyhow::Context;

pub const DEFAULT_SETTINGS_FILE: &str = "geoflow.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
    pub output_dir: PathBuf,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".into(),
            output_dir: PathBuf::from("."),
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `geoflow.toml` (when present), then environment overrides.
pub fn load_settings(settings_file: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(settings_file) {
        Ok(raw) => {
            let file_cfg = toml::from_str::<HashMap<String, String>>(&raw).with_context(|| {
                format!("failed to parse settings file '{}'", settings_file.display())
            })?;
            apply_file_settings(&mut settings, &file_cfg);
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read settings file '{}'", settings_file.display())
            })
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.backend_url = normalize_backend_url(&settings.backend_url);
    Ok(settings)
}

fn apply_file_settings(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("backend_url") {
        settings.backend_url = v.clone();
    }
    if let Some(v) = file_cfg.get("output_dir") {
        settings.output_dir = PathBuf::from(v);
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("GEOFLOW_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = lookup("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = lookup("GEOFLOW_OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }

    if let Some(v) = lookup("GEOFLOW_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

pub fn normalize_backend_url(raw_backend_url: &str) -> String {
    let raw_backend_url = raw_backend_url.trim().trim_end_matches('/');

    if raw_backend_url.is_empty() {
        return Settings::default().backend_url;
    }

    if raw_backend_url.contains("://") {
        return raw_backend_url.to_string();
    }

    format!("http://{raw_backend_url}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
