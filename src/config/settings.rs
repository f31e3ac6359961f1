use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::ClientConfig;

const APP_NAME: &str = "RepoDigestFilter";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "repodigest", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads the client configuration.
/// If the file doesn't exist, it creates a default one.
/// If the file is corrupted or incomplete, every field that can be read is
/// kept and the rest fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let config_path = resolve_path(path)?;

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = ClientConfig::default();
        save_config(&default_config, Some(&config_path))?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file {config_path:?}"))?;

    match serde_json::from_str::<ClientConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Migrating with defaults.",
                config_path,
                e
            );
            Ok(migrate_legacy_config(&config_content).unwrap_or_else(|e| {
                tracing::warn!("Config migration failed: {}. Using default config.", e);
                ClientConfig::default()
            }))
        }
    }
}

/// Rebuilds a config from an older or partially broken file, field by field.
fn migrate_legacy_config(config_content: &str) -> Result<ClientConfig> {
    let value: Value = serde_json::from_str(config_content)?;
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let mut config = ClientConfig::default();

    // Each field is read on its own; a bad value only loses that field.
    fn read<T: serde::de::DeserializeOwned>(
        obj: &serde_json::Map<String, Value>,
        key: &str,
    ) -> Option<T> {
        obj.get(key)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    if let Some(url) = read(obj, "api_base_url") {
        config.api_base_url = url;
    }
    if let Some(timeout) = read(obj, "request_timeout_secs") {
        config.request_timeout_secs = timeout;
    }
    if let Some(unit) = read(obj, "threshold_unit") {
        config.threshold_unit = unit;
    }
    if let Some(threshold) = read(obj, "default_size_threshold").or_else(|| read(obj, "max_file_size_mb")) {
        config.default_size_threshold = threshold;
    }
    if let Some(top) = read(obj, "summary_top_files") {
        config.summary_top_files = top;
    }

    tracing::info!("Successfully migrated legacy config");
    Ok(config)
}

/// Saves the provided configuration to `path`, or to the platform config file.
pub fn save_config(config: &ClientConfig, path: Option<&Path>) -> Result<()> {
    let config_path = resolve_path(path)?;

    if let Some(config_dir) = config_path.parent() {
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir)
                .with_context(|| format!("Failed to create {config_dir:?}"))?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }
    }

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_json)
        .with_context(|| format!("Failed to write config file {config_path:?}"))?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Exports the current configuration to a user-specified JSON file.
pub fn export_config(config: &ClientConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports a client configuration from a user-specified JSON file.
pub fn import_config(import_path: &Path) -> Result<ClientConfig> {
    let config_content = fs::read_to_string(import_path)?;
    match serde_json::from_str::<ClientConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Imported config from {:?}", import_path);
            Ok(config)
        }
        Err(_) => {
            tracing::info!("Importing legacy config format from {:?}", import_path);
            migrate_legacy_config(&config_content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ThresholdUnit;

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config, ClientConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ClientConfig {
            api_base_url: "http://example.test".to_string(),
            threshold_unit: ThresholdUnit::Megabytes,
            ..ClientConfig::default()
        };

        save_config(&config, Some(&path)).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_partial_config_keeps_valid_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"api_base_url": "http://old.test", "request_timeout_secs": "soon", "max_file_size_mb": 20}"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.api_base_url, "http://old.test");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.default_size_threshold, 20);
        assert_eq!(config.threshold_unit, ThresholdUnit::Tokens);
    }

    #[test]
    fn test_garbage_config_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "this is not json").unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_export_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        let config = ClientConfig {
            summary_top_files: 5,
            ..ClientConfig::default()
        };

        export_config(&config, &path).unwrap();

        assert_eq!(import_config(&path).unwrap(), config);
    }
}
