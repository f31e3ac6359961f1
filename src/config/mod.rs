pub mod settings;

use crate::core::{FilterSettings, ThresholdUnit, DEFAULT_SIZE_THRESHOLD};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `api_base_url`.
pub const API_URL_ENV: &str = "DIGEST_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub threshold_unit: ThresholdUnit,
    pub default_size_threshold: i64,
    pub summary_top_files: usize,
}

impl ClientConfig {
    /// Loads the config from `path`, or from the platform config directory,
    /// and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = settings::load_config(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::info!("Using API base URL from {}", API_URL_ENV);
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings a store starts from before the backend has answered.
    pub fn default_filter_settings(&self) -> FilterSettings {
        FilterSettings {
            size_threshold: self.default_size_threshold,
            ..FilterSettings::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://0.0.0.0:8000".to_string(),
            request_timeout_secs: 30,
            threshold_unit: ThresholdUnit::Tokens,
            default_size_threshold: DEFAULT_SIZE_THRESHOLD,
            summary_top_files: 20,
        }
    }
}
