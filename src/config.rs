// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application configuration.
//!
//! Settings are read once at startup from the file named by
//! `FRAMEMARK_CONFIG`, or from `framemark/config.yaml` under the platform
//! config directory. A missing or broken file falls back to defaults.

use crate::io::serialization::DEFAULT_EXPORT_FILE_NAME;
use crate::models::session::{SessionPolicy, CLOSURE_THRESHOLD};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "FRAMEMARK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Auto-close distance in display pixels
    pub closure_threshold: f64,
    /// Discard committed polygons when a new drawing pass starts
    pub start_clears_committed: bool,
    /// File name suggested by the export dialog
    pub export_file_name: String,
    pub window_width: f32,
    pub window_height: f32,
    /// Radius of vertex markers on the canvas
    pub marker_radius: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            closure_threshold: CLOSURE_THRESHOLD,
            start_clears_committed: false,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            window_width: 1280.0,
            window_height: 720.0,
            marker_radius: 5.0,
        }
    }
}

impl AppConfig {
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            closure_threshold: self.closure_threshold,
            start_clears_committed: self.start_clears_committed,
        }
    }

    /// Load from the configured location, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            log::debug!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::from_file(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring config file: {:#}", e);
                Self::default()
            }
        }
    }

    /// Parse a YAML or JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            _ => serde_yaml::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.closure_threshold.is_finite() && self.closure_threshold >= 0.0,
            "closure_threshold must be a non-negative number, got {}",
            self.closure_threshold
        );
        anyhow::ensure!(
            self.marker_radius > 0.0,
            "marker_radius must be positive, got {}",
            self.marker_radius
        );
        anyhow::ensure!(
            !self.export_file_name.trim().is_empty(),
            "export_file_name must not be empty"
        );
        Ok(())
    }
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("framemark").join("config.yaml"))
}
