use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::cache::DEFAULT_FRESHNESS_HOURS;
use crate::core::fetcher::{FetchTarget, TemplateSource, GITHUB_API_BASE, MODRINTH_API_BASE};

const APP_DIR_NAME: &str = "instancesmith";
pub const DEFAULT_INSTANCE_NAME: &str = "Modded b1.7.3";
pub const RAW_CONTENT_BASE: &str = "https://raw.githubusercontent.com";

/// Runtime configuration. Every field has a default, so a partial JSON file
/// only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root holding `temp/` (artifact cache) and `instances/` (outputs).
    pub data_dir: PathBuf,
    #[serde(flatten)]
    pub target: FetchTarget,
    pub base_template: TemplateSource,
    pub default_instance_name: String,
    /// Holds `betaicon_<n>.png`.
    pub icons_dir: PathBuf,
    /// Holds the fixed adjustment payloads and local override jars.
    pub adjustments_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub fetch_concurrency: usize,
    pub freshness_hours: i64,
    pub github_api_base: String,
    pub modrinth_api_base: String,
    pub raw_content_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            target: FetchTarget::default(),
            base_template: TemplateSource::default(),
            default_instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            icons_dir: PathBuf::from("public").join("img"),
            adjustments_dir: PathBuf::from("adjustments"),
            fetch_timeout_secs: 60,
            fetch_concurrency: 6,
            freshness_hours: DEFAULT_FRESHNESS_HOURS,
            github_api_base: GITHUB_API_BASE.to_string(),
            modrinth_api_base: MODRINTH_API_BASE.to_string(),
            raw_content_base: RAW_CONTENT_BASE.to_string(),
        }
    }
}

impl Settings {
    /// Load from `path`, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Corrupt settings at {:?}: {} (using defaults)", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Cannot read settings {:?}: {} (using defaults)", path, e);
                Self::default()
            }
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("temp")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_hours)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
