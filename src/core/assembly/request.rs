use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// What the front end posts to start an assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssemblyRequest {
    #[serde(rename = "mods", default)]
    pub mod_ids: Vec<String>,
    #[serde(rename = "icon")]
    pub icon_id: u32,
    #[serde(rename = "instanceName", default)]
    pub instance_name: String,
}

impl AssemblyRequest {
    pub fn new(mod_ids: Vec<String>, icon_id: u32, instance_name: impl Into<String>) -> Self {
        Self {
            mod_ids,
            icon_id,
            instance_name: instance_name.into(),
        }
    }

    /// Name of the instance and of its archive. Blank names fall back to
    /// `default_name`; path separators are replaced so the name stays a
    /// single file name.
    pub fn display_name(&self, default_name: &str) -> String {
        let cleaned: String = self
            .instance_name
            .trim()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();

        if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
            default_name.to_string()
        } else {
            cleaned
        }
    }

    /// Icon key referenced from `instance.cfg`, e.g. `betaicon_3`.
    pub fn icon_key(&self) -> String {
        format!("betaicon_{}", self.icon_id)
    }
}

/// Progress of one background assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssemblyStatus {
    Pending,
    Fetching,
    Unpacking,
    Injecting,
    Repacking,
    CleaningUp,
    Done {
        archive: PathBuf,
        /// Mods whose artifact could not be fetched and were left out.
        skipped_mods: Vec<String>,
    },
    Failed {
        reason: String,
    },
}

impl AssemblyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssemblyStatus::Done { .. } | AssemblyStatus::Failed { .. })
    }
}

/// Returned as soon as the instance directory exists; the assembly itself
/// keeps running in the background.
#[derive(Debug, Clone)]
pub struct AssemblyHandle {
    pub id: String,
    pub dir: PathBuf,
    status: watch::Receiver<AssemblyStatus>,
}

impl AssemblyHandle {
    pub(crate) fn new(id: String, dir: PathBuf, status: watch::Receiver<AssemblyStatus>) -> Self {
        Self { id, dir, status }
    }

    /// Current state, without waiting.
    pub fn status(&self) -> AssemblyStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every later status change.
    pub fn subscribe(&self) -> watch::Receiver<AssemblyStatus> {
        self.status.clone()
    }

    /// Wait until the assembly reaches `Done` or `Failed`.
    pub async fn wait(&self) -> AssemblyStatus {
        let mut rx = self.status.clone();
        let status = match rx.wait_for(AssemblyStatus::is_terminal).await {
            Ok(status) => status.clone(),
            Err(_) => AssemblyStatus::Failed {
                reason: "assembly task ended without reporting a result".to_string(),
            },
        };
        status
    }
}
