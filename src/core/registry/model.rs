use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Id given to catalog entries whose descriptor could not be loaded.
pub const PLACEHOLDER_MOD_ID: &str = "nomodid";

/// One declared dependency edge. The version constraint is kept for display
/// only; resolution pulls any declared dependency regardless of version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModDependency {
    pub id: String,
    pub version_constraint: String,
}

/// Identity and metadata of one installable mod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModDescriptor {
    pub id: String,
    pub display_title: Option<String>,
    pub description: String,
    pub icon_ref: String,
    /// `owner/name` of the source repository on GitHub.
    pub source_repo: String,
    pub source_branch: String,
    /// Modrinth project slug; when set it takes priority over GitHub releases.
    pub registry_package_id: Option<String>,
    /// In declaration order.
    #[serde(default)]
    pub dependencies: Vec<ModDependency>,
    #[serde(default)]
    pub is_api_only: bool,
    #[serde(default)]
    pub is_hidden: bool,
}

impl ModDescriptor {
    /// Bare descriptor with no metadata beyond its source.
    pub fn new(id: impl Into<String>, source_repo: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_title: None,
            description: String::new(),
            icon_ref: String::new(),
            source_repo: source_repo.into(),
            source_branch: "master".to_string(),
            registry_package_id: None,
            dependencies: Vec::new(),
            is_api_only: false,
            is_hidden: false,
        }
    }

    /// Stand-in for a catalog entry whose remote descriptor failed to load.
    pub fn placeholder(source_repo: &str, source_branch: &str) -> Self {
        Self {
            id: PLACEHOLDER_MOD_ID.to_string(),
            display_title: Some("Unknown".to_string()),
            description: "Failed to load description".to_string(),
            icon_ref: String::new(),
            source_repo: source_repo.to_string(),
            source_branch: source_branch.to_string(),
            registry_package_id: None,
            dependencies: Vec::new(),
            is_api_only: false,
            is_hidden: false,
        }
    }

    pub fn with_dependency(mut self, id: &str, version_constraint: &str) -> Self {
        self.dependencies.push(ModDependency {
            id: id.to_string(),
            version_constraint: version_constraint.to_string(),
        });
        self
    }

    pub fn with_registry_package(mut self, package_id: &str) -> Self {
        self.registry_package_id = Some(package_id.to_string());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_MOD_ID
    }

    /// Whether the mod belongs in the user-facing picker.
    pub fn is_listed(&self) -> bool {
        !self.is_api_only && !self.is_hidden && self.display_title.is_some()
    }
}

/// Immutable snapshot of every known mod, built once and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct ModRegistry {
    mods: Vec<ModDescriptor>,
    index: HashMap<String, usize>,
}

impl ModRegistry {
    pub fn from_descriptors(mods: Vec<ModDescriptor>) -> Self {
        let mut index = HashMap::with_capacity(mods.len());
        for (position, descriptor) in mods.iter().enumerate() {
            // First descriptor wins for duplicate ids.
            index.entry(descriptor.id.clone()).or_insert(position);
        }
        Self { mods, index }
    }

    /// Find a mod by id.
    pub fn get(&self, id: &str) -> Option<&ModDescriptor> {
        self.index.get(id).map(|&position| &self.mods[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModDescriptor> {
        self.mods.iter()
    }

    /// Mods shown to users, in catalog order. Placeholders stay visible so a
    /// broken entry degrades instead of disappearing.
    pub fn listing(&self) -> Vec<&ModDescriptor> {
        self.mods.iter().filter(|m| m.is_listed()).collect()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}
