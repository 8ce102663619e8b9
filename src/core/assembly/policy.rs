use std::path::{Path, PathBuf};

/// Mods every instance ships with, whatever was requested.
const CORE_MOD_IDS: &[&str] = &[
    "stationapi",
    "gcapi3",
    "gambac",
    "mojangfixstationapi",
    "stapi-fast-intro",
    "unitweaks",
    "glassnetworking",
    "fixhandshakepacket",
];

/// When both mods of a pair are requested, the `drop` one is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundancyRule {
    pub keep: String,
    pub drop: String,
}

/// A mod installed from a checked-in jar instead of being fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalOverride {
    pub mod_id: String,
    /// Relative to the adjustments directory.
    pub file: PathBuf,
}

/// A file or directory copied into every instance tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    /// Relative to the adjustments directory.
    pub source: PathBuf,
    /// Relative to the instance tree root.
    pub dest: PathBuf,
}

/// The fixed tables that shape an instance beyond what the user picked.
#[derive(Debug, Clone)]
pub struct AssemblyPolicy {
    pub core_mod_ids: Vec<String>,
    pub redundancy_rules: Vec<RedundancyRule>,
    pub local_overrides: Vec<LocalOverride>,
    pub adjustments: Vec<Adjustment>,
    /// Relative to the instance tree root.
    pub mods_dir: PathBuf,
}

impl Default for AssemblyPolicy {
    fn default() -> Self {
        let minecraft = PathBuf::from(".minecraft");
        Self {
            core_mod_ids: CORE_MOD_IDS.iter().map(|id| id.to_string()).collect(),
            redundancy_rules: vec![RedundancyRule {
                keep: "alwaysmoreitems".to_string(),
                drop: "hmifabric".to_string(),
            }],
            local_overrides: vec![LocalOverride {
                mod_id: "zeasons".to_string(),
                file: PathBuf::from("Zeasons-0.1.0-SNAPSHOT.jar"),
            }],
            adjustments: vec![
                Adjustment {
                    source: PathBuf::from("GlassConfigAPI-2.0.2.jar"),
                    dest: minecraft.join("mods").join("GlassConfigAPI-2.0.2.jar"),
                },
                Adjustment {
                    source: PathBuf::from("config"),
                    dest: minecraft.join("config"),
                },
            ],
            mods_dir: minecraft.join("mods"),
        }
    }
}

impl AssemblyPolicy {
    /// Requested ids followed by the core mods, with redundant mods removed.
    pub fn augment<S: AsRef<str>>(&self, requested: &[S]) -> Vec<String> {
        let mut ids: Vec<String> = requested
            .iter()
            .map(|id| id.as_ref().to_string())
            .chain(self.core_mod_ids.iter().cloned())
            .collect();

        for rule in &self.redundancy_rules {
            let has = |id: &str| ids.iter().any(|x| x == id);
            if has(&rule.keep) && has(&rule.drop) {
                ids.retain(|id| id != &rule.drop);
            }
        }

        ids
    }

    pub fn local_override(&self, mod_id: &str) -> Option<&Path> {
        self.local_overrides
            .iter()
            .find(|o| o.mod_id == mod_id)
            .map(|o| o.file.as_path())
    }
}

/// Contents of the launcher's `instance.cfg`.
pub fn render_instance_cfg(display_name: &str, icon_key: &str) -> String {
    format!(
        "InstanceType=OneSix\n\
         name={}\n\
         iconKey={}\n\
         JvmArgs=\"-Dapple.awt.application.appearance=system\"\n\
         OverrideJavaArgs=true",
        display_name, icon_key
    )
}
