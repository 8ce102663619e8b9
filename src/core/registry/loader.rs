// ─── Registry Loader ───
// Builds the mod registry by reading each catalog repository's fabric.mod.json.

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::model::{ModDependency, ModDescriptor, ModRegistry};
use crate::core::error::{AssemblerError, AssemblerResult};

/// Dependencies every mod declares that the instance template already ships.
const IMPLICIT_DEPENDENCIES: [&str; 3] = ["stationapi", "minecraft", "fabricloader"];

const DESCRIPTION_LIMIT: usize = 150;

/// One curated source repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub repo: String,
    pub branch: String,
    #[serde(default)]
    pub registry_package_id: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl CatalogEntry {
    fn new(repo: &str, branch: &str, registry_package_id: Option<&str>, hidden: bool) -> Self {
        Self {
            repo: repo.to_string(),
            branch: branch.to_string(),
            registry_package_id: registry_package_id.map(str::to_string),
            hidden,
        }
    }
}

/// The curated catalog of b1.7.3 StationAPI mods offered by the picker.
pub fn default_catalog() -> Vec<CatalogEntry> {
    let e = CatalogEntry::new;
    vec![
        e("calmilamsy/ModMenu", "b1.7.3", Some("modmenu-beta"), false),
        e("matthewperiut/accessory-api", "master", Some("accessory-api"), false),
        e("matthewperiut/aether-fabric-b1.7.3", "master", Some("aether-stapi"), false),
        e("matthewperiut/retrocommands", "master", Some("retrocommands"), false),
        e("paulevsGitch/BHCreative", "stapi-2.0", Some("bh-creative"), false),
        e("paulevsGitch/BetterWeather", "main", Some("betterweather"), false),
        e("matthewperiut/babric-sprint", "master", None, false),
        e("telvarost/UniTweaksTelsAddons-StationAPI", "main", Some("unitweakstelsaddons-stationapi"), false),
        e("telvarost/MiscTweaks-StationAPI", "main", Some("misctweaks-stationapi"), false),
        e("telvarost/MojangFix-StationAPI", "stationapi-config", Some("mojangfix-stationapi-edition"), true),
        e("matthewperiut/retroauth", "master", None, true),
        e("telvarost/InventoryTweaks-StationAPI", "main", Some("inventorytweaks"), false),
        e("Glass-Series/Always-More-Items", "master", Some("always-more-items"), false),
        e("calmilamsy/HowManyItems-Fabric-Unofficial", "master", Some("howmanyitems-fabric"), false),
        e("DanyGames2014/spawneggs", "master", Some("spawn-eggs"), false),
        e("telvarost/TelsDrinks-StationAPI", "main", None, false),
        e("Atilist/SpookySquashLands", "master", None, false),
        e("matthewperiut/thirdpersonfix-fabric-b1.7.3", "master", Some("thirdpersonfix-babric"), false),
        e("matthewperiut/midastouch-fabric-b1.7.3", "master", None, false),
        e("ModificationStation/StationAPI", "master", Some("stationapi"), true),
        e("Glass-Series/glass-config-api", "master", Some("glass-config-api"), false),
        e("DanyGames2014/gambac", "master", Some("gambac"), true),
        e("viciscat/stapi-fast-intro", "master", Some("fast-stapi-intro"), true),
        e("DanyGames2014/UniTweaks", "master", Some("unitweaks"), true),
        e("matthewperiut/elementalcreepers-fabric-b1.7.3", "master", None, false),
        e("matthewperiut/claysoldiers-fabric-b1.7.3", "master", None, false),
        e("telvarost/SameOldSpells-StationAPI", "main", Some("sameoldspells-stationapi"), false),
        e("ralf2oo2/netherstorage-stapi", "2.0.0", Some("nether-storage-stationapi"), false),
        e("telvarost/CreativeEditorWands-StationAPI", "main", Some("creativeeditorwands-stationapi"), false),
        e("calmilamsy/Glass-Networking", "master", Some("glass-networking"), true),
        e("KydZombie/voxel-shapes", "master", None, true),
        e("matthewperiut/fixhandshakepacket", "master", None, true),
        e("FabricMC/fabric-language-kotlin", "master", None, true),
    ]
}

/// Subset of `fabric.mod.json` needed to describe a mod.
#[derive(Debug, Deserialize)]
pub struct FabricModJson {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub depends: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub custom: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Derive a descriptor from a parsed manifest and its catalog entry.
pub fn descriptor_from_manifest(
    entry: &CatalogEntry,
    manifest: FabricModJson,
    raw_content_base: &str,
) -> ModDescriptor {
    let resources = format!(
        "{}/{}/{}/src/main/resources",
        raw_content_base.trim_end_matches('/'),
        entry.repo,
        entry.branch
    );

    let dependencies = manifest
        .depends
        .iter()
        .filter(|(id, _)| !IMPLICIT_DEPENDENCIES.contains(&id.as_str()))
        .map(|(id, constraint)| ModDependency {
            id: id.clone(),
            version_constraint: match constraint {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
        .collect();

    let is_api_only = manifest
        .custom
        .as_ref()
        .map(|custom| custom.contains_key("modmenu:api"))
        .unwrap_or(false);

    ModDescriptor {
        id: manifest.id,
        display_title: manifest.name,
        description: truncate_description(manifest.description.as_deref().unwrap_or_default()),
        icon_ref: manifest
            .icon
            .map(|icon| format!("{}/{}", resources, icon))
            .unwrap_or_default(),
        source_repo: entry.repo.clone(),
        source_branch: entry.branch.clone(),
        registry_package_id: entry.registry_package_id.clone(),
        dependencies,
        is_api_only,
        is_hidden: entry.hidden,
    }
}

fn truncate_description(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_LIMIT {
        let head: String = description.chars().take(DESCRIPTION_LIMIT - 3).collect();
        format!("{}...", head)
    } else {
        description.to_string()
    }
}

/// Loads the registry snapshot at startup.
pub struct RegistryLoader {
    client: reqwest::Client,
    raw_content_base: String,
    concurrency: usize,
}

impl RegistryLoader {
    pub fn new(client: reqwest::Client, raw_content_base: impl Into<String>) -> Self {
        Self {
            client,
            raw_content_base: raw_content_base.into(),
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Fetch every catalog entry, keeping catalog order. Entries that fail to
    /// load become placeholders instead of vanishing.
    pub async fn load_all(&self, catalog: &[CatalogEntry]) -> ModRegistry {
        info!("Loading mod registry from {} catalog entries", catalog.len());

        let mods: Vec<ModDescriptor> = stream::iter(catalog)
            .map(|entry| async move {
                match self.fetch_descriptor(entry).await {
                    Ok(descriptor) => descriptor,
                    Err(e) => {
                        warn!("Cannot load descriptor for {}: {}", entry.repo, e);
                        ModDescriptor::placeholder(&entry.repo, &entry.branch)
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let registry = ModRegistry::from_descriptors(mods);
        info!(
            "Registry ready: {} mods, {} listed, {} unavailable",
            registry.len(),
            registry.listing().len(),
            registry.iter().filter(|m| m.is_placeholder()).count()
        );
        registry
    }

    async fn fetch_descriptor(&self, entry: &CatalogEntry) -> AssemblerResult<ModDescriptor> {
        let url = format!(
            "{}/{}/{}/src/main/resources/fabric.mod.json",
            self.raw_content_base.trim_end_matches('/'),
            entry.repo,
            entry.branch
        );

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(AssemblerError::DownloadFailed {
                url,
                status: resp.status().as_u16(),
            });
        }

        // Some manifests are saved with a UTF-8 BOM.
        let body = resp.text().await?;
        let manifest: FabricModJson = serde_json::from_str(body.trim_start_matches('\u{feff}'))?;
        Ok(descriptor_from_manifest(entry, manifest, &self.raw_content_base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "https://raw.githubusercontent.com";

    fn entry() -> CatalogEntry {
        CatalogEntry::new("owner/cool-mod", "main", Some("cool-mod"), false)
    }

    #[test]
    fn manifest_maps_to_descriptor() {
        let json = r#"{
            "id": "coolmod",
            "name": "CoolMod",
            "description": "Adds cool things",
            "icon": "assets/coolmod/icon.png",
            "depends": {
                "fabricloader": "*",
                "minecraft": "1.0.0-beta.7.3",
                "accessoryapi": ">=0.7.1",
                "stationapi": "*",
                "glassconfigapi": ["2.x", "3.x"]
            },
            "custom": { "modmenu:api": true }
        }"#;
        let manifest: FabricModJson = serde_json::from_str(json).unwrap();
        let d = descriptor_from_manifest(&entry(), manifest, RAW);

        assert_eq!(d.id, "coolmod");
        assert_eq!(d.display_title.as_deref(), Some("CoolMod"));
        assert_eq!(
            d.icon_ref,
            "https://raw.githubusercontent.com/owner/cool-mod/main/src/main/resources/assets/coolmod/icon.png"
        );
        let deps: Vec<&str> = d.dependencies.iter().map(|dep| dep.id.as_str()).collect();
        assert_eq!(deps, vec!["accessoryapi", "glassconfigapi"]);
        assert_eq!(d.dependencies[0].version_constraint, ">=0.7.1");
        assert!(d.is_api_only);
        assert_eq!(d.registry_package_id.as_deref(), Some("cool-mod"));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "x".repeat(200);
        let truncated = truncate_description(&long);
        assert_eq!(truncated.chars().count(), 150);
        assert!(truncated.ends_with("..."));

        let exact = "y".repeat(150);
        assert_eq!(truncate_description(&exact), exact);
    }

    #[test]
    fn missing_optional_fields_default() {
        let manifest: FabricModJson = serde_json::from_str(r#"{ "id": "bare" }"#).unwrap();
        let d = descriptor_from_manifest(&entry(), manifest, RAW);
        assert!(d.dependencies.is_empty());
        assert!(!d.is_api_only);
        assert_eq!(d.icon_ref, "");
        assert!(!d.is_listed());
    }

    #[test]
    fn default_catalog_marks_core_infrastructure_hidden() {
        let catalog = default_catalog();
        let stationapi = catalog
            .iter()
            .find(|e| e.repo == "ModificationStation/StationAPI")
            .unwrap();
        assert!(stationapi.hidden);
        assert_eq!(stationapi.registry_package_id.as_deref(), Some("stationapi"));
    }
}
