// ─── Artifact Fetcher ───
// Produces artifact files for mods and the base template, going through the
// artifact cache so a fresh hit never touches the network.

mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::cache::ArtifactCache;
use crate::core::error::{AssemblerError, AssemblerResult};
use crate::core::registry::ModDescriptor;

pub use source::{
    project_versions_url, HttpRemoteSource, ProjectVersion, Release, ReleaseAsset, RemoteSource,
    VersionFile, GITHUB_API_BASE, MODRINTH_API_BASE,
};

/// File name used when the package registry does not report one.
const FALLBACK_REGISTRY_FILE_NAME: &str = "modrinth-mod.jar";

/// Marker identifying source jars that must never be installed.
const SOURCES_MARKER: &str = "sources";

/// Game/loader pair every artifact must target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchTarget {
    pub game_version: String,
    pub loader: String,
    /// Extension of installable artifacts, without the dot.
    pub artifact_extension: String,
}

impl Default for FetchTarget {
    fn default() -> Self {
        Self {
            game_version: "b1.7.3".to_string(),
            loader: "fabric".to_string(),
            artifact_extension: "jar".to_string(),
        }
    }
}

/// Where the base instance template is published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TemplateSource {
    pub repo: String,
    pub asset_name: String,
    pub cache_key: String,
}

impl Default for TemplateSource {
    fn default() -> Self {
        Self {
            repo: "Glass-Series/babric-prism-instance".to_string(),
            asset_name: "babric-b1.7.3.zip".to_string(),
            cache_key: "prism".to_string(),
        }
    }
}

/// A located, not yet downloaded, remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RemoteFile {
    url: String,
    file_name: String,
}

pub struct ArtifactFetcher {
    cache: Arc<ArtifactCache>,
    source: Arc<dyn RemoteSource>,
    target: FetchTarget,
}

impl ArtifactFetcher {
    pub fn new(cache: Arc<ArtifactCache>, source: Arc<dyn RemoteSource>, target: FetchTarget) -> Self {
        Self {
            cache,
            source,
            target,
        }
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn target(&self) -> &FetchTarget {
        &self.target
    }

    /// Fetch the base instance template archive.
    pub async fn fetch_base_template(&self, template: &TemplateSource) -> AssemblerResult<PathBuf> {
        let _guard = self.cache.lock(&template.cache_key).await;
        self.ensure_template(template).await
    }

    /// Fetch the template and copy it to `dest` before the cache entry is
    /// unlocked, so a concurrent re-fetch cannot pull it away.
    pub async fn stage_base_template(
        &self,
        template: &TemplateSource,
        dest: &Path,
    ) -> AssemblerResult<PathBuf> {
        let key = template.cache_key.as_str();
        let _guard = self.cache.lock(key).await;
        let cached = self.ensure_template(template).await?;
        copy_file(&cached, dest)
            .await
            .map_err(|e| AssemblerError::fetch(key, e))?;
        Ok(dest.to_path_buf())
    }

    /// Fetch the installable artifact of one mod.
    pub async fn fetch_mod_artifact(&self, descriptor: &ModDescriptor) -> AssemblerResult<PathBuf> {
        let _guard = self.cache.lock(&descriptor.id).await;
        self.ensure_mod_artifact(descriptor).await
    }

    /// Fetch a mod and copy every artifact file of its cache entry into
    /// `dest_dir` while the entry is still locked. Returns the copies.
    pub async fn stage_mod_artifacts(
        &self,
        descriptor: &ModDescriptor,
        dest_dir: &Path,
    ) -> AssemblerResult<Vec<PathBuf>> {
        let key = descriptor.id.as_str();
        let _guard = self.cache.lock(key).await;
        self.ensure_mod_artifact(descriptor).await?;

        let staged: AssemblerResult<Vec<PathBuf>> = async {
            let files = self
                .cache
                .artifact_files(key, &self.target.artifact_extension)
                .await?;
            let mut copies = Vec::with_capacity(files.len());
            for file in files {
                let Some(name) = file.file_name() else {
                    continue;
                };
                let dest = dest_dir.join(name);
                copy_file(&file, &dest).await?;
                copies.push(dest);
            }
            Ok(copies)
        }
        .await;
        staged.map_err(|e| AssemblerError::fetch(key, e))
    }

    /// Caller holds the template's key lock.
    async fn ensure_template(&self, template: &TemplateSource) -> AssemblerResult<PathBuf> {
        let key = template.cache_key.as_str();
        if let Some(hit) = self.cache.get(key).await {
            debug!("Recent download exists for {}, skipping download", key);
            return Ok(hit.local_file_path);
        }

        let result = match self.locate_template(template).await {
            Ok(remote) => self.store(key, remote).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| AssemblerError::fetch(key, e))
    }

    /// Caller holds the mod's key lock.
    async fn ensure_mod_artifact(&self, descriptor: &ModDescriptor) -> AssemblerResult<PathBuf> {
        let key = descriptor.id.as_str();
        if let Some(hit) = self.cache.get(key).await {
            debug!("Recent download exists for {}, skipping download", key);
            return Ok(hit.local_file_path);
        }

        let located = match &descriptor.registry_package_id {
            Some(project_id) => self.locate_registry_file(project_id).await,
            None => self.locate_release_artifact(&descriptor.source_repo).await,
        };
        let result = match located {
            Ok(remote) => self.store(key, remote).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| AssemblerError::fetch(key, e))
    }

    /// Download `remote` into a freshly cleared cache entry and mark it.
    async fn store(&self, key: &str, remote: RemoteFile) -> AssemblerResult<PathBuf> {
        let dir = self.cache.reset(key).await?;
        let dest = dir.join(&remote.file_name);
        self.source.download(&remote.url, &dest).await?;
        let entry = self.cache.put(key, &dest).await?;
        info!("Cached '{}' for {}", remote.file_name, key);
        Ok(entry.local_file_path)
    }

    async fn locate_template(&self, template: &TemplateSource) -> AssemblerResult<RemoteFile> {
        let release = match self.source.latest_release(&template.repo).await {
            Ok(release) => release,
            Err(e) => {
                // Repositories that only publish pre-releases have no "latest".
                warn!(
                    "'latest' endpoint failed for {} ({}), trying all releases instead",
                    template.repo, e
                );
                self.source
                    .all_releases(&template.repo)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| AssemblerError::NoReleases(template.repo.clone()))?
            }
        };

        release
            .assets
            .into_iter()
            .find(|asset| asset.name == template.asset_name)
            .map(|asset| RemoteFile {
                url: asset.browser_download_url,
                file_name: asset.name,
            })
            .ok_or_else(|| AssemblerError::NoMatchingAsset {
                repo: template.repo.clone(),
                wanted: template.asset_name.clone(),
            })
    }

    async fn locate_release_artifact(&self, repo: &str) -> AssemblerResult<RemoteFile> {
        let release = self.source.latest_release(repo).await?;
        select_artifact_asset(&release.assets, &self.target.artifact_extension)
            .map(|asset| RemoteFile {
                url: asset.browser_download_url.clone(),
                file_name: asset.name.clone(),
            })
            .ok_or_else(|| AssemblerError::NoMatchingAsset {
                repo: repo.to_string(),
                wanted: format!(
                    "*.{} without '{}'",
                    self.target.artifact_extension, SOURCES_MARKER
                ),
            })
    }

    async fn locate_registry_file(&self, project_id: &str) -> AssemblerResult<RemoteFile> {
        let versions = self
            .source
            .project_versions(project_id, &self.target.game_version, &self.target.loader)
            .await?;

        let file = versions
            .into_iter()
            .next()
            .and_then(|version| version.files.into_iter().next())
            .ok_or_else(|| AssemblerError::EmptyPackageVersions(project_id.to_string()))?;

        Ok(RemoteFile {
            url: file.url,
            file_name: file
                .filename
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| FALLBACK_REGISTRY_FILE_NAME.to_string()),
        })
    }
}

async fn copy_file(source: &Path, dest: &Path) -> AssemblerResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AssemblerError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::copy(source, dest)
        .await
        .map_err(|e| AssemblerError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
    Ok(())
}

/// First asset ending in `.{extension}` whose name does not mark it as a
/// sources jar.
pub fn select_artifact_asset<'a>(assets: &'a [ReleaseAsset], extension: &str) -> Option<&'a ReleaseAsset> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    assets.iter().find(|asset| {
        asset.name.ends_with(&suffix) && !asset.name.to_lowercase().contains(SOURCES_MARKER)
    })
}
