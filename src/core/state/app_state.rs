use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::core::assembly::{find_archive_name, AssemblyHandle, AssemblyRequest, InstanceAssembler};
use crate::core::cache::ArtifactCache;
use crate::core::error::AssemblerResult;
use crate::core::fetcher::{ArtifactFetcher, HttpRemoteSource, RemoteSource};
use crate::core::http::build_http_client;
use crate::core::registry::{default_catalog, ModDescriptor, ModRegistry, RegistryLoader};

use super::Settings;

/// Everything a running service needs, built once at startup.
pub struct AppState {
    pub settings: Arc<Settings>,
    pub http_client: Client,
    pub registry: Arc<ModRegistry>,
    pub fetcher: Arc<ArtifactFetcher>,
    pub assembler: InstanceAssembler,
}

impl AppState {
    /// Build the HTTP client, load the mod registry from the default
    /// catalog, and wire the cache, fetcher and assembler.
    pub async fn initialize(settings: Settings) -> AssemblerResult<Self> {
        let settings = Arc::new(settings);
        let http_client = build_http_client(settings.fetch_timeout())?;

        let registry = RegistryLoader::new(http_client.clone(), settings.raw_content_base.clone())
            .with_concurrency(settings.fetch_concurrency)
            .load_all(&default_catalog())
            .await;

        Ok(Self::with_registry(settings, http_client, registry))
    }

    /// Wire the state around an already loaded registry.
    pub fn with_registry(settings: Arc<Settings>, http_client: Client, registry: ModRegistry) -> Self {
        let cache = Arc::new(ArtifactCache::with_freshness(
            settings.cache_dir(),
            settings.freshness(),
        ));
        let source: Arc<dyn RemoteSource> = Arc::new(HttpRemoteSource::with_endpoints(
            http_client.clone(),
            settings.github_api_base.clone(),
            settings.modrinth_api_base.clone(),
        ));
        let fetcher = Arc::new(ArtifactFetcher::new(cache, source, settings.target.clone()));
        let registry = Arc::new(registry);
        let assembler = InstanceAssembler::new(
            Arc::clone(&settings),
            Arc::clone(&registry),
            Arc::clone(&fetcher),
        );

        info!(
            "State ready: data at {:?}, {} mods in registry",
            settings.data_dir,
            registry.len()
        );

        Self {
            settings,
            http_client,
            registry,
            fetcher,
            assembler,
        }
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.settings.instances_dir()
    }

    /// Mods a user can pick from.
    pub fn listing(&self) -> Vec<&ModDescriptor> {
        self.registry.listing()
    }

    pub async fn start_assembly(&self, request: AssemblyRequest) -> AssemblerResult<AssemblyHandle> {
        self.assembler.create(request).await
    }

    pub async fn find_archive(&self, id: &str) -> AssemblerResult<Option<String>> {
        find_archive_name(&self.instances_dir(), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn wires_paths_and_registry_from_settings() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            data_dir: tmp.path().to_path_buf(),
            freshness_hours: 2,
            ..Settings::default()
        };
        let client = build_http_client(Duration::from_secs(5)).unwrap();
        let registry = ModRegistry::from_descriptors(vec![
            ModDescriptor::new("visible", "glass/visible"),
            ModDescriptor::new("other", "glass/other"),
        ]);

        let state = AppState::with_registry(Arc::new(settings), client, registry);

        assert_eq!(state.instances_dir(), tmp.path().join("instances"));
        assert_eq!(state.fetcher.cache().root(), tmp.path().join("temp"));
        assert_eq!(state.fetcher.target().game_version, "b1.7.3");
        assert_eq!(state.registry.len(), 2);
        assert_eq!(state.find_archive("missing").await.unwrap(), None);
    }
}
