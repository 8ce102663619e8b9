//! In-memory `RemoteSource` for network-free tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::{AssemblerError, AssemblerResult};
use crate::core::fetcher::{ProjectVersion, Release, ReleaseAsset, RemoteSource, VersionFile};

const FAKE_HOST: &str = "https://fake.invalid";

#[derive(Default)]
pub struct FakeRemoteSource {
    latest: HashMap<String, Release>,
    all: HashMap<String, Vec<Release>>,
    versions: HashMap<String, Vec<ProjectVersion>>,
    payloads: HashMap<String, Vec<u8>>,
    download_delay: Option<Duration>,
    version_queries: Mutex<Vec<(String, String, String)>>,
    pub latest_calls: AtomicUsize,
    pub all_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl FakeRemoteSource {
    /// Publish `name` in the latest release of `repo` (also listed in all releases).
    pub fn with_release_asset(mut self, repo: &str, name: &str, bytes: &[u8]) -> Self {
        let asset = self.register(repo, name, bytes);
        self.latest
            .entry(repo.to_string())
            .or_insert_with(empty_release)
            .assets
            .push(asset.clone());
        self.first_of_all(repo).assets.push(asset);
        self
    }

    /// Publish `name` only as a pre-release: `latest_release` fails for `repo`.
    pub fn with_prerelease_asset(mut self, repo: &str, name: &str, bytes: &[u8]) -> Self {
        let asset = self.register(repo, name, bytes);
        self.first_of_all(repo).assets.push(asset);
        self
    }

    pub fn with_project(mut self, project: &str, filename: Option<&str>, bytes: &[u8]) -> Self {
        let url = format!("{}/modrinth/{}/{}", FAKE_HOST, project, filename.unwrap_or("file"));
        self.payloads.insert(url.clone(), bytes.to_vec());
        self.versions.insert(
            project.to_string(),
            vec![ProjectVersion {
                version_number: Some("1.0.0".to_string()),
                files: vec![VersionFile {
                    url,
                    filename: filename.map(str::to_string),
                }],
            }],
        );
        self
    }

    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn last_version_query(&self) -> Option<(String, String, String)> {
        self.version_queries.lock().ok()?.last().cloned()
    }

    fn register(&mut self, repo: &str, name: &str, bytes: &[u8]) -> ReleaseAsset {
        let url = format!("{}/{}/{}", FAKE_HOST, repo, name);
        self.payloads.insert(url.clone(), bytes.to_vec());
        ReleaseAsset {
            name: name.to_string(),
            browser_download_url: url,
        }
    }

    fn first_of_all(&mut self, repo: &str) -> &mut Release {
        let releases = self.all.entry(repo.to_string()).or_default();
        if releases.is_empty() {
            releases.push(empty_release());
        }
        &mut releases[0]
    }
}

fn empty_release() -> Release {
    Release {
        tag_name: Some("v1.0.0".to_string()),
        assets: Vec::new(),
    }
}

fn not_found(url: String) -> AssemblerError {
    AssemblerError::DownloadFailed { url, status: 404 }
}

#[async_trait]
impl RemoteSource for FakeRemoteSource {
    async fn latest_release(&self, repo: &str) -> AssemblerResult<Release> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.latest
            .get(repo)
            .cloned()
            .ok_or_else(|| not_found(format!("{}/repos/{}/releases/latest", FAKE_HOST, repo)))
    }

    async fn all_releases(&self, repo: &str) -> AssemblerResult<Vec<Release>> {
        self.all_calls.fetch_add(1, Ordering::SeqCst);
        self.all
            .get(repo)
            .cloned()
            .ok_or_else(|| not_found(format!("{}/repos/{}/releases", FAKE_HOST, repo)))
    }

    async fn project_versions(
        &self,
        project_id: &str,
        game_version: &str,
        loader: &str,
    ) -> AssemblerResult<Vec<ProjectVersion>> {
        if let Ok(mut queries) = self.version_queries.lock() {
            queries.push((
                project_id.to_string(),
                game_version.to_string(),
                loader.to_string(),
            ));
        }
        self.versions
            .get(project_id)
            .cloned()
            .ok_or_else(|| not_found(format!("{}/project/{}/version", FAKE_HOST, project_id)))
    }

    async fn download(&self, url: &str, dest: &Path) -> AssemblerResult<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        let bytes = self
            .payloads
            .get(url)
            .ok_or_else(|| not_found(url.to_string()))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }
}
