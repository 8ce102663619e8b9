use std::path::Path;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::RequestBuilder;
use serde::Deserialize;
use tracing::info;

use crate::core::downloader::Downloader;
use crate::core::error::{AssemblerError, AssemblerResult};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const MODRINTH_API_BASE: &str = "https://api.modrinth.com/v2";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const JSON_ACCEPT: &str = "application/json";

/// A published repository release.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Release {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// One version of a package-registry project.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProjectVersion {
    #[serde(default)]
    pub version_number: Option<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VersionFile {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Everything the fetcher needs from the outside world.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Most recent published release of `repo` (`owner/name`).
    async fn latest_release(&self, repo: &str) -> AssemblerResult<Release>;

    /// All releases of `repo`, newest first, including pre-releases.
    async fn all_releases(&self, repo: &str) -> AssemblerResult<Vec<Release>>;

    /// Versions of a registry project compatible with `game_version` and `loader`,
    /// newest first.
    async fn project_versions(
        &self,
        project_id: &str,
        game_version: &str,
        loader: &str,
    ) -> AssemblerResult<Vec<ProjectVersion>>;

    /// Stream `url` into `dest`.
    async fn download(&self, url: &str, dest: &Path) -> AssemblerResult<()>;
}

/// GitHub releases + Modrinth v2 over HTTP.
pub struct HttpRemoteSource {
    client: reqwest::Client,
    downloader: Downloader,
    github_api_base: String,
    modrinth_api_base: String,
}

impl HttpRemoteSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoints(client, GITHUB_API_BASE, MODRINTH_API_BASE)
    }

    pub fn with_endpoints(
        client: reqwest::Client,
        github_api_base: impl Into<String>,
        modrinth_api_base: impl Into<String>,
    ) -> Self {
        Self {
            downloader: Downloader::new(client.clone()),
            client,
            github_api_base: github_api_base.into().trim_end_matches('/').to_string(),
            modrinth_api_base: modrinth_api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn github_request(&self, url: &str) -> RequestBuilder {
        self.client.get(url).header(ACCEPT, GITHUB_ACCEPT)
    }

    fn modrinth_request(&self, url: &str) -> RequestBuilder {
        self.client.get(url).header(ACCEPT, JSON_ACCEPT)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> AssemblerResult<T> {
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AssemblerError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(resp.json::<T>().await?)
    }
}

/// Modrinth expects JSON arrays in the facet query parameters.
pub fn project_versions_url(
    api_base: &str,
    project_id: &str,
    game_version: &str,
    loader: &str,
) -> String {
    format!(
        "{}/project/{}/version?game_versions=[\"{}\"]&loaders=[\"{}\"]",
        api_base.trim_end_matches('/'),
        project_id,
        game_version,
        loader
    )
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn latest_release(&self, repo: &str) -> AssemblerResult<Release> {
        let url = format!("{}/repos/{}/releases/latest", self.github_api_base, repo);
        self.get_json(self.github_request(&url), &url).await
    }

    async fn all_releases(&self, repo: &str) -> AssemblerResult<Vec<Release>> {
        let url = format!("{}/repos/{}/releases", self.github_api_base, repo);
        self.get_json(self.github_request(&url), &url).await
    }

    async fn project_versions(
        &self,
        project_id: &str,
        game_version: &str,
        loader: &str,
    ) -> AssemblerResult<Vec<ProjectVersion>> {
        let url = project_versions_url(&self.modrinth_api_base, project_id, game_version, loader);
        self.get_json(self.modrinth_request(&url), &url).await
    }

    async fn download(&self, url: &str, dest: &Path) -> AssemblerResult<()> {
        let bytes = self.downloader.download_file(url, dest).await?;
        info!("Downloaded {:?} ({} bytes)", dest.file_name().unwrap_or_default(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_release_payload() {
        let json = r#"{
            "tag_name": "v2.0.0",
            "draft": false,
            "assets": [
                { "name": "Mod-2.0.0.jar", "browser_download_url": "https://example.com/Mod-2.0.0.jar", "size": 10 }
            ]
        }"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.tag_name.as_deref(), Some("v2.0.0"));
        assert_eq!(release.assets[0].name, "Mod-2.0.0.jar");
    }

    #[test]
    fn deserialize_project_version_without_filename() {
        let json = r#"[{ "files": [{ "url": "https://cdn.example.com/x.jar" }] }]"#;
        let versions: Vec<ProjectVersion> = serde_json::from_str(json).unwrap();
        assert_eq!(versions[0].files[0].filename, None);
    }

    #[test]
    fn github_accept_header_only_on_github_calls() {
        let source = HttpRemoteSource::new(reqwest::Client::new());

        let github = source
            .github_request("https://api.github.com/repos/a/b/releases")
            .build()
            .unwrap();
        assert_eq!(github.headers()[ACCEPT], GITHUB_ACCEPT);

        let modrinth = source
            .modrinth_request("https://api.modrinth.com/v2/project/x/version")
            .build()
            .unwrap();
        assert_eq!(modrinth.headers()[ACCEPT], JSON_ACCEPT);
    }

    #[test]
    fn project_versions_url_uses_json_array_facets() {
        let url = project_versions_url(MODRINTH_API_BASE, "accessory-api", "b1.7.3", "fabric");
        assert_eq!(
            url,
            "https://api.modrinth.com/v2/project/accessory-api/version?game_versions=[\"b1.7.3\"]&loaders=[\"fabric\"]"
        );
    }
}
