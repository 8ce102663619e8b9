use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{AssemblerError, AssemblerResult};

/// Streaming downloader. Bodies are written chunk by chunk so an artifact
/// never has to fit in memory.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download `url` to `dest`.
    ///
    /// The body lands in `<dest>.part` first and is renamed over `dest` once
    /// fully flushed, so `dest` is either absent or complete.
    pub async fn download_file(&self, url: &str, dest: &Path) -> AssemblerResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AssemblerError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssemblerError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let partial = partial_path(dest);
        let written = match write_body(response, &partial).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| AssemblerError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, written);
        Ok(written)
    }
}

async fn write_body(response: reqwest::Response, partial: &Path) -> AssemblerResult<u64> {
    // File handle is dropped at the end of this function, before the rename.
    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| AssemblerError::Io {
            path: partial.to_path_buf(),
            source: e,
        })?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| AssemblerError::Io {
                path: partial.to_path_buf(),
                source: e,
            })?;
        written = written.saturating_add(chunk.len() as u64);
    }

    file.flush().await.map_err(|e| AssemblerError::Io {
        path: partial.to_path_buf(),
        source: e,
    })?;

    Ok(written)
}

/// `foo.jar` -> `foo.jar.part`
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/cache/mod/Mod-1.0.jar")),
            PathBuf::from("/tmp/cache/mod/Mod-1.0.jar.part")
        );
    }
}
