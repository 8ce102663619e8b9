// ─── Delivery ───
// Where a finished archive lives, and how to find it knowing only the id.

use std::path::{Path, PathBuf};

use crate::core::error::{AssemblerError, AssemblerResult};

const ARCHIVE_EXTENSION: &str = "zip";

pub fn archive_path(instances_dir: &Path, id: &str, display_name: &str) -> PathBuf {
    instances_dir
        .join(id)
        .join(format!("{}.{}", display_name, ARCHIVE_EXTENSION))
}

/// File name of the first finished archive in the instance directory.
///
/// `None` while the directory or archive does not exist yet, and for ids
/// that are not a single path component.
pub async fn find_archive_name(instances_dir: &Path, id: &str) -> AssemblerResult<Option<String>> {
    if !is_plain_id(id) {
        return Ok(None);
    }

    let dir = instances_dir.join(id);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(AssemblerError::Io { path: dir, source }),
    };

    let suffix = format!(".{}", ARCHIVE_EXTENSION);
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| AssemblerError::Io {
            path: dir.clone(),
            source,
        })?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(&suffix) && entry.path().is_file() {
            names.push(name);
        }
    }

    names.sort();
    Ok(names.into_iter().next())
}

fn is_plain_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && !id.contains('\\') && !id.contains("..")
}
