// ─── Archive Transformer ───
// Unpack a zip into a working tree, write into the tree, and pack it back.
// All functions are blocking; async callers go through `spawn_blocking`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::downloader::partial_path;
use crate::core::error::{AssemblerError, AssemblerResult};

/// Extract every entry of `archive_path` under `dest_dir`.
///
/// Entry names are used as stored. Returns the number of files written.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> AssemblerResult<usize> {
    let file = File::open(archive_path).map_err(|source| AssemblerError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| AssemblerError::Archive {
        path: archive_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    create_dir(dest_dir)?;

    let mut files = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| AssemblerError::Archive {
            path: archive_path.to_path_buf(),
            reason: format!("entry #{}: {}", index, e),
        })?;
        let out_path = dest_dir.join(entry.name());

        if entry.is_dir() {
            create_dir(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            create_dir(parent)?;
        }

        let mut out = File::create(&out_path).map_err(|source| AssemblerError::Io {
            path: out_path.clone(),
            source,
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|source| AssemblerError::Io {
            path: out_path,
            source,
        })?;
        files += 1;
    }

    debug!("Unpacked {} files from {:?} into {:?}", files, archive_path, dest_dir);
    Ok(files)
}

/// Write `content` to `dest_dir/relative_path`, replacing any existing file.
pub fn write_file(
    dest_dir: &Path,
    relative_path: impl AsRef<Path>,
    content: &[u8],
) -> AssemblerResult<PathBuf> {
    let out_path = dest_dir.join(relative_path);
    if let Some(parent) = out_path.parent() {
        create_dir(parent)?;
    }
    std::fs::write(&out_path, content).map_err(|source| AssemblerError::Io {
        path: out_path.clone(),
        source,
    })?;
    Ok(out_path)
}

/// Copy `source_path` (a file, or a directory tree) to
/// `dest_dir/relative_path`, overwriting. Returns the number of files copied.
pub fn copy_into(
    dest_dir: &Path,
    relative_path: impl AsRef<Path>,
    source_path: &Path,
) -> AssemblerResult<usize> {
    let out_path = dest_dir.join(relative_path);
    let metadata = std::fs::metadata(source_path).map_err(|source| AssemblerError::Io {
        path: source_path.to_path_buf(),
        source,
    })?;

    if metadata.is_dir() {
        create_dir(&out_path)?;
        return copy_dir_recursive(source_path, &out_path);
    }

    if let Some(parent) = out_path.parent() {
        create_dir(parent)?;
    }
    copy_file(source_path, &out_path)?;
    Ok(1)
}

/// Zip every regular file under `source_dir` into `archive_path`.
///
/// Entries are named by their `/`-separated path relative to `source_dir`
/// and added in file-name order, so identical trees give identical entry
/// lists. The archive is written beside its final name and renamed into
/// place only once complete. Returns the number of entries.
pub fn pack(source_dir: &Path, archive_path: &Path) -> AssemblerResult<usize> {
    if let Some(parent) = archive_path.parent() {
        create_dir(parent)?;
    }

    let partial = partial_path(archive_path);
    let count = match write_archive(source_dir, &partial) {
        Ok(count) => count,
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            return Err(e);
        }
    };

    std::fs::rename(&partial, archive_path).map_err(|source| AssemblerError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;

    debug!("Packed {} files from {:?} into {:?}", count, source_dir, archive_path);
    Ok(count)
}

fn write_archive(source_dir: &Path, out: &Path) -> AssemblerResult<usize> {
    let file = File::create(out).map_err(|source| AssemblerError::Io {
        path: out.to_path_buf(),
        source,
    })?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0usize;
    for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| AssemblerError::Archive {
            path: source_dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        // Symlinks and special files are skipped.
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| AssemblerError::Archive {
                path: entry.path().to_path_buf(),
                reason: e.to_string(),
            })?;

        writer.start_file(entry_name(relative), options)?;
        let mut input = File::open(entry.path()).map_err(|source| AssemblerError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        std::io::copy(&mut input, &mut writer).map_err(|source| AssemblerError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        count += 1;
    }

    let mut inner = writer.finish()?;
    inner.flush().map_err(|source| AssemblerError::Io {
        path: out.to_path_buf(),
        source,
    })?;
    Ok(count)
}

/// `a\b\c.txt` or `a/b/c.txt` -> `a/b/c.txt`
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> AssemblerResult<usize> {
    let entries = std::fs::read_dir(source).map_err(|e| AssemblerError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;

    let mut copied = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| AssemblerError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| AssemblerError::Io {
            path: src_path.clone(),
            source: e,
        })?;

        if file_type.is_dir() {
            create_dir(&dst_path)?;
            copied += copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            copy_file(&src_path, &dst_path)?;
            copied += 1;
        }
    }

    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> AssemblerResult<()> {
    std::fs::copy(from, to).map_err(|source| AssemblerError::Io {
        path: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn create_dir(path: &Path) -> AssemblerResult<()> {
    std::fs::create_dir_all(path).map_err(|source| AssemblerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use tempfile::TempDir;

    fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = entry_name(e.path().strip_prefix(root).unwrap());
                (rel, std::fs::read(e.path()).unwrap())
            })
            .collect()
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn pack_then_unpack_reproduces_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        write_file(&src, "instance.cfg", b"InstanceType=OneSix\n").unwrap();
        write_file(&src, ".minecraft/mods/a.jar", &[0u8, 159, 146, 150, 255]).unwrap();
        write_file(&src, ".minecraft/config/deep/nested/x.toml", b"k = 1").unwrap();
        write_file(&src, "empty.txt", b"").unwrap();

        let archive = tmp.path().join("out").join("Test.zip");
        assert_eq!(pack(&src, &archive).unwrap(), 4);
        assert!(!partial_path(&archive).exists());

        let dest = tmp.path().join("dest");
        assert_eq!(unpack(&archive, &dest).unwrap(), 4);
        assert_eq!(snapshot(&src), snapshot(&dest));
    }

    #[test]
    fn pack_orders_entries_by_file_name() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        write_file(&src, "b.txt", b"b").unwrap();
        write_file(&src, "a/z.txt", b"z").unwrap();
        write_file(&src, "a/c.txt", b"c").unwrap();

        let first = tmp.path().join("first.zip");
        let second = tmp.path().join("second.zip");
        pack(&src, &first).unwrap();
        pack(&src, &second).unwrap();

        assert_eq!(entry_names(&first), vec!["a/c.txt", "a/z.txt", "b.txt"]);
        assert_eq!(entry_names(&first), entry_names(&second));
    }

    #[test]
    fn unpack_creates_directory_entries() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("dirs.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive).unwrap());
            let options = SimpleFileOptions::default();
            zip.add_directory("empty/", options).unwrap();
            zip.start_file("nested/dir/file.txt", options).unwrap();
            zip.write_all(b"hello").unwrap();
            zip.finish().unwrap();
        }

        let dest = tmp.path().join("dest");
        assert_eq!(unpack(&archive, &dest).unwrap(), 1);
        assert!(dest.join("empty").is_dir());
        assert_eq!(std::fs::read(dest.join("nested/dir/file.txt")).unwrap(), b"hello");
    }

    #[test]
    fn corrupt_archive_is_an_archive_error() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = unpack(&archive, &tmp.path().join("dest")).unwrap_err();
        assert!(matches!(err, AssemblerError::Archive { .. }));
    }

    #[test]
    fn copy_into_handles_files_and_trees_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let payload = tmp.path().join("adjustments");
        write_file(&payload, "config/a.cfg", b"new").unwrap();
        write_file(&payload, "config/sub/b.cfg", b"b").unwrap();
        write_file(&payload, "Legacy.jar", b"jar").unwrap();

        let tree = tmp.path().join("tree");
        write_file(&tree, ".minecraft/config/a.cfg", b"old").unwrap();

        let copied = copy_into(&tree, ".minecraft/config", &payload.join("config")).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(std::fs::read(tree.join(".minecraft/config/a.cfg")).unwrap(), b"new");
        assert!(tree.join(".minecraft/config/sub/b.cfg").is_file());

        assert_eq!(
            copy_into(&tree, ".minecraft/mods/Legacy.jar", &payload.join("Legacy.jar")).unwrap(),
            1
        );
        assert!(tree.join(".minecraft/mods/Legacy.jar").is_file());
    }

    #[test]
    fn entry_name_uses_forward_slashes() {
        let rel: PathBuf = [".minecraft", "mods", "a.jar"].iter().collect();
        assert_eq!(entry_name(&rel), ".minecraft/mods/a.jar");
    }
}
