//! Build output enumeration.
//!
//! Each regular file below the root becomes an [`UploadTask`] whose remote key
//! is the root-relative path joined with `/`. Traversal order follows the
//! filesystem and is not stable across runs.

use crate::content;
use frontdeploy_core::{Error, Result, UploadTask};
use std::path::{Component, Path};
use walkdir::WalkDir;

/// Lazily enumerate the upload tasks for every file beneath `root`.
///
/// Fails up front if `root` is not a directory; per-entry walk errors are
/// yielded in sequence. Symlinks are followed, so a linked file is uploaded
/// under the link's own key.
pub fn enumerate(root: &Path) -> Result<impl Iterator<Item = Result<UploadTask>> + use<>> {
    if !root.is_dir() {
        return Err(Error::Configuration(format!(
            "Build directory not found: {}",
            root.display()
        )));
    }

    let root = root.to_path_buf();
    Ok(WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(task_for(&root, entry.path())),
            Ok(_) => None,
            Err(e) => Some(Err(Error::Io(e.into()))),
        }))
}

/// Collect every upload task beneath `root`
pub fn collect(root: &Path) -> Result<Vec<UploadTask>> {
    enumerate(root)?.collect()
}

fn task_for(root: &Path, path: &Path) -> Result<UploadTask> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::Configuration(format!(
            "{} is not below {}",
            path.display(),
            root.display()
        ))
    })?;

    Ok(UploadTask {
        local_path: path.to_path_buf(),
        remote_key: remote_key(relative),
        content_type: content::content_type(path),
        cache_control: content::cache_control(path).to_string(),
    })
}

/// Join the normal components of a relative path with forward slashes
pub fn remote_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().replace('\\', "/")),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
