//! Local scanning and sync planning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{PublishError, Result};
use crate::group::join_key;

/// A local template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTemplate {
    /// Path on disk.
    pub path: PathBuf,
    /// Path relative to the template directory, `/`-separated.
    pub relative: String,
    /// Hex SHA-256 of the content.
    pub digest: String,
}

/// A remote object under the sync prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Full object key.
    pub key: String,
    /// Stored content digest, if the object carries one.
    pub digest: Option<String>,
}

/// What a sync will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Files to upload, with their target keys.
    pub uploads: Vec<(LocalTemplate, String)>,
    /// Keys already up to date.
    pub unchanged: Vec<String>,
    /// Remote keys without a local counterpart.
    pub deletions: Vec<String>,
}

/// What a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Bucket synced to.
    pub bucket: String,
    /// Uploaded keys.
    pub uploaded: Vec<String>,
    /// Skipped keys.
    pub unchanged: Vec<String>,
    /// Deleted keys.
    pub deleted: Vec<String>,
}

/// Hex SHA-256 of `content`.
#[must_use]
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Lists every file below `dir`, sorted by relative path.
///
/// # Errors
///
/// Returns `PublishError::LocalRead` if the directory or a file cannot be
/// read.
pub fn scan_local(dir: &Path) -> Result<Vec<LocalTemplate>> {
    let mut files = Vec::new();
    scan_dir(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

fn scan_dir(root: &Path, dir: &Path, files: &mut Vec<LocalTemplate>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| local_read(dir, &e))?;

    for entry in entries {
        let entry = entry.map_err(|e| local_read(dir, &e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| local_read(&path, &e))?;

        if file_type.is_dir() {
            scan_dir(root, &path, files)?;
        } else if file_type.is_file() {
            let content = std::fs::read(&path).map_err(|e| local_read(&path, &e))?;
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(LocalTemplate {
                digest: sha256_hex(&content),
                path,
                relative,
            });
        }
    }

    Ok(())
}

fn local_read(path: &Path, err: &std::io::Error) -> crate::error::StackfabError {
    PublishError::LocalRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
    .into()
}

/// Plans a sync of `local` files against `remote` objects under `prefix`.
#[must_use]
pub fn plan_sync(local: &[LocalTemplate], remote: &[RemoteObject], prefix: &str) -> SyncPlan {
    let remote_digests: HashMap<&str, Option<&str>> = remote
        .iter()
        .map(|o| (o.key.as_str(), o.digest.as_deref()))
        .collect();

    let mut plan = SyncPlan::default();

    for file in local {
        let key = join_key(prefix, &file.relative);
        match remote_digests.get(key.as_str()) {
            Some(Some(digest)) if *digest == file.digest => plan.unchanged.push(key),
            _ => plan.uploads.push((file.clone(), key)),
        }
    }

    let local_keys: Vec<String> = local
        .iter()
        .map(|f| join_key(prefix, &f.relative))
        .collect();
    plan.deletions = remote
        .iter()
        .filter(|o| !local_keys.contains(&o.key))
        .map(|o| o.key.clone())
        .collect();

    plan
}
