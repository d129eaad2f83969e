//! Template publishing.
//!
//! Templates are mirrored from the local template directory to the group's
//! bucket and prefix before they can be referenced by URL.

mod plan;
mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

pub use plan::{LocalTemplate, RemoteObject, SyncPlan, SyncReport, plan_sync, scan_local, sha256_hex};
pub use s3::{DIGEST_METADATA_KEY, S3TemplatePublisher};

/// Publishes local templates to remote storage.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Mirrors `local_dir` to `bucket` under `prefix`.
    ///
    /// Unchanged files are skipped and remote objects without a local
    /// counterpart are deleted.
    async fn sync(&self, local_dir: &Path, bucket: &str, prefix: &str) -> Result<SyncReport>;
}
