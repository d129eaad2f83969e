//! S3-backed template publisher.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use crate::error::{PublishError, Result, StackfabError};
use crate::group::join_key;

use super::ArtifactPublisher;
use super::plan::{RemoteObject, SyncReport, plan_sync, scan_local};

/// Object metadata key holding the content digest.
pub const DIGEST_METADATA_KEY: &str = "sha256";

/// Content type set on uploaded templates.
const TEMPLATE_CONTENT_TYPE: &str = "application/x-yaml";

/// Publishes templates to an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3TemplatePublisher {
    client: Client,
}

impl S3TemplatePublisher {
    /// Creates a publisher over an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Lists every key under `prefix`.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let list_prefix = if prefix.is_empty() {
            None
        } else {
            Some(format!("{prefix}/"))
        };

        let mut keys = Vec::new();
        let mut token = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_prefix(list_prefix.clone())
                .set_continuation_token(token)
                .send()
                .await
                .map_err(|e| remote_error("list", &e))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(String::from)),
            );

            match output.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => return Ok(keys),
            }
        }
    }

    /// Reads the stored digest of an object.
    async fn stored_digest(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| remote_error("head", &e))?;

        Ok(output
            .metadata()
            .and_then(|m| m.get(DIGEST_METADATA_KEY))
            .cloned())
    }

    async fn put_template(&self, bucket: &str, key: &str, path: &Path, digest: &str) -> Result<()> {
        let content = tokio::fs::read(path).await.map_err(|e| PublishError::LocalRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(content))
            .content_type(TEMPLATE_CONTENT_TYPE)
            .metadata(DIGEST_METADATA_KEY, digest)
            .send()
            .await
            .map_err(|e| remote_error("put", &e))?;

        Ok(())
    }

    async fn delete_key(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| remote_error("delete", &e))?;

        Ok(())
    }
}

#[async_trait]
impl ArtifactPublisher for S3TemplatePublisher {
    async fn sync(&self, local_dir: &Path, bucket: &str, prefix: &str) -> Result<SyncReport> {
        info!(
            "Syncing {} to s3://{bucket}/{prefix}",
            local_dir.display()
        );

        let local = scan_local(local_dir)?;
        let local_keys: Vec<String> = local
            .iter()
            .map(|f| join_key(prefix, &f.relative))
            .collect();

        let mut remote = Vec::new();
        for key in self.list_keys(bucket, prefix).await? {
            // Only objects that may be skipped need their digest.
            let digest = if local_keys.contains(&key) {
                self.stored_digest(bucket, &key).await?
            } else {
                None
            };
            remote.push(RemoteObject { key, digest });
        }

        let plan = plan_sync(&local, &remote, prefix);
        let mut report = SyncReport {
            bucket: bucket.to_string(),
            unchanged: plan.unchanged,
            ..SyncReport::default()
        };

        for (file, key) in plan.uploads {
            debug!("Uploading {} -> {key}", file.path.display());
            self.put_template(bucket, &key, &file.path, &file.digest).await?;
            report.uploaded.push(key);
        }

        for key in plan.deletions {
            debug!("Deleting {key}");
            self.delete_key(bucket, &key).await?;
            report.deleted.push(key);
        }

        info!(
            "Sync complete: {} uploaded, {} unchanged, {} deleted",
            report.uploaded.len(),
            report.unchanged.len(),
            report.deleted.len()
        );
        Ok(report)
    }
}

fn remote_error(operation: &str, err: &impl std::fmt::Display) -> StackfabError {
    PublishError::remote(operation, err.to_string()).into()
}
