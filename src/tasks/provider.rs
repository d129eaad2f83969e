//! Lazily connected clients for task execution.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::gateway::{AwsSession, ProvisioningGateway, SessionCache};
use crate::publish::{ArtifactPublisher, S3TemplatePublisher};

/// Hands out clients for the context's current AWS selection.
#[async_trait]
pub trait ClientProvider: Send {
    /// Provisioning gateway.
    async fn gateway(&mut self, ctx: &ExecutionContext) -> Result<Arc<dyn ProvisioningGateway>>;

    /// Template publisher.
    async fn publisher(&mut self, ctx: &ExecutionContext) -> Result<Arc<dyn ArtifactPublisher>>;

    /// Effective region of the session.
    async fn region(&mut self, ctx: &ExecutionContext) -> Result<Option<String>>;
}

/// Provider backed by AWS SDK clients.
#[derive(Debug, Default)]
pub struct AwsClientProvider {
    cache: SessionCache<AwsSession>,
}

impl AwsClientProvider {
    /// Creates a provider that connects on first use.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cache: SessionCache::new(),
        }
    }

    async fn session(&mut self, ctx: &ExecutionContext) -> Result<Arc<AwsSession>> {
        self.cache.get_or_connect(ctx, AwsSession::connect).await
    }
}

#[async_trait]
impl ClientProvider for AwsClientProvider {
    async fn gateway(&mut self, ctx: &ExecutionContext) -> Result<Arc<dyn ProvisioningGateway>> {
        let session = self.session(ctx).await?;
        Ok(Arc::new(session.gateway.clone()))
    }

    async fn publisher(&mut self, ctx: &ExecutionContext) -> Result<Arc<dyn ArtifactPublisher>> {
        let session = self.session(ctx).await?;
        Ok(Arc::new(S3TemplatePublisher::new(session.s3.clone())))
    }

    async fn region(&mut self, ctx: &ExecutionContext) -> Result<Option<String>> {
        Ok(self.session(ctx).await?.region.clone())
    }
}
