//! Lazily built AWS sessions.
//!
//! The session is built on first use and cached for the context's current
//! AWS selection. Changing profile, region or credentials bumps the context's
//! session generation, which makes the cached session stale.

use std::future::Future;
use std::sync::Arc;

use aws_config::SdkConfig;
use aws_sdk_cloudformation::config::Credentials;
use tracing::{debug, info};

use crate::context::{AwsSelection, ExecutionContext};
use crate::error::Result;

use super::cloudformation::CloudFormationGateway;

/// Provider name attached to static credentials.
const CREDENTIALS_PROVIDER: &str = "stackfab";

/// Clients built for one AWS selection.
#[derive(Debug, Clone)]
pub struct AwsSession {
    /// CloudFormation gateway.
    pub gateway: CloudFormationGateway,
    /// S3 client used for template publishing.
    pub s3: aws_sdk_s3::Client,
    /// Resolved region, if any.
    pub region: Option<String>,
}

impl AwsSession {
    /// Builds the clients for an AWS selection.
    ///
    /// # Errors
    ///
    /// Currently infallible; configuration problems surface on first call.
    pub async fn connect(selection: AwsSelection) -> Result<Self> {
        info!(
            "Connecting to AWS (profile: {}, region: {})",
            selection.profile.as_deref().unwrap_or("default"),
            selection.region.as_deref().unwrap_or("default")
        );

        let config = load_config(&selection).await;

        Ok(Self {
            gateway: CloudFormationGateway::new(aws_sdk_cloudformation::Client::new(&config)),
            s3: aws_sdk_s3::Client::new(&config),
            region: config.region().map(ToString::to_string),
        })
    }
}

async fn load_config(selection: &AwsSelection) -> SdkConfig {
    let mut loader = aws_config::from_env();

    if let Some(profile) = &selection.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(region) = &selection.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let (Some(key_id), Some(secret)) = (&selection.access_key_id, &selection.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key_id.clone(),
            secret.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        ));
    }

    loader.load().await
}

/// Cache holding the session built for the latest AWS selection.
#[derive(Debug)]
pub struct SessionCache<S> {
    /// Cached session and the generation it was built for.
    cached: Option<(u64, Arc<S>)>,
}

impl<S> Default for SessionCache<S> {
    fn default() -> Self {
        Self { cached: None }
    }
}

impl<S> SessionCache<S> {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self { cached: None }
    }

    /// Returns the cached session, building it when missing or stale.
    ///
    /// # Errors
    ///
    /// Returns an error if `connect` fails.
    pub async fn get_or_connect<F, Fut>(
        &mut self,
        ctx: &ExecutionContext,
        connect: F,
    ) -> Result<Arc<S>>
    where
        F: FnOnce(AwsSelection) -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        let generation = ctx.session_generation();

        if let Some((cached_generation, session)) = &self.cached {
            if *cached_generation == generation {
                return Ok(Arc::clone(session));
            }
            debug!("AWS selection changed, rebuilding session");
        }

        let session = Arc::new(connect(ctx.aws().clone()).await?);
        self.cached = Some((generation, Arc::clone(&session)));
        Ok(session)
    }
}
