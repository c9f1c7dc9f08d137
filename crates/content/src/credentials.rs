//! AWS credential chain for the S3 backend.
//!
//! Environment variables first, then the EC2 instance role. When a role ARN
//! is configured the chain's credentials are only used to call STS
//! AssumeRole, and the assumed-role credentials sign the S3 requests.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use aws_config::environment::credentials::EnvironmentVariableCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::meta::credentials::CredentialsProviderChain;
use aws_config::sts::AssumeRoleProvider;
use aws_config::Region;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use object_store::aws::AwsCredential;
use object_store::CredentialProvider;
use tokio::sync::Mutex;

use crate::error::{LocatorError, Result};

const SESSION_NAME: &str = "backup-filler";
/// Refresh this long before the advertised expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct Cached {
    credential: Arc<AwsCredential>,
    expires: Option<SystemTime>,
}

impl Cached {
    fn is_fresh(&self) -> bool {
        match self.expires {
            Some(expires) => SystemTime::now() + EXPIRY_MARGIN < expires,
            None => true,
        }
    }
}

/// Adapts the AWS SDK provider chain to `object_store`'s credential hook.
#[derive(Debug)]
pub(crate) struct ChainCredentials {
    provider: SharedCredentialsProvider,
    cached: Mutex<Option<Cached>>,
}

impl ChainCredentials {
    /// Build the chain and fetch credentials once, so a misconfigured
    /// environment fails before the first object is requested.
    pub async fn resolve(region: Option<&str>, assume_role_arn: Option<&str>) -> Result<Self> {
        let base = CredentialsProviderChain::first_try(
            "Environment",
            EnvironmentVariableCredentialsProvider::new(),
        )
        .or_else(
            "Ec2InstanceMetadata",
            ImdsCredentialsProvider::builder().build(),
        );

        let provider = match assume_role_arn {
            Some(arn) => {
                tracing::debug!(role_arn = arn, "assuming role for object storage");
                let mut builder = AssumeRoleProvider::builder(arn).session_name(SESSION_NAME);
                if let Some(region) = region {
                    builder = builder.region(Region::new(region.to_string()));
                }
                SharedCredentialsProvider::new(builder.build_from_provider(base).await)
            }
            None => SharedCredentialsProvider::new(base),
        };

        let chain = Self {
            provider,
            cached: Mutex::new(None),
        };
        chain.fetch().await?;
        Ok(chain)
    }

    async fn fetch(&self) -> Result<Arc<AwsCredential>> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref().filter(|c| c.is_fresh()) {
            return Ok(entry.credential.clone());
        }

        let credentials = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| LocatorError::Credentials(e.to_string()))?;
        let entry = Cached {
            credential: Arc::new(to_object_store(&credentials)),
            expires: credentials.expiry(),
        };
        let credential = entry.credential.clone();
        *cached = Some(entry);
        Ok(credential)
    }
}

fn to_object_store(credentials: &Credentials) -> AwsCredential {
    AwsCredential {
        key_id: credentials.access_key_id().to_string(),
        secret_key: credentials.secret_access_key().to_string(),
        token: credentials.session_token().map(str::to_string),
    }
}

#[async_trait::async_trait]
impl CredentialProvider for ChainCredentials {
    type Credential = AwsCredential;

    async fn get_credential(&self) -> object_store::Result<Arc<AwsCredential>> {
        self.fetch().await.map_err(|e| object_store::Error::Generic {
            store: "S3",
            source: Box::new(e),
        })
    }
}
