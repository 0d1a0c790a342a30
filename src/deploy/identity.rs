//! Caller Identity
//!
//! Every lifecycle command starts by establishing who is calling. Failure
//! here is fatal and normalized to [`DeployError::InvalidCredentials`].

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DeployError;

/// The principal behind the active credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub account_id: String,
    pub principal_id: String,
    pub principal_arn: String,
}

#[async_trait]
pub trait IdentityValidator: Send + Sync {
    async fn validate(&self) -> Result<CallerIdentity, DeployError>;
}

#[cfg(feature = "aws")]
pub use sts::StsIdentityValidator;

#[cfg(feature = "aws")]
mod sts {
    use async_trait::async_trait;
    use aws_sdk_sts::error::DisplayErrorContext;
    use tracing::info;

    use super::{CallerIdentity, IdentityValidator};
    use crate::error::DeployError;

    /// Identity via STS GetCallerIdentity
    pub struct StsIdentityValidator {
        client: aws_sdk_sts::Client,
    }

    impl StsIdentityValidator {
        pub fn new(config: &aws_config::SdkConfig) -> Self {
            Self {
                client: aws_sdk_sts::Client::new(config),
            }
        }
    }

    #[async_trait]
    impl IdentityValidator for StsIdentityValidator {
        async fn validate(&self) -> Result<CallerIdentity, DeployError> {
            let resp = self
                .client
                .get_caller_identity()
                .send()
                .await
                .map_err(|e| DeployError::InvalidCredentials(DisplayErrorContext(&e).to_string()))?;

            let field = |value: Option<&str>, name: &str| {
                value.map(str::to_string).ok_or_else(|| {
                    DeployError::InvalidCredentials(format!("GetCallerIdentity returned no {}", name))
                })
            };

            let identity = CallerIdentity {
                account_id: field(resp.account(), "account")?,
                principal_id: field(resp.user_id(), "user id")?,
                principal_arn: field(resp.arn(), "arn")?,
            };

            info!("Authenticated as {} in account {}", identity.principal_arn, identity.account_id);
            Ok(identity)
        }
    }
}
