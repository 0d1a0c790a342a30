//! Error taxonomy for lifecycle commands
//!
//! Every fatal error carries a one-line cause; the common operator-fixable
//! cases also carry concrete next-step text via [`DeployError::remediation`].

use std::path::PathBuf;
use thiserror::Error;

/// How far a command got before failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Aborted before any mutating call
    FatalImmediate,
    /// Infrastructure may have been partially changed
    FatalAfterPartialWork,
}

/// Errors surfaced by the deployment orchestrator
#[derive(Debug, Error)]
pub enum DeployError {
    /// Caller identity could not be established
    #[error("AWS credentials not found or invalid: {0}")]
    InvalidCredentials(String),

    /// Command requires an existing deployment
    #[error("No deployment found for account {account_id} in {region}")]
    NotConnected { account_id: String, region: String },

    /// Metadata exists but the service was never applied
    #[error("Email infrastructure for account {account_id} in {region} was never deployed")]
    NotDeployed { account_id: String, region: String },

    /// Connect found no identities to link
    #[error("No SES identities found in {region}; nothing to connect")]
    NothingToConnect { region: String },

    /// Operator declined the confirmation prompt
    #[error("Operation cancelled")]
    Aborted,

    /// The IaC engine holds a lock on the stack
    #[error("Stack {stack} is locked by another (or a crashed) run")]
    StackLocked { stack: String, lock_dir: PathBuf },

    /// Apply failed, possibly after partially changing infrastructure
    #[error("Deployment failed: {0}")]
    ApplyFailed(String),

    /// Destroy failed, possibly after partially removing infrastructure
    #[error("Teardown failed: {0}")]
    DestroyFailed(String),

    /// Local metadata could not be persisted
    #[error("Metadata store error: {0}")]
    Store(#[from] crate::metadata::StoreError),
}

impl DeployError {
    /// Classify the error per the lifecycle taxonomy
    pub fn class(&self) -> ErrorClass {
        match self {
            DeployError::ApplyFailed(_)
            | DeployError::DestroyFailed(_)
            | DeployError::StackLocked { .. }
            | DeployError::Store(_) => ErrorClass::FatalAfterPartialWork,
            _ => ErrorClass::FatalImmediate,
        }
    }

    /// Operator-actionable next steps, when there is a known fix
    pub fn remediation(&self) -> Option<String> {
        match self {
            DeployError::InvalidCredentials(_) => Some(
                "Configure credentials with `aws configure` or export AWS_PROFILE, then retry."
                    .to_string(),
            ),
            DeployError::NotConnected { region, .. } => Some(format!(
                "Run `mailplane init --region {region}` to deploy, or `mailplane connect --region {region}` to link existing SES identities."
            )),
            DeployError::NotDeployed { region, .. } => Some(format!(
                "Run `mailplane restore --region {region}` to clear the stale record, then `mailplane init --region {region}`."
            )),
            DeployError::NothingToConnect { region } => Some(format!(
                "Use `mailplane init --region {region}` to create new infrastructure instead."
            )),
            DeployError::StackLocked { lock_dir, .. } => Some(format!(
                "If no other mailplane command is running, remove the lock file under {} and re-run the command.",
                lock_dir.display()
            )),
            _ => None,
        }
    }
}
