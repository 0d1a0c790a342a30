//! Deployment Orchestrator
//!
//! Lifecycle commands (initialize, connect, update, restore, status) and the
//! seams they drive: caller identity, the IaC engine and confirmation.

mod confirm;
mod iac;
mod identity;
mod orchestrator;

pub use confirm::{AutoConfirm, Confirm, StdinConfirm};
pub use iac::{
    is_lock_error, IacEngine, IacError, LocalProgram, PulumiCli, PulumiStack, Stack, StackOutputs,
    StackProgram,
};
pub use identity::{CallerIdentity, IdentityValidator};
#[cfg(feature = "aws")]
pub use identity::StsIdentityValidator;
pub use orchestrator::{
    seed_domain, ConnectRequest, DeployOutcome, Deployer, DeploymentSummary, InitRequest,
    RestoreOutcome, StatusReport, DEFAULT_MONTHLY_VOLUME,
};
