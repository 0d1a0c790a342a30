//! Mailplane Library
//!
//! Deployment lifecycle for self-hosted email sending infrastructure:
//! local connection metadata, cost estimation, live resource discovery,
//! DNS health checks and IaC stack orchestration.

pub mod config;
pub mod cost;
pub mod deploy;
pub mod dns;
pub mod email;
pub mod error;
pub mod metadata;
pub mod scanner;

pub use config::Settings;
pub use cost::{estimate, FeatureCostBreakdown, PricingTable};
pub use deploy::Deployer;
pub use dns::DnsVerifier;
pub use error::DeployError;
pub use metadata::{ConnectionMetadata, MetadataStore};
pub use scanner::{AwsResourceScan, ResourceScanner};
