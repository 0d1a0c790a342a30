//! Scan Result Types

use serde::{Deserialize, Serialize};

use crate::config::RESOURCE_PREFIX;

/// Whether an identity is a whole domain or a single address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Domain,
    Email,
}

impl IdentityKind {
    pub fn of(identity: &str) -> Self {
        if identity.contains('@') {
            IdentityKind::Email
        } else {
            IdentityKind::Domain
        }
    }
}

/// A sending identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SesIdentity {
    pub name: String,
    pub kind: IdentityKind,
    pub verified: bool,
}

impl SesIdentity {
    /// Domain part of the identity (the identity itself for domains)
    pub fn domain(&self) -> &str {
        match self.kind {
            IdentityKind::Domain => &self.name,
            IdentityKind::Email => self
                .name
                .rsplit_once('@')
                .map(|(_, domain)| domain)
                .unwrap_or(&self.name),
        }
    }
}

/// Where a configuration set sends matching events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDestination {
    pub name: String,
    pub enabled: bool,
    pub matching_event_types: Vec<String>,
    /// Topic or event bus ARN, when the destination has one
    pub target: Option<String>,
}

/// An event-routing configuration set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSet {
    pub name: String,
    pub event_destinations: Vec<EventDestination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub arn: String,
}

impl Topic {
    pub fn name(&self) -> &str {
        self.arn.rsplit(':').next().unwrap_or(&self.arn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub url: String,
}

impl Queue {
    pub fn name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub arn: Option<String>,
    pub runtime: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub arn: String,
}

/// Read-only snapshot of one region
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsResourceScan {
    pub region: String,
    pub identities: Vec<SesIdentity>,
    pub configuration_sets: Vec<ConfigurationSet>,
    pub sns_topics: Vec<Topic>,
    pub sqs_queues: Vec<Queue>,
    pub dynamodb_tables: Vec<Table>,
    pub lambda_functions: Vec<Function>,
    pub iam_roles: Vec<Role>,
}

impl AwsResourceScan {
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            identities: self.identities.len(),
            verified_identities: self.identities.iter().filter(|i| i.verified).count(),
            configuration_sets: self.configuration_sets.len(),
            topics: self.sns_topics.len(),
            queues: self.sqs_queues.len(),
            tables: self.dynamodb_tables.len(),
            functions: self.lambda_functions.len(),
            roles: self.iam_roles.len(),
        }
    }
}

/// Per-family counts for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub identities: usize,
    pub verified_identities: usize,
    pub configuration_sets: usize,
    pub topics: usize,
    pub queues: usize,
    pub tables: usize,
    pub functions: usize,
    pub roles: usize,
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} identities ({} verified), {} configuration sets, {} topics, {} queues, {} tables, {} functions, {} roles",
            self.identities,
            self.verified_identities,
            self.configuration_sets,
            self.topics,
            self.queues,
            self.tables,
            self.functions,
            self.roles
        )
    }
}

/// Whether a resource name follows the managed naming convention
pub fn is_managed_name(name: &str) -> bool {
    name.strip_prefix(RESOURCE_PREFIX)
        .map(|rest| rest.starts_with('-'))
        .unwrap_or(false)
}
