//! Resource Scanner
//!
//! Read-only discovery of live resources in one region. Every family is
//! scanned independently; a failing family is logged and comes back empty
//! so the rest of the scan still completes.

#[cfg(feature = "aws")]
mod aws;
mod types;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "aws")]
pub use aws::AwsResourceProvider;
pub use types::*;

/// Region-scoped list/describe calls against the cloud provider
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Region every call is scoped to
    fn region(&self) -> &str;

    /// Names of all identities (domains and addresses)
    async fn list_identities(&self) -> Result<Vec<String>>;

    /// Verification flags for the given identities.
    ///
    /// Identities absent from the returned map have no attributes on record.
    async fn verification_status(&self, identities: &[String]) -> Result<HashMap<String, bool>>;

    /// Names of all configuration sets
    async fn list_configuration_sets(&self) -> Result<Vec<String>>;
    /// Event destinations of one configuration set
    async fn event_destinations(&self, configuration_set: &str) -> Result<Vec<EventDestination>>;
    async fn list_topics(&self) -> Result<Vec<Topic>>;
    async fn list_queues(&self) -> Result<Vec<Queue>>;
    async fn list_tables(&self) -> Result<Vec<Table>>;
    async fn list_functions(&self) -> Result<Vec<Function>>;
    async fn list_roles(&self) -> Result<Vec<Role>>;
}

/// Scans a region through a [`ResourceProvider`]
#[derive(Clone)]
pub struct ResourceScanner {
    provider: Arc<dyn ResourceProvider>,
}

fn absorb<T>(family: &str, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            warn!("Failed to scan {}: {:#}", family, e);
            Vec::new()
        }
    }
}

impl ResourceScanner {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self { provider }
    }

    pub fn region(&self) -> &str {
        self.provider.region()
    }

    /// Identities joined with their verification attributes
    pub async fn scan_identities(&self) -> Vec<SesIdentity> {
        let names = absorb("identities", self.provider.list_identities().await);
        if names.is_empty() {
            return Vec::new();
        }

        let status = match self.provider.verification_status(&names).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to fetch identity verification status: {:#}", e);
                HashMap::new()
            }
        };

        names
            .into_iter()
            .map(|name| SesIdentity {
                kind: IdentityKind::of(&name),
                verified: status.get(&name).copied().unwrap_or(false),
                name,
            })
            .collect()
    }

    /// Configuration sets with their destinations; a set whose destinations
    /// cannot be read is kept with none
    pub async fn scan_configuration_sets(&self) -> Vec<ConfigurationSet> {
        let names = absorb("configuration sets", self.provider.list_configuration_sets().await);
        let destinations =
            join_all(names.iter().map(|name| self.provider.event_destinations(name))).await;

        names
            .into_iter()
            .zip(destinations)
            .map(|(name, result)| {
                let event_destinations = result.unwrap_or_else(|e| {
                    warn!("Failed to read event destinations of {}: {:#}", name, e);
                    Vec::new()
                });
                ConfigurationSet {
                    name,
                    event_destinations,
                }
            })
            .collect()
    }

    pub async fn scan_topics(&self) -> Vec<Topic> {
        absorb("topics", self.provider.list_topics().await)
    }

    pub async fn scan_queues(&self) -> Vec<Queue> {
        absorb("queues", self.provider.list_queues().await)
    }

    pub async fn scan_tables(&self) -> Vec<Table> {
        absorb("tables", self.provider.list_tables().await)
    }

    pub async fn scan_functions(&self) -> Vec<Function> {
        absorb("functions", self.provider.list_functions().await)
    }

    pub async fn scan_roles(&self) -> Vec<Role> {
        absorb("roles", self.provider.list_roles().await)
    }

    /// Every family, concurrently
    pub async fn scan_all(&self) -> AwsResourceScan {
        let (
            identities,
            configuration_sets,
            sns_topics,
            sqs_queues,
            dynamodb_tables,
            lambda_functions,
            iam_roles,
        ) = futures::join!(
            self.scan_identities(),
            self.scan_configuration_sets(),
            self.scan_topics(),
            self.scan_queues(),
            self.scan_tables(),
            self.scan_functions(),
            self.scan_roles(),
        );

        let scan = AwsResourceScan {
            region: self.region().to_string(),
            identities,
            configuration_sets,
            sns_topics,
            sqs_queues,
            dynamodb_tables,
            lambda_functions,
            iam_roles,
        };

        info!("Scanned {}: {}", scan.region, scan.summary());
        scan
    }
}

/// Narrow every family except identities to managed resources
pub fn filter_managed(scan: &AwsResourceScan) -> AwsResourceScan {
    AwsResourceScan {
        region: scan.region.clone(),
        identities: scan.identities.clone(),
        configuration_sets: scan
            .configuration_sets
            .iter()
            .filter(|c| is_managed_name(&c.name))
            .cloned()
            .collect(),
        sns_topics: scan
            .sns_topics
            .iter()
            .filter(|t| is_managed_name(t.name()))
            .cloned()
            .collect(),
        sqs_queues: scan
            .sqs_queues
            .iter()
            .filter(|q| is_managed_name(q.name()))
            .cloned()
            .collect(),
        dynamodb_tables: scan
            .dynamodb_tables
            .iter()
            .filter(|t| is_managed_name(&t.name))
            .cloned()
            .collect(),
        lambda_functions: scan
            .lambda_functions
            .iter()
            .filter(|f| is_managed_name(&f.name))
            .cloned()
            .collect(),
        iam_roles: scan
            .iam_roles
            .iter()
            .filter(|r| is_managed_name(&r.name))
            .cloned()
            .collect(),
    }
}

/// Whether any managed resource exists, identities aside
pub fn check_managed_exist(scan: &AwsResourceScan) -> bool {
    scan.configuration_sets.iter().any(|c| is_managed_name(&c.name))
        || scan.sns_topics.iter().any(|t| is_managed_name(t.name()))
        || scan.sqs_queues.iter().any(|q| is_managed_name(q.name()))
        || scan.dynamodb_tables.iter().any(|t| is_managed_name(&t.name))
        || scan.lambda_functions.iter().any(|f| is_managed_name(&f.name))
        || scan.iam_roles.iter().any(|r| is_managed_name(&r.name))
}


#[cfg(test)]
mod tests {
    use super::testing::{table, FakeProvider};
    use super::*;

    #[tokio::test]
    async fn test_queue_failure_does_not_sink_scan() {
        let provider = FakeProvider {
            identities: Some(vec!["example.com".to_string()]),
            verified: HashMap::from([("example.com".to_string(), true)]),
            tables: Some(vec![table("mailplane-email-history")]),
            queues: None,
            ..Default::default()
        };
        let scan = ResourceScanner::new(Arc::new(provider)).scan_all().await;

        assert_eq!(scan.identities.len(), 1);
        assert!(scan.identities[0].verified);
        assert_eq!(scan.dynamodb_tables.len(), 1);
        assert!(scan.sqs_queues.is_empty());
        assert!(scan.iam_roles.is_empty());
    }

    #[tokio::test]
    async fn test_missing_verification_entry_is_unverified() {
        let provider = FakeProvider {
            identities: Some(vec![
                "example.com".to_string(),
                "ops@other.org".to_string(),
            ]),
            verified: HashMap::from([("example.com".to_string(), true)]),
            ..Default::default()
        };
        let identities = ResourceScanner::new(Arc::new(provider))
            .scan_identities()
            .await;

        assert_eq!(identities.len(), 2);
        assert!(identities[0].verified);
        assert_eq!(identities[1].kind, IdentityKind::Email);
        assert!(!identities[1].verified);
        assert_eq!(identities[1].domain(), "other.org");
    }

    #[tokio::test]
    async fn test_destination_failure_keeps_configuration_set() {
        let destination = EventDestination {
            name: "events".to_string(),
            enabled: true,
            matching_event_types: vec!["SEND".to_string()],
            target: Some("arn:aws:sns:us-east-1:123:mailplane-email-events".to_string()),
        };
        let provider = FakeProvider {
            configuration_sets: Some(vec![
                ConfigurationSet {
                    name: "mailplane-tracking".to_string(),
                    event_destinations: vec![destination.clone()],
                },
                ConfigurationSet {
                    name: "legacy-marketing".to_string(),
                    event_destinations: vec![destination],
                },
            ]),
            failing_destinations: vec!["legacy-marketing".to_string()],
            ..Default::default()
        };

        let sets = ResourceScanner::new(Arc::new(provider))
            .scan_configuration_sets()
            .await;

        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].name, "mailplane-tracking");
        assert_eq!(sets[0].event_destinations.len(), 1);
        assert_eq!(sets[1].name, "legacy-marketing");
        assert!(sets[1].event_destinations.is_empty());
    }

    #[test]
    fn test_filter_managed_keeps_all_identities() {
        let scan = AwsResourceScan {
            region: "us-east-1".to_string(),
            identities: vec![SesIdentity {
                name: "unmanaged.com".to_string(),
                kind: IdentityKind::Domain,
                verified: false,
            }],
            sns_topics: vec![
                Topic {
                    arn: "arn:aws:sns:us-east-1:123:mailplane-email-events".to_string(),
                },
                Topic {
                    arn: "arn:aws:sns:us-east-1:123:billing-alerts".to_string(),
                },
            ],
            sqs_queues: vec![Queue {
                url: "https://sqs.us-east-1.amazonaws.com/123/mailplaneish".to_string(),
            }],
            dynamodb_tables: vec![table("orders")],
            ..Default::default()
        };

        let managed = filter_managed(&scan);
        assert_eq!(managed.identities.len(), 1);
        assert_eq!(managed.sns_topics.len(), 1);
        assert!(managed.sqs_queues.is_empty());
        assert!(managed.dynamodb_tables.is_empty());
        assert!(check_managed_exist(&scan));
        assert!(!check_managed_exist(&AwsResourceScan {
            identities: scan.identities.clone(),
            ..Default::default()
        }));
    }
}
