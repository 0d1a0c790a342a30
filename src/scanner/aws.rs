//! AWS Resource Provider
//!
//! SDK-backed list/describe calls. Every list follows its pagination token
//! to the end.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_ses::types::VerificationStatus;
use std::collections::HashMap;
use tracing::debug;

use super::types::{EventDestination, Function, Queue, Role, Table, Topic};
use super::ResourceProvider;

/// Identities per GetIdentityVerificationAttributes call
const VERIFICATION_BATCH: usize = 100;

pub struct AwsResourceProvider {
    region: String,
    ses: aws_sdk_ses::Client,
    sesv2: aws_sdk_sesv2::Client,
    sns: aws_sdk_sns::Client,
    sqs: aws_sdk_sqs::Client,
    dynamodb: aws_sdk_dynamodb::Client,
    lambda: aws_sdk_lambda::Client,
    iam: aws_sdk_iam::Client,
}

impl AwsResourceProvider {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            region: config
                .region()
                .map(|r| r.to_string())
                .unwrap_or_else(|| crate::config::DEFAULT_REGION.to_string()),
            ses: aws_sdk_ses::Client::new(config),
            sesv2: aws_sdk_sesv2::Client::new(config),
            sns: aws_sdk_sns::Client::new(config),
            sqs: aws_sdk_sqs::Client::new(config),
            dynamodb: aws_sdk_dynamodb::Client::new(config),
            lambda: aws_sdk_lambda::Client::new(config),
            iam: aws_sdk_iam::Client::new(config),
        }
    }

    /// DKIM tokens and cloud-side verification flag of one identity
    pub async fn identity_dkim(&self, identity: &str) -> Result<(Vec<String>, bool)> {
        let resp = self
            .sesv2
            .get_email_identity()
            .email_identity(identity)
            .send()
            .await
            .with_context(|| format!("Failed to get identity {}", identity))?;

        let tokens = resp
            .dkim_attributes()
            .map(|d| d.tokens().to_vec())
            .unwrap_or_default();
        Ok((tokens, resp.verified_for_sending_status()))
    }
}

#[async_trait]
impl ResourceProvider for AwsResourceProvider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_identities(&self) -> Result<Vec<String>> {
        let mut identities = Vec::new();
        let mut next_token = None;
        loop {
            let resp = self
                .ses
                .list_identities()
                .set_next_token(next_token)
                .send()
                .await
                .context("Failed to list SES identities")?;
            identities.extend(resp.identities().iter().cloned());
            next_token = resp.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        debug!("Listed {} identities", identities.len());
        Ok(identities)
    }

    async fn verification_status(&self, identities: &[String]) -> Result<HashMap<String, bool>> {
        let mut status = HashMap::new();
        for batch in identities.chunks(VERIFICATION_BATCH) {
            let resp = self
                .ses
                .get_identity_verification_attributes()
                .set_identities(Some(batch.to_vec()))
                .send()
                .await
                .context("Failed to get identity verification attributes")?;
            for (identity, attrs) in resp.verification_attributes() {
                status.insert(
                    identity.clone(),
                    *attrs.verification_status() == VerificationStatus::Success,
                );
            }
        }
        Ok(status)
    }

    async fn list_configuration_sets(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut next_token = None;
        loop {
            let resp = self
                .sesv2
                .list_configuration_sets()
                .set_next_token(next_token)
                .send()
                .await
                .context("Failed to list configuration sets")?;
            names.extend(resp.configuration_sets().iter().cloned());
            next_token = resp.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(names)
    }

    async fn event_destinations(&self, configuration_set: &str) -> Result<Vec<EventDestination>> {
        let resp = self
            .sesv2
            .get_configuration_set_event_destinations()
            .configuration_set_name(configuration_set)
            .send()
            .await
            .with_context(|| format!("Failed to get event destinations for {}", configuration_set))?;

        Ok(resp
            .event_destinations()
            .iter()
            .map(|d| EventDestination {
                name: d.name().to_string(),
                enabled: d.enabled(),
                matching_event_types: d
                    .matching_event_types()
                    .iter()
                    .map(|t| t.as_str().to_string())
                    .collect(),
                target: d
                    .sns_destination()
                    .map(|s| s.topic_arn().to_string())
                    .or_else(|| {
                        d.event_bridge_destination()
                            .map(|e| e.event_bus_arn().to_string())
                    }),
            })
            .collect())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let mut topics = Vec::new();
        let mut next_token = None;
        loop {
            let resp = self
                .sns
                .list_topics()
                .set_next_token(next_token)
                .send()
                .await
                .context("Failed to list SNS topics")?;
            topics.extend(
                resp.topics()
                    .iter()
                    .filter_map(|t| t.topic_arn())
                    .map(|arn| Topic {
                        arn: arn.to_string(),
                    }),
            );
            next_token = resp.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(topics)
    }

    async fn list_queues(&self) -> Result<Vec<Queue>> {
        let mut queues = Vec::new();
        let mut next_token = None;
        loop {
            let resp = self
                .sqs
                .list_queues()
                .set_next_token(next_token)
                .send()
                .await
                .context("Failed to list SQS queues")?;
            queues.extend(resp.queue_urls().iter().map(|url| Queue { url: url.clone() }));
            next_token = resp.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(queues)
    }

    async fn list_tables(&self) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        let mut start = None;
        loop {
            let resp = self
                .dynamodb
                .list_tables()
                .set_exclusive_start_table_name(start)
                .send()
                .await
                .context("Failed to list DynamoDB tables")?;
            tables.extend(resp.table_names().iter().map(|name| Table { name: name.clone() }));
            start = resp.last_evaluated_table_name().map(str::to_string);
            if start.is_none() {
                break;
            }
        }
        Ok(tables)
    }

    async fn list_functions(&self) -> Result<Vec<Function>> {
        let mut functions = Vec::new();
        let mut marker = None;
        loop {
            let resp = self
                .lambda
                .list_functions()
                .set_marker(marker)
                .send()
                .await
                .context("Failed to list Lambda functions")?;
            functions.extend(resp.functions().iter().filter_map(|f| {
                Some(Function {
                    name: f.function_name()?.to_string(),
                    arn: f.function_arn().map(str::to_string),
                    runtime: f.runtime().map(|r| r.as_str().to_string()),
                })
            }));
            marker = resp.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }
        Ok(functions)
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let mut roles = Vec::new();
        let mut marker = None;
        loop {
            let resp = self
                .iam
                .list_roles()
                .set_marker(marker)
                .send()
                .await
                .context("Failed to list IAM roles")?;
            roles.extend(resp.roles().iter().map(|r| Role {
                name: r.role_name().to_string(),
                arn: r.arn().to_string(),
            }));
            marker = if resp.is_truncated() {
                resp.marker().map(str::to_string)
            } else {
                None
            };
            if marker.is_none() {
                break;
            }
        }
        Ok(roles)
    }
}
