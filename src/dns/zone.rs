//! Managed DNS Zones
//!
//! Publishes required records into a hosted zone the operator already
//! controls. Record creation is opportunistic: callers treat failures as
//! advisory.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::records::RequiredRecord;

/// A public hosted zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostedZone {
    pub id: String,
    /// Zone apex without trailing dot
    pub name: String,
}

#[async_trait]
pub trait DnsZoneManager: Send + Sync {
    /// Public zone whose apex is the closest suffix of `domain`
    async fn find_zone(&self, domain: &str) -> Result<Option<HostedZone>>;

    /// Create or overwrite records in a zone
    async fn upsert_records(&self, zone: &HostedZone, records: &[RequiredRecord]) -> Result<()>;
}

/// Pick the zone whose apex is the longest suffix of `domain`
pub fn best_zone_match<'a>(domain: &str, zones: &'a [HostedZone]) -> Option<&'a HostedZone> {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    zones
        .iter()
        .filter(|z| {
            let apex = z.name.trim_end_matches('.').to_ascii_lowercase();
            domain == apex || domain.ends_with(&format!(".{}", apex))
        })
        .max_by_key(|z| z.name.trim_end_matches('.').len())
}

/// Outcome of publishing records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum DnsProvisioning {
    Created { zone: String, records: usize },
    NoZone,
    Failed { reason: String },
}

/// Publish `records` if a matching zone exists; never fails
pub async fn provision_records(
    zones: &dyn DnsZoneManager,
    domain: &str,
    records: &[RequiredRecord],
) -> DnsProvisioning {
    let zone = match zones.find_zone(domain).await {
        Ok(Some(zone)) => zone,
        Ok(None) => {
            info!("No hosted zone found for {}, DNS records must be added manually", domain);
            return DnsProvisioning::NoZone;
        }
        Err(e) => {
            warn!("Failed to look up hosted zone for {}: {:#}", domain, e);
            return DnsProvisioning::Failed {
                reason: format!("{:#}", e),
            };
        }
    };

    match zones.upsert_records(&zone, records).await {
        Ok(()) => {
            info!("Published {} DNS records in zone {}", records.len(), zone.name);
            DnsProvisioning::Created {
                zone: zone.name,
                records: records.len(),
            }
        }
        Err(e) => {
            warn!("Failed to publish DNS records in zone {}: {:#}", zone.name, e);
            DnsProvisioning::Failed {
                reason: format!("{:#}", e),
            }
        }
    }
}

#[cfg(feature = "aws")]
pub use route53::Route53ZoneManager;

#[cfg(feature = "aws")]
mod route53 {
    use anyhow::{Context, Result};
    use async_trait::async_trait;
    use aws_sdk_route53::types::{
        Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
    };
    use tracing::debug;

    use super::{best_zone_match, DnsZoneManager, HostedZone};
    use crate::dns::records::RequiredRecord;
    use crate::dns::resolver::RecordType;

    const RECORD_TTL: i64 = 300;

    pub struct Route53ZoneManager {
        client: aws_sdk_route53::Client,
    }

    impl Route53ZoneManager {
        pub fn new(config: &aws_config::SdkConfig) -> Self {
            Self {
                client: aws_sdk_route53::Client::new(config),
            }
        }

        async fn public_zones(&self) -> Result<Vec<HostedZone>> {
            let mut zones = Vec::new();
            let mut marker = None;
            loop {
                let resp = self
                    .client
                    .list_hosted_zones()
                    .set_marker(marker)
                    .send()
                    .await
                    .context("Failed to list hosted zones")?;
                zones.extend(
                    resp.hosted_zones()
                        .iter()
                        .filter(|z| !z.config().map(|c| c.private_zone()).unwrap_or(false))
                        .map(|z| HostedZone {
                            id: z.id().trim_start_matches("/hostedzone/").to_string(),
                            name: z.name().trim_end_matches('.').to_string(),
                        }),
                );
                marker = if resp.is_truncated() {
                    resp.next_marker().map(str::to_string)
                } else {
                    None
                };
                if marker.is_none() {
                    break;
                }
            }
            Ok(zones)
        }
    }

    fn record_set(record: &RequiredRecord) -> Result<ResourceRecordSet> {
        let (rr_type, value) = match record.record_type {
            RecordType::CNAME => (RrType::Cname, record.value.clone()),
            RecordType::MX => (RrType::Mx, record.value.clone()),
            RecordType::TXT => (RrType::Txt, format!("\"{}\"", record.value)),
        };

        Ok(ResourceRecordSet::builder()
            .name(&record.name)
            .r#type(rr_type)
            .ttl(RECORD_TTL)
            .resource_records(ResourceRecord::builder().value(value).build()?)
            .build()?)
    }

    #[async_trait]
    impl DnsZoneManager for Route53ZoneManager {
        async fn find_zone(&self, domain: &str) -> Result<Option<HostedZone>> {
            let zones = self.public_zones().await?;
            Ok(best_zone_match(domain, &zones).cloned())
        }

        async fn upsert_records(&self, zone: &HostedZone, records: &[RequiredRecord]) -> Result<()> {
            let mut changes = Vec::with_capacity(records.len());
            for record in records {
                changes.push(
                    Change::builder()
                        .action(ChangeAction::Upsert)
                        .resource_record_set(record_set(record)?)
                        .build()?,
                );
            }

            self.client
                .change_resource_record_sets()
                .hosted_zone_id(&zone.id)
                .change_batch(ChangeBatch::builder().set_changes(Some(changes)).build()?)
                .send()
                .await
                .with_context(|| format!("Failed to upsert records in zone {}", zone.name))?;

            debug!("Upserted {} records in {}", records.len(), zone.id);
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every upsert; `zone` decides what `find_zone` returns
    #[derive(Default)]
    pub struct FakeZones {
        pub zone: Option<HostedZone>,
        pub fail_upsert: bool,
        pub upserted: Mutex<Vec<RequiredRecord>>,
    }

    #[async_trait]
    impl DnsZoneManager for FakeZones {
        async fn find_zone(&self, _domain: &str) -> Result<Option<HostedZone>> {
            Ok(self.zone.clone())
        }

        async fn upsert_records(&self, _zone: &HostedZone, records: &[RequiredRecord]) -> Result<()> {
            if self.fail_upsert {
                anyhow::bail!("InvalidChangeBatch");
            }
            if let Ok(mut upserted) = self.upserted.lock() {
                upserted.extend_from_slice(records);
            }
            Ok(())
        }
    }
}
