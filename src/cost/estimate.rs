//! Monthly Cost Estimate
//!
//! Each calculator returns `None` when its feature is off, so a breakdown
//! only lists the features that actually drive cost.

use serde::Serialize;

use super::pricing::PricingTable;
use crate::email::{ArchiveRetention, EmailConfig};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const MILLION: f64 = 1_000_000.0;

/// Cost of one active feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCost {
    pub monthly: f64,
    pub description: String,
}

/// Sum of every active feature plus base sending
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCost {
    pub monthly: f64,
    /// Flat per-message sending rate, not an average
    pub per_email: f64,
    pub description: String,
}

/// Per-feature monthly cost for one configuration and volume
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCostBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<FeatureCost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation_metrics: Option<FeatureCost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_tracking: Option<FeatureCost>,
    #[serde(rename = "dynamoDBHistory", skip_serializing_if = "Option::is_none")]
    pub dynamo_db_history: Option<FeatureCost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_archiving: Option<FeatureCost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedicated_ip: Option<FeatureCost>,
    pub total: TotalCost,
}

impl FeatureCostBreakdown {
    /// Active line items in display order
    pub fn items(&self) -> Vec<(&'static str, &FeatureCost)> {
        [
            ("tracking", &self.tracking),
            ("reputationMetrics", &self.reputation_metrics),
            ("eventTracking", &self.event_tracking),
            ("dynamoDBHistory", &self.dynamo_db_history),
            ("emailArchiving", &self.email_archiving),
            ("dedicatedIp", &self.dedicated_ip),
        ]
        .into_iter()
        .filter_map(|(name, item)| item.as_ref().map(|cost| (name, cost)))
        .collect()
    }
}

/// Estimate with the default pricing table
pub fn estimate(config: &EmailConfig, emails_per_month: u64) -> FeatureCostBreakdown {
    estimate_with(&PricingTable::default(), config, emails_per_month)
}

/// Estimate against an explicit pricing table
pub fn estimate_with(
    pricing: &PricingTable,
    config: &EmailConfig,
    emails_per_month: u64,
) -> FeatureCostBreakdown {
    let tracking = tracking_cost(pricing, config);
    let reputation_metrics = reputation_cost(config);
    let event_tracking = event_tracking_cost(pricing, config, emails_per_month);
    let dynamo_db_history = history_cost(pricing, config, emails_per_month);
    let email_archiving = archiving_cost(pricing, config, emails_per_month);
    let dedicated_ip = dedicated_ip_cost(pricing, config);

    let billable_emails = emails_per_month.saturating_sub(pricing.ses_free_tier_emails);
    let base = billable_emails as f64 * pricing.ses_per_email;

    let features: f64 = [
        &tracking,
        &reputation_metrics,
        &event_tracking,
        &dynamo_db_history,
        &email_archiving,
        &dedicated_ip,
    ]
    .iter()
    .filter_map(|item| item.as_ref())
    .map(|item| item.monthly)
    .sum();

    FeatureCostBreakdown {
        tracking,
        reputation_metrics,
        event_tracking,
        dynamo_db_history,
        email_archiving,
        dedicated_ip,
        total: TotalCost {
            monthly: base + features,
            per_email: pricing.ses_per_email,
            description: format!(
                "{} emails/month ({} sending + {} features)",
                format_count(emails_per_month),
                format_cost(base),
                format_cost(features)
            ),
        },
    }
}

/// Steady-state history table size in GB
pub fn estimate_storage_size(
    emails_per_month: u64,
    retention: ArchiveRetention,
    event_types: usize,
) -> f64 {
    estimate_storage_size_with(
        &PricingTable::default(),
        emails_per_month,
        retention,
        event_types,
    )
}

fn estimate_storage_size_with(
    pricing: &PricingTable,
    emails_per_month: u64,
    retention: ArchiveRetention,
    event_types: usize,
) -> f64 {
    let records = emails_per_month as f64 * event_types as f64 * retention.months_for_estimate();
    records * pricing.event_record_bytes / BYTES_PER_GB
}

/// `Free`, `< $0.01`, or `$X.XX`
pub fn format_cost(amount: f64) -> String {
    if amount == 0.0 {
        "Free".to_string()
    } else if amount < 0.01 {
        "< $0.01".to_string()
    } else {
        format!("${:.2}", amount)
    }
}

fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn per_million(units: f64, rate: f64) -> f64 {
    units / MILLION * rate
}

fn tracking_cost(pricing: &PricingTable, config: &EmailConfig) -> Option<FeatureCost> {
    let tracking = config.active_tracking()?;
    Some(match &tracking.custom_redirect_domain {
        Some(domain) => FeatureCost {
            monthly: pricing.route53_zone_monthly,
            description: format!("Open/click tracking via {} (hosted zone)", domain),
        },
        None => FeatureCost {
            monthly: 0.0,
            description: "Open/click tracking on the shared redirect domain".to_string(),
        },
    })
}

fn reputation_cost(config: &EmailConfig) -> Option<FeatureCost> {
    config.reputation_metrics.then(|| FeatureCost {
        monthly: 0.0,
        description: "Bounce and complaint rate monitoring".to_string(),
    })
}

fn event_tracking_cost(
    pricing: &PricingTable,
    config: &EmailConfig,
    emails_per_month: u64,
) -> Option<FeatureCost> {
    let events = config.active_event_tracking()?;
    let total_events = emails_per_month.saturating_mul(events.events.len() as u64);

    let bus = if events.event_bridge {
        per_million(total_events as f64, pricing.eventbridge_per_million_events)
    } else {
        0.0
    };

    let queue_requests = total_events.saturating_mul(pricing.sqs_requests_per_event);
    let queue = per_million(
        queue_requests.saturating_sub(pricing.sqs_free_tier_requests) as f64,
        pricing.sqs_per_million_requests,
    );

    let invocations = total_events.saturating_sub(pricing.lambda_free_tier_requests);
    let requests = per_million(invocations as f64, pricing.lambda_per_million_requests);
    let gb_seconds =
        total_events as f64 * pricing.lambda_memory_gb * pricing.lambda_duration_seconds;
    let compute =
        (gb_seconds - pricing.lambda_free_tier_gb_seconds).max(0.0) * pricing.lambda_per_gb_second;

    Some(FeatureCost {
        monthly: bus + queue + requests + compute,
        description: format!(
            "{} events/month ({} event types) through EventBridge, SQS and Lambda",
            format_count(total_events),
            events.events.len()
        ),
    })
}

fn history_cost(
    pricing: &PricingTable,
    config: &EmailConfig,
    emails_per_month: u64,
) -> Option<FeatureCost> {
    let events = config.active_event_tracking().filter(|e| e.dynamo_db_history)?;
    let event_types = events.events.len();
    let writes = emails_per_month.saturating_mul(event_types as u64);

    let write_cost = per_million(writes as f64, pricing.dynamodb_per_million_writes);
    let size_gb =
        estimate_storage_size_with(pricing, emails_per_month, events.archive_retention, event_types);
    let storage_cost = (size_gb - pricing.dynamodb_free_tier_gb).max(0.0) * pricing.dynamodb_per_gb_month;

    Some(FeatureCost {
        monthly: write_cost + storage_cost,
        description: format!(
            "{} writes/month, ~{:.1} GB stored for {}",
            format_count(writes),
            size_gb,
            events.archive_retention
        ),
    })
}

fn archiving_cost(
    pricing: &PricingTable,
    config: &EmailConfig,
    emails_per_month: u64,
) -> Option<FeatureCost> {
    let archiving = config.active_archiving()?;
    let ingested_gb = emails_per_month as f64 * pricing.archived_message_bytes / BYTES_PER_GB;
    let stored_gb = ingested_gb * archiving.retention.months_for_estimate();

    Some(FeatureCost {
        monthly: ingested_gb * pricing.archive_ingest_per_gb
            + stored_gb * pricing.archive_storage_per_gb_month,
        description: format!(
            "~{:.1} GB archived/month, retained {}",
            ingested_gb, archiving.retention
        ),
    })
}

fn dedicated_ip_cost(pricing: &PricingTable, config: &EmailConfig) -> Option<FeatureCost> {
    config.dedicated_ip.then(|| FeatureCost {
        monthly: pricing.dedicated_ip_monthly,
        description: "Dedicated sending IP".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::SES_PER_EMAIL;
    use crate::email::EmailPreset;

    #[test]
    fn test_production_at_100k() {
        let breakdown = estimate(&EmailPreset::Production.config(), 100_000);

        assert!(breakdown.event_tracking.as_ref().unwrap().monthly > 0.0);
        assert!(breakdown.dynamo_db_history.as_ref().unwrap().monthly > 0.0);
        assert_eq!(breakdown.reputation_metrics.as_ref().unwrap().monthly, 0.0);
        assert!(breakdown.dedicated_ip.is_none());
        assert!(breakdown.total.monthly >= 10.0);
        assert_eq!(breakdown.total.per_email, SES_PER_EMAIL);
    }

    #[test]
    fn test_disabled_feature_is_absent() {
        let mut config = EmailPreset::Production.config();
        if let Some(events) = config.event_tracking.as_mut() {
            events.enabled = false;
        }
        let breakdown = estimate(&config, 100_000);
        assert!(breakdown.event_tracking.is_none());
        assert!(breakdown.dynamo_db_history.is_none());

        let json = serde_json::to_value(&breakdown).unwrap();
        assert!(json.get("eventTracking").is_none());
        assert!(json.get("reputationMetrics").is_some());
    }

    #[test]
    fn test_total_is_monotonic_in_volume() {
        let config = EmailPreset::Enterprise.config().with_domain("example.com");
        let volumes = [0, 1_000, 50_000, 1_000_000, 10_000_000, 200_000_000];
        let totals: Vec<f64> = volumes
            .iter()
            .map(|v| estimate(&config, *v).total.monthly)
            .collect();
        assert!(totals.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_redirect_domain_adds_zone_cost() {
        let mut config = EmailPreset::Starter.config();
        assert_eq!(estimate(&config, 1_000).tracking.unwrap().monthly, 0.0);

        if let Some(tracking) = config.tracking.as_mut() {
            tracking.custom_redirect_domain = Some("links.example.com".to_string());
        }
        assert_eq!(estimate(&config, 1_000).tracking.unwrap().monthly, 0.50);
    }

    #[test]
    fn test_custom_pricing_table() {
        let pricing = PricingTable {
            ses_per_email: 0.0002,
            ..PricingTable::default()
        };
        let config = EmailConfig::default();
        let breakdown = estimate_with(&pricing, &config, 10_000);
        assert!((breakdown.total.monthly - 2.0).abs() < 1e-9);
        assert!(breakdown.items().is_empty());
    }

    #[test]
    fn test_storage_grows_with_retention() {
        let short = estimate_storage_size(100_000, ArchiveRetention::SevenDays, 6);
        let long = estimate_storage_size(100_000, ArchiveRetention::Indefinite, 6);
        assert!(short < long);
        assert_eq!(estimate_storage_size(0, ArchiveRetention::OneYear, 6), 0.0);
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.0), "Free");
        assert_eq!(format_cost(0.004), "< $0.01");
        assert_eq!(format_cost(24.95), "$24.95");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(format_count(100), "100");
    }
}
