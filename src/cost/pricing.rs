//! Pricing Table
//!
//! Unit rates and free-tier allowances for the AWS us-east-1 schedule.
//! Estimates take the table as a value so older schedules stay reproducible.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Outbound email, per message
pub const SES_PER_EMAIL: f64 = 0.0001;
/// Onboarding allowance is ignored; most accounts are past it
pub const SES_FREE_TIER_EMAILS: u64 = 0;
/// Event bus custom events, per million
pub const EVENTBRIDGE_PER_MILLION_EVENTS: f64 = 1.00;
/// Standard queue requests, per million
pub const SQS_PER_MILLION_REQUESTS: f64 = 0.40;
pub const SQS_FREE_TIER_REQUESTS: u64 = 1_000_000;
/// Enqueue, receive and delete for every event
pub const SQS_REQUESTS_PER_EVENT: u64 = 3;
/// Function invocations, per million
pub const LAMBDA_PER_MILLION_REQUESTS: f64 = 0.20;
pub const LAMBDA_FREE_TIER_REQUESTS: u64 = 1_000_000;
pub const LAMBDA_PER_GB_SECOND: f64 = 0.000_016_666_7;
pub const LAMBDA_FREE_TIER_GB_SECONDS: f64 = 400_000.0;
/// Assumed handler footprint: 128 MB for 100 ms
pub const LAMBDA_MEMORY_GB: f64 = 0.128;
pub const LAMBDA_DURATION_SECONDS: f64 = 0.1;
/// On-demand table writes, per million
pub const DYNAMODB_PER_MILLION_WRITES: f64 = 1.25;
pub const DYNAMODB_PER_GB_MONTH: f64 = 0.25;
pub const DYNAMODB_FREE_TIER_GB: f64 = 25.0;
/// Average stored event record
pub const EVENT_RECORD_BYTES: f64 = 1024.0;
/// Dedicated egress address, per month
pub const DEDICATED_IP_MONTHLY: f64 = 24.95;
/// Hosted zone for a custom redirect domain, per month
pub const ROUTE53_ZONE_MONTHLY: f64 = 0.50;
/// Mail Manager archive ingestion and storage
pub const ARCHIVE_INGEST_PER_GB: f64 = 2.00;
pub const ARCHIVE_STORAGE_PER_GB_MONTH: f64 = 0.19;
/// Average archived message including headers
pub const ARCHIVED_MESSAGE_BYTES: f64 = 50.0 * 1024.0;

/// A versioned set of unit rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTable {
    pub effective_date: NaiveDate,
    pub ses_per_email: f64,
    pub ses_free_tier_emails: u64,
    pub eventbridge_per_million_events: f64,
    pub sqs_per_million_requests: f64,
    pub sqs_free_tier_requests: u64,
    pub sqs_requests_per_event: u64,
    pub lambda_per_million_requests: f64,
    pub lambda_free_tier_requests: u64,
    pub lambda_per_gb_second: f64,
    pub lambda_free_tier_gb_seconds: f64,
    pub lambda_memory_gb: f64,
    pub lambda_duration_seconds: f64,
    pub dynamodb_per_million_writes: f64,
    pub dynamodb_per_gb_month: f64,
    pub dynamodb_free_tier_gb: f64,
    pub event_record_bytes: f64,
    pub dedicated_ip_monthly: f64,
    pub route53_zone_monthly: f64,
    pub archive_ingest_per_gb: f64,
    pub archive_storage_per_gb_month: f64,
    pub archived_message_bytes: f64,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            ses_per_email: SES_PER_EMAIL,
            ses_free_tier_emails: SES_FREE_TIER_EMAILS,
            eventbridge_per_million_events: EVENTBRIDGE_PER_MILLION_EVENTS,
            sqs_per_million_requests: SQS_PER_MILLION_REQUESTS,
            sqs_free_tier_requests: SQS_FREE_TIER_REQUESTS,
            sqs_requests_per_event: SQS_REQUESTS_PER_EVENT,
            lambda_per_million_requests: LAMBDA_PER_MILLION_REQUESTS,
            lambda_free_tier_requests: LAMBDA_FREE_TIER_REQUESTS,
            lambda_per_gb_second: LAMBDA_PER_GB_SECOND,
            lambda_free_tier_gb_seconds: LAMBDA_FREE_TIER_GB_SECONDS,
            lambda_memory_gb: LAMBDA_MEMORY_GB,
            lambda_duration_seconds: LAMBDA_DURATION_SECONDS,
            dynamodb_per_million_writes: DYNAMODB_PER_MILLION_WRITES,
            dynamodb_per_gb_month: DYNAMODB_PER_GB_MONTH,
            dynamodb_free_tier_gb: DYNAMODB_FREE_TIER_GB,
            event_record_bytes: EVENT_RECORD_BYTES,
            dedicated_ip_monthly: DEDICATED_IP_MONTHLY,
            route53_zone_monthly: ROUTE53_ZONE_MONTHLY,
            archive_ingest_per_gb: ARCHIVE_INGEST_PER_GB,
            archive_storage_per_gb_month: ARCHIVE_STORAGE_PER_GB_MONTH,
            archived_message_bytes: ARCHIVED_MESSAGE_BYTES,
        }
    }
}
