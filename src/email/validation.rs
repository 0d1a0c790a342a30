//! Advisory Configuration Checks
//!
//! Warnings surfaced to the operator before a deploy. They never block.

use serde::Serialize;

use super::config::EmailConfig;

/// Below roughly 100k emails a day a dedicated IP cannot be warmed
pub const DEDICATED_IP_MIN_MONTHLY_VOLUME: u64 = 100_000 * 30;

/// A non-blocking configuration warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration against the expected monthly volume
pub fn validate(config: &EmailConfig, emails_per_month: u64) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.dedicated_ip && emails_per_month < DEDICATED_IP_MIN_MONTHLY_VOLUME {
        warnings.push(ConfigWarning::new(
            "dedicatedIp",
            format!(
                "a dedicated IP needs roughly {} emails/month to warm up; shared IPs will deliver better at {}",
                DEDICATED_IP_MIN_MONTHLY_VOLUME, emails_per_month
            ),
        ));
    }

    match (&config.event_tracking, config.active_event_tracking()) {
        (_, Some(events)) if !events.dynamo_db_history => {
            warnings.push(ConfigWarning::new(
                "eventTracking",
                "event routing is enabled without history storage; events will not be queryable later",
            ));
        }
        (_, Some(events)) if events.events.is_empty() => {
            warnings.push(ConfigWarning::new(
                "eventTracking.events",
                "event routing is enabled but no event types are selected",
            ));
        }
        (Some(events), None) if events.dynamo_db_history => {
            warnings.push(ConfigWarning::new(
                "eventTracking.dynamoDBHistory",
                "history storage is requested while event routing is off; nothing will be recorded",
            ));
        }
        _ => {}
    }

    if let Some(tracking) = &config.tracking {
        if !tracking.enabled && tracking.custom_redirect_domain.is_some() {
            warnings.push(ConfigWarning::new(
                "tracking.customRedirectDomain",
                "a custom redirect domain is set but tracking is disabled",
            ));
        }
    }

    if config.active_archiving().is_some() && config.domain.is_none() {
        warnings.push(ConfigWarning::new(
            "emailArchiving",
            "archiving is enabled but no sending domain is configured",
        ));
    }

    warnings
}
