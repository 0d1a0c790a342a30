//! Email Feature Configuration
//!
//! The full feature set a deployed email service can carry. Serialized in
//! camelCase because it is persisted inside connection metadata and passed
//! to the IaC program verbatim.

use serde::{Deserialize, Serialize};

/// Complete configuration of the email service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailConfig {
    /// Open/click instrumentation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingConfig>,
    /// Require TLS for outbound delivery
    pub tls_required: bool,
    /// Publish reputation metrics (monitoring only)
    pub reputation_metrics: bool,
    /// Account-level suppression handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppression_list: Option<SuppressionListConfig>,
    /// Event routing pipeline and history storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_tracking: Option<EventTrackingConfig>,
    /// Rent a dedicated egress IP
    pub dedicated_ip: bool,
    /// Message archiving
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_archiving: Option<EmailArchivingConfig>,
    /// Sending domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Custom bounce/return-path domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_from_domain: Option<String>,
    /// Whether sending is enabled on the configuration set
    pub sending_enabled: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            tracking: None,
            tls_required: false,
            reputation_metrics: false,
            suppression_list: None,
            event_tracking: None,
            dedicated_ip: false,
            email_archiving: None,
            domain: None,
            mail_from_domain: None,
            sending_enabled: true,
        }
    }
}

impl EmailConfig {
    /// Tracking config, only when switched on
    pub fn active_tracking(&self) -> Option<&TrackingConfig> {
        self.tracking.as_ref().filter(|t| t.enabled)
    }

    /// Event pipeline config, only when switched on
    pub fn active_event_tracking(&self) -> Option<&EventTrackingConfig> {
        self.event_tracking.as_ref().filter(|e| e.enabled)
    }

    /// Archiving config, only when switched on
    pub fn active_archiving(&self) -> Option<&EmailArchivingConfig> {
        self.email_archiving.as_ref().filter(|a| a.enabled)
    }

    /// History storage requires the event pipeline to feed it
    pub fn history_enabled(&self) -> bool {
        self.active_event_tracking()
            .map(|e| e.dynamo_db_history)
            .unwrap_or(false)
    }

    /// Return a copy with the sending domain replaced
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Open/click tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingConfig {
    pub enabled: bool,
    #[serde(default)]
    pub opens: bool,
    #[serde(default)]
    pub clicks: bool,
    /// Branded redirect host for tracked links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_redirect_domain: Option<String>,
}

/// Reasons an address lands on the suppression list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuppressionReason {
    Bounce,
    Complaint,
}

/// Suppression list handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuppressionListConfig {
    pub enabled: bool,
    #[serde(default)]
    pub reasons: Vec<SuppressionReason>,
}

/// Lifecycle events a send can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailEventType {
    Send,
    Delivery,
    Open,
    Click,
    Bounce,
    Complaint,
    Reject,
    RenderingFailure,
    DeliveryDelay,
    Subscription,
}

impl EmailEventType {
    /// Every event type, in provider order
    pub const ALL: [EmailEventType; 10] = [
        EmailEventType::Send,
        EmailEventType::Delivery,
        EmailEventType::Open,
        EmailEventType::Click,
        EmailEventType::Bounce,
        EmailEventType::Complaint,
        EmailEventType::Reject,
        EmailEventType::RenderingFailure,
        EmailEventType::DeliveryDelay,
        EmailEventType::Subscription,
    ];
}

/// Event routing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrackingConfig {
    pub enabled: bool,
    /// Publish events on the event bus
    #[serde(default)]
    pub event_bridge: bool,
    #[serde(default)]
    pub events: Vec<EmailEventType>,
    /// Persist events into the history table
    #[serde(default, rename = "dynamoDBHistory")]
    pub dynamo_db_history: bool,
    #[serde(default)]
    pub archive_retention: ArchiveRetention,
}

/// Message archiving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailArchivingConfig {
    pub enabled: bool,
    #[serde(default)]
    pub retention: ArchiveRetention,
}

/// How long history and archives are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum ArchiveRetention {
    #[serde(rename = "7days")]
    SevenDays,
    #[serde(rename = "30days")]
    ThirtyDays,
    #[default]
    #[serde(rename = "90days")]
    NinetyDays,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year")]
    OneYear,
    #[serde(rename = "18months")]
    EighteenMonths,
    #[serde(rename = "indefinite")]
    Indefinite,
}

impl ArchiveRetention {
    /// Retention in days; `None` means records never expire
    pub fn days(self) -> Option<u32> {
        match self {
            ArchiveRetention::SevenDays => Some(7),
            ArchiveRetention::ThirtyDays => Some(30),
            ArchiveRetention::NinetyDays => Some(90),
            ArchiveRetention::SixMonths => Some(180),
            ArchiveRetention::OneYear => Some(365),
            ArchiveRetention::EighteenMonths => Some(545),
            ArchiveRetention::Indefinite => None,
        }
    }

    /// Months of data held at steady state, for storage estimates.
    ///
    /// Indefinite retention is planned as two years.
    pub fn months_for_estimate(self) -> f64 {
        match self {
            ArchiveRetention::SevenDays => 0.25,
            ArchiveRetention::ThirtyDays => 1.0,
            ArchiveRetention::NinetyDays => 3.0,
            ArchiveRetention::SixMonths => 6.0,
            ArchiveRetention::OneYear => 12.0,
            ArchiveRetention::EighteenMonths => 18.0,
            ArchiveRetention::Indefinite => 24.0,
        }
    }

    /// Wire name (`7days`, `1year`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveRetention::SevenDays => "7days",
            ArchiveRetention::ThirtyDays => "30days",
            ArchiveRetention::NinetyDays => "90days",
            ArchiveRetention::SixMonths => "6months",
            ArchiveRetention::OneYear => "1year",
            ArchiveRetention::EighteenMonths => "18months",
            ArchiveRetention::Indefinite => "indefinite",
        }
    }
}

impl std::fmt::Display for ArchiveRetention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ArchiveRetention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7days" => Ok(ArchiveRetention::SevenDays),
            "30days" => Ok(ArchiveRetention::ThirtyDays),
            "90days" => Ok(ArchiveRetention::NinetyDays),
            "6months" => Ok(ArchiveRetention::SixMonths),
            "1year" => Ok(ArchiveRetention::OneYear),
            "18months" => Ok(ArchiveRetention::EighteenMonths),
            "indefinite" => Ok(ArchiveRetention::Indefinite),
            other => Err(format!("unknown retention: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_days_ordering() {
        let days = |r: ArchiveRetention| r.days().unwrap();
        assert!(days(ArchiveRetention::SevenDays) < days(ArchiveRetention::ThirtyDays));
        assert!(days(ArchiveRetention::ThirtyDays) < days(ArchiveRetention::NinetyDays));
        assert!(days(ArchiveRetention::NinetyDays) < days(ArchiveRetention::OneYear));
        assert_eq!(ArchiveRetention::Indefinite.days(), None);
    }

    #[test]
    fn test_retention_months_table() {
        assert_eq!(ArchiveRetention::SevenDays.months_for_estimate(), 0.25);
        assert_eq!(ArchiveRetention::ThirtyDays.months_for_estimate(), 1.0);
        assert_eq!(ArchiveRetention::NinetyDays.months_for_estimate(), 3.0);
        assert_eq!(ArchiveRetention::OneYear.months_for_estimate(), 12.0);
        assert_eq!(ArchiveRetention::Indefinite.months_for_estimate(), 24.0);
    }

    #[test]
    fn test_retention_wire_names() {
        let json = serde_json::to_string(&ArchiveRetention::OneYear).unwrap();
        assert_eq!(json, "\"1year\"");
        assert_eq!("7days".parse::<ArchiveRetention>(), Ok(ArchiveRetention::SevenDays));
    }

    #[test]
    fn test_event_tracking_history_field_name() {
        let config = EventTrackingConfig {
            enabled: true,
            event_bridge: true,
            events: vec![EmailEventType::Send, EmailEventType::RenderingFailure],
            dynamo_db_history: true,
            archive_retention: ArchiveRetention::ThirtyDays,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"dynamoDBHistory\":true"));
        assert!(json.contains("\"RENDERING_FAILURE\""));
        assert!(json.contains("\"archiveRetention\":\"30days\""));
    }

    #[test]
    fn test_history_requires_event_tracking() {
        let config = EmailConfig {
            event_tracking: Some(EventTrackingConfig {
                enabled: false,
                event_bridge: false,
                events: vec![],
                dynamo_db_history: true,
                archive_retention: ArchiveRetention::default(),
            }),
            ..Default::default()
        };
        assert!(!config.history_enabled());
    }
}
