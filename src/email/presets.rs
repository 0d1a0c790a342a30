//! Configuration Presets
//!
//! Canned feature bundles offered in place of answering every question.

use serde::{Deserialize, Serialize};

use super::config::{
    ArchiveRetention, EmailArchivingConfig, EmailConfig, EmailEventType, EventTrackingConfig,
    SuppressionListConfig, SuppressionReason, TrackingConfig,
};

/// Named preset for the email service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailPreset {
    Starter,
    Production,
    Enterprise,
}

impl EmailPreset {
    /// Build the configuration this preset stands for
    pub fn config(self) -> EmailConfig {
        match self {
            EmailPreset::Starter => starter(),
            EmailPreset::Production => production(),
            EmailPreset::Enterprise => enterprise(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmailPreset::Starter => "starter",
            EmailPreset::Production => "production",
            EmailPreset::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for EmailPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EmailPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starter" => Ok(EmailPreset::Starter),
            "production" => Ok(EmailPreset::Production),
            "enterprise" => Ok(EmailPreset::Enterprise),
            other => Err(format!(
                "unknown preset '{other}' (expected starter, production or enterprise)"
            )),
        }
    }
}

fn starter() -> EmailConfig {
    EmailConfig {
        tracking: Some(TrackingConfig {
            enabled: true,
            opens: true,
            clicks: true,
            custom_redirect_domain: None,
        }),
        tls_required: true,
        reputation_metrics: true,
        suppression_list: Some(SuppressionListConfig {
            enabled: true,
            reasons: vec![SuppressionReason::Bounce, SuppressionReason::Complaint],
        }),
        ..Default::default()
    }
}

fn production() -> EmailConfig {
    EmailConfig {
        event_tracking: Some(EventTrackingConfig {
            enabled: true,
            event_bridge: true,
            events: vec![
                EmailEventType::Send,
                EmailEventType::Delivery,
                EmailEventType::Open,
                EmailEventType::Click,
                EmailEventType::Bounce,
                EmailEventType::Complaint,
            ],
            dynamo_db_history: true,
            archive_retention: ArchiveRetention::NinetyDays,
        }),
        ..starter()
    }
}

fn enterprise() -> EmailConfig {
    EmailConfig {
        event_tracking: Some(EventTrackingConfig {
            enabled: true,
            event_bridge: true,
            events: EmailEventType::ALL.to_vec(),
            dynamo_db_history: true,
            archive_retention: ArchiveRetention::OneYear,
        }),
        dedicated_ip: true,
        email_archiving: Some(EmailArchivingConfig {
            enabled: true,
            retention: ArchiveRetention::OneYear,
        }),
        ..production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_escalate() {
        let starter = EmailPreset::Starter.config();
        let production = EmailPreset::Production.config();
        let enterprise = EmailPreset::Enterprise.config();

        assert!(starter.active_event_tracking().is_none());
        assert!(production.history_enabled());
        assert!(!production.dedicated_ip);
        assert!(enterprise.dedicated_ip);
        assert_eq!(
            enterprise.active_event_tracking().unwrap().events.len(),
            EmailEventType::ALL.len()
        );
        assert!(enterprise.active_archiving().is_some());
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!("Production".parse::<EmailPreset>(), Ok(EmailPreset::Production));
        assert!("custom".parse::<EmailPreset>().is_err());
    }
}
