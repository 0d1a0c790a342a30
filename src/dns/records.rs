//! Required DNS Records
//!
//! The records a sending domain must publish, derived from the domain,
//! its signing tokens and the deployment region.

use serde::{Deserialize, Serialize};

use super::resolver::RecordType;

pub const DKIM_HOST: &str = "dkim.amazonses.com";
pub const SPF_INCLUDE: &str = "include:amazonses.com";
pub const SPF_RECORD: &str = "v=spf1 include:amazonses.com ~all";
pub const DMARC_PREFIX: &str = "v=DMARC1";
pub const DMARC_RECORD: &str = "v=DMARC1; p=none;";

/// Bounce feedback endpoint for a region
pub fn feedback_host(region: &str) -> String {
    format!("feedback-smtp.{}.amazonses.com", region)
}

/// Shared open/click redirect host for a region
pub fn tracking_host(region: &str) -> String {
    format!("r.{}.awstrack.me", region)
}

/// Which requirement a record satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordPurpose {
    Dkim,
    Spf,
    Dmarc,
    MailFromMx,
    MailFromSpf,
    Tracking,
}

impl std::fmt::Display for RecordPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RecordPurpose::Dkim => "DKIM",
            RecordPurpose::Spf => "SPF",
            RecordPurpose::Dmarc => "DMARC",
            RecordPurpose::MailFromMx => "MAIL FROM MX",
            RecordPurpose::MailFromSpf => "MAIL FROM SPF",
            RecordPurpose::Tracking => "Tracking",
        };
        f.write_str(label)
    }
}

/// Inputs beyond the domain itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainExpectations {
    pub region: String,
    pub dkim_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_from_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_domain: Option<String>,
    /// Cloud-side verification flag, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ses_verified: Option<bool>,
}

impl DomainExpectations {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }
}

/// A record to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredRecord {
    pub purpose: RecordPurpose,
    pub name: String,
    pub record_type: RecordType,
    pub value: String,
}

/// Every record `domain` needs
pub fn required_records(domain: &str, expectations: &DomainExpectations) -> Vec<RequiredRecord> {
    let mut records: Vec<RequiredRecord> = expectations
        .dkim_tokens
        .iter()
        .map(|token| RequiredRecord {
            purpose: RecordPurpose::Dkim,
            name: format!("{}._domainkey.{}", token, domain),
            record_type: RecordType::CNAME,
            value: format!("{}.{}", token, DKIM_HOST),
        })
        .collect();

    records.push(RequiredRecord {
        purpose: RecordPurpose::Spf,
        name: domain.to_string(),
        record_type: RecordType::TXT,
        value: SPF_RECORD.to_string(),
    });
    records.push(RequiredRecord {
        purpose: RecordPurpose::Dmarc,
        name: format!("_dmarc.{}", domain),
        record_type: RecordType::TXT,
        value: DMARC_RECORD.to_string(),
    });

    if let Some(mail_from) = &expectations.mail_from_domain {
        records.push(RequiredRecord {
            purpose: RecordPurpose::MailFromMx,
            name: mail_from.clone(),
            record_type: RecordType::MX,
            value: format!("10 {}", feedback_host(&expectations.region)),
        });
        records.push(RequiredRecord {
            purpose: RecordPurpose::MailFromSpf,
            name: mail_from.clone(),
            record_type: RecordType::TXT,
            value: SPF_RECORD.to_string(),
        });
    }

    if let Some(redirect) = &expectations.redirect_domain {
        records.push(RequiredRecord {
            purpose: RecordPurpose::Tracking,
            name: redirect.clone(),
            record_type: RecordType::CNAME,
            value: tracking_host(&expectations.region),
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_records_cover_optional_domains() {
        let mut expectations = DomainExpectations::new("eu-west-1");
        expectations.dkim_tokens = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(required_records("example.com", &expectations).len(), 5);

        expectations.mail_from_domain = Some("bounce.example.com".into());
        expectations.redirect_domain = Some("links.example.com".into());
        let records = required_records("example.com", &expectations);
        assert_eq!(records.len(), 8);

        let mx = records
            .iter()
            .find(|r| r.purpose == RecordPurpose::MailFromMx)
            .unwrap();
        assert_eq!(mx.value, "10 feedback-smtp.eu-west-1.amazonses.com");

        let tracking = records.last().unwrap();
        assert_eq!(tracking.value, "r.eu-west-1.awstrack.me");
        assert_eq!(records[0].name, "a._domainkey.example.com");
    }
}
