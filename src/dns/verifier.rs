//! Domain Verifier
//!
//! Resolves each required record independently and classifies it as
//! verified, incorrect or missing. Cloud-side verification state is carried
//! alongside but never overrides what public DNS actually serves.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::records::{
    required_records, DomainExpectations, RecordPurpose, RequiredRecord, DKIM_HOST, DMARC_PREFIX,
    SPF_INCLUDE,
};
use super::resolver::{DnsResolver, RecordType, ResolveError};

/// Classification of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Verified,
    Incorrect,
    Missing,
}

/// Cloud-side identity status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SesStatus {
    Verified,
    Pending,
    Unknown,
}

impl From<Option<bool>> for SesStatus {
    fn from(verified: Option<bool>) -> Self {
        match verified {
            Some(true) => SesStatus::Verified,
            Some(false) => SesStatus::Pending,
            None => SesStatus::Unknown,
        }
    }
}

/// DNS-side health of a domain as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Verified,
    Incomplete,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallStatus::Verified => write!(f, "fully verified"),
            OverallStatus::Incomplete => write!(f, "some records incorrect or missing"),
        }
    }
}

/// Outcome for one required record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCheck {
    pub purpose: RecordPurpose,
    pub name: String,
    pub record_type: RecordType,
    pub expected: String,
    pub found: Vec<String>,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RecordCheck {
    fn new(required: &RequiredRecord, found: Vec<String>, status: RecordStatus) -> Self {
        Self {
            purpose: required.purpose,
            name: required.name.clone(),
            record_type: required.record_type,
            expected: required.value.clone(),
            found,
            status,
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainVerification {
    pub domain: String,
    pub ses_status: SesStatus,
    pub records: Vec<RecordCheck>,
}

impl DomainVerification {
    /// Verified only when every record is
    pub fn overall(&self) -> OverallStatus {
        if !self.records.is_empty()
            && self
                .records
                .iter()
                .all(|r| r.status == RecordStatus::Verified)
        {
            OverallStatus::Verified
        } else {
            OverallStatus::Incomplete
        }
    }

    pub fn count(&self, status: RecordStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

fn normalize_host(value: &str) -> String {
    value.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// `10 host.` -> `host`
fn mx_host(value: &str) -> String {
    normalize_host(value.split_whitespace().last().unwrap_or(value))
}

fn is_spf(value: &str) -> bool {
    value.trim_start().to_ascii_lowercase().starts_with("v=spf1")
}

/// Classify resolved values against a requirement
pub fn classify(required: &RequiredRecord, found: &[String]) -> RecordStatus {
    let matched = match required.purpose {
        RecordPurpose::Dkim | RecordPurpose::Tracking => {
            let expected = normalize_host(&required.value);
            found.iter().any(|v| normalize_host(v) == expected)
        }
        RecordPurpose::Spf | RecordPurpose::MailFromSpf => {
            let policies: Vec<&String> = found.iter().filter(|v| is_spf(v)).collect();
            if policies.is_empty() {
                return RecordStatus::Missing;
            }
            policies.iter().any(|v| v.contains(SPF_INCLUDE))
        }
        RecordPurpose::Dmarc => found.iter().any(|v| {
            v.trim_start()
                .to_ascii_uppercase()
                .starts_with(&DMARC_PREFIX.to_ascii_uppercase())
        }),
        RecordPurpose::MailFromMx => {
            let expected = mx_host(&required.value);
            found.iter().any(|v| mx_host(v) == expected)
        }
    };

    if matched {
        RecordStatus::Verified
    } else {
        RecordStatus::Incorrect
    }
}

/// Stand-in check when no signing tokens are known; a domain is never fully
/// verified without its DKIM records
fn unknown_dkim(domain: &str) -> RecordCheck {
    RecordCheck {
        purpose: RecordPurpose::Dkim,
        name: format!("<token>._domainkey.{}", domain),
        record_type: RecordType::CNAME,
        expected: format!("<token>.{}", DKIM_HOST),
        found: Vec::new(),
        status: RecordStatus::Missing,
        note: Some("DKIM tokens unknown; could not check signing records".to_string()),
    }
}

/// Checks a domain's public DNS against what sending requires
#[derive(Clone)]
pub struct DnsVerifier {
    resolver: Arc<dyn DnsResolver>,
}

impl DnsVerifier {
    pub fn new(resolver: Arc<dyn DnsResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve and classify one record.
    ///
    /// A name that does not resolve is `Missing`; unexpected resolver
    /// failures are returned.
    pub async fn check(&self, required: &RequiredRecord) -> Result<RecordCheck, ResolveError> {
        match self.resolver.resolve(&required.name, required.record_type).await {
            Ok(found) => {
                let status = classify(required, &found);
                Ok(RecordCheck::new(required, found, status))
            }
            Err(ResolveError::NotFound { .. }) => {
                Ok(RecordCheck::new(required, Vec::new(), RecordStatus::Missing))
            }
            Err(e) => Err(e),
        }
    }

    /// Check every record `domain` needs, concurrently
    pub async fn verify_domain(
        &self,
        domain: &str,
        expectations: &DomainExpectations,
    ) -> DomainVerification {
        let required = required_records(domain, expectations);
        let results = join_all(required.iter().map(|r| self.check(r))).await;

        let mut records: Vec<RecordCheck> = required
            .iter()
            .zip(results)
            .map(|(req, result)| match result {
                Ok(check) => check,
                Err(e) => {
                    warn!("DNS lookup for {} {} failed: {}", req.record_type, req.name, e);
                    let mut check = RecordCheck::new(req, Vec::new(), RecordStatus::Missing);
                    check.note = Some(format!("lookup failed: {}", e));
                    check
                }
            })
            .collect();

        if expectations.dkim_tokens.is_empty() {
            warn!("No DKIM tokens known for {}, signing records not checked", domain);
            records.insert(0, unknown_dkim(domain));
        }

        let verification = DomainVerification {
            domain: domain.to_string(),
            ses_status: expectations.ses_verified.into(),
            records,
        };

        info!(
            "DNS for {}: {} ({} verified, {} incorrect, {} missing)",
            domain,
            verification.overall(),
            verification.count(RecordStatus::Verified),
            verification.count(RecordStatus::Incorrect),
            verification.count(RecordStatus::Missing)
        );
        verification
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeResolver;
    use super::*;

    fn expectations() -> DomainExpectations {
        DomainExpectations {
            region: "us-east-1".to_string(),
            dkim_tokens: vec!["tok1".into(), "tok2".into(), "tok3".into()],
            ses_verified: Some(true),
            ..Default::default()
        }
    }

    fn with_dkim(resolver: FakeResolver) -> FakeResolver {
        resolver
            .with("tok1._domainkey.example.com", RecordType::CNAME, &["tok1.dkim.amazonses.com."])
            .with("tok2._domainkey.example.com", RecordType::CNAME, &["tok2.dkim.amazonses.com"])
            .with("tok3._domainkey.example.com", RecordType::CNAME, &["TOK3.dkim.amazonses.com."])
    }

    #[tokio::test]
    async fn test_dkim_ok_but_no_spf_is_incomplete() {
        let resolver = with_dkim(FakeResolver::default())
            .with("_dmarc.example.com", RecordType::TXT, &["v=DMARC1; p=none;"]);
        let verifier = DnsVerifier::new(Arc::new(resolver));

        let result = verifier.verify_domain("example.com", &expectations()).await;

        assert_eq!(result.ses_status, SesStatus::Verified);
        assert_eq!(result.count(RecordStatus::Verified), 4);
        let spf = result
            .records
            .iter()
            .find(|r| r.purpose == RecordPurpose::Spf)
            .unwrap();
        assert_eq!(spf.status, RecordStatus::Missing);
        assert_eq!(result.overall(), OverallStatus::Incomplete);
    }

    #[tokio::test]
    async fn test_fully_verified_domain() {
        let resolver = with_dkim(FakeResolver::default())
            .with("example.com", RecordType::TXT, &["v=spf1 include:amazonses.com ~all"])
            .with("_dmarc.example.com", RecordType::TXT, &["v=DMARC1; p=reject"]);
        let verifier = DnsVerifier::new(Arc::new(resolver));

        let result = verifier.verify_domain("example.com", &expectations()).await;
        assert_eq!(result.overall(), OverallStatus::Verified);
    }

    #[tokio::test]
    async fn test_wrong_values_are_incorrect() {
        let resolver = FakeResolver::default()
            .with("example.com", RecordType::TXT, &["v=spf1 include:_spf.google.com ~all"])
            .with("_dmarc.example.com", RecordType::TXT, &["some-other-token"])
            .with("bounce.example.com", RecordType::MX, &["10 mx.other.net."])
            .with("links.example.com", RecordType::CNAME, &["r.us-east-1.awstrack.me."]);
        let verifier = DnsVerifier::new(Arc::new(resolver));

        let mut exp = expectations();
        exp.dkim_tokens.clear();
        exp.mail_from_domain = Some("bounce.example.com".into());
        exp.redirect_domain = Some("links.example.com".into());

        let result = verifier.verify_domain("example.com", &exp).await;
        let status = |purpose: RecordPurpose| {
            result
                .records
                .iter()
                .find(|r| r.purpose == purpose)
                .map(|r| r.status)
                .unwrap()
        };

        assert_eq!(status(RecordPurpose::Spf), RecordStatus::Incorrect);
        assert_eq!(status(RecordPurpose::Dmarc), RecordStatus::Incorrect);
        assert_eq!(status(RecordPurpose::MailFromMx), RecordStatus::Incorrect);
        assert_eq!(status(RecordPurpose::MailFromSpf), RecordStatus::Missing);
        assert_eq!(status(RecordPurpose::Tracking), RecordStatus::Verified);
    }

    #[tokio::test]
    async fn test_resolver_failure_is_absorbed_as_missing() {
        let resolver = FakeResolver::default().failing("example.com", RecordType::TXT);
        let verifier = DnsVerifier::new(Arc::new(resolver));

        let mut exp = expectations();
        exp.dkim_tokens.clear();

        let spf = crate::dns::required_records("example.com", &exp)
            .into_iter()
            .find(|r| r.purpose == RecordPurpose::Spf)
            .unwrap();
        assert!(verifier.check(&spf).await.is_err());

        let result = verifier.verify_domain("example.com", &exp).await;
        let check = result
            .records
            .iter()
            .find(|r| r.purpose == RecordPurpose::Spf)
            .unwrap();
        assert_eq!(check.status, RecordStatus::Missing);
        assert!(check.note.as_deref().unwrap().contains("lookup failed"));
    }

    #[tokio::test]
    async fn test_unknown_dkim_tokens_never_fully_verified() {
        let resolver = FakeResolver::default()
            .with("example.com", RecordType::TXT, &["v=spf1 include:amazonses.com ~all"])
            .with("_dmarc.example.com", RecordType::TXT, &["v=DMARC1; p=none;"]);
        let verifier = DnsVerifier::new(Arc::new(resolver));

        let result = verifier
            .verify_domain("example.com", &DomainExpectations::new("us-east-1"))
            .await;

        assert_eq!(result.records.len(), 3);
        assert_eq!(result.count(RecordStatus::Verified), 2);
        let dkim = &result.records[0];
        assert_eq!(dkim.purpose, RecordPurpose::Dkim);
        assert_eq!(dkim.status, RecordStatus::Missing);
        assert!(dkim.note.as_deref().unwrap().contains("DKIM tokens unknown"));
        assert_eq!(result.overall(), OverallStatus::Incomplete);
    }

    #[test]
    fn test_mx_with_priority_matches() {
        let required = RequiredRecord {
            purpose: RecordPurpose::MailFromMx,
            name: "bounce.example.com".into(),
            record_type: RecordType::MX,
            value: "10 feedback-smtp.us-east-1.amazonses.com".into(),
        };
        assert_eq!(
            classify(&required, &["20 feedback-smtp.us-east-1.amazonses.com.".to_string()]),
            RecordStatus::Verified
        );
    }
}
