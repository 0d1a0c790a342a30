//! DNS Resolution
//!
//! Lookups go to public DNS-over-HTTPS resolvers rather than the system
//! resolver, so split-horizon setups cannot mask propagation problems.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Public resolvers, tried in order
pub const DOH_ENDPOINTS: [&str; 2] = [
    "https://cloudflare-dns.com/dns-query",
    "https://dns.google/resolve",
];

const NOERROR: u32 = 0;
const NXDOMAIN: u32 = 3;

/// Record types the verifier queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    #[allow(clippy::upper_case_acronyms)]
    CNAME,
    #[allow(clippy::upper_case_acronyms)]
    TXT,
    MX,
}

impl RecordType {
    /// Wire type code
    pub fn code(self) -> u16 {
        match self {
            RecordType::CNAME => 5,
            RecordType::MX => 15,
            RecordType::TXT => 16,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::CNAME => "CNAME",
            RecordType::TXT => "TXT",
            RecordType::MX => "MX",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// NXDOMAIN or no answer of the requested type
    #[error("no {record_type} record for {name}")]
    NotFound { name: String, record_type: RecordType },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Resolves record values for a name.
///
/// TXT values come back unquoted with character-strings joined; MX values
/// as `<priority> <host>`.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, ResolveError>;
}

/// DoH JSON response body
#[derive(Debug, Clone, Deserialize)]
pub struct DohResponse {
    #[serde(rename = "Status")]
    pub status: u32,
    #[serde(rename = "Answer", default)]
    pub answer: Vec<DohAnswer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DohAnswer {
    #[serde(rename = "type")]
    pub record_type: u16,
    pub data: String,
}

/// Map a DoH response to record values
pub fn parse_doh_response(
    response: &DohResponse,
    name: &str,
    record_type: RecordType,
) -> Result<Vec<String>, ResolveError> {
    let not_found = || ResolveError::NotFound {
        name: name.to_string(),
        record_type,
    };

    match response.status {
        NOERROR => {}
        NXDOMAIN => return Err(not_found()),
        rcode => {
            return Err(ResolveError::Other(anyhow::anyhow!(
                "resolver returned rcode {} for {} {}",
                rcode,
                record_type,
                name
            )))
        }
    }

    let values: Vec<String> = response
        .answer
        .iter()
        .filter(|a| a.record_type == record_type.code())
        .map(|a| match record_type {
            RecordType::TXT => unquote_txt(&a.data),
            _ => a.data.clone(),
        })
        .collect();

    if values.is_empty() {
        return Err(not_found());
    }
    Ok(values)
}

/// `"v=spf1 " "include:x ~all"` -> `v=spf1 include:x ~all`
fn unquote_txt(data: &str) -> String {
    let trimmed = data.trim();
    if !trimmed.starts_with('"') {
        return trimmed.to_string();
    }
    trimmed
        .split('"')
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, chunk)| chunk)
        .collect()
}

/// DNS-over-HTTPS resolver
pub struct DohResolver {
    http_client: Client,
    endpoints: Vec<String>,
}

impl DohResolver {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_endpoints(DOH_ENDPOINTS.iter().map(|e| e.to_string()).collect())
    }

    pub fn with_endpoints(endpoints: Vec<String>) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            endpoints,
        })
    }

    async fn query(
        &self,
        endpoint: &str,
        name: &str,
        record_type: RecordType,
    ) -> anyhow::Result<DohResponse> {
        let response = self
            .http_client
            .get(endpoint)
            .query(&[("name", name), ("type", record_type.as_str())])
            .header("accept", "application/dns-json")
            .send()
            .await
            .with_context(|| format!("Failed to query {}", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} returned {}", endpoint, status);
        }

        response
            .json()
            .await
            .with_context(|| format!("Invalid DoH response from {}", endpoint))
    }
}

#[async_trait]
impl DnsResolver for DohResolver {
    async fn resolve(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, ResolveError> {
        let mut last_error = None;

        for endpoint in &self.endpoints {
            match self.query(endpoint, name, record_type).await {
                Ok(response) => match parse_doh_response(&response, name, record_type) {
                    Err(ResolveError::Other(e)) => {
                        warn!("{} failed for {} {}: {}", endpoint, record_type, name, e);
                        last_error = Some(e);
                    }
                    result => {
                        debug!("Resolved {} {} via {}", record_type, name, endpoint);
                        return result;
                    }
                },
                Err(e) => {
                    warn!("DoH lookup failed: {:#}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(ResolveError::Other(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("no DNS resolvers configured")
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> DohResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_nxdomain_is_not_found() {
        let r = response(r#"{"Status": 3, "Question": [{"name": "nope.example.com.", "type": 16}]}"#);
        assert!(matches!(
            parse_doh_response(&r, "nope.example.com", RecordType::TXT),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_no_data_is_not_found() {
        let r = response(
            r#"{"Status": 0, "Answer": [{"name": "www.example.com.", "type": 5, "TTL": 300, "data": "example.com."}]}"#,
        );
        assert!(matches!(
            parse_doh_response(&r, "www.example.com", RecordType::TXT),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_servfail_is_an_error() {
        let r = response(r#"{"Status": 2}"#);
        assert!(matches!(
            parse_doh_response(&r, "example.com", RecordType::MX),
            Err(ResolveError::Other(_))
        ));
    }

    #[test]
    fn test_txt_chunks_are_joined() {
        let r = response(
            r#"{"Status": 0, "Answer": [
                {"name": "example.com.", "type": 16, "TTL": 300, "data": "\"v=spf1 \" \"include:amazonses.com ~all\""},
                {"name": "example.com.", "type": 16, "TTL": 300, "data": "\"google-site-verification=abc\""}
            ]}"#,
        );
        let values = parse_doh_response(&r, "example.com", RecordType::TXT).unwrap();
        assert_eq!(values[0], "v=spf1 include:amazonses.com ~all");
        assert_eq!(values[1], "google-site-verification=abc");
    }
}
