//! Metadata Format Migration
//!
//! Documents are read through a tagged read path: the current shape is
//! recognised by its `services` map, the pre-multi-service shape by a flat
//! `emailConfig` field with no `services`. Anything else is rejected, as is
//! any document stamped with a version newer than this build understands.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::types::{
    ConnectionMetadata, HostingProvider, ProviderConfig, ServiceConfig, Services,
    METADATA_VERSION,
};
use crate::email::{EmailConfig, EmailPreset};

/// Single-service record written before `services` existed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConnectionMetadata {
    #[serde(default)]
    pub version: Option<String>,
    pub account_id: String,
    pub region: String,
    pub provider: HostingProvider,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub provider_config: Option<ProviderConfig>,
    #[serde(default)]
    pub preset: Option<EmailPreset>,
    pub email_config: EmailConfig,
    #[serde(default)]
    pub pulumi_stack_name: Option<String>,
}

impl LegacyConnectionMetadata {
    /// Lift into the current shape, nesting the config under `services.email`
    pub fn migrate(self) -> ConnectionMetadata {
        ConnectionMetadata {
            version: METADATA_VERSION.to_string(),
            account_id: self.account_id,
            region: self.region,
            provider: self.provider,
            timestamp: self.timestamp,
            provider_config: self.provider_config,
            services: Services {
                email: Some(ServiceConfig {
                    preset: self.preset,
                    config: self.email_config,
                    pulumi_stack_name: self.pulumi_stack_name,
                    deployed_at: self.timestamp,
                }),
                sms: None,
            },
        }
    }
}

/// A document as found on disk
#[derive(Debug, Clone)]
pub enum StoredDocument {
    Current(ConnectionMetadata),
    Legacy(LegacyConnectionMetadata),
}

/// Why a document could not be read
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized metadata format (neither `services` nor `emailConfig` present)")]
    Unrecognized,
    #[error("metadata version {found} is not supported (this build reads up to {supported})")]
    UnsupportedVersion {
        found: String,
        supported: &'static str,
    },
}

/// `major.minor.patch` as a comparable tuple
fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version.trim().splitn(3, '.').map(|p| p.parse::<u64>().ok());
    Some((parts.next()??, parts.next()??, parts.next()??))
}

/// Reject versions this build cannot read without losing data
fn check_version(doc: &Value) -> Result<(), FormatError> {
    let Some(found) = doc.get("version").and_then(Value::as_str) else {
        return Ok(());
    };
    if found.is_empty() {
        return Ok(());
    }

    let unsupported = || FormatError::UnsupportedVersion {
        found: found.to_string(),
        supported: METADATA_VERSION,
    };
    match (parse_version(found), parse_version(METADATA_VERSION)) {
        (Some(found), Some(current)) if found <= current => Ok(()),
        _ => Err(unsupported()),
    }
}

/// Structural sniff: legacy iff `emailConfig` present and `services` absent
pub fn is_legacy_shape(doc: &Value) -> bool {
    doc.get("emailConfig").is_some() && doc.get("services").is_none()
}

/// Parse raw JSON into one of the known shapes
pub fn parse_document(raw: &str) -> Result<StoredDocument, FormatError> {
    let doc: Value = serde_json::from_str(raw)?;
    check_version(&doc)?;

    if doc.get("services").is_some() {
        return Ok(StoredDocument::Current(serde_json::from_value(doc)?));
    }
    if is_legacy_shape(&doc) {
        return Ok(StoredDocument::Legacy(serde_json::from_value(doc)?));
    }
    Err(FormatError::Unrecognized)
}

/// Outcome of bringing a document to the current format
#[derive(Debug, Clone)]
pub struct Upgraded {
    pub metadata: ConnectionMetadata,
    /// True when the on-disk form must be rewritten
    pub changed: bool,
}

/// Bring any recognised document to the latest format
pub fn upgrade(doc: StoredDocument) -> Upgraded {
    match doc {
        StoredDocument::Legacy(legacy) => Upgraded {
            metadata: legacy.migrate(),
            changed: true,
        },
        StoredDocument::Current(mut metadata) => {
            let changed = metadata.version != METADATA_VERSION;
            if changed {
                metadata.version = METADATA_VERSION.to_string();
            }
            Upgraded { metadata, changed }
        }
    }
}
