//! Connection Metadata Types
//!
//! One [`ConnectionMetadata`] per (account, region) describes which services
//! are deployed there and with what configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::email::{EmailConfig, EmailPreset};

/// Current on-disk format version
pub const METADATA_VERSION: &str = "2.0.0";

/// Hosting platform the operator's application runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostingProvider {
    Aws,
    Vercel,
    Railway,
    Other,
}

impl std::fmt::Display for HostingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostingProvider::Aws => write!(f, "aws"),
            HostingProvider::Vercel => write!(f, "vercel"),
            HostingProvider::Railway => write!(f, "railway"),
            HostingProvider::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for HostingProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(HostingProvider::Aws),
            "vercel" => Ok(HostingProvider::Vercel),
            "railway" => Ok(HostingProvider::Railway),
            "other" => Ok(HostingProvider::Other),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Platform linkage needed for federated-credential flows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Keys this version does not model, kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A deployed service within a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig<C, P> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<P>,
    pub config: C,
    /// IaC stack backing the service; absent means nothing was ever applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulumi_stack_name: Option<String>,
    pub deployed_at: DateTime<Utc>,
}

impl<C, P> ServiceConfig<C, P> {
    /// Live infrastructure exists only once a stack was applied
    pub fn is_deployed(&self) -> bool {
        self.pulumi_stack_name.is_some()
    }
}

/// SMS phone number flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhoneNumberType {
    Simulator,
    TollFree,
    TenDlc,
    ShortCode,
}

/// SMS service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsConfig {
    pub phone_number_type: PhoneNumberType,
    #[serde(default)]
    pub opt_out_list: bool,
    #[serde(default)]
    pub event_tracking: bool,
}

/// SMS presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsPreset {
    Starter,
    Production,
}

/// Services deployable within one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    Email,
    Sms,
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceName::Email => write!(f, "email"),
            ServiceName::Sms => write!(f, "sms"),
        }
    }
}

/// Per-service slots of a connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Services {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<ServiceConfig<EmailConfig, EmailPreset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms: Option<ServiceConfig<SmsConfig, SmsPreset>>,
}

/// Binds a service name to its config and preset types
pub trait ManagedService {
    const NAME: ServiceName;
    type Config;
    type Preset;

    fn slot(services: &Services) -> &Option<ServiceConfig<Self::Config, Self::Preset>>;
    fn slot_mut(services: &mut Services) -> &mut Option<ServiceConfig<Self::Config, Self::Preset>>;
}

/// Marker for the email service
pub struct Email;

impl ManagedService for Email {
    const NAME: ServiceName = ServiceName::Email;
    type Config = EmailConfig;
    type Preset = EmailPreset;

    fn slot(services: &Services) -> &Option<ServiceConfig<EmailConfig, EmailPreset>> {
        &services.email
    }

    fn slot_mut(services: &mut Services) -> &mut Option<ServiceConfig<EmailConfig, EmailPreset>> {
        &mut services.email
    }
}

/// Marker for the SMS service
pub struct Sms;

impl ManagedService for Sms {
    const NAME: ServiceName = ServiceName::Sms;
    type Config = SmsConfig;
    type Preset = SmsPreset;

    fn slot(services: &Services) -> &Option<ServiceConfig<SmsConfig, SmsPreset>> {
        &services.sms
    }

    fn slot_mut(services: &mut Services) -> &mut Option<ServiceConfig<SmsConfig, SmsPreset>> {
        &mut services.sms
    }
}

/// Everything deployed for one (account, region)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetadata {
    /// Empty when read from a document that predates versioning
    #[serde(default)]
    pub version: String,
    pub account_id: String,
    pub region: String,
    pub provider: HostingProvider,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<ProviderConfig>,
    pub services: Services,
}

impl ConnectionMetadata {
    /// Fresh record with no services
    pub fn new(account_id: &str, region: &str, provider: HostingProvider) -> Self {
        Self {
            version: METADATA_VERSION.to_string(),
            account_id: account_id.to_string(),
            region: region.to_string(),
            provider,
            timestamp: Utc::now(),
            provider_config: None,
            services: Services::default(),
        }
    }

    /// Mark the record as modified now
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }

    /// Add (or replace) a service entry
    pub fn add_service<S: ManagedService>(
        &mut self,
        config: S::Config,
        preset: Option<S::Preset>,
        pulumi_stack_name: Option<String>,
    ) {
        *S::slot_mut(&mut self.services) = Some(ServiceConfig {
            preset,
            config,
            pulumi_stack_name,
            deployed_at: Utc::now(),
        });
        self.touch();
    }

    /// Replace a service's configuration; returns false if the service is absent
    pub fn update_service_config<S: ManagedService>(&mut self, config: S::Config) -> bool {
        match S::slot_mut(&mut self.services) {
            Some(service) => {
                service.config = config;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Typed access to a service entry
    pub fn service<S: ManagedService>(&self) -> Option<&ServiceConfig<S::Config, S::Preset>> {
        S::slot(&self.services).as_ref()
    }

    /// Typed mutable access to a service entry
    pub fn service_mut<S: ManagedService>(
        &mut self,
    ) -> Option<&mut ServiceConfig<S::Config, S::Preset>> {
        S::slot_mut(&mut self.services).as_mut()
    }

    /// Drop a service entry; returns whether it existed
    pub fn remove_service(&mut self, name: ServiceName) -> bool {
        let removed = match name {
            ServiceName::Email => self.services.email.take().is_some(),
            ServiceName::Sms => self.services.sms.take().is_some(),
        };
        if removed {
            self.touch();
        }
        removed
    }

    pub fn has_service(&self, name: ServiceName) -> bool {
        match name {
            ServiceName::Email => self.services.email.is_some(),
            ServiceName::Sms => self.services.sms.is_some(),
        }
    }

    /// Names of every configured service
    pub fn configured_services(&self) -> Vec<ServiceName> {
        [ServiceName::Email, ServiceName::Sms]
            .into_iter()
            .filter(|name| self.has_service(*name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_helpers() {
        let mut meta = ConnectionMetadata::new("123456789012", "us-east-1", HostingProvider::Vercel);
        assert!(meta.configured_services().is_empty());

        meta.add_service::<Email>(
            EmailPreset::Starter.config(),
            Some(EmailPreset::Starter),
            Some("mailplane-123456789012-us-east-1".to_string()),
        );
        assert!(meta.has_service(ServiceName::Email));
        assert!(!meta.has_service(ServiceName::Sms));
        assert!(meta.service::<Email>().unwrap().is_deployed());

        let updated = meta.update_service_config::<Email>(EmailPreset::Production.config());
        assert!(updated);
        assert!(meta.service::<Email>().unwrap().config.history_enabled());

        assert!(!meta.update_service_config::<Sms>(SmsConfig {
            phone_number_type: PhoneNumberType::Simulator,
            opt_out_list: false,
            event_tracking: false,
        }));

        assert!(meta.remove_service(ServiceName::Email));
        assert!(!meta.remove_service(ServiceName::Email));
        assert!(meta.configured_services().is_empty());
    }

    #[test]
    fn test_service_without_stack_is_not_deployed() {
        let mut meta = ConnectionMetadata::new("1", "us-east-1", HostingProvider::Aws);
        meta.add_service::<Email>(EmailConfig::default(), None, None);
        assert!(!meta.service::<Email>().unwrap().is_deployed());
    }

    #[test]
    fn test_service_without_preset_or_stack_parses() {
        let json = r#"{"config": {"tlsRequired": true}, "deployedAt": "2024-05-01T12:00:00Z"}"#;
        let service: ServiceConfig<EmailConfig, EmailPreset> = serde_json::from_str(json).unwrap();
        assert!(service.preset.is_none());
        assert!(!service.is_deployed());

        let json = r#"{"phoneNumberType": "simulator"}"#;
        let sms: SmsConfig = serde_json::from_str(json).unwrap();
        let service = ServiceConfig::<SmsConfig, SmsPreset> {
            preset: None,
            config: sms,
            pulumi_stack_name: None,
            deployed_at: Utc::now(),
        };
        let back = serde_json::to_value(&service).unwrap();
        assert!(back.get("preset").is_none());
        assert!(back.get("pulumiStackName").is_none());
    }

    #[test]
    fn test_provider_config_keeps_unknown_keys() {
        let json = r#"{"teamSlug":"acme","projectName":"web","oidcIssuer":"https://oidc.vercel.com/acme"}"#;
        let config: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.team_slug.as_deref(), Some("acme"));
        assert!(config.extra.contains_key("oidcIssuer"));

        let back = serde_json::to_string(&config).unwrap();
        assert!(back.contains("oidcIssuer"));
    }
}
