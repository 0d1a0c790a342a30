//! Deployment Orchestrator
//!
//! One state machine per lifecycle command. Each starts with caller
//! identity, then loads or builds metadata, drives the IaC engine and
//! finally persists what was applied.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::confirm::{AutoConfirm, Confirm};
use super::iac::{IacEngine, IacError, StackOutputs};
use super::identity::{CallerIdentity, IdentityValidator};
use crate::config::stack_name_for;
use crate::cost::{estimate, format_cost, FeatureCostBreakdown};
use crate::dns::{
    provision_records, required_records, DnsProvisioning, DnsVerifier, DnsZoneManager,
    DomainExpectations, DomainVerification,
};
use crate::email::{validate, ConfigWarning, EmailConfig, EmailPreset};
use crate::error::DeployError;
use crate::metadata::{
    ConnectionMetadata, Email, HostingProvider, LoadResult, MetadataStore, ProviderConfig,
    ServiceName,
};
use crate::scanner::{
    check_managed_exist, filter_managed, IdentityKind, ResourceScanner, ScanSummary, SesIdentity,
};

/// Volume assumed for estimates when the operator gives none
pub const DEFAULT_MONTHLY_VOLUME: u64 = 10_000;

/// Input to [`Deployer::initialize`]
#[derive(Debug, Clone)]
pub struct InitRequest {
    pub provider: HostingProvider,
    pub provider_config: Option<ProviderConfig>,
    pub preset: Option<EmailPreset>,
    /// Custom configuration; takes precedence over `preset`
    pub config: Option<EmailConfig>,
    pub domain: Option<String>,
    pub emails_per_month: u64,
}

impl Default for InitRequest {
    fn default() -> Self {
        Self {
            provider: HostingProvider::Aws,
            provider_config: None,
            preset: None,
            config: None,
            domain: None,
            emails_per_month: DEFAULT_MONTHLY_VOLUME,
        }
    }
}

/// Input to [`Deployer::connect`]
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub provider: HostingProvider,
    pub provider_config: Option<ProviderConfig>,
    pub preset: Option<EmailPreset>,
    pub emails_per_month: u64,
}

impl Default for ConnectRequest {
    fn default() -> Self {
        Self {
            provider: HostingProvider::Aws,
            provider_config: None,
            preset: None,
            emails_per_month: DEFAULT_MONTHLY_VOLUME,
        }
    }
}

/// What an apply produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub account_id: String,
    pub region: String,
    pub stack_name: String,
    pub outputs: StackOutputs,
    pub cost: FeatureCostBreakdown,
    pub warnings: Vec<ConfigWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsProvisioning>,
}

/// Result of initialize and connect
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome", content = "detail")]
pub enum DeployOutcome {
    /// A record already exists; nothing was changed
    AlreadyConnected(ConnectionMetadata),
    Deployed(DeploymentSummary),
}

/// Result of restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub account_id: String,
    pub region: String,
    pub stack_name: Option<String>,
    pub stack_destroyed: bool,
    pub metadata_deleted: bool,
}

/// Read-only view of a connection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub identity: CallerIdentity,
    pub region: String,
    pub metadata: Option<ConnectionMetadata>,
    /// Set when the record exists but cannot be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrupt: Option<String>,
    pub managed: ScanSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<DomainVerification>,
}

/// Domain to seed a connected configuration with: the first domain
/// identity, else the domain part of the first address
pub fn seed_domain(identities: &[SesIdentity]) -> Option<String> {
    identities
        .iter()
        .find(|i| i.kind == IdentityKind::Domain)
        .or_else(|| identities.first())
        .map(|i| i.domain().to_string())
}

fn apply_error(e: IacError) -> DeployError {
    match e {
        IacError::Locked {
            stack, lock_dir, ..
        } => DeployError::StackLocked { stack, lock_dir },
        other => DeployError::ApplyFailed(other.to_string()),
    }
}

fn destroy_error(e: IacError) -> DeployError {
    match e {
        IacError::Locked {
            stack, lock_dir, ..
        } => DeployError::StackLocked { stack, lock_dir },
        other => DeployError::DestroyFailed(other.to_string()),
    }
}

struct NewDeployment {
    provider: HostingProvider,
    provider_config: Option<ProviderConfig>,
    preset: Option<EmailPreset>,
    config: EmailConfig,
    emails_per_month: u64,
}

/// Drives lifecycle commands for one region
pub struct Deployer {
    region: String,
    store: MetadataStore,
    identity: Arc<dyn IdentityValidator>,
    engine: Arc<dyn IacEngine>,
    scanner: ResourceScanner,
    verifier: DnsVerifier,
    zones: Option<Arc<dyn DnsZoneManager>>,
    confirm: Arc<dyn Confirm>,
}

impl Deployer {
    pub fn new(
        region: impl Into<String>,
        store: MetadataStore,
        identity: Arc<dyn IdentityValidator>,
        engine: Arc<dyn IacEngine>,
        scanner: ResourceScanner,
        verifier: DnsVerifier,
    ) -> Self {
        Self {
            region: region.into(),
            store,
            identity,
            engine,
            scanner,
            verifier,
            zones: None,
            confirm: Arc::new(AutoConfirm),
        }
    }

    /// Publish DNS records into matching hosted zones after apply
    pub fn with_zones(mut self, zones: Arc<dyn DnsZoneManager>) -> Self {
        self.zones = Some(zones);
        self
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Deploy fresh infrastructure for a new (account, region)
    pub async fn initialize(&self, request: InitRequest) -> Result<DeployOutcome, DeployError> {
        let identity = self.identity.validate().await?;

        if let Some(existing) = self.store.load(&identity.account_id, &self.region) {
            info!(
                "Account {} in {} is already connected; use `update` to re-apply",
                identity.account_id, self.region
            );
            return Ok(DeployOutcome::AlreadyConnected(existing));
        }

        let (preset, mut config) = match (request.config, request.preset) {
            (Some(config), preset) => (preset, config),
            (None, Some(preset)) => (Some(preset), preset.config()),
            (None, None) => (Some(EmailPreset::Starter), EmailPreset::Starter.config()),
        };
        if let Some(domain) = request.domain {
            config.domain = Some(domain);
        }

        let summary = self
            .deploy_new(
                &identity,
                NewDeployment {
                    provider: request.provider,
                    provider_config: request.provider_config,
                    preset,
                    config,
                    emails_per_month: request.emails_per_month,
                },
            )
            .await?;
        Ok(DeployOutcome::Deployed(summary))
    }

    /// Adopt a region that already has sending identities
    pub async fn connect(&self, request: ConnectRequest) -> Result<DeployOutcome, DeployError> {
        let identity = self.identity.validate().await?;

        if let Some(existing) = self.store.load(&identity.account_id, &self.region) {
            info!(
                "Account {} in {} is already connected",
                identity.account_id, self.region
            );
            return Ok(DeployOutcome::AlreadyConnected(existing));
        }

        let scan = self.scanner.scan_all().await;
        if scan.identities.is_empty() {
            return Err(DeployError::NothingToConnect {
                region: self.region.clone(),
            });
        }
        if check_managed_exist(&scan) {
            info!(
                "Found existing managed resources in {}: {}",
                self.region,
                filter_managed(&scan).summary()
            );
        }

        let preset = request.preset.unwrap_or(EmailPreset::Starter);
        let mut config = preset.config();
        config.domain = seed_domain(&scan.identities);

        let summary = self
            .deploy_new(
                &identity,
                NewDeployment {
                    provider: request.provider,
                    provider_config: request.provider_config,
                    preset: Some(preset),
                    config,
                    emails_per_month: request.emails_per_month,
                },
            )
            .await?;
        Ok(DeployOutcome::Deployed(summary))
    }

    /// Re-apply the stored configuration unchanged
    pub async fn update(&self, emails_per_month: u64) -> Result<DeploymentSummary, DeployError> {
        let identity = self.identity.validate().await?;
        let mut metadata = self.require_metadata(&identity)?;

        let (config, stack_name) = match metadata.service::<Email>() {
            None => return Err(self.not_connected(&identity)),
            Some(email) => match &email.pulumi_stack_name {
                None => {
                    return Err(DeployError::NotDeployed {
                        account_id: identity.account_id.clone(),
                        region: self.region.clone(),
                    })
                }
                Some(name) => (email.config.clone(), name.clone()),
            },
        };

        let warnings = self.advise(&config, emails_per_month);
        let cost = estimate(&config, emails_per_month);

        if !self.confirm.confirm(&format!(
            "Re-apply {} in account {} ({})?",
            stack_name, identity.account_id, self.region
        )) {
            return Err(DeployError::Aborted);
        }

        let outputs = self.apply(&stack_name, &identity.account_id, &config).await?;

        if let Some(email) = metadata.service_mut::<Email>() {
            email.deployed_at = Utc::now();
        }
        metadata.touch();
        self.store.save(&metadata)?;

        Ok(DeploymentSummary {
            account_id: identity.account_id,
            region: self.region.clone(),
            stack_name,
            outputs,
            cost,
            warnings,
            dns: None,
        })
    }

    /// Destroy the email stack, remove it from the engine, then drop metadata
    pub async fn restore(&self) -> Result<RestoreOutcome, DeployError> {
        let identity = self.identity.validate().await?;
        let mut metadata = self.require_metadata(&identity)?;

        let stack_name = metadata
            .service::<Email>()
            .and_then(|email| email.pulumi_stack_name.clone());

        if !self.confirm.confirm(&format!(
            "Destroy all email infrastructure in account {} ({})? This cannot be undone.",
            identity.account_id, self.region
        )) {
            return Err(DeployError::Aborted);
        }

        let mut stack_destroyed = false;
        match &stack_name {
            Some(name) => match self.engine.select_stack(name).await.map_err(destroy_error)? {
                Some(stack) => {
                    stack.destroy().await.map_err(destroy_error)?;
                    self.engine.remove_stack(name).await.map_err(destroy_error)?;
                    stack_destroyed = true;
                }
                None => info!("Stack {} not found, skipping destroy", name),
            },
            None => info!(
                "No stack recorded for account {} in {}, skipping destroy",
                identity.account_id, self.region
            ),
        }

        metadata.remove_service(ServiceName::Email);
        let metadata_deleted = if metadata.configured_services().is_empty() {
            self.store.delete(&identity.account_id, &self.region)?;
            true
        } else {
            self.store.save(&metadata)?;
            false
        };

        info!(
            "Restored account {} in {} (stack destroyed: {}, metadata deleted: {})",
            identity.account_id, self.region, stack_destroyed, metadata_deleted
        );

        Ok(RestoreOutcome {
            account_id: identity.account_id,
            region: self.region.clone(),
            stack_name,
            stack_destroyed,
            metadata_deleted,
        })
    }

    /// Metadata, managed resources and DNS health for this region
    pub async fn status(&self) -> Result<StatusReport, DeployError> {
        let identity = self.identity.validate().await?;

        let (metadata, corrupt) = match self.store.inspect(&identity.account_id, &self.region) {
            LoadResult::Found(metadata) => (Some(metadata), None),
            LoadResult::Missing => (None, None),
            LoadResult::Corrupt { path, reason } => {
                warn!("Connection metadata {} is unreadable: {}", path.display(), reason);
                (None, Some(format!("{}: {}", path.display(), reason)))
            }
        };

        let scan = self.scanner.scan_all().await;
        let managed = filter_managed(&scan).summary();

        let mut dns = None;
        if let Some(email) = metadata.as_ref().and_then(|m| m.service::<Email>()) {
            if let Some(domain) = &email.config.domain {
                let outputs = self.stack_outputs(email.pulumi_stack_name.as_deref()).await;
                let ses_verified = scan
                    .identities
                    .iter()
                    .find(|i| &i.name == domain)
                    .map(|i| i.verified);
                let expectations = self.expectations(&email.config, &outputs, ses_verified);
                dns = Some(self.verifier.verify_domain(domain, &expectations).await);
            }
        }

        Ok(StatusReport {
            identity,
            region: self.region.clone(),
            metadata,
            corrupt,
            managed,
            dns,
        })
    }

    fn require_metadata(&self, identity: &CallerIdentity) -> Result<ConnectionMetadata, DeployError> {
        self.store
            .load(&identity.account_id, &self.region)
            .ok_or_else(|| self.not_connected(identity))
    }

    fn not_connected(&self, identity: &CallerIdentity) -> DeployError {
        DeployError::NotConnected {
            account_id: identity.account_id.clone(),
            region: self.region.clone(),
        }
    }

    fn advise(&self, config: &EmailConfig, emails_per_month: u64) -> Vec<ConfigWarning> {
        let warnings = validate(config, emails_per_month);
        for warning in &warnings {
            warn!("Configuration warning: {}", warning);
        }
        warnings
    }

    async fn deploy_new(
        &self,
        identity: &CallerIdentity,
        request: NewDeployment,
    ) -> Result<DeploymentSummary, DeployError> {
        let warnings = self.advise(&request.config, request.emails_per_month);
        let cost = estimate(&request.config, request.emails_per_month);
        let stack_name = stack_name_for(&identity.account_id, &self.region);

        if !self.confirm.confirm(&format!(
            "Deploy {} to account {} ({}), estimated {}/month?",
            stack_name,
            identity.account_id,
            self.region,
            format_cost(cost.total.monthly)
        )) {
            return Err(DeployError::Aborted);
        }

        let outputs = self
            .apply(&stack_name, &identity.account_id, &request.config)
            .await?;
        let dns = self.publish_dns(&request.config, &outputs).await;

        let mut metadata =
            ConnectionMetadata::new(&identity.account_id, &self.region, request.provider);
        metadata.provider_config = request.provider_config;
        metadata.add_service::<Email>(request.config, request.preset, Some(stack_name.clone()));
        self.store.save(&metadata)?;

        info!(
            "Deployed {} for account {} in {}",
            stack_name, identity.account_id, self.region
        );

        Ok(DeploymentSummary {
            account_id: identity.account_id.clone(),
            region: self.region.clone(),
            stack_name,
            outputs,
            cost,
            warnings,
            dns,
        })
    }

    async fn apply(
        &self,
        stack_name: &str,
        account_id: &str,
        config: &EmailConfig,
    ) -> Result<StackOutputs, DeployError> {
        let config_json = serde_json::to_string(config).map_err(|e| {
            DeployError::ApplyFailed(format!("failed to serialize configuration: {}", e))
        })?;

        let stack = self
            .engine
            .create_or_select_stack(stack_name)
            .await
            .map_err(apply_error)?;
        stack
            .set_config("aws:region", &self.region)
            .await
            .map_err(apply_error)?;
        stack
            .set_config("accountId", account_id)
            .await
            .map_err(apply_error)?;
        stack
            .set_config("emailConfig", &config_json)
            .await
            .map_err(apply_error)?;

        stack.up().await.map_err(apply_error)
    }

    async fn publish_dns(
        &self,
        config: &EmailConfig,
        outputs: &StackOutputs,
    ) -> Option<DnsProvisioning> {
        let zones = self.zones.as_ref()?;
        let domain = outputs.domain.as_deref().or(config.domain.as_deref())?;
        let records = required_records(domain, &self.expectations(config, outputs, None));
        Some(provision_records(zones.as_ref(), domain, &records).await)
    }

    async fn stack_outputs(&self, stack_name: Option<&str>) -> StackOutputs {
        let Some(name) = stack_name else {
            return StackOutputs::default();
        };
        match self.engine.select_stack(name).await {
            Ok(Some(stack)) => stack.outputs().await.unwrap_or_else(|e| {
                warn!("Failed to read outputs of {}: {}", name, e);
                StackOutputs::default()
            }),
            Ok(None) => StackOutputs::default(),
            Err(e) => {
                warn!("Failed to select stack {}: {}", name, e);
                StackOutputs::default()
            }
        }
    }

    fn expectations(
        &self,
        config: &EmailConfig,
        outputs: &StackOutputs,
        ses_verified: Option<bool>,
    ) -> DomainExpectations {
        DomainExpectations {
            region: self.region.clone(),
            dkim_tokens: outputs.dkim_tokens.clone(),
            mail_from_domain: outputs
                .mail_from_domain
                .clone()
                .or_else(|| config.mail_from_domain.clone()),
            redirect_domain: config
                .active_tracking()
                .and_then(|t| t.custom_redirect_domain.clone()),
            ses_verified,
        }
    }
}
