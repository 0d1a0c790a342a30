//! Mailplane CLI
//!
//! Provision, update, inspect and tear down email sending infrastructure in
//! the operator's own AWS account.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mailplane::config::{resolve_region, RESOURCE_PREFIX};
use mailplane::cost::{estimate, format_cost, FeatureCostBreakdown};
use mailplane::deploy::{
    AutoConfirm, Confirm, ConnectRequest, DeployOutcome, Deployer, DeploymentSummary, InitRequest,
    LocalProgram, PulumiCli, StatusReport, StdinConfirm, StsIdentityValidator,
    DEFAULT_MONTHLY_VOLUME,
};
use mailplane::dns::{
    DnsProvisioning, DnsVerifier, DohResolver, DomainExpectations, DomainVerification,
    RecordStatus, Route53ZoneManager,
};
use mailplane::email::{validate, EmailConfig, EmailPreset};
use mailplane::metadata::{HostingProvider, MetadataStore, ProviderConfig};
use mailplane::scanner::{AwsResourceProvider, ResourceScanner};
use mailplane::{DeployError, Settings};

/// Mailplane - email infrastructure in your own AWS account
#[derive(Parser, Debug)]
#[command(name = "mailplane", version, about)]
struct Cli {
    /// AWS region (falls back to AWS_REGION, AWS_DEFAULT_REGION, us-east-1)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "MAILPLANE_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct ProviderArgs {
    /// Hosting platform of the sending application
    #[arg(long, default_value = "aws")]
    provider: HostingProvider,

    /// Platform team identifier (federated credentials)
    #[arg(long)]
    team_slug: Option<String>,

    /// Platform project name (federated credentials)
    #[arg(long)]
    project_name: Option<String>,
}

impl ProviderArgs {
    fn provider_config(&self) -> Option<ProviderConfig> {
        if self.team_slug.is_none() && self.project_name.is_none() {
            return None;
        }
        Some(ProviderConfig {
            team_slug: self.team_slug.clone(),
            project_name: self.project_name.clone(),
            ..Default::default()
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy new email infrastructure
    Init {
        /// Sending domain
        #[arg(long)]
        domain: Option<String>,

        /// starter, production or enterprise
        #[arg(long)]
        preset: Option<EmailPreset>,

        /// Custom configuration (JSON), instead of a preset
        #[arg(long, conflicts_with = "preset")]
        config: Option<PathBuf>,

        #[command(flatten)]
        provider: ProviderArgs,

        /// Expected monthly volume, for cost and sizing advice
        #[arg(long, default_value_t = DEFAULT_MONTHLY_VOLUME)]
        emails_per_month: u64,
    },

    /// Adopt existing SES identities in this region
    Connect {
        #[arg(long)]
        preset: Option<EmailPreset>,

        #[command(flatten)]
        provider: ProviderArgs,

        #[arg(long, default_value_t = DEFAULT_MONTHLY_VOLUME)]
        emails_per_month: u64,
    },

    /// Re-apply the stored configuration
    Update {
        #[arg(long, default_value_t = DEFAULT_MONTHLY_VOLUME)]
        emails_per_month: u64,
    },

    /// Destroy deployed infrastructure and forget the connection
    #[command(alias = "destroy")]
    Restore,

    /// Show connection, managed resources and DNS health
    Status,

    /// Check a domain's DNS records
    Verify {
        domain: String,
    },

    /// Estimate monthly cost without deploying
    Estimate {
        #[arg(long)]
        preset: Option<EmailPreset>,

        #[arg(long, conflicts_with = "preset")]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_MONTHLY_VOLUME)]
        emails_per_month: u64,
    },

    /// List local connection records
    List,
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<DeployError>().and_then(|d| d.remediation()) {
                eprintln!("\n{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;
    let store = MetadataStore::new(settings.connections_dir());
    let region = resolve_region(cli.region.as_deref());

    match cli.command {
        Command::Estimate {
            preset,
            config,
            emails_per_month,
        } => {
            let config = load_config(preset, config.as_deref())?;
            print_warnings(&config, emails_per_month);
            print_breakdown(&estimate(&config, emails_per_month));
            Ok(())
        }
        Command::List => {
            let records = store.list();
            if records.is_empty() {
                println!("No connections in {}", store.dir().display());
            }
            for record in records {
                let services: Vec<String> = record
                    .configured_services()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                println!(
                    "{}  {}  provider={}  services=[{}]  updated {}",
                    record.account_id,
                    record.region,
                    record.provider,
                    services.join(", "),
                    record.timestamp.format("%Y-%m-%d %H:%M UTC")
                );
            }
            Ok(())
        }
        Command::Verify { domain } => {
            let sdk_config = load_aws(&region).await;
            let provider = AwsResourceProvider::new(&sdk_config);
            let mut expectations = DomainExpectations::new(region.clone());
            match provider.identity_dkim(&domain).await {
                Ok((tokens, verified)) => {
                    expectations.dkim_tokens = tokens;
                    expectations.ses_verified = Some(verified);
                }
                Err(e) => warn!("Could not read SES identity {}: {:#}", domain, e),
            }

            let verifier = DnsVerifier::new(Arc::new(DohResolver::new()?));
            print_verification(&verifier.verify_domain(&domain, &expectations).await);
            Ok(())
        }
        command => {
            let sdk_config = load_aws(&region).await;
            let provider = Arc::new(AwsResourceProvider::new(&sdk_config));
            let program = Arc::new(LocalProgram::new(RESOURCE_PREFIX, &settings.program_dir));
            let engine = Arc::new(PulumiCli::new(
                &settings.pulumi_bin,
                settings.pulumi_dir(),
                program,
            ));
            let confirm: Arc<dyn Confirm> = if cli.yes {
                Arc::new(AutoConfirm)
            } else {
                Arc::new(StdinConfirm)
            };

            let deployer = Deployer::new(
                region,
                store,
                Arc::new(StsIdentityValidator::new(&sdk_config)),
                engine,
                ResourceScanner::new(provider),
                DnsVerifier::new(Arc::new(DohResolver::new()?)),
            )
            .with_zones(Arc::new(Route53ZoneManager::new(&sdk_config)))
            .with_confirm(confirm);

            lifecycle(&deployer, command).await
        }
    }
}

async fn lifecycle(deployer: &Deployer, command: Command) -> Result<()> {
    match command {
        Command::Init {
            domain,
            preset,
            config,
            provider,
            emails_per_month,
        } => {
            let custom = config
                .as_deref()
                .map(read_config_file)
                .transpose()?;
            let outcome = deployer
                .initialize(InitRequest {
                    provider: provider.provider,
                    provider_config: provider.provider_config(),
                    preset,
                    config: custom,
                    domain,
                    emails_per_month,
                })
                .await?;
            print_outcome(&outcome);
        }
        Command::Connect {
            preset,
            provider,
            emails_per_month,
        } => {
            let outcome = deployer
                .connect(ConnectRequest {
                    provider: provider.provider,
                    provider_config: provider.provider_config(),
                    preset,
                    emails_per_month,
                })
                .await?;
            print_outcome(&outcome);
        }
        Command::Update { emails_per_month } => {
            let summary = deployer.update(emails_per_month).await?;
            print_summary(&summary);
        }
        Command::Restore => {
            let outcome = deployer.restore().await?;
            match &outcome.stack_name {
                Some(stack) if outcome.stack_destroyed => {
                    println!("Destroyed stack {}", stack)
                }
                Some(stack) => println!("Stack {} was not found; nothing to destroy", stack),
                None => println!("No stack was ever deployed; nothing to destroy"),
            }
            if outcome.metadata_deleted {
                println!(
                    "Removed connection for {} in {}",
                    outcome.account_id, outcome.region
                );
            }
        }
        Command::Status => {
            let report = deployer.status().await?;
            print_status(&report);
        }
        Command::Estimate { .. } | Command::List | Command::Verify { .. } => {}
    }
    Ok(())
}

async fn load_aws(region: &str) -> aws_config::SdkConfig {
    info!("Using region {}", region);
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await
}

fn read_config_file(path: &std::path::Path) -> Result<EmailConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid email configuration in {}", path.display()))
}

fn load_config(preset: Option<EmailPreset>, path: Option<&std::path::Path>) -> Result<EmailConfig> {
    match path {
        Some(path) => read_config_file(path),
        None => Ok(preset.unwrap_or(EmailPreset::Starter).config()),
    }
}

fn print_warnings(config: &EmailConfig, emails_per_month: u64) {
    for warning in validate(config, emails_per_month) {
        println!("warning: {}", warning);
    }
}

fn print_breakdown(breakdown: &FeatureCostBreakdown) {
    for (name, item) in breakdown.items() {
        println!(
            "  {:<18} {:>10}  {}",
            name,
            format_cost(item.monthly),
            item.description
        );
    }
    println!(
        "  {:<18} {:>10}  {} ({} per email)",
        "total",
        format_cost(breakdown.total.monthly),
        breakdown.total.description,
        breakdown.total.per_email
    );
}

fn print_outcome(outcome: &DeployOutcome) {
    match outcome {
        DeployOutcome::AlreadyConnected(metadata) => println!(
            "Account {} in {} is already connected (last updated {}). Use `mailplane update` to re-apply.",
            metadata.account_id,
            metadata.region,
            metadata.timestamp.format("%Y-%m-%d %H:%M UTC")
        ),
        DeployOutcome::Deployed(summary) => print_summary(summary),
    }
}

fn print_summary(summary: &DeploymentSummary) {
    println!(
        "Deployed {} to account {} in {}",
        summary.stack_name, summary.account_id, summary.region
    );
    for warning in &summary.warnings {
        println!("warning: {}", warning);
    }
    print_breakdown(&summary.cost);

    if let Some(config_set) = &summary.outputs.config_set_name {
        println!("Configuration set: {}", config_set);
    }
    match &summary.dns {
        Some(DnsProvisioning::Created { zone, records }) => {
            println!("Published {} DNS records in {}", records, zone)
        }
        Some(DnsProvisioning::NoZone) | None => {
            if summary.outputs.domain.is_some() {
                println!("Add the required DNS records, then run `mailplane verify <domain>`");
            }
        }
        Some(DnsProvisioning::Failed { reason }) => {
            println!("Could not publish DNS records ({}); add them manually", reason)
        }
    }
}

fn print_status(report: &StatusReport) {
    println!(
        "Account {} ({}) in {}",
        report.identity.account_id, report.identity.principal_arn, report.region
    );
    if let Some(corrupt) = &report.corrupt {
        println!("Connection record is unreadable: {}", corrupt);
    }
    match &report.metadata {
        Some(metadata) => match &metadata.services.email {
            Some(email) => println!(
                "  email: stack {}",
                email
                    .pulumi_stack_name
                    .as_deref()
                    .unwrap_or("(never deployed)")
            ),
            None => println!("  email: not configured"),
        },
        None => println!("  not connected"),
    }
    println!("  managed resources: {}", report.managed);
    if let Some(dns) = &report.dns {
        print_verification(dns);
    }
}

fn print_verification(verification: &DomainVerification) {
    println!(
        "DNS for {}: {} (SES: {:?})",
        verification.domain,
        verification.overall(),
        verification.ses_status
    );
    for record in &verification.records {
        let mark = match record.status {
            RecordStatus::Verified => "ok",
            RecordStatus::Incorrect => "incorrect",
            RecordStatus::Missing => "missing",
        };
        println!(
            "  [{:<9}] {:<13} {} {} -> {}",
            mark, record.purpose, record.record_type, record.name, record.expected
        );
        if let Some(note) = &record.note {
            println!("              {}", note);
        }
    }
}
