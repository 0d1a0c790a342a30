//! IaC Engine Adapter
//!
//! Drives Pulumi through its CLI with a local `file://` state backend and an
//! empty passphrase. The resource program itself is a black box that lives
//! in its own project directory and reports named stack outputs.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IacError {
    /// Another (or a crashed) run holds the stack lock
    #[error("stack {stack} is locked: {message}")]
    Locked {
        stack: String,
        lock_dir: PathBuf,
        message: String,
    },
    #[error("`pulumi {command}` failed: {message}")]
    CommandFailed { command: String, message: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Typed outputs of an applied stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default)]
    pub lambda_functions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub dkim_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_from_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_arn: Option<String>,
    #[serde(default)]
    pub archiving_enabled: bool,
    /// Outputs not modelled above
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StackOutputs {
    /// Parse `pulumi stack output --json`
    pub fn from_json(raw: &str) -> Result<Self, IacError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .context("Invalid stack output JSON")
            .map_err(IacError::from)
    }
}

/// The declarative program a stack runs
pub trait StackProgram: Send + Sync {
    fn project_name(&self) -> &str;
    fn project_dir(&self) -> &Path;
}

/// A program in a local project directory
#[derive(Debug, Clone)]
pub struct LocalProgram {
    name: String,
    dir: PathBuf,
}

impl LocalProgram {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

impl StackProgram for LocalProgram {
    fn project_name(&self) -> &str {
        &self.name
    }

    fn project_dir(&self) -> &Path {
        &self.dir
    }
}

/// A named stack
#[async_trait]
pub trait Stack: Send + Sync {
    fn name(&self) -> &str;
    async fn set_config(&self, key: &str, value: &str) -> Result<(), IacError>;
    /// Apply and return the resulting outputs
    async fn up(&self) -> Result<StackOutputs, IacError>;
    /// Outputs of the last apply
    async fn outputs(&self) -> Result<StackOutputs, IacError>;
    async fn destroy(&self) -> Result<(), IacError>;
}

/// Stack registry of the engine
#[async_trait]
pub trait IacEngine: Send + Sync {
    async fn create_or_select_stack(&self, name: &str) -> Result<Box<dyn Stack>, IacError>;
    /// `None` when no stack of that name is registered
    async fn select_stack(&self, name: &str) -> Result<Option<Box<dyn Stack>>, IacError>;
    async fn remove_stack(&self, name: &str) -> Result<(), IacError>;
}

/// Whether engine output reports a held stack lock
pub fn is_lock_error(message: &str) -> bool {
    message.to_ascii_lowercase().contains("the stack is currently locked")
}

/// Whether engine output reports that the stack does not exist
fn is_missing_stack(message: &str) -> bool {
    message.to_ascii_lowercase().contains("no stack named")
}

/// Pulumi CLI with a local state backend
#[derive(Clone)]
pub struct PulumiCli {
    bin: PathBuf,
    backend_dir: PathBuf,
    program: Arc<dyn StackProgram>,
}

impl PulumiCli {
    pub fn new(
        bin: impl Into<PathBuf>,
        backend_dir: impl Into<PathBuf>,
        program: Arc<dyn StackProgram>,
    ) -> Self {
        Self {
            bin: bin.into(),
            backend_dir: backend_dir.into(),
            program,
        }
    }

    /// Where the engine keeps stack lock files
    pub fn lock_dir(&self) -> PathBuf {
        self.backend_dir.join(".pulumi").join("locks")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .arg("--non-interactive")
            .current_dir(self.program.project_dir())
            .env(
                "PULUMI_BACKEND_URL",
                format!("file://{}", self.backend_dir.display()),
            )
            .env("PULUMI_CONFIG_PASSPHRASE", "")
            .env("PULUMI_SKIP_UPDATE_CHECK", "true");
        cmd
    }

    /// Run to completion and return stdout
    async fn run(&self, stack: &str, args: &[&str]) -> Result<String, IacError> {
        tokio::fs::create_dir_all(&self.backend_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.backend_dir.display()))?;

        debug!("pulumi {}", args.join(" "));
        let output = self
            .command(args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.bin.display()))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };

        if is_lock_error(&message) {
            return Err(IacError::Locked {
                stack: stack.to_string(),
                lock_dir: self.lock_dir(),
                message,
            });
        }
        Err(IacError::CommandFailed {
            command: args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
            message,
        })
    }

    fn stack(&self, name: &str) -> Box<dyn Stack> {
        Box::new(PulumiStack {
            cli: self.clone(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl IacEngine for PulumiCli {
    async fn create_or_select_stack(&self, name: &str) -> Result<Box<dyn Stack>, IacError> {
        self.run(name, &["stack", "select", "--create", name]).await?;
        info!("Selected stack {} ({})", name, self.program.project_name());
        Ok(self.stack(name))
    }

    async fn select_stack(&self, name: &str) -> Result<Option<Box<dyn Stack>>, IacError> {
        match self.run(name, &["stack", "select", name]).await {
            Ok(_) => Ok(Some(self.stack(name))),
            Err(IacError::CommandFailed { message, .. }) if is_missing_stack(&message) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn remove_stack(&self, name: &str) -> Result<(), IacError> {
        self.run(name, &["stack", "rm", name, "--yes"]).await?;
        info!("Removed stack {}", name);
        Ok(())
    }
}

/// A stack driven through [`PulumiCli`]
pub struct PulumiStack {
    cli: PulumiCli,
    name: String,
}

#[async_trait]
impl Stack for PulumiStack {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), IacError> {
        self.cli
            .run(&self.name, &["config", "set", key, value, "--stack", &self.name])
            .await?;
        Ok(())
    }

    async fn up(&self) -> Result<StackOutputs, IacError> {
        info!("Applying stack {}", self.name);
        self.cli
            .run(&self.name, &["up", "--yes", "--skip-preview", "--stack", &self.name])
            .await?;
        self.outputs().await
    }

    async fn outputs(&self) -> Result<StackOutputs, IacError> {
        let raw = self
            .cli
            .run(&self.name, &["stack", "output", "--json", "--stack", &self.name])
            .await?;
        StackOutputs::from_json(&raw)
    }

    async fn destroy(&self) -> Result<(), IacError> {
        info!("Destroying stack {}", self.name);
        self.cli
            .run(&self.name, &["destroy", "--yes", "--skip-preview", "--stack", &self.name])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_detection() {
        assert!(is_lock_error(
            "error: the stack is currently locked by 1 lock(s). Either wait for the other process(es) to end or delete the lock file"
        ));
        assert!(!is_lock_error("error: AccessDenied: not authorized"));
        assert!(!is_lock_error(
            "error: KMS key is locked for deletion; delete the lock file manually"
        ));
    }

    #[test]
    fn test_missing_stack_detection() {
        assert!(is_missing_stack(
            "error: no stack named 'mailplane-123456789012-us-east-1' found"
        ));
        assert!(!is_missing_stack("error: role mailplane-email not found"));
        assert!(!is_missing_stack("pulumi: command not found"));
    }

    #[test]
    fn test_outputs_parse() {
        let raw = r#"{
            "roleArn": "arn:aws:iam::123:role/mailplane-email",
            "configSetName": "mailplane-tracking",
            "dkimTokens": ["a", "b", "c"],
            "archivingEnabled": true,
            "customOutput": 7
        }"#;
        let outputs = StackOutputs::from_json(raw).unwrap();
        assert_eq!(outputs.config_set_name.as_deref(), Some("mailplane-tracking"));
        assert_eq!(outputs.dkim_tokens.len(), 3);
        assert!(outputs.archiving_enabled);
        assert!(outputs.lambda_functions.is_empty());
        assert_eq!(outputs.extra.get("customOutput"), Some(&Value::from(7)));

        assert_eq!(StackOutputs::from_json("").unwrap(), StackOutputs::default());
        assert!(StackOutputs::from_json("not json").is_err());
    }

    #[test]
    fn test_lock_dir_under_backend() {
        let cli = PulumiCli::new(
            "pulumi",
            "/home/op/.mailplane/pulumi",
            Arc::new(LocalProgram::new("mailplane", "/home/op/.mailplane/program")),
        );
        assert_eq!(
            cli.lock_dir(),
            PathBuf::from("/home/op/.mailplane/pulumi/.pulumi/locks")
        );
    }
}
