//! Runtime Settings
//!
//! Directories, engine location and region resolution. Everything is
//! derived from the environment with sensible defaults so the CLI works
//! with zero configuration.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Prefix for every stack and cloud resource this tool creates
pub const RESOURCE_PREFIX: &str = "mailplane";

/// Region used when neither a flag nor the environment names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Resolved local settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base directory (`MAILPLANE_HOME`, default `~/.mailplane`)
    pub home: PathBuf,
    /// Directory of the IaC project holding the resource program
    pub program_dir: PathBuf,
    /// IaC engine executable
    pub pulumi_bin: PathBuf,
}

impl Settings {
    /// Build settings from the environment
    pub fn from_env() -> Result<Self> {
        let home = match env::var("MAILPLANE_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => home::home_dir()
                .context("Could not determine home directory (set MAILPLANE_HOME)")?
                .join(".mailplane"),
        };

        let program_dir = env::var("MAILPLANE_PROGRAM_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("program"));

        let pulumi_bin = env::var("PULUMI_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("pulumi"));

        Ok(Self {
            home,
            program_dir,
            pulumi_bin,
        })
    }

    /// Settings rooted at an explicit directory (tests, embedding)
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            program_dir: home.join("program"),
            pulumi_bin: PathBuf::from("pulumi"),
            home,
        }
    }

    /// One JSON file per (account, region) lives here
    pub fn connections_dir(&self) -> PathBuf {
        self.home.join("connections")
    }

    /// Local state backend of the IaC engine
    pub fn pulumi_dir(&self) -> PathBuf {
        self.home.join("pulumi")
    }
}

/// Resolve the target region: explicit flag > `AWS_REGION` > `AWS_DEFAULT_REGION` > default
pub fn resolve_region(flag: Option<&str>) -> String {
    resolve_region_with(flag, |key| env::var(key).ok())
}

/// Region resolution against an arbitrary environment lookup
pub fn resolve_region_with<F>(flag: Option<&str>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    flag.map(str::to_string)
        .filter(|r| !r.trim().is_empty())
        .or_else(|| lookup("AWS_REGION").filter(|r| !r.is_empty()))
        .or_else(|| lookup("AWS_DEFAULT_REGION").filter(|r| !r.is_empty()))
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

/// Name of the stack backing an (account, region) deployment
pub fn stack_name_for(account_id: &str, region: &str) -> String {
    format!("{}-{}-{}", RESOURCE_PREFIX, account_id, region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_region_flag_wins() {
        let env: HashMap<&str, &str> = [("AWS_REGION", "eu-west-1")].into();
        let region = resolve_region_with(Some("ap-south-1"), |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(region, "ap-south-1");
    }

    #[test]
    fn test_region_env_precedence() {
        let env: HashMap<&str, &str> =
            [("AWS_REGION", "eu-west-1"), ("AWS_DEFAULT_REGION", "us-west-2")].into();
        assert_eq!(
            resolve_region_with(None, |k| env.get(k).map(|v| v.to_string())),
            "eu-west-1"
        );

        let env: HashMap<&str, &str> = [("AWS_DEFAULT_REGION", "us-west-2")].into();
        assert_eq!(
            resolve_region_with(None, |k| env.get(k).map(|v| v.to_string())),
            "us-west-2"
        );
    }

    #[test]
    fn test_region_default() {
        assert_eq!(resolve_region_with(Some("  "), |_| None), DEFAULT_REGION);
    }

    #[test]
    fn test_stack_name() {
        assert_eq!(
            stack_name_for("123456789012", "us-east-1"),
            "mailplane-123456789012-us-east-1"
        );
    }

    #[test]
    fn test_settings_dirs() {
        let settings = Settings::with_home("/tmp/mp");
        assert_eq!(settings.connections_dir(), PathBuf::from("/tmp/mp/connections"));
        assert_eq!(settings.pulumi_dir(), PathBuf::from("/tmp/mp/pulumi"));
    }
}
