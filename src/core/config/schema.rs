//! core::config::schema
//!
//! On-disk registry schema.
//!
//! # Location
//!
//! Loaded from (in order of precedence):
//! 1. `--registry <path>`
//! 2. `$SITESTACK_REGISTRY` if set
//!
//! Without either, the built-in registry is used.
//!
//! # Validation
//!
//! Raw entries are plain strings and flags. [`RegistryFile::into_configurations`]
//! turns them into strongly typed [`Configuration`] records, folding the
//! optional fields into closed profiles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AccessProfile, ConfigError, Configuration, DomainProfile};
use crate::core::types::{BranchName, DnsLabel, DomainName, Environment};

/// Registry file.
///
/// # Example
///
/// ```toml
/// [configurations.development]
/// branch_name = "development"
/// deploy_from_environment = { account = "836443378780", region = "eu-central-1" }
/// deploy_to_environment = { account = "598242258242", region = "eu-central-1" }
/// subdomain = "componenten-dev"
/// include_pipeline_validation_checks = false
/// iam_user_access = true
///
/// [configurations.development.cname_records]
/// _abc123 = "_def456.acm-validations.aws"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryFile {
    /// Configurations keyed by a descriptive name (not necessarily the branch)
    pub configurations: BTreeMap<String, ConfigurationEntry>,
}

/// One raw configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationEntry {
    pub branch_name: BranchName,
    pub deploy_from_environment: Environment,
    pub deploy_to_environment: Environment,
    pub subdomain: DnsLabel,
    #[serde(default)]
    pub alternative_domains: Option<Vec<DomainName>>,
    #[serde(default)]
    pub cname_records: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub include_pipeline_validation_checks: bool,
    #[serde(default)]
    pub iam_user_access: bool,
    #[serde(default)]
    pub old_landing_zone: Option<bool>,
}

impl ConfigurationEntry {
    /// Convert into a validated configuration.
    pub fn into_configuration(self, name: &str) -> Result<Configuration, ConfigError> {
        let domains = DomainProfile::from_domains(self.alternative_domains.unwrap_or_default());

        let cname_records = self.cname_records.unwrap_or_default();
        for (record, target) in &cname_records {
            if record.is_empty() || record.ends_with('.') {
                return Err(ConfigError::InvalidValue(format!(
                    "configuration '{name}': cname record name '{record}' must be a non-empty name without trailing dot"
                )));
            }
            if target.is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "configuration '{name}': cname record '{record}' has an empty target"
                )));
            }
        }

        Ok(Configuration {
            name: name.to_string(),
            branch_name: self.branch_name,
            deploy_from_environment: self.deploy_from_environment,
            deploy_to_environment: self.deploy_to_environment,
            subdomain: self.subdomain,
            domains,
            cname_records,
            include_pipeline_validation_checks: self.include_pipeline_validation_checks,
            access: if self.iam_user_access {
                AccessProfile::IamUser
            } else {
                AccessProfile::None
            },
            old_landing_zone: self.old_landing_zone.unwrap_or(false),
        })
    }
}

impl RegistryFile {
    /// Convert all entries, rejecting duplicate branch names.
    pub fn into_configurations(self) -> Result<Vec<Configuration>, ConfigError> {
        let mut seen: BTreeMap<BranchName, String> = BTreeMap::new();
        let mut configurations = Vec::with_capacity(self.configurations.len());

        for (name, entry) in self.configurations {
            if let Some(previous) = seen.get(&entry.branch_name) {
                return Err(ConfigError::InvalidValue(format!(
                    "branch '{}' is configured twice ('{}' and '{}')",
                    entry.branch_name, previous, name
                )));
            }
            seen.insert(entry.branch_name.clone(), name.clone());
            configurations.push(entry.into_configuration(&name)?);
        }

        Ok(configurations)
    }
}
