//! core::config
//!
//! Per-branch deployment configuration and the registry that resolves it.
//!
//! # Overview
//!
//! Every deployable branch has exactly one [`Configuration`]: which account
//! runs the pipeline, which account/region receives the website, the DNS
//! label of the site and a handful of shape-altering options.
//!
//! The [`ConfigurationRegistry`] is constructed once at process start and
//! passed by reference to everything that needs it. There is no global table.
//!
//! # Sources
//!
//! 1. `--registry <path>` / `$SITESTACK_REGISTRY` (TOML, see [`schema`])
//! 2. The built-in registry ([`ConfigurationRegistry::builtin`])
//!
//! # Lookup
//!
//! Resolution is an exact, case-sensitive match on the branch name. An
//! unknown branch is always an error; there is no fallback configuration.
//!
//! # Example
//!
//! ```
//! use sitestack::core::config::{ConfigError, ConfigurationRegistry};
//!
//! let registry = ConfigurationRegistry::builtin();
//!
//! let production = registry.resolve("main").unwrap();
//! assert_eq!(production.branch_name.as_str(), "main");
//!
//! assert!(matches!(
//!     registry.resolve("Main"),
//!     Err(ConfigError::ConfigurationNotFound { .. })
//! ));
//! ```

pub mod schema;

pub use schema::{ConfigurationEntry, RegistryFile};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{AccountId, BranchName, DnsLabel, DomainName, Environment, Region};

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration found for branch name '{branch}' (known branches: {})", known.join(", "))]
    ConfigurationNotFound { branch: String, known: Vec<String> },

    #[error("failed to read registry file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse registry file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Which domains the certificate and distribution cover.
///
/// The certificate validation mode follows from this: a certificate spanning
/// domains outside the project zone cannot be auto-validated against that
/// zone, so a non-empty [`DomainProfile::WithAlternativeDomains`] implies
/// external (manual) validation. [`ConfigurationRegistry::new`] rejects the
/// variant with an empty list; use [`DomainProfile::from_domains`] to fold
/// an empty list into [`DomainProfile::ZoneOnly`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainProfile {
    /// Only the project hosted zone's apex (and `www.`).
    ZoneOnly,
    /// The project zone plus these extra domains (never empty).
    WithAlternativeDomains(Vec<DomainName>),
}

impl DomainProfile {
    pub fn from_domains(domains: Vec<DomainName>) -> Self {
        if domains.is_empty() {
            DomainProfile::ZoneOnly
        } else {
            DomainProfile::WithAlternativeDomains(domains)
        }
    }

    /// Extra domains, empty for [`DomainProfile::ZoneOnly`].
    pub fn alternative_domains(&self) -> &[DomainName] {
        match self {
            DomainProfile::ZoneOnly => &[],
            DomainProfile::WithAlternativeDomains(domains) => domains,
        }
    }

    /// Whether certificate validation records must be created outside the zone.
    pub fn requires_external_validation(&self) -> bool {
        !self.alternative_domains().is_empty()
    }
}

/// Whether an IAM user with access to the website bucket is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessProfile {
    #[default]
    None,
    IamUser,
}

/// Deployment configuration for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Registry key this configuration was declared under
    pub name: String,
    /// The branch this configuration is used for
    pub branch_name: BranchName,
    /// Where the pipeline itself runs
    pub deploy_from_environment: Environment,
    /// Where the website infrastructure is created
    pub deploy_to_environment: Environment,
    /// Label of the project zone under the account root zone
    pub subdomain: DnsLabel,
    pub domains: DomainProfile,
    /// Extra CNAME records for the project zone, keyed by record name
    /// without the zone suffix
    pub cname_records: BTreeMap<String, String>,
    pub include_pipeline_validation_checks: bool,
    pub access: AccessProfile,
    /// Account still runs on the old landing zone (needs a permissions boundary)
    pub old_landing_zone: bool,
}

impl Configuration {
    pub fn alternative_domains(&self) -> &[DomainName] {
        self.domains.alternative_domains()
    }

    pub fn iam_user_access(&self) -> bool {
        self.access == AccessProfile::IamUser
    }
}

/// Immutable branch → configuration lookup.
#[derive(Debug, Clone)]
pub struct ConfigurationRegistry {
    configurations: Vec<Configuration>,
}

impl ConfigurationRegistry {
    /// Build a registry from configurations.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if two configurations share a
    /// branch name, or if a configuration declares an empty alternative
    /// domain list.
    pub fn new(configurations: Vec<Configuration>) -> Result<Self, ConfigError> {
        for (i, config) in configurations.iter().enumerate() {
            if config.domains == DomainProfile::WithAlternativeDomains(Vec::new()) {
                return Err(ConfigError::InvalidValue(format!(
                    "configuration '{}': alternative domain list is empty",
                    config.name
                )));
            }
            if let Some(other) = configurations[..i]
                .iter()
                .find(|c| c.branch_name == config.branch_name)
            {
                return Err(ConfigError::InvalidValue(format!(
                    "branch '{}' is configured twice ('{}' and '{}')",
                    config.branch_name, other.name, config.name
                )));
            }
        }
        Ok(Self { configurations })
    }

    /// The built-in registry.
    pub fn builtin() -> Self {
        Self {
            configurations: builtin_configurations(),
        }
    }

    /// Parse a registry from TOML text.
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: RegistryFile = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::new(file.into_configurations()?)
    }

    /// Load a registry file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Load from an explicit path if given, otherwise use the built-in registry.
    ///
    /// The CLI resolves `$SITESTACK_REGISTRY` into `explicit` before calling this.
    pub fn load_or_builtin(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Resolve the configuration for a branch.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigurationNotFound` when no configuration's
    /// branch name equals `branch` exactly.
    pub fn resolve(&self, branch: &str) -> Result<&Configuration, ConfigError> {
        self.configurations
            .iter()
            .find(|c| c.branch_name.as_str() == branch)
            .ok_or_else(|| ConfigError::ConfigurationNotFound {
                branch: branch.to_string(),
                known: self.branch_names().map(str::to_string).collect(),
            })
    }

    /// Valid branch names, in declaration order.
    pub fn branch_names(&self) -> impl Iterator<Item = &str> {
        self.configurations.iter().map(|c| c.branch_name.as_str())
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }
}

// The values below are validated literals; a failure here is a programming
// error caught by `builtin_registry_is_valid`.
fn builtin_configurations() -> Vec<Configuration> {
    let env = |account: &str, region: &str| Environment {
        account: AccountId::new_unchecked(account),
        region: Region::new_unchecked(region),
    };
    let deployment_environment = env("836443378780", "eu-central-1");

    vec![
        Configuration {
            name: "development".into(),
            branch_name: BranchName::new_unchecked("development"),
            deploy_from_environment: deployment_environment.clone(),
            deploy_to_environment: env("598242258242", "eu-central-1"),
            subdomain: DnsLabel::new_unchecked("componenten-dev"),
            domains: DomainProfile::ZoneOnly,
            cname_records: BTreeMap::new(),
            include_pipeline_validation_checks: false,
            access: AccessProfile::IamUser,
            old_landing_zone: false,
        },
        Configuration {
            name: "acceptance".into(),
            branch_name: BranchName::new_unchecked("acceptance"),
            deploy_from_environment: deployment_environment.clone(),
            deploy_to_environment: env("768900902886", "eu-central-1"),
            subdomain: DnsLabel::new_unchecked("componenten-accp"),
            domains: DomainProfile::WithAlternativeDomains(vec![DomainName::new_unchecked("componenten.acc.nijmegen.nl")]),
            cname_records: BTreeMap::new(),
            include_pipeline_validation_checks: false,
            access: AccessProfile::None,
            old_landing_zone: false,
        },
        Configuration {
            name: "production".into(),
            branch_name: BranchName::new_unchecked("main"),
            deploy_from_environment: deployment_environment,
            deploy_to_environment: env("706611162248", "eu-central-1"),
            subdomain: DnsLabel::new_unchecked("componenten"),
            domains: DomainProfile::WithAlternativeDomains(vec![DomainName::new_unchecked("componenten.nijmegen.nl")]),
            cname_records: BTreeMap::new(),
            include_pipeline_validation_checks: false,
            access: AccessProfile::None,
            old_landing_zone: false,
        },
    ]
}
