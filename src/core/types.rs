//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name (the registry key)
//! - [`AccountId`] - AWS account number
//! - [`Region`] - AWS region code
//! - [`Environment`] - Account/region pair a stack is deployed to
//! - [`DnsLabel`] - A single DNS label (used for subdomains)
//! - [`DomainName`] - A fully qualified domain name
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use sitestack::core::types::{AccountId, BranchName, Environment, Region};
//!
//! let branch = BranchName::new("acceptance").unwrap();
//! let env = Environment::new(
//!     AccountId::new("768900902886").unwrap(),
//!     Region::new("eu-central-1").unwrap(),
//! );
//! assert_eq!(env.to_string(), "768900902886/eu-central-1");
//!
//! // Invalid constructions fail at creation time
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(AccountId::new("not-a-number").is_err());
//! assert!(Region::new("EU-Central-1").is_err());
//! # let _ = branch;
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("invalid dns label: {0}")]
    InvalidDnsLabel(String),

    #[error("invalid domain name: {0}")]
    InvalidDomainName(String),
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
/// - Cannot be exactly `@`
///
/// Comparison is exact and case-sensitive.
///
/// # Example
///
/// ```
/// use sitestack::core::types::BranchName;
///
/// let name = BranchName::new("feature/new-header").unwrap();
/// assert_eq!(name.as_str(), "feature/new-header");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let invalid = |reason: &str| Err(TypeError::InvalidBranchName(reason.to_string()));

        if name.is_empty() {
            return invalid("branch name cannot be empty");
        }
        if name == "@" {
            return invalid("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') {
            return invalid("branch name cannot start with '.'");
        }
        if name.starts_with('-') {
            return invalid("branch name cannot start with '-'");
        }
        if name.ends_with(".lock") {
            return invalid("branch name cannot end with '.lock'");
        }
        if name.ends_with('/') {
            return invalid("branch name cannot end with '/'");
        }
        for sequence in ["..", "@{", "//"] {
            if name.contains(sequence) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{sequence}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return invalid("branch name cannot contain control characters");
        }

        for component in name.split('/').filter(|c| !c.is_empty()) {
            if component.starts_with('.') {
                return invalid("path component cannot start with '.'");
            }
            if component.ends_with(".lock") {
                return invalid("path component cannot end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl BranchName {
    /// Construct from a literal already known to be valid.
    pub(crate) fn new_unchecked(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An AWS account number (1-12 ASCII digits).
///
/// Real accounts are always 12 digits, but shorter values are accepted so
/// that test fixtures can use placeholder accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Create a new validated account id.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() || id.len() > 12 || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidAccountId(format!(
                "'{id}' must be 1 to 12 digits"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AccountId {
    /// Construct from a literal already known to be valid.
    pub(crate) fn new_unchecked(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for AccountId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An AWS region code such as `eu-central-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    /// Create a new validated region.
    ///
    /// Regions are lowercase ASCII letters, digits and hyphens, and must
    /// start with a letter.
    pub fn new(code: impl Into<String>) -> Result<Self, TypeError> {
        let code = code.into();
        let starts_with_letter = code
            .chars()
            .next()
            .map(|c| c.is_ascii_lowercase())
            .unwrap_or(false);
        let valid_chars = code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !starts_with_letter || !valid_chars || code.ends_with('-') {
            return Err(TypeError::InvalidRegion(code));
        }
        Ok(Self(code))
    }

    /// The region certificates for CloudFront and DNSSEC signing keys live in.
    pub fn us_east_1() -> Self {
        Self("us-east-1".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Region {
    /// Construct from a literal already known to be valid.
    pub(crate) fn new_unchecked(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for Region {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account/region pair a stack or pipeline is deployed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Environment {
    pub account: AccountId,
    pub region: Region,
}

impl Environment {
    pub fn new(account: AccountId, region: Region) -> Self {
        Self { account, region }
    }

    /// Same account, different region.
    pub fn in_region(&self, region: Region) -> Self {
        Self {
            account: self.account.clone(),
            region,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account, self.region)
    }
}

/// A single DNS label, e.g. the `componenten-dev` in
/// `componenten-dev.example.nl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DnsLabel(String);

impl DnsLabel {
    /// Create a new validated label (1-63 chars, alphanumeric or `-`,
    /// no leading or trailing hyphen).
    pub fn new(label: impl Into<String>) -> Result<Self, TypeError> {
        let label = label.into();
        Self::validate(&label).map_err(TypeError::InvalidDnsLabel)?;
        Ok(Self(label))
    }

    fn validate(label: &str) -> Result<(), String> {
        if label.is_empty() || label.len() > 63 {
            return Err(format!("'{label}' must be 1 to 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("'{label}' cannot start or end with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("'{label}' may only contain letters, digits and '-'"));
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DnsLabel {
    /// Construct from a literal already known to be valid.
    pub(crate) fn new_unchecked(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for DnsLabel {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DnsLabel> for String {
    fn from(label: DnsLabel) -> Self {
        label.0
    }
}

impl std::fmt::Display for DnsLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully qualified domain name without trailing dot.
///
/// ```
/// use sitestack::core::types::DomainName;
///
/// assert!(DomainName::new("componenten.nijmegen.nl").is_ok());
/// assert!(DomainName::new("componenten.nijmegen.nl.").is_err());
/// assert!(DomainName::new("nodots").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if !name.contains('.') {
            return Err(TypeError::InvalidDomainName(format!(
                "'{name}' must contain at least two labels"
            )));
        }
        for label in name.split('.') {
            DnsLabel::validate(label)
                .map_err(|reason| TypeError::InvalidDomainName(format!("{name}: {reason}")))?;
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DomainName {
    /// Construct from a literal already known to be valid.
    pub(crate) fn new_unchecked(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for DomainName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DomainName> for String {
    fn from(name: DomainName) -> Self {
        name.0
    }
}

impl std::fmt::Display for DomainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_names() {
            for name in ["main", "development", "acceptance", "feature/x", "release-1.2"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn invalid_names() {
            for name in ["", "@", ".x", "-x", "x.lock", "x/", "a..b", "a@{b", "a//b", "a b", "a:b"] {
                assert!(BranchName::new(name).is_err(), "{name} should be invalid");
            }
        }

        #[test]
        fn comparison_is_case_sensitive() {
            assert_ne!(
                BranchName::new("Main").unwrap(),
                BranchName::new("main").unwrap()
            );
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<BranchName, _> = serde_json::from_str("\"a..b\"");
            assert!(result.is_err());
        }
    }

    mod account_and_region {
        use super::*;

        #[test]
        fn account_accepts_digits_only() {
            assert!(AccountId::new("836443378780").is_ok());
            assert!(AccountId::new("123").is_ok());
            assert!(AccountId::new("").is_err());
            assert!(AccountId::new("1234567890123").is_err());
            assert!(AccountId::new("12a").is_err());
        }

        #[test]
        fn region_shape() {
            assert!(Region::new("eu-central-1").is_ok());
            assert!(Region::new("us-east-1").is_ok());
            assert!(Region::new("").is_err());
            assert!(Region::new("1-east").is_err());
            assert!(Region::new("eu-central-").is_err());
            assert!(Region::new("eu_central_1").is_err());
        }

        #[test]
        fn environment_in_region_keeps_account() {
            let env = Environment::new(
                AccountId::new("598242258242").unwrap(),
                Region::new("eu-central-1").unwrap(),
            );
            let moved = env.in_region(Region::us_east_1());
            assert_eq!(moved.account, env.account);
            assert_eq!(moved.region.as_str(), "us-east-1");
        }

        #[test]
        fn environment_deserializes_from_table() {
            let env: Environment =
                toml::from_str("account = \"123\"\nregion = \"eu-west-1\"").unwrap();
            assert_eq!(env.to_string(), "123/eu-west-1");
        }
    }

    mod dns {
        use super::*;

        #[test]
        fn label_rules() {
            assert!(DnsLabel::new("componenten-dev").is_ok());
            assert!(DnsLabel::new("-x").is_err());
            assert!(DnsLabel::new("x-").is_err());
            assert!(DnsLabel::new("a.b").is_err());
            assert!(DnsLabel::new("a".repeat(64)).is_err());
        }

        #[test]
        fn domain_rules() {
            assert!(DomainName::new("componenten.acc.nijmegen.nl").is_ok());
            assert!(DomainName::new("a..b").is_err());
            assert!(DomainName::new(".nl").is_err());
        }
    }
}
