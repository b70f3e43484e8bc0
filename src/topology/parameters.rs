//! topology::parameters
//!
//! Cross-stack parameter names.
//!
//! Stacks in different regions cannot reference each other's outputs
//! directly. Instead, a stack writes a generated identifier (zone id,
//! certificate ARN, ...) to the parameter store of its own region, and
//! dependents read it from there. Every key has exactly one publisher and is
//! written once.

use serde::{Deserialize, Serialize};

use super::StackKind;
use crate::core::types::Region;

/// A cross-stack parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKey {
    /// Hosted zone id of the project zone
    ZoneId,
    /// Hosted zone name of the project zone
    ZoneName,
    /// ARN of the CloudFront certificate (published in us-east-1)
    CertificateArn,
    /// ARN of the website bucket
    SiteBucketArn,
    /// Hosted zone id of the account root zone (account baseline)
    AccountRootZoneId,
    /// Hosted zone name of the account root zone (account baseline)
    AccountRootZoneName,
    /// KMS key used for DNSSEC signing (account baseline, us-east-1)
    AccountDnssecKmsKeyArn,
}

impl ParameterKey {
    pub const ALL: [ParameterKey; 7] = [
        ParameterKey::ZoneId,
        ParameterKey::ZoneName,
        ParameterKey::CertificateArn,
        ParameterKey::SiteBucketArn,
        ParameterKey::AccountRootZoneId,
        ParameterKey::AccountRootZoneName,
        ParameterKey::AccountDnssecKmsKeyArn,
    ];

    /// Parameter store path.
    pub fn path(&self) -> &'static str {
        match self {
            ParameterKey::ZoneId => "/component-library/zone/id",
            ParameterKey::ZoneName => "/component-library/zone/name",
            ParameterKey::CertificateArn => "/component-library/certificates/certificate-arn",
            ParameterKey::SiteBucketArn => "/component-library/site/bucket-arn",
            ParameterKey::AccountRootZoneId => "/gemeente-nijmegen/account/hostedzone/id",
            ParameterKey::AccountRootZoneName => "/gemeente-nijmegen/account/hostedzone/name",
            ParameterKey::AccountDnssecKmsKeyArn => "/gemeente-nijmegen/account/dnssec/kmskey/arn",
        }
    }

    /// Who is expected to write this parameter.
    pub fn publisher(&self) -> Publisher {
        match self {
            ParameterKey::ZoneId | ParameterKey::ZoneName => Publisher::Stack(StackKind::DnsZone),
            ParameterKey::CertificateArn => Publisher::Stack(StackKind::Certificate),
            ParameterKey::SiteBucketArn => Publisher::Stack(StackKind::StaticSite),
            ParameterKey::AccountRootZoneId
            | ParameterKey::AccountRootZoneName
            | ParameterKey::AccountDnssecKmsKeyArn => Publisher::AccountBaseline,
        }
    }
}

impl std::fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Owner of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "stack")]
pub enum Publisher {
    /// Written by a stack in this topology.
    Stack(StackKind),
    /// Written by the account baseline before any project stack exists.
    AccountBaseline,
}

impl std::fmt::Display for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Publisher::Stack(kind) => write!(f, "stack '{}'", kind.stack_id()),
            Publisher::AccountBaseline => write!(f, "account baseline"),
        }
    }
}

/// A parameter a stack reads, and the region it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumedParameter {
    pub key: ParameterKey,
    pub region: Region,
}

impl ConsumedParameter {
    pub fn new(key: ParameterKey, region: &Region) -> Self {
        Self {
            key,
            region: region.clone(),
        }
    }
}
