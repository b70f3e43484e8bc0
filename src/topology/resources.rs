//! topology::resources
//!
//! Declarative description of the resources inside a stack.
//!
//! Resources are pure data. Values that are only known at deploy time are
//! expressed as [`Value`]s referring to a cross-stack parameter or to an
//! attribute of another resource in the same stack; the provisioner decides
//! how to render them.

use serde::{Deserialize, Serialize};

use super::parameters::ParameterKey;

/// A possibly deferred string value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Known at build time.
    Literal(String),
    /// Read from a consumed cross-stack parameter.
    Parameter(ParameterKey),
    /// `prefix` followed by a consumed parameter, e.g. `www.<zone name>`.
    Prefixed { prefix: String, key: ParameterKey },
    /// An attribute of another resource in the same stack.
    Attribute { resource: String, attribute: String },
}

impl Value {
    pub fn literal(value: impl Into<String>) -> Self {
        Value::Literal(value.into())
    }

    pub fn attribute(resource: &str, attribute: &str) -> Self {
        Value::Attribute {
            resource: resource.to_string(),
            attribute: attribute.to_string(),
        }
    }

    /// The parameter this value reads, if any.
    pub fn parameter(&self) -> Option<ParameterKey> {
        match self {
            Value::Parameter(key) | Value::Prefixed { key, .. } => Some(*key),
            Value::Literal(_) | Value::Attribute { .. } => None,
        }
    }
}

/// How the certificate proves domain ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum CertificateValidation {
    /// DNS validation records are created automatically in the project zone.
    ZoneAuto { hosted_zone_id: Value },
    /// DNS validation records must be created by hand (alternative domains
    /// live in zones this project does not own).
    External,
}

impl CertificateValidation {
    pub fn is_external(&self) -> bool {
        matches!(self, CertificateValidation::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::Aaaa => write!(f, "AAAA"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

/// One resource within a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    HostedZone {
        zone_name: Value,
    },
    /// NS record in the parent zone pointing at the project zone.
    NsDelegation {
        parent_zone_id: Value,
        parent_zone_name: Value,
        record_name: String,
        name_servers: Value,
    },
    CnameRecord {
        hosted_zone_id: Value,
        record_name: String,
        target: String,
    },
    KeySigningKey {
        name: String,
        status: String,
        hosted_zone_id: Value,
        kms_key_arn: Value,
    },
    DnssecActivation {
        hosted_zone_id: Value,
    },
    /// DS record in the parent zone for the project zone's signing key.
    DelegationSignerRecord {
        hosted_zone_id: Value,
        hosted_zone_name: Value,
        parent_zone_id: Value,
        key_signing_key: String,
    },
    Certificate {
        domain_name: Value,
        subject_alternative_names: Vec<String>,
        validation: CertificateValidation,
    },
    WebsiteBucket {
        auto_delete_objects: bool,
        removal_policy: RemovalPolicy,
    },
    OriginAccessIdentity {
        bucket: String,
        comment: String,
    },
    LogBucket {
        block_public_access: bool,
        enforce_ssl: bool,
        encryption: String,
        object_ownership: String,
        expiration_days: u32,
    },
    ResponseHeadersPolicy {
        content_security_policy: String,
        strict_transport_security_days: u32,
        include_subdomains: bool,
        frame_option: String,
        referrer_policy: String,
        content_type_options: bool,
    },
    /// Viewer-request function rewriting directory URIs to `index.html`.
    EdgeFunction {
        name: String,
        event_type: String,
    },
    Distribution {
        origin_bucket: String,
        origin_access_identity: String,
        certificate_arn: Value,
        domain_names: Vec<Value>,
        price_class: String,
        minimum_protocol_version: String,
        viewer_protocol_policy: String,
        cache_policy: String,
        default_root_object: String,
        log_bucket: String,
        response_headers_policy: String,
        edge_function: String,
    },
    AliasRecord {
        record_type: RecordType,
        hosted_zone_id: Value,
        record_name: Value,
        distribution: String,
    },
    /// Bucket notification + function invalidating the distribution cache.
    CacheInvalidator {
        bucket: String,
        distribution: String,
        trigger_keys: Vec<String>,
        environment: String,
    },
    ParameterPublication {
        key: ParameterKey,
        value: Value,
    },
    BucketAccessPolicy {
        bucket_arn: Value,
    },
    IamUser {
        managed_policy: String,
        removal_policy: RemovalPolicy,
    },
    AccessKey {
        user: String,
        serial: u32,
    },
    AccessKeySecret {
        access_key: String,
    },
}

impl Resource {
    /// Short type name for display.
    pub fn type_name(&self) -> &'static str {
        match self {
            Resource::HostedZone { .. } => "hosted-zone",
            Resource::NsDelegation { .. } => "ns-delegation",
            Resource::CnameRecord { .. } => "cname-record",
            Resource::KeySigningKey { .. } => "key-signing-key",
            Resource::DnssecActivation { .. } => "dnssec",
            Resource::DelegationSignerRecord { .. } => "ds-record",
            Resource::Certificate { .. } => "certificate",
            Resource::WebsiteBucket { .. } => "website-bucket",
            Resource::OriginAccessIdentity { .. } => "origin-access-identity",
            Resource::LogBucket { .. } => "log-bucket",
            Resource::ResponseHeadersPolicy { .. } => "response-headers-policy",
            Resource::EdgeFunction { .. } => "edge-function",
            Resource::Distribution { .. } => "distribution",
            Resource::AliasRecord { .. } => "alias-record",
            Resource::CacheInvalidator { .. } => "cache-invalidator",
            Resource::ParameterPublication { .. } => "parameter",
            Resource::BucketAccessPolicy { .. } => "bucket-access-policy",
            Resource::IamUser { .. } => "iam-user",
            Resource::AccessKey { .. } => "access-key",
            Resource::AccessKeySecret { .. } => "access-key-secret",
        }
    }
}

/// A resource with its logical id and intra-stack ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub logical_id: String,
    /// Resources in the same stack that must be complete before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub resource: Resource,
}

impl ResourceSpec {
    pub fn new(logical_id: impl Into<String>, resource: Resource) -> Self {
        Self {
            logical_id: logical_id.into(),
            depends_on: Vec::new(),
            resource,
        }
    }

    pub fn after(mut self, logical_id: &str) -> Self {
        self.depends_on.push(logical_id.to_string());
        self
    }

    /// Every value held by this resource (used for parameter-flow checks).
    pub fn values(&self) -> Vec<&Value> {
        match &self.resource {
            Resource::HostedZone { zone_name } => vec![zone_name],
            Resource::NsDelegation {
                parent_zone_id,
                parent_zone_name,
                name_servers,
                ..
            } => vec![parent_zone_id, parent_zone_name, name_servers],
            Resource::CnameRecord { hosted_zone_id, .. } => vec![hosted_zone_id],
            Resource::KeySigningKey {
                hosted_zone_id,
                kms_key_arn,
                ..
            } => vec![hosted_zone_id, kms_key_arn],
            Resource::DnssecActivation { hosted_zone_id } => vec![hosted_zone_id],
            Resource::DelegationSignerRecord {
                hosted_zone_id,
                hosted_zone_name,
                parent_zone_id,
                ..
            } => vec![hosted_zone_id, hosted_zone_name, parent_zone_id],
            Resource::Certificate {
                domain_name,
                validation,
                ..
            } => match validation {
                CertificateValidation::ZoneAuto { hosted_zone_id } => {
                    vec![domain_name, hosted_zone_id]
                }
                CertificateValidation::External => vec![domain_name],
            },
            Resource::Distribution {
                certificate_arn,
                domain_names,
                ..
            } => std::iter::once(certificate_arn).chain(domain_names).collect(),
            Resource::AliasRecord {
                hosted_zone_id,
                record_name,
                ..
            } => vec![hosted_zone_id, record_name],
            Resource::ParameterPublication { value, .. } => vec![value],
            Resource::BucketAccessPolicy { bucket_arn } => vec![bucket_arn],
            Resource::WebsiteBucket { .. }
            | Resource::OriginAccessIdentity { .. }
            | Resource::LogBucket { .. }
            | Resource::ResponseHeadersPolicy { .. }
            | Resource::EdgeFunction { .. }
            | Resource::CacheInvalidator { .. }
            | Resource::IamUser { .. }
            | Resource::AccessKey { .. }
            | Resource::AccessKeySecret { .. } => Vec::new(),
        }
    }
}
