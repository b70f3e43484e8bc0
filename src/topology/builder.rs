//! topology::builder
//!
//! Builds the deployment topology for one configuration.
//!
//! # Invariants
//!
//! - The builder performs no I/O
//! - Building twice from the same configuration yields equal topologies
//! - Dependency edges are declared here and nowhere else
//! - The result has passed [`DeploymentTopology::verify`]

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::parameters::{ConsumedParameter, ParameterKey};
use super::resources::{
    CertificateValidation, RecordType, RemovalPolicy, Resource, ResourceSpec, Value,
};
use super::{
    Dependency, DeploymentTopology, PipelineDefinition, PublishedParameter, StackKind, StackNode,
    TopologyError,
};
use crate::core::config::Configuration;
use crate::core::statics::{
    repository_slug, BRANCH_ENV_VAR, CACHE_TRIGGER_KEYS, LEGACY_PERMISSIONS_BOUNDARY,
    PROJECT_NAME, PRODUCTION_BRANCH,
};
use crate::core::types::{Environment, Region};

/// Content security policy served with every response.
const CONTENT_SECURITY_POLICY: &[&str] = &[
    "base-uri 'self';",
    "default-src 'self';",
    "frame-ancestors 'self';",
    "frame-src 'self';",
    "connect-src 'self';",
    "form-action 'self';",
    "style-src 'self' https://fonts.googleapis.com https://fonts.gstatic.com;",
    "script-src 'self' https://siteimproveanalytics.com;",
    "font-src 'self' https://fonts.gstatic.com;",
    "img-src 'self' data: https://*.siteimproveanalytics.io;",
    "object-src 'none';",
];

const LOG_RETENTION_DAYS: u32 = 180;
const HSTS_MAX_AGE_DAYS: u32 = 366;

/// Build and verify the topology for `config`.
///
/// # Errors
///
/// Returns `TopologyError` if the wired graph has a cycle or a stack reads
/// a parameter that no earlier stack publishes.
///
/// # Example
///
/// ```
/// use sitestack::core::config::ConfigurationRegistry;
/// use sitestack::topology::build;
///
/// let registry = ConfigurationRegistry::builtin();
/// let development = build(registry.resolve("development").unwrap()).unwrap();
/// let acceptance = build(registry.resolve("acceptance").unwrap()).unwrap();
///
/// // Only development gets an IAM access user.
/// assert_eq!(development.len(), 5);
/// assert_eq!(acceptance.len(), 4);
/// ```
pub fn build(config: &Configuration) -> Result<DeploymentTopology, TopologyError> {
    let mut nodes = vec![
        dns_node(config),
        dnssec_node(config),
        certificate_node(config),
        site_node(config),
    ];
    if config.iam_user_access() {
        nodes.push(access_user_node(config));
    }

    let boundary = permissions_boundary(config);
    for node in &mut nodes {
        node.permissions_boundary = boundary.clone();
    }

    let topology = DeploymentTopology::new(
        config.branch_name.clone(),
        pipeline_definition(config),
        nodes,
    )?;

    debug!(
        configuration = %config.name,
        branch = %config.branch_name,
        stacks = topology.len(),
        "built deployment topology"
    );
    Ok(topology)
}

fn permissions_boundary(config: &Configuration) -> Option<String> {
    config
        .old_landing_zone
        .then(|| LEGACY_PERMISSIONS_BOUNDARY.to_string())
}

fn stack_node(kind: StackKind, environment: Environment) -> StackNode {
    StackNode {
        id: kind.stack_id(),
        kind,
        stack_name: format!("{PROJECT_NAME}-{}", kind.id_str()),
        environment,
        depends_on: Vec::new(),
        consumes: Vec::new(),
        publishes: Vec::new(),
        resources: Vec::new(),
        permissions_boundary: None,
    }
}

fn depends(kind: StackKind, reason: &str) -> Dependency {
    Dependency {
        stack: kind.stack_id(),
        reason: reason.to_string(),
    }
}

fn consume<'a>(
    keys: &'a [ParameterKey],
    region: &'a Region,
) -> impl Iterator<Item = ConsumedParameter> + 'a {
    keys.iter().map(move |key| ConsumedParameter::new(*key, region))
}

fn publish(key: ParameterKey, value: Value) -> (PublishedParameter, ResourceSpec) {
    let spec = ResourceSpec::new(
        format!("param-{}", key.path().rsplit('/').next().unwrap_or("value")),
        Resource::ParameterPublication {
            key,
            value: value.clone(),
        },
    );
    (PublishedParameter { key, value }, spec)
}

fn add_publication(node: &mut StackNode, key: ParameterKey, value: Value) {
    let (published, spec) = publish(key, value);
    node.publishes.push(published);
    node.resources.push(spec);
}

/// Logical id of a CNAME record: stable across builds and unique per name.
pub(crate) fn cname_logical_id(record_name: &str) -> String {
    let hash = Sha256::digest(record_name.as_bytes());
    let hex = hex::encode(hash);
    format!("record-{}", &hex[..10])
}

fn dns_node(config: &Configuration) -> StackNode {
    let env = config.deploy_to_environment.clone();
    let mut node = stack_node(StackKind::DnsZone, env.clone());

    node.consumes.extend(consume(
        &[
            ParameterKey::AccountRootZoneId,
            ParameterKey::AccountRootZoneName,
        ],
        &env.region,
    ));

    node.resources.push(ResourceSpec::new(
        "hosted-zone",
        Resource::HostedZone {
            zone_name: Value::Prefixed {
                prefix: format!("{}.", config.subdomain),
                key: ParameterKey::AccountRootZoneName,
            },
        },
    ));
    node.resources.push(
        ResourceSpec::new(
            "ns-record",
            Resource::NsDelegation {
                parent_zone_id: Value::Parameter(ParameterKey::AccountRootZoneId),
                parent_zone_name: Value::Parameter(ParameterKey::AccountRootZoneName),
                record_name: config.subdomain.to_string(),
                name_servers: Value::attribute("hosted-zone", "NameServers"),
            },
        )
        .after("hosted-zone"),
    );

    for (name, target) in &config.cname_records {
        node.resources.push(
            ResourceSpec::new(
                cname_logical_id(name),
                Resource::CnameRecord {
                    hosted_zone_id: Value::attribute("hosted-zone", "Id"),
                    record_name: name.clone(),
                    target: target.clone(),
                },
            )
            .after("hosted-zone"),
        );
    }

    add_publication(
        &mut node,
        ParameterKey::ZoneId,
        Value::attribute("hosted-zone", "Id"),
    );
    add_publication(
        &mut node,
        ParameterKey::ZoneName,
        Value::attribute("hosted-zone", "Name"),
    );
    node
}

fn dnssec_node(config: &Configuration) -> StackNode {
    let home = &config.deploy_to_environment.region;
    let mut node = stack_node(
        StackKind::Dnssec,
        config.deploy_to_environment.in_region(Region::us_east_1()),
    );
    node.depends_on
        .push(depends(StackKind::DnsZone, "zone parameters must exist for dnssec"));

    node.consumes.extend(consume(
        &[
            ParameterKey::ZoneId,
            ParameterKey::ZoneName,
            ParameterKey::AccountRootZoneId,
            ParameterKey::AccountRootZoneName,
        ],
        home,
    ));
    node.consumes.extend(consume(
        &[ParameterKey::AccountDnssecKmsKeyArn],
        &Region::us_east_1(),
    ));

    node.resources.push(ResourceSpec::new(
        "dnssec-keysigning-key",
        Resource::KeySigningKey {
            name: "app_ksk".to_string(),
            status: "ACTIVE".to_string(),
            hosted_zone_id: Value::Parameter(ParameterKey::ZoneId),
            kms_key_arn: Value::Parameter(ParameterKey::AccountDnssecKmsKeyArn),
        },
    ));
    node.resources.push(
        ResourceSpec::new(
            "dnssec",
            Resource::DnssecActivation {
                hosted_zone_id: Value::Parameter(ParameterKey::ZoneId),
            },
        )
        .after("dnssec-keysigning-key"),
    );
    node.resources.push(
        ResourceSpec::new(
            "dnssec-record",
            Resource::DelegationSignerRecord {
                hosted_zone_id: Value::Parameter(ParameterKey::ZoneId),
                hosted_zone_name: Value::Parameter(ParameterKey::ZoneName),
                parent_zone_id: Value::Parameter(ParameterKey::AccountRootZoneId),
                key_signing_key: "dnssec-keysigning-key".to_string(),
            },
        )
        .after("dnssec"),
    );
    node
}

fn certificate_node(config: &Configuration) -> StackNode {
    let mut node = stack_node(
        StackKind::Certificate,
        config.deploy_to_environment.in_region(Region::us_east_1()),
    );
    node.depends_on.push(depends(
        StackKind::DnsZone,
        "dns parameters must exist for cert stack",
    ));
    node.consumes.extend(consume(
        &[ParameterKey::ZoneId, ParameterKey::ZoneName],
        &config.deploy_to_environment.region,
    ));

    // Validation records for domains outside the project zone cannot be
    // created automatically.
    let validation = if config.domains.requires_external_validation() {
        CertificateValidation::External
    } else {
        CertificateValidation::ZoneAuto {
            hosted_zone_id: Value::Parameter(ParameterKey::ZoneId),
        }
    };

    node.resources.push(ResourceSpec::new(
        "certificate",
        Resource::Certificate {
            domain_name: Value::Parameter(ParameterKey::ZoneName),
            subject_alternative_names: config
                .alternative_domains()
                .iter()
                .map(ToString::to_string)
                .collect(),
            validation,
        },
    ));
    add_publication(
        &mut node,
        ParameterKey::CertificateArn,
        Value::attribute("certificate", "Arn"),
    );
    node
}

fn site_node(config: &Configuration) -> StackNode {
    let env = config.deploy_to_environment.clone();
    let mut node = stack_node(StackKind::StaticSite, env.clone());
    node.depends_on.push(depends(
        StackKind::Certificate,
        "certificate must be created before use",
    ));
    node.depends_on.push(depends(
        StackKind::DnsZone,
        "zone parameters must exist for alias records",
    ));

    node.consumes.extend(consume(
        &[ParameterKey::CertificateArn],
        &Region::us_east_1(),
    ));
    node.consumes.extend(consume(
        &[ParameterKey::ZoneId, ParameterKey::ZoneName],
        &env.region,
    ));

    node.resources.push(ResourceSpec::new(
        "website-bucket",
        Resource::WebsiteBucket {
            auto_delete_objects: true,
            removal_policy: RemovalPolicy::Destroy,
        },
    ));
    node.resources.push(
        ResourceSpec::new(
            "origin-access-identity",
            Resource::OriginAccessIdentity {
                bucket: "website-bucket".to_string(),
                comment: "CloudFront OriginAccessIdentity for website-bucket".to_string(),
            },
        )
        .after("website-bucket"),
    );
    node.resources.push(ResourceSpec::new(
        "cloudfront-logs",
        Resource::LogBucket {
            block_public_access: true,
            enforce_ssl: true,
            encryption: "S3_MANAGED".to_string(),
            object_ownership: "OBJECT_WRITER".to_string(),
            expiration_days: LOG_RETENTION_DAYS,
        },
    ));
    node.resources.push(ResourceSpec::new(
        "headers",
        Resource::ResponseHeadersPolicy {
            content_security_policy: CONTENT_SECURITY_POLICY.join(" "),
            strict_transport_security_days: HSTS_MAX_AGE_DAYS,
            include_subdomains: true,
            frame_option: "DENY".to_string(),
            referrer_policy: "no-referrer".to_string(),
            content_type_options: true,
        },
    ));
    node.resources.push(ResourceSpec::new(
        "rewrite-index",
        Resource::EdgeFunction {
            name: "rewrite-index".to_string(),
            event_type: "viewer-request".to_string(),
        },
    ));

    let domain_names = std::iter::once(Value::Parameter(ParameterKey::ZoneName))
        .chain(
            config
                .alternative_domains()
                .iter()
                .map(|d| Value::literal(d.as_str())),
        )
        .collect();
    node.resources.push(
        ResourceSpec::new(
            "cf-distribution",
            Resource::Distribution {
                origin_bucket: "website-bucket".to_string(),
                origin_access_identity: "origin-access-identity".to_string(),
                certificate_arn: Value::Parameter(ParameterKey::CertificateArn),
                domain_names,
                price_class: "PriceClass_100".to_string(),
                minimum_protocol_version: "TLSv1.2_2021".to_string(),
                viewer_protocol_policy: "redirect-to-https".to_string(),
                cache_policy: "CachingOptimized".to_string(),
                default_root_object: "index.html".to_string(),
                log_bucket: "cloudfront-logs".to_string(),
                response_headers_policy: "headers".to_string(),
                edge_function: "rewrite-index".to_string(),
            },
        )
        .after("origin-access-identity")
        .after("cloudfront-logs")
        .after("headers")
        .after("rewrite-index"),
    );

    let www = Value::Prefixed {
        prefix: "www.".to_string(),
        key: ParameterKey::ZoneName,
    };
    let aliases = [
        ("a-record", RecordType::A, Value::Parameter(ParameterKey::ZoneName)),
        ("aaaa-record", RecordType::Aaaa, Value::Parameter(ParameterKey::ZoneName)),
        ("a-record-www", RecordType::A, www.clone()),
        ("aaaa-record-www", RecordType::Aaaa, www),
    ];
    for (logical_id, record_type, record_name) in aliases {
        node.resources.push(
            ResourceSpec::new(
                logical_id,
                Resource::AliasRecord {
                    record_type,
                    hosted_zone_id: Value::Parameter(ParameterKey::ZoneId),
                    record_name,
                    distribution: "cf-distribution".to_string(),
                },
            )
            .after("cf-distribution"),
        );
    }

    node.resources.push(
        ResourceSpec::new(
            "cachebuster",
            Resource::CacheInvalidator {
                bucket: "website-bucket".to_string(),
                distribution: "cf-distribution".to_string(),
                trigger_keys: CACHE_TRIGGER_KEYS.iter().map(|k| k.to_string()).collect(),
                environment: invalidation_environment(config).to_string(),
            },
        )
        .after("website-bucket")
        .after("cf-distribution"),
    );

    add_publication(
        &mut node,
        ParameterKey::SiteBucketArn,
        Value::attribute("website-bucket", "Arn"),
    );
    node
}

/// Environment name handed to the cache invalidator.
fn invalidation_environment(config: &Configuration) -> &'static str {
    if config.branch_name.as_str() == PRODUCTION_BRANCH {
        "production"
    } else {
        "acceptance"
    }
}

fn access_user_node(config: &Configuration) -> StackNode {
    let env = config.deploy_to_environment.clone();
    let mut node = stack_node(StackKind::AccessUser, env.clone());
    node.depends_on.push(depends(
        StackKind::StaticSite,
        "bucket must exist before granting access",
    ));
    node.consumes
        .extend(consume(&[ParameterKey::SiteBucketArn], &env.region));

    node.resources.push(ResourceSpec::new(
        "s3-specific-bucket-only-boundary",
        Resource::BucketAccessPolicy {
            bucket_arn: Value::Parameter(ParameterKey::SiteBucketArn),
        },
    ));
    node.resources.push(
        ResourceSpec::new(
            "s3user",
            Resource::IamUser {
                managed_policy: "s3-specific-bucket-only-boundary".to_string(),
                removal_policy: RemovalPolicy::Destroy,
            },
        )
        .after("s3-specific-bucket-only-boundary"),
    );
    node.resources.push(
        ResourceSpec::new(
            "s3-key",
            Resource::AccessKey {
                user: "s3user".to_string(),
                serial: 1,
            },
        )
        .after("s3user"),
    );
    node.resources.push(
        ResourceSpec::new(
            "s3-secret",
            Resource::AccessKeySecret {
                access_key: "s3-key".to_string(),
            },
        )
        .after("s3-key"),
    );
    node
}

fn pipeline_definition(config: &Configuration) -> PipelineDefinition {
    let branch = config.branch_name.as_str();

    let mut synth_env = BTreeMap::new();
    synth_env.insert(BRANCH_ENV_VAR.to_string(), branch.to_string());

    let mut tags = BTreeMap::new();
    tags.insert("cdkManaged".to_string(), "yes".to_string());
    tags.insert("Project".to_string(), PROJECT_NAME.to_string());

    let validation_commands = if config.include_pipeline_validation_checks {
        vec!["npx projen test".to_string()]
    } else {
        Vec::new()
    };

    PipelineDefinition {
        name: format!("{PROJECT_NAME}-{branch}"),
        stack_name: format!("{PROJECT_NAME}-pipeline-{branch}"),
        environment: config.deploy_from_environment.clone(),
        repository: repository_slug(),
        branch: config.branch_name.clone(),
        synth_commands: vec![
            "yarn install --frozen-lockfile".to_string(),
            "npx projen build".to_string(),
            "npx projen synth".to_string(),
        ],
        synth_env,
        validation_commands,
        cross_account_keys: true,
        tags,
        stage_name: PROJECT_NAME.to_string(),
        permissions_boundary: permissions_boundary(config),
    }
}
