//! Integration tests for deployment runs.
//!
//! These tests drive the full flow: Resolve → Build → Execute, against an
//! in-memory parameter store and either the recording or the assembly
//! provisioner.

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use sitestack::core::config::ConfigurationRegistry;
use sitestack::core::types::Region;
use sitestack::engine::provision::{ProvisionEvent, MANIFEST_FILE};
use sitestack::engine::{
    run_deployment, AssemblyProvisioner, Context, InMemoryParameterStore, MockProvisioner,
    RetryPolicy, RunError,
};
use sitestack::topology::{ParameterKey, StackKind};

// =============================================================================
// Test Fixtures
// =============================================================================

fn home() -> Region {
    Region::new("eu-central-1").unwrap()
}

fn baseline_store() -> InMemoryParameterStore {
    InMemoryParameterStore::new().with_account_baseline(&home())
}

fn context(retries: u32) -> Context {
    Context {
        parameter_timeout: Duration::from_millis(500),
        retry: RetryPolicy {
            retries,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        },
        ..Context::default()
    }
}

const REGISTRY_TOML: &str = r#"
[configurations.preview]
branch_name = "preview"
deploy_from_environment = { account = "836443378780", region = "eu-central-1" }
deploy_to_environment = { account = "111122223333", region = "eu-west-1" }
subdomain = "componenten-preview"
alternative_domains = ["preview.componenten.nl"]
include_pipeline_validation_checks = true
iam_user_access = true
old_landing_zone = true

[configurations.preview.cname_records]
_abc123 = "_def456.acm-validations.aws"
"#;

fn write_registry(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("registry.toml");
    std::fs::write(&path, REGISTRY_TOML).unwrap();
    path
}

// =============================================================================
// Recording provisioner
// =============================================================================

#[tokio::test]
async fn production_run_publishes_every_parameter() {
    let registry = ConfigurationRegistry::builtin();
    let store = baseline_store();
    let provisioner = MockProvisioner::new();

    let deployment = run_deployment(&registry, "main", &store, &provisioner, &context(0))
        .await
        .unwrap();

    assert_eq!(deployment.configuration, "production");
    assert_eq!(deployment.report.stacks(), 4);
    assert_eq!(deployment.report.published, 4);

    assert!(store.value(&home(), ParameterKey::ZoneId).is_some());
    assert!(store.value(&home(), ParameterKey::ZoneName).is_some());
    assert!(store.value(&home(), ParameterKey::SiteBucketArn).is_some());
    assert!(store
        .value(&Region::us_east_1(), ParameterKey::CertificateArn)
        .is_some());
    assert!(store.value(&home(), ParameterKey::CertificateArn).is_none());
}

#[tokio::test]
async fn site_sees_certificate_published_in_us_east_1() {
    let registry = ConfigurationRegistry::builtin();
    let store = baseline_store();
    let provisioner = MockProvisioner::new();

    run_deployment(&registry, "acceptance", &store, &provisioner, &context(0))
        .await
        .unwrap();

    let published = store
        .value(&Region::us_east_1(), ParameterKey::CertificateArn)
        .unwrap();
    let inputs = provisioner
        .inputs_of(&StackKind::StaticSite.stack_id())
        .unwrap();
    assert_eq!(inputs.get(&ParameterKey::CertificateArn), Some(&published));
}

#[tokio::test]
async fn stacks_start_only_after_their_dependencies_finish() {
    let registry = ConfigurationRegistry::builtin();
    let store = baseline_store();
    let provisioner = MockProvisioner::new();

    let deployment = run_deployment(&registry, "development", &store, &provisioner, &context(0))
        .await
        .unwrap();

    let events = provisioner.events();
    let position = |wanted: &ProvisionEvent| events.iter().position(|e| e == wanted);
    for node in deployment.topology.nodes_in_order() {
        let started = events
            .iter()
            .position(|e| matches!(e, ProvisionEvent::Started { stack, .. } if *stack == node.id))
            .unwrap();
        for dependency in &node.depends_on {
            let finished = position(&ProvisionEvent::Finished {
                stack: dependency.stack.clone(),
            })
            .unwrap();
            assert!(finished < started, "{} started before {}", node.id, dependency.stack);
        }
    }
}

#[tokio::test]
async fn missing_baseline_fails_before_anything_is_written() {
    let registry = ConfigurationRegistry::builtin();
    let store = InMemoryParameterStore::new();
    let provisioner = MockProvisioner::new();

    let err = run_deployment(&registry, "acceptance", &store, &provisioner, &context(3))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Execute { attempts: 1, .. }));
    assert!(err.to_string().contains("attempt"), "{err}");
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn registry_file_drives_the_run() {
    let dir = TempDir::new().unwrap();
    let registry = ConfigurationRegistry::load(&write_registry(dir.path())).unwrap();
    let west = Region::new("eu-west-1").unwrap();
    let store = InMemoryParameterStore::new().with_account_baseline(&west);
    let provisioner = MockProvisioner::new();

    let deployment = run_deployment(&registry, "preview", &store, &provisioner, &context(0))
        .await
        .unwrap();

    assert_eq!(deployment.report.stacks(), 5);
    assert!(store.value(&west, ParameterKey::SiteBucketArn).is_some());
    for node in deployment.topology.nodes_in_order() {
        assert!(node.permissions_boundary.is_some(), "{}", node.id);
    }
    assert!(deployment
        .topology
        .pipeline
        .validation_commands
        .iter()
        .any(|c| c.contains("test")));
}

// =============================================================================
// Assembly provisioner
// =============================================================================

#[tokio::test]
async fn assembly_writes_one_template_per_stack() {
    let dir = TempDir::new().unwrap();
    let registry = ConfigurationRegistry::builtin();
    let store = baseline_store();
    let provisioner = AssemblyProvisioner::new(dir.path().join("cdk.out"));

    let deployment = run_deployment(&registry, "development", &store, &provisioner, &context(0))
        .await
        .unwrap();
    let manifest_path = provisioner.write_manifest(&deployment.topology).unwrap();
    assert_eq!(manifest_path, dir.path().join("cdk.out").join(MANIFEST_FILE));

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    assert_eq!(manifest["branch"], "development");
    assert_eq!(manifest["digest"], deployment.topology.digest().unwrap());

    let stacks = manifest["stacks"].as_array().unwrap();
    assert_eq!(stacks.len(), deployment.topology.len());
    for stack in stacks {
        let template = stack["template"].as_str().unwrap();
        assert!(
            provisioner.out_dir().join(template).is_file(),
            "missing {template}"
        );
    }
}
