//! engine::provision
//!
//! Materializing one stack.
//!
//! # Design
//!
//! A `Provisioner` receives a stack node together with the values of every
//! parameter it consumes, and returns the values of the parameters it
//! publishes. It never reads or writes the parameter store itself; the
//! executor owns that exchange.
//!
//! Two implementations ship with the crate:
//! - [`MockProvisioner`] records calls and supports injected failures
//! - [`AssemblyProvisioner`] writes one template per stack plus a manifest,
//!   the input of a CloudFormation deployment

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::core::graph::StackId;
use crate::core::types::Environment;
use crate::topology::{
    DeploymentTopology, ParameterKey, PipelineDefinition, ResourceSpec, StackNode, Value,
};

/// Values of the parameters a stack consumes.
pub type ResolvedInputs = BTreeMap<ParameterKey, String>;

/// Values of the parameters a stack publishes.
pub type StackOutputs = BTreeMap<ParameterKey, String>;

/// Errors from provisioning a stack.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The target rejected the stack.
    #[error("stack '{stack}' failed: {message}")]
    Rejected { stack: StackId, message: String },

    /// Writing an assembly artifact failed.
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing an assembly artifact failed.
    #[error("failed to serialize {what}: {message}")]
    Serialize { what: String, message: String },
}

/// Materializes one stack node.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(
        &self,
        node: &StackNode,
        inputs: &ResolvedInputs,
    ) -> Result<StackOutputs, ProvisionError>;
}

/// Render a value against resolved inputs.
///
/// Attributes become `<stack>/<resource>.<attribute>` placeholders, the form
/// in which generated identifiers flow between stacks before deployment.
/// Returns `None` when a parameter the value reads was not resolved.
pub fn render_value(stack: &StackId, value: &Value, inputs: &ResolvedInputs) -> Option<String> {
    match value {
        Value::Literal(s) => Some(s.clone()),
        Value::Parameter(key) => inputs.get(key).cloned(),
        Value::Prefixed { prefix, key } => inputs.get(key).map(|v| format!("{prefix}{v}")),
        Value::Attribute {
            resource,
            attribute,
        } => Some(format!("{stack}/{resource}.{attribute}")),
    }
}

fn outputs_of(node: &StackNode, inputs: &ResolvedInputs) -> StackOutputs {
    node.publishes
        .iter()
        .filter_map(|p| render_value(&node.id, &p.value, inputs).map(|v| (p.key, v)))
        .collect()
}

// ============================================================================
// Mock
// ============================================================================

/// Mock provisioner for deterministic testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
///
/// # Example
///
/// ```
/// use sitestack::engine::provision::{MockProvisioner, Provisioner, ResolvedInputs};
/// use sitestack::core::config::ConfigurationRegistry;
/// use sitestack::topology::{self, ParameterKey, StackKind};
///
/// # tokio_test::block_on(async {
/// let registry = ConfigurationRegistry::builtin();
/// let topology = topology::build(registry.resolve("acceptance").unwrap()).unwrap();
/// let dns = topology.node_of_kind(StackKind::DnsZone).unwrap();
///
/// let provisioner = MockProvisioner::new();
/// let outputs = provisioner.provision(dns, &ResolvedInputs::new()).await.unwrap();
/// assert_eq!(outputs[&ParameterKey::ZoneId], "dns/hosted-zone.Id");
/// assert_eq!(provisioner.provisioned(), vec![dns.id.clone()]);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockProvisioner {
    inner: Arc<Mutex<MockProvisionerInner>>,
}

#[derive(Debug, Default)]
struct MockProvisionerInner {
    /// Stacks to fail, with the message to fail with.
    fail_on: HashMap<StackId, String>,
    /// Outputs to drop from a stack's result.
    omit: Vec<(StackId, ParameterKey)>,
    /// Per-stack provisioning time.
    delays: HashMap<StackId, Duration>,
    /// Recorded events for verification.
    events: Vec<ProvisionEvent>,
}

/// Recorded provisioner event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    Started {
        stack: StackId,
        inputs: ResolvedInputs,
    },
    Finished {
        stack: StackId,
    },
    Failed {
        stack: StackId,
    },
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail provisioning of `stack` with `message`.
    pub fn fail_on(self, stack: StackId, message: impl Into<String>) -> Self {
        self.lock().fail_on.insert(stack, message.into());
        self
    }

    /// Leave `key` out of the outputs of `stack`.
    pub fn omit_output(self, stack: StackId, key: ParameterKey) -> Self {
        self.lock().omit.push((stack, key));
        self
    }

    /// Make provisioning `stack` take `delay`.
    pub fn with_delay(self, stack: StackId, delay: Duration) -> Self {
        self.lock().delays.insert(stack, delay);
        self
    }

    /// All recorded events, in the order they happened.
    pub fn events(&self) -> Vec<ProvisionEvent> {
        self.lock().events.clone()
    }

    /// Stacks that finished, in completion order.
    pub fn provisioned(&self) -> Vec<StackId> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ProvisionEvent::Finished { stack } => Some(stack.clone()),
                _ => None,
            })
            .collect()
    }

    /// Inputs a stack was started with, if it was started.
    pub fn inputs_of(&self, stack: &StackId) -> Option<ResolvedInputs> {
        self.lock().events.iter().find_map(|e| match e {
            ProvisionEvent::Started { stack: s, inputs } if s == stack => Some(inputs.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, MockProvisionerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn provision(
        &self,
        node: &StackNode,
        inputs: &ResolvedInputs,
    ) -> Result<StackOutputs, ProvisionError> {
        let delay = {
            let mut inner = self.lock();
            inner.events.push(ProvisionEvent::Started {
                stack: node.id.clone(),
                inputs: inputs.clone(),
            });
            inner.delays.get(&node.id).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        if let Some(message) = inner.fail_on.get(&node.id).cloned() {
            inner.events.push(ProvisionEvent::Failed {
                stack: node.id.clone(),
            });
            return Err(ProvisionError::Rejected {
                stack: node.id.clone(),
                message,
            });
        }

        let mut outputs = outputs_of(node, inputs);
        for (stack, key) in &inner.omit {
            if stack == &node.id {
                outputs.remove(key);
            }
        }
        inner.events.push(ProvisionEvent::Finished {
            stack: node.id.clone(),
        });
        Ok(outputs)
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Manifest file name inside the assembly directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Writes a deployable assembly: one `<stack name>.template.json` per stack
/// and a `manifest.json` describing order and targets.
#[derive(Debug, Clone)]
pub struct AssemblyProvisioner {
    out_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct StackTemplate<'a> {
    stack_name: &'a str,
    environment: &'a Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions_boundary: Option<&'a str>,
    /// Consumed parameters by path, as rendered at synth time.
    parameters: BTreeMap<&'static str, &'a str>,
    resources: &'a [ResourceSpec],
    /// Published parameters by path.
    outputs: BTreeMap<&'static str, String>,
}

/// Contents of `manifest.json`.
#[derive(Debug, Serialize)]
pub struct AssemblyManifest<'a> {
    pub version: u32,
    pub branch: &'a str,
    pub digest: String,
    pub pipeline: &'a PipelineDefinition,
    pub waves: Vec<Vec<StackId>>,
    pub stacks: Vec<ManifestEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ManifestEntry<'a> {
    pub id: &'a StackId,
    pub stack_name: &'a str,
    pub environment: &'a Environment,
    pub depends_on: Vec<&'a StackId>,
    pub template: String,
}

impl AssemblyProvisioner {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn template_file(node: &StackNode) -> String {
        format!("{}.template.json", node.stack_name)
    }

    /// Write `manifest.json` for `topology`. Returns its path.
    pub fn write_manifest(&self, topology: &DeploymentTopology) -> Result<PathBuf, ProvisionError> {
        let digest = topology.digest().map_err(|e| ProvisionError::Serialize {
            what: "topology digest".to_string(),
            message: e.to_string(),
        })?;
        let manifest = AssemblyManifest {
            version: 1,
            branch: topology.branch.as_str(),
            digest,
            pipeline: &topology.pipeline,
            waves: topology.waves(),
            stacks: topology
                .nodes_in_order()
                .into_iter()
                .map(|node| ManifestEntry {
                    id: &node.id,
                    stack_name: &node.stack_name,
                    environment: &node.environment,
                    depends_on: node.depends_on.iter().map(|d| &d.stack).collect(),
                    template: Self::template_file(node),
                })
                .collect(),
        };
        self.write_json(MANIFEST_FILE, &manifest)
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<PathBuf, ProvisionError> {
        fs::create_dir_all(&self.out_dir).map_err(|source| ProvisionError::Io {
            path: self.out_dir.clone(),
            source,
        })?;
        let json = serde_json::to_string_pretty(value).map_err(|e| ProvisionError::Serialize {
            what: file.to_string(),
            message: e.to_string(),
        })?;
        let path = self.out_dir.join(file);
        fs::write(&path, json).map_err(|source| ProvisionError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "wrote assembly file");
        Ok(path)
    }
}

#[async_trait]
impl Provisioner for AssemblyProvisioner {
    async fn provision(
        &self,
        node: &StackNode,
        inputs: &ResolvedInputs,
    ) -> Result<StackOutputs, ProvisionError> {
        let outputs = outputs_of(node, inputs);
        let template = StackTemplate {
            stack_name: &node.stack_name,
            environment: &node.environment,
            permissions_boundary: node.permissions_boundary.as_deref(),
            parameters: inputs
                .iter()
                .map(|(key, value)| (key.path(), value.as_str()))
                .collect(),
            resources: &node.resources,
            outputs: outputs
                .iter()
                .map(|(key, value)| (key.path(), value.clone()))
                .collect(),
        };
        self.write_json(&Self::template_file(node), &template)?;
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigurationRegistry;
    use crate::topology::{self, StackKind};

    fn topology(name: &str) -> DeploymentTopology {
        let registry = ConfigurationRegistry::builtin();
        topology::build(registry.resolve(name).unwrap()).unwrap()
    }

    #[test]
    fn render_values() {
        let stack = StackId::new("site");
        let mut inputs = ResolvedInputs::new();
        inputs.insert(ParameterKey::ZoneName, "componenten.example.nl".into());

        let www = Value::Prefixed {
            prefix: "www.".into(),
            key: ParameterKey::ZoneName,
        };
        assert_eq!(
            render_value(&stack, &www, &inputs).as_deref(),
            Some("www.componenten.example.nl")
        );
        assert_eq!(
            render_value(&stack, &Value::attribute("website-bucket", "Arn"), &inputs).as_deref(),
            Some("site/website-bucket.Arn")
        );
        assert_eq!(
            render_value(&stack, &Value::Parameter(ParameterKey::ZoneId), &inputs),
            None
        );
    }

    #[tokio::test]
    async fn mock_failure_is_recorded() {
        let topology = topology("acceptance");
        let cert = topology.node_of_kind(StackKind::Certificate).unwrap();
        let provisioner = MockProvisioner::new().fail_on(cert.id.clone(), "limit exceeded");

        let err = provisioner
            .provision(cert, &ResolvedInputs::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("limit exceeded"));
        assert_eq!(
            provisioner.events().last(),
            Some(&ProvisionEvent::Failed {
                stack: cert.id.clone()
            })
        );
        assert!(provisioner.provisioned().is_empty());
    }

    #[tokio::test]
    async fn mock_omits_outputs() {
        let topology = topology("acceptance");
        let dns = topology.node_of_kind(StackKind::DnsZone).unwrap();
        let provisioner =
            MockProvisioner::new().omit_output(dns.id.clone(), ParameterKey::ZoneName);

        let outputs = provisioner
            .provision(dns, &ResolvedInputs::new())
            .await
            .unwrap();
        assert!(outputs.contains_key(&ParameterKey::ZoneId));
        assert!(!outputs.contains_key(&ParameterKey::ZoneName));
    }

    #[tokio::test]
    async fn assembly_writes_template_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let topology = topology("main");
        let site = topology.node_of_kind(StackKind::StaticSite).unwrap();
        let provisioner = AssemblyProvisioner::new(dir.path());

        let mut inputs = ResolvedInputs::new();
        inputs.insert(ParameterKey::CertificateArn, "arn:cert".into());
        let outputs = provisioner.provision(site, &inputs).await.unwrap();
        assert_eq!(outputs[&ParameterKey::SiteBucketArn], "site/website-bucket.Arn");

        let template_path = dir.path().join("component-library-site.template.json");
        let template: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(template_path).unwrap()).unwrap();
        assert_eq!(template["stack_name"], "component-library-site");
        assert_eq!(
            template["parameters"]["/component-library/certificates/certificate-arn"],
            "arn:cert"
        );

        let manifest_path = provisioner.write_manifest(&topology).unwrap();
        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(manifest_path).unwrap()).unwrap();
        assert_eq!(manifest["branch"], "main");
        assert_eq!(manifest["stacks"][0]["id"], "dns");
        assert_eq!(manifest["stacks"].as_array().unwrap().len(), 4);
        assert_eq!(manifest["pipeline"]["name"], "component-library-main");
    }
}
