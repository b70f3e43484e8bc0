//! topology
//!
//! The deployment topology: which stacks exist for one configuration, where
//! each is deployed, and in which order they must be provisioned.
//!
//! # Architecture
//!
//! The topology is the sole intermediate representation between a resolved
//! [`Configuration`](crate::core::config::Configuration) and the provisioning
//! engine. It is:
//! - **Deterministic**: the same configuration always produces the same topology
//! - **Previewable**: `sitestack plan` prints it without touching any account
//! - **Serializable**: `sitestack synth` writes it as a manifest
//! - **Explicit**: dependency edges are declared, never inferred from the
//!   resources a stack reads or writes
//!
//! # Invariants
//!
//! - The stack graph is acyclic
//! - DNS zone completes before DNSSEC and before the certificate
//! - Certificate completes (and publishes its ARN) before the site
//! - Every consumed parameter is published by the account baseline or by a
//!   transitive dependency of the consumer
//!
//! # Example
//!
//! ```
//! use sitestack::core::config::ConfigurationRegistry;
//! use sitestack::topology::{self, StackKind};
//!
//! let registry = ConfigurationRegistry::builtin();
//! let config = registry.resolve("acceptance").unwrap();
//! let topology = topology::build(config).unwrap();
//!
//! let site = topology.node_of_kind(StackKind::StaticSite).unwrap();
//! assert!(site.depends_on(&StackKind::Certificate.stack_id()));
//! ```

pub mod builder;
pub mod parameters;
pub mod resources;

pub use builder::build;
pub use parameters::{ConsumedParameter, ParameterKey, Publisher};
pub use resources::{CertificateValidation, RecordType, RemovalPolicy, Resource, ResourceSpec, Value};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::graph::{StackGraph, StackId};
use crate::core::types::{BranchName, Environment};

/// Errors from topology construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// A stack reads a parameter whose publisher does not complete before it.
    #[error("stack '{consumer}' reads {key} but its expected publisher ({expected_publisher}) is not a dependency")]
    MissingCrossStackParameter {
        key: ParameterKey,
        expected_publisher: Publisher,
        consumer: StackId,
    },

    /// A dependency cycle makes the topology unprovisionable.
    #[error("dependency cycle involving stack '{stack}'")]
    DependencyCycle { stack: StackId },

    /// A dependency edge points at a stack that is not in the topology.
    #[error("stack '{stack}' depends on unknown stack '{dependency}'")]
    UnknownDependency { stack: StackId, dependency: StackId },
}

/// Kinds of stack in a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackKind {
    DnsZone,
    Dnssec,
    Certificate,
    StaticSite,
    AccessUser,
}

impl StackKind {
    /// Stable stack id within the topology.
    pub fn id_str(&self) -> &'static str {
        match self {
            StackKind::DnsZone => "dns",
            StackKind::Dnssec => "dnssec-stack",
            StackKind::Certificate => "cert-stack",
            StackKind::StaticSite => "site",
            StackKind::AccessUser => "access-user",
        }
    }

    pub fn stack_id(&self) -> StackId {
        StackId::new(self.id_str())
    }
}

impl std::fmt::Display for StackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_str())
    }
}

/// A declared happens-before edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub stack: StackId,
    pub reason: String,
}

/// A parameter a stack writes once it has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedParameter {
    pub key: ParameterKey,
    pub value: Value,
}

/// One deployable stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackNode {
    pub id: StackId,
    pub kind: StackKind,
    /// Full CloudFormation stack name
    pub stack_name: String,
    pub environment: Environment,
    pub depends_on: Vec<Dependency>,
    pub consumes: Vec<ConsumedParameter>,
    pub publishes: Vec<PublishedParameter>,
    pub resources: Vec<ResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions_boundary: Option<String>,
}

impl StackNode {
    pub fn depends_on(&self, stack: &StackId) -> bool {
        self.depends_on.iter().any(|d| &d.stack == stack)
    }

    pub fn publishes_key(&self, key: ParameterKey) -> bool {
        self.publishes.iter().any(|p| p.key == key)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }
}

/// The pipeline that deploys the topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub stack_name: String,
    /// Where the pipeline runs
    pub environment: Environment,
    pub repository: String,
    pub branch: BranchName,
    pub synth_commands: Vec<String>,
    pub synth_env: BTreeMap<String, String>,
    /// Extra commands run after synth when validation checks are enabled
    pub validation_commands: Vec<String>,
    pub cross_account_keys: bool,
    pub tags: BTreeMap<String, String>,
    /// Name of the stage holding the website stacks
    pub stage_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions_boundary: Option<String>,
}

/// Stacks, edges and pipeline for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTopology {
    pub branch: BranchName,
    pub pipeline: PipelineDefinition,
    nodes: BTreeMap<StackId, StackNode>,
    graph: StackGraph,
}

impl DeploymentTopology {
    /// Assemble a topology from nodes, deriving the graph from their
    /// declared dependencies, and verify it.
    pub fn new(
        branch: BranchName,
        pipeline: PipelineDefinition,
        nodes: Vec<StackNode>,
    ) -> Result<Self, TopologyError> {
        let mut graph = StackGraph::new();
        let nodes: BTreeMap<StackId, StackNode> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

        for node in nodes.values() {
            graph.add_node(node.id.clone());
            for dep in &node.depends_on {
                if !nodes.contains_key(&dep.stack) {
                    return Err(TopologyError::UnknownDependency {
                        stack: node.id.clone(),
                        dependency: dep.stack.clone(),
                    });
                }
                graph.add_edge(node.id.clone(), dep.stack.clone());
            }
        }

        let topology = Self {
            branch,
            pipeline,
            nodes,
            graph,
        };
        topology.verify()?;
        Ok(topology)
    }

    pub fn node(&self, id: &StackId) -> Option<&StackNode> {
        self.nodes.get(id)
    }

    pub fn node_of_kind(&self, kind: StackKind) -> Option<&StackNode> {
        self.nodes.values().find(|n| n.kind == kind)
    }

    pub fn graph(&self) -> &StackGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in a deterministic deployment order (dependencies first).
    pub fn nodes_in_order(&self) -> Vec<&StackNode> {
        self.graph
            .topological_order()
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Provisioning waves; see [`StackGraph::waves`].
    pub fn waves(&self) -> Vec<Vec<StackId>> {
        // Verified acyclic at construction.
        self.graph.waves().unwrap_or_default()
    }

    /// SHA-256 over the canonical JSON of the pipeline and the ordered
    /// stacks, as `sha256:<hex>`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the topology cannot be encoded.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let canonical = (&self.pipeline, self.nodes_in_order());
        let json = serde_json::to_vec(&canonical)?;
        let mut hasher = Sha256::new();
        hasher.update(&json);
        Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    /// Check graph shape and parameter flow.
    ///
    /// # Errors
    ///
    /// - `DependencyCycle` if the graph has a cycle
    /// - `MissingCrossStackParameter` if a stack consumes a parameter whose
    ///   publisher is absent, does not publish it, or is not a transitive
    ///   dependency of the consumer
    pub fn verify(&self) -> Result<(), TopologyError> {
        let order = self
            .graph
            .topological_order()
            .map_err(|stack| TopologyError::DependencyCycle { stack })?;

        for id in &order {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let ancestors = self.graph.ancestors(id);

            for consumed in &node.consumes {
                let publisher = consumed.key.publisher();
                let satisfied = match publisher {
                    Publisher::AccountBaseline => true,
                    Publisher::Stack(kind) => {
                        let publisher_id = kind.stack_id();
                        ancestors.contains(&publisher_id)
                            && self
                                .nodes
                                .get(&publisher_id)
                                .map(|p| p.publishes_key(consumed.key))
                                .unwrap_or(false)
                    }
                };
                if !satisfied {
                    return Err(TopologyError::MissingCrossStackParameter {
                        key: consumed.key,
                        expected_publisher: publisher,
                        consumer: id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigurationRegistry;

    fn parts() -> (BranchName, PipelineDefinition, Vec<StackNode>) {
        let registry = ConfigurationRegistry::builtin();
        let topology = build(registry.resolve("development").unwrap()).unwrap();
        let nodes = topology.nodes_in_order().into_iter().cloned().collect();
        (topology.branch.clone(), topology.pipeline.clone(), nodes)
    }

    fn node_mut(nodes: &mut [StackNode], kind: StackKind) -> &mut StackNode {
        nodes.iter_mut().find(|n| n.kind == kind).unwrap()
    }

    #[test]
    fn dropping_certificate_edge_is_missing_parameter() {
        let (branch, pipeline, mut nodes) = parts();
        node_mut(&mut nodes, StackKind::StaticSite)
            .depends_on
            .retain(|d| d.stack != StackKind::Certificate.stack_id());

        let err = DeploymentTopology::new(branch, pipeline, nodes).unwrap_err();
        assert_eq!(
            err,
            TopologyError::MissingCrossStackParameter {
                key: ParameterKey::CertificateArn,
                expected_publisher: Publisher::Stack(StackKind::Certificate),
                consumer: StackKind::StaticSite.stack_id(),
            }
        );
    }

    #[test]
    fn transitive_publisher_is_enough() {
        let (branch, pipeline, mut nodes) = parts();
        // site still reaches dns through cert-stack
        node_mut(&mut nodes, StackKind::StaticSite)
            .depends_on
            .retain(|d| d.stack != StackKind::DnsZone.stack_id());

        assert!(DeploymentTopology::new(branch, pipeline, nodes).is_ok());
    }

    #[test]
    fn publisher_must_actually_publish() {
        let (branch, pipeline, mut nodes) = parts();
        node_mut(&mut nodes, StackKind::DnsZone)
            .publishes
            .retain(|p| p.key != ParameterKey::ZoneName);

        let err = DeploymentTopology::new(branch, pipeline, nodes).unwrap_err();
        assert!(matches!(
            err,
            TopologyError::MissingCrossStackParameter {
                key: ParameterKey::ZoneName,
                ..
            }
        ));
    }

    #[test]
    fn cycle_is_rejected() {
        let (branch, pipeline, mut nodes) = parts();
        node_mut(&mut nodes, StackKind::DnsZone)
            .depends_on
            .push(Dependency {
                stack: StackKind::StaticSite.stack_id(),
                reason: "test".into(),
            });

        let err = DeploymentTopology::new(branch, pipeline, nodes).unwrap_err();
        assert!(matches!(err, TopologyError::DependencyCycle { .. }));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let (branch, pipeline, mut nodes) = parts();
        nodes.retain(|n| n.kind != StackKind::StaticSite);

        let err = DeploymentTopology::new(branch, pipeline, nodes).unwrap_err();
        assert_eq!(
            err,
            TopologyError::UnknownDependency {
                stack: StackKind::AccessUser.stack_id(),
                dependency: StackKind::StaticSite.stack_id(),
            }
        );
    }

    #[test]
    fn error_messages_name_the_stack() {
        let err = TopologyError::MissingCrossStackParameter {
            key: ParameterKey::CertificateArn,
            expected_publisher: Publisher::Stack(StackKind::Certificate),
            consumer: StackKind::StaticSite.stack_id(),
        };
        assert_eq!(
            err.to_string(),
            "stack 'site' reads /component-library/certificates/certificate-arn but its expected publisher (stack 'cert-stack') is not a dependency"
        );
    }

    #[test]
    fn digest_changes_with_content() {
        let registry = ConfigurationRegistry::builtin();
        let acc = build(registry.resolve("acceptance").unwrap()).unwrap();
        let main = build(registry.resolve("main").unwrap()).unwrap();
        let digest = acc.digest().unwrap();
        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), "sha256:".len() + 64);
        assert_ne!(digest, main.digest().unwrap());
    }
}
