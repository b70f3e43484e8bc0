//! engine::exec
//!
//! The topology executor.
//!
//! # Architecture
//!
//! The executor is the only component that provisions stacks. It walks the
//! topology in waves: a wave holds every stack whose dependencies have all
//! completed. Stacks in one wave run concurrently; the next wave starts only
//! once the whole wave has completed.
//!
//! For each stack the executor:
//! 1. Reads every consumed parameter, each read bounded by the parameter
//!    timeout
//! 2. Hands the node and its resolved inputs to the provisioner
//! 3. Writes every declared output to the store in the stack's own region
//!
//! # Invariants
//!
//! - A dependent never starts before all its dependencies have completed
//! - Any error aborts the whole run; no later wave is started
//! - Only parameter timeouts are retryable

use std::time::Duration;

use futures::future::try_join_all;
use thiserror::Error;
use tracing::{debug, info};

use super::params::{ParameterStore, StoreError};
use super::provision::{ProvisionError, Provisioner, ResolvedInputs};
use crate::core::graph::StackId;
use crate::core::types::Region;
use crate::topology::{DeploymentTopology, ParameterKey, StackNode};

/// Default bound on a single parameter read.
pub const DEFAULT_PARAMETER_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from topology execution.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// A consumed parameter has not been written.
    #[error("stack '{consumer}' needs {key} in {region}, but it has not been published")]
    MissingCrossStackParameter {
        key: ParameterKey,
        region: Region,
        consumer: StackId,
    },

    /// Reading a parameter exceeded its time budget.
    #[error("timed out after {timeout:?} reading {key} in {region} for stack '{consumer}'")]
    ParameterFetchTimeout {
        key: ParameterKey,
        region: Region,
        consumer: StackId,
        timeout: Duration,
    },

    /// The provisioner did not return a declared output.
    #[error("stack '{stack}' completed without producing {key}")]
    MissingOutput { stack: StackId, key: ParameterKey },

    /// The provisioner returned an output the stack does not declare.
    #[error("stack '{stack}' produced undeclared output {key}")]
    UndeclaredOutput { stack: StackId, key: ParameterKey },

    #[error("parameter store error for stack '{stack}': {source}")]
    Store {
        stack: StackId,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The topology could not be ordered.
    #[error("dependency cycle involving stack '{0}'")]
    Cycle(StackId),
}

impl ExecuteError {
    /// Whether re-submitting the same topology may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecuteError::ParameterFetchTimeout { .. })
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteReport {
    /// Waves as executed.
    pub waves: Vec<Vec<StackId>>,
    /// Number of parameters written.
    pub published: usize,
}

impl ExecuteReport {
    pub fn stacks(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }
}

/// The executor.
pub struct Executor<'a> {
    store: &'a dyn ParameterStore,
    provisioner: &'a dyn Provisioner,
    parameter_timeout: Duration,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a dyn ParameterStore, provisioner: &'a dyn Provisioner) -> Self {
        Self {
            store,
            provisioner,
            parameter_timeout: DEFAULT_PARAMETER_TIMEOUT,
        }
    }

    pub fn with_parameter_timeout(mut self, timeout: Duration) -> Self {
        self.parameter_timeout = timeout;
        self
    }

    /// Execute every stack of `topology`, wave by wave.
    ///
    /// # Errors
    ///
    /// The first error from any stack aborts the run. Stacks still running
    /// in the same wave are dropped.
    pub async fn execute(
        &self,
        topology: &DeploymentTopology,
    ) -> Result<ExecuteReport, ExecuteError> {
        let waves = topology.graph().waves().map_err(ExecuteError::Cycle)?;
        let mut published = 0;

        for (index, wave) in waves.iter().enumerate() {
            info!(
                wave = index + 1,
                stacks = %join_ids(wave),
                "provisioning wave"
            );
            let nodes = wave.iter().filter_map(|id| topology.node(id));
            let written = try_join_all(nodes.map(|node| self.run_node(node))).await?;
            published += written.iter().sum::<usize>();
        }

        info!(
            branch = %topology.branch,
            stacks = topology.len(),
            "topology submitted"
        );
        Ok(ExecuteReport { waves, published })
    }

    /// Provision one stack. Returns the number of parameters written.
    async fn run_node(&self, node: &StackNode) -> Result<usize, ExecuteError> {
        debug!(stack = %node.id, environment = %node.environment, "resolving inputs");
        let inputs = self.resolve_inputs(node).await?;

        debug!(stack = %node.id, inputs = inputs.len(), "provisioning");
        let outputs = self.provisioner.provision(node, &inputs).await?;

        if let Some(key) = outputs.keys().find(|key| !node.publishes_key(**key)) {
            return Err(ExecuteError::UndeclaredOutput {
                stack: node.id.clone(),
                key: *key,
            });
        }

        for published in &node.publishes {
            let value = outputs
                .get(&published.key)
                .ok_or_else(|| ExecuteError::MissingOutput {
                    stack: node.id.clone(),
                    key: published.key,
                })?;
            self.store
                .put(&node.environment.region, published.key, value.clone())
                .await
                .map_err(|source| ExecuteError::Store {
                    stack: node.id.clone(),
                    source,
                })?;
        }

        info!(stack = %node.id, "stack complete");
        Ok(node.publishes.len())
    }

    async fn resolve_inputs(&self, node: &StackNode) -> Result<ResolvedInputs, ExecuteError> {
        let mut inputs = ResolvedInputs::new();
        for consumed in &node.consumes {
            let read = self.store.get(&consumed.region, consumed.key);
            let value = tokio::time::timeout(self.parameter_timeout, read)
                .await
                .map_err(|_| ExecuteError::ParameterFetchTimeout {
                    key: consumed.key,
                    region: consumed.region.clone(),
                    consumer: node.id.clone(),
                    timeout: self.parameter_timeout,
                })?
                .map_err(|source| ExecuteError::Store {
                    stack: node.id.clone(),
                    source,
                })?
                .ok_or_else(|| ExecuteError::MissingCrossStackParameter {
                    key: consumed.key,
                    region: consumed.region.clone(),
                    consumer: node.id.clone(),
                })?;
            inputs.insert(consumed.key, value);
        }
        Ok(inputs)
    }
}

fn join_ids(ids: &[StackId]) -> String {
    ids.iter()
        .map(StackId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigurationRegistry;
    use crate::engine::params::InMemoryParameterStore;
    use crate::engine::provision::{MockProvisioner, ProvisionEvent};
    use crate::topology::{self, StackKind};

    fn topology(name: &str) -> DeploymentTopology {
        let registry = ConfigurationRegistry::builtin();
        topology::build(registry.resolve(name).unwrap()).unwrap()
    }

    fn home() -> Region {
        Region::new("eu-central-1").unwrap()
    }

    fn seeded() -> InMemoryParameterStore {
        InMemoryParameterStore::new().with_account_baseline(&home())
    }

    #[tokio::test]
    async fn provisions_every_stack_and_publishes() {
        let topology = topology("development");
        let store = seeded();
        let provisioner = MockProvisioner::new();

        let report = Executor::new(&store, &provisioner)
            .execute(&topology)
            .await
            .unwrap();

        assert_eq!(report.stacks(), 5);
        assert_eq!(report.published, 4);
        assert_eq!(provisioner.provisioned().len(), 5);

        // Certificate ARN lands in us-east-1, and the site read it from there.
        let arn = store
            .value(&Region::us_east_1(), ParameterKey::CertificateArn)
            .unwrap();
        let site_inputs = provisioner
            .inputs_of(&StackKind::StaticSite.stack_id())
            .unwrap();
        assert_eq!(site_inputs[&ParameterKey::CertificateArn], arn);
    }

    #[tokio::test]
    async fn dependents_start_after_dependencies_finish() {
        let topology = topology("development");
        let store = seeded();
        let provisioner = MockProvisioner::new()
            .with_delay(StackKind::Certificate.stack_id(), Duration::from_millis(20));

        Executor::new(&store, &provisioner)
            .execute(&topology)
            .await
            .unwrap();

        let events = provisioner.events();
        let position = |wanted: &ProvisionEvent| events.iter().position(|e| e == wanted).unwrap();
        for node in topology.nodes_in_order() {
            let started = events
                .iter()
                .position(|e| matches!(e, ProvisionEvent::Started { stack, .. } if stack == &node.id))
                .unwrap();
            for dep in &node.depends_on {
                let finished = position(&ProvisionEvent::Finished {
                    stack: dep.stack.clone(),
                });
                assert!(finished < started, "{} started before {}", node.id, dep.stack);
            }
        }
    }

    #[tokio::test]
    async fn missing_baseline_parameter_aborts() {
        let topology = topology("acceptance");
        let store = InMemoryParameterStore::new();
        let provisioner = MockProvisioner::new();

        let err = Executor::new(&store, &provisioner)
            .execute(&topology)
            .await
            .unwrap_err();

        match &err {
            ExecuteError::MissingCrossStackParameter { key, consumer, .. } => {
                assert_eq!(*key, ParameterKey::AccountRootZoneId);
                assert_eq!(consumer, &StackKind::DnsZone.stack_id());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!err.is_retryable());
        assert!(provisioner.events().is_empty());
    }

    #[tokio::test]
    async fn slow_store_times_out_retryably() {
        let topology = topology("acceptance");
        let store = seeded().with_read_latency(Duration::from_millis(200));
        let provisioner = MockProvisioner::new();

        let err = Executor::new(&store, &provisioner)
            .with_parameter_timeout(Duration::from_millis(10))
            .execute(&topology)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::ParameterFetchTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_output_aborts_before_dependents() {
        let topology = topology("acceptance");
        let store = seeded();
        let provisioner = MockProvisioner::new()
            .omit_output(StackKind::DnsZone.stack_id(), ParameterKey::ZoneId);

        let err = Executor::new(&store, &provisioner)
            .execute(&topology)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExecuteError::MissingOutput {
                key: ParameterKey::ZoneId,
                ..
            }
        ));
        assert!(!err.is_retryable());
        assert_eq!(provisioner.provisioned(), vec![StackKind::DnsZone.stack_id()]);
    }

    #[tokio::test]
    async fn provisioner_failure_stops_later_waves() {
        let topology = topology("acceptance");
        let store = seeded();
        let provisioner =
            MockProvisioner::new().fail_on(StackKind::Certificate.stack_id(), "quota");

        let err = Executor::new(&store, &provisioner)
            .execute(&topology)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::Provision(_)));
        assert!(provisioner
            .inputs_of(&StackKind::StaticSite.stack_id())
            .is_none());
    }

    #[tokio::test]
    async fn rerun_against_same_store_republishes() {
        let topology = topology("acceptance");
        let store = seeded();
        let provisioner = MockProvisioner::new();
        let executor = Executor::new(&store, &provisioner);

        let first = executor.execute(&topology).await.unwrap();
        let second = executor.execute(&topology).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.writes().len(), first.published);
    }

    #[tokio::test]
    async fn conflicting_publication_is_rejected() {
        let topology = topology("acceptance");
        let store = seeded().with(&home(), ParameterKey::ZoneId, "Z0STALE");
        let provisioner = MockProvisioner::new();

        let err = Executor::new(&store, &provisioner)
            .execute(&topology)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Store {
                source: StoreError::AlreadyWritten {
                    key: ParameterKey::ZoneId,
                    ..
                },
                ..
            }
        ));
        assert!(!err.is_retryable());
    }
}
