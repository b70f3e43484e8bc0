//! engine::runner
//!
//! The single entry point for a deployment run.
//!
//! # Architecture
//!
//! ```text
//! branch signal -> Resolve -> Build -> Execute [-> backoff -> Execute]* -> Return
//! ```
//!
//! # Invariants
//!
//! - Exactly one configuration is resolved per run
//! - The topology is built exactly once, before the first attempt
//! - Only retryable execution errors are retried, at most `retries` times
//!
//! # Example
//!
//! ```
//! use sitestack::core::config::ConfigurationRegistry;
//! use sitestack::engine::{run_deployment, Context, InMemoryParameterStore, MockProvisioner};
//! use sitestack::core::types::Region;
//!
//! # tokio_test::block_on(async {
//! let registry = ConfigurationRegistry::builtin();
//! let store = InMemoryParameterStore::new()
//!     .with_account_baseline(&Region::new("eu-central-1").unwrap());
//! let provisioner = MockProvisioner::new();
//!
//! let deployment = run_deployment(&registry, "acceptance", &store, &provisioner, &Context::default())
//!     .await
//!     .unwrap();
//! assert_eq!(deployment.configuration, "acceptance");
//! assert_eq!(deployment.attempts, 1);
//! # });
//! ```

use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::exec::{ExecuteError, ExecuteReport, Executor};
use super::params::ParameterStore;
use super::provision::Provisioner;
use super::Context;
use crate::core::config::{ConfigError, ConfigurationRegistry};
use crate::core::statics::DEFAULT_BRANCH;
use crate::topology::{self, DeploymentTopology, TopologyError};

/// Errors from a deployment run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("deployment failed after {attempts} attempt(s): {source}")]
    Execute {
        attempts: u32,
        #[source]
        source: ExecuteError,
    },
}

/// Exponential backoff for retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// Registry key of the resolved configuration.
    pub configuration: String,
    pub topology: DeploymentTopology,
    pub report: ExecuteReport,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Pick the branch to build from the branch signal.
///
/// An absent signal selects the default branch. A present signal is passed
/// through unchanged, even when empty, so that resolving it fails loudly.
pub fn branch_to_build(signal: Option<&str>) -> &str {
    signal.unwrap_or(DEFAULT_BRANCH)
}

/// Resolve, build and submit the topology for `branch`.
///
/// # Errors
///
/// - `RunError::Config` if no configuration matches `branch`
/// - `RunError::Topology` if the topology fails verification
/// - `RunError::Execute` on a fatal execution error, or once retries for a
///   retryable one are exhausted
pub async fn run_deployment(
    registry: &ConfigurationRegistry,
    branch: &str,
    store: &dyn ParameterStore,
    provisioner: &dyn Provisioner,
    ctx: &Context,
) -> Result<Deployment, RunError> {
    let config = registry.resolve(branch)?;
    info!(
        branch,
        configuration = %config.name,
        target = %config.deploy_to_environment,
        "resolved configuration"
    );

    let topology = topology::build(config)?;
    let executor = Executor::new(store, provisioner).with_parameter_timeout(ctx.parameter_timeout);

    let mut attempts = 0;
    loop {
        attempts += 1;
        match executor.execute(&topology).await {
            Ok(report) => {
                return Ok(Deployment {
                    configuration: config.name.clone(),
                    topology,
                    report,
                    attempts,
                });
            }
            Err(e) if e.is_retryable() && attempts <= ctx.retry.retries => {
                let delay = ctx.retry.delay(attempts);
                warn!(
                    "Deployment attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempts,
                    ctx.retry.retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!("Deployment failed after {} attempt(s): {}", attempts, e);
                return Err(RunError::Execute {
                    attempts,
                    source: e,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use crate::core::types::Region;
    use crate::engine::params::{InMemoryParameterStore, StoreError};
    use crate::engine::provision::{MockProvisioner, ProvisionEvent};
    use crate::topology::{ParameterKey, StackKind};

    fn fast_context(retries: u32) -> Context {
        Context {
            parameter_timeout: Duration::from_millis(10),
            retry: RetryPolicy {
                retries,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
            ..Context::default()
        }
    }

    fn seeded() -> InMemoryParameterStore {
        InMemoryParameterStore::new().with_account_baseline(&Region::new("eu-central-1").unwrap())
    }

    /// Store whose first read of one key stalls past the parameter timeout.
    struct StallOnce {
        inner: InMemoryParameterStore,
        key: ParameterKey,
        stalled: AtomicBool,
    }

    impl StallOnce {
        fn new(inner: InMemoryParameterStore, key: ParameterKey) -> Self {
            Self {
                inner,
                key,
                stalled: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ParameterStore for StallOnce {
        async fn get(
            &self,
            region: &Region,
            key: ParameterKey,
        ) -> Result<Option<String>, StoreError> {
            if key == self.key && !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.get(region, key).await
        }

        async fn put(
            &self,
            region: &Region,
            key: ParameterKey,
            value: String,
        ) -> Result<(), StoreError> {
            self.inner.put(region, key, value).await
        }
    }

    #[test]
    fn absent_signal_builds_acceptance() {
        assert_eq!(branch_to_build(None), "acceptance");
        assert_eq!(branch_to_build(Some("main")), "main");
        assert_eq!(branch_to_build(Some("")), "");
    }

    #[test]
    fn delay_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
        assert_eq!(policy.delay(10), Duration::from_secs(8));
        assert_eq!(policy.delay(100), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn unknown_branch_is_config_error() {
        let registry = ConfigurationRegistry::builtin();
        let store = seeded();
        let provisioner = MockProvisioner::new();

        for branch in ["feature-x", "", "Main"] {
            let err = run_deployment(&registry, branch, &store, &provisioner, &fast_context(0))
                .await
                .unwrap_err();
            assert!(
                matches!(err, RunError::Config(ConfigError::ConfigurationNotFound { .. })),
                "{branch:?}"
            );
        }
        assert!(provisioner.events().is_empty());
    }

    #[tokio::test]
    async fn timeouts_are_retried_then_reported() {
        let registry = ConfigurationRegistry::builtin();
        let store = seeded().with_read_latency(Duration::from_millis(100));
        let provisioner = MockProvisioner::new();

        let err = run_deployment(&registry, "acceptance", &store, &provisioner, &fast_context(2))
            .await
            .unwrap_err();

        match err {
            RunError::Execute { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(source.is_retryable());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_after_earlier_waves_published_recovers_on_retry() {
        let registry = ConfigurationRegistry::builtin();
        let inner = seeded();
        let store = StallOnce::new(inner.clone(), ParameterKey::CertificateArn);
        let provisioner = MockProvisioner::new();

        let deployment =
            run_deployment(&registry, "acceptance", &store, &provisioner, &fast_context(2))
                .await
                .unwrap();

        assert_eq!(deployment.attempts, 2);
        assert_eq!(deployment.report.stacks(), 4);
        // dns and cert-stack published in the first attempt; the retry
        // republished them without recording new writes.
        assert_eq!(inner.writes().len(), 4);
        let site_runs = provisioner
            .events()
            .iter()
            .filter(|e| {
                matches!(e, ProvisionEvent::Started { stack, .. } if *stack == StackKind::StaticSite.stack_id())
            })
            .count();
        assert_eq!(site_runs, 1);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let registry = ConfigurationRegistry::builtin();
        let store = InMemoryParameterStore::new();
        let provisioner = MockProvisioner::new();

        let err = run_deployment(&registry, "main", &store, &provisioner, &fast_context(5))
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Execute { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn success_reports_topology() {
        let registry = ConfigurationRegistry::builtin();
        let store = seeded();
        let provisioner = MockProvisioner::new();

        let deployment =
            run_deployment(&registry, "development", &store, &provisioner, &fast_context(2))
                .await
                .unwrap();
        assert_eq!(deployment.configuration, "development");
        assert_eq!(deployment.report.stacks(), 5);
        assert_eq!(deployment.attempts, 1);
    }
}
