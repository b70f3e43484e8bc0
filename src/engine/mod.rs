//! engine
//!
//! Drives a deployment: Resolve -> Build -> Execute.
//!
//! # Architecture
//!
//! 1. **Resolve**: pick exactly one configuration for the branch signal
//! 2. **Build**: derive the deployment topology from it, once
//! 3. **Execute**: provision the topology wave by wave through the
//!    [`Executor`], retrying transient failures
//!
//! Everything with side effects sits behind two seams: the
//! [`ParameterStore`](params::ParameterStore) for cross-region values and the
//! [`Provisioner`](provision::Provisioner) that materializes one stack.
//!
//! # Invariants
//!
//! - The topology is built once per run and reused across retries
//! - Only the executor calls the provisioner
//! - A fatal error is never retried

pub mod exec;
pub mod params;
pub mod provision;
pub mod runner;

pub use exec::{ExecuteError, ExecuteReport, Executor};
pub use params::{DeferredParameterStore, InMemoryParameterStore, ParameterStore, StoreError};
pub use provision::{AssemblyProvisioner, MockProvisioner, ProvisionError, Provisioner};
pub use runner::{branch_to_build, run_deployment, Deployment, RetryPolicy, RunError};

use std::time::Duration;

/// Execution context for engine operations.
#[derive(Debug, Clone)]
pub struct Context {
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Bound on each parameter read.
    pub parameter_timeout: Duration,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            debug: false,
            quiet: false,
            parameter_timeout: exec::DEFAULT_PARAMETER_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}
