//! core::graph
//!
//! Stack dependency graph representation and operations.
//!
//! # Architecture
//!
//! The stack graph is a DAG where:
//! - Nodes are deployable stacks
//! - Edges point from a dependent stack to the stack it depends on
//! - Roots are stacks with no dependencies (the DNS zone in practice)
//!
//! An edge is a happens-before barrier: the dependent may only start once the
//! dependency has *completed*. Stacks without a path between them may be
//! provisioned concurrently.
//!
//! # Invariants
//!
//! - Graph must be acyclic
//! - Edges are only ever declared explicitly, never inferred
//! - All orderings are deterministic (ties broken by stack id)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Identifier of a stack within one deployment topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(String);

impl StackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The stack dependency graph.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StackGraph {
    /// Direct dependencies of each stack
    dependencies: BTreeMap<StackId, BTreeSet<StackId>>,
}

impl StackGraph {
    /// Create an empty stack graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack with no dependencies (no-op if already present).
    pub fn add_node(&mut self, stack: StackId) {
        self.dependencies.entry(stack).or_default();
    }

    /// Declare that `dependent` must wait for `dependency` to complete.
    ///
    /// Both stacks are added to the graph if missing.
    pub fn add_edge(&mut self, dependent: StackId, dependency: StackId) {
        self.add_node(dependent.clone());
        self.add_node(dependency.clone());
        self.dependencies
            .entry(dependent)
            .or_default()
            .insert(dependency);
    }

    /// Direct dependencies of a stack.
    pub fn dependencies(&self, stack: &StackId) -> Option<&BTreeSet<StackId>> {
        self.dependencies.get(stack)
    }

    /// All edges as `(dependent, dependency)` pairs, sorted.
    pub fn edges(&self) -> BTreeSet<(StackId, StackId)> {
        self.dependencies
            .iter()
            .flat_map(|(dependent, deps)| {
                deps.iter()
                    .map(move |dep| (dependent.clone(), dep.clone()))
            })
            .collect()
    }

    /// Every stack `stack` transitively depends on.
    ///
    /// # Example
    ///
    /// ```
    /// use sitestack::core::graph::{StackGraph, StackId};
    ///
    /// let mut graph = StackGraph::new();
    /// let dns = StackId::new("dns");
    /// let cert = StackId::new("cert-stack");
    /// let site = StackId::new("site");
    ///
    /// graph.add_edge(cert.clone(), dns.clone());
    /// graph.add_edge(site.clone(), cert.clone());
    ///
    /// let ancestors = graph.ancestors(&site);
    /// assert!(ancestors.contains(&cert));
    /// assert!(ancestors.contains(&dns));
    /// ```
    pub fn ancestors(&self, stack: &StackId) -> BTreeSet<StackId> {
        let mut result = BTreeSet::new();
        let mut pending: Vec<&StackId> = self
            .dependencies(stack)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default();

        while let Some(current) = pending.pop() {
            if result.insert(current.clone()) {
                if let Some(deps) = self.dependencies(current) {
                    pending.extend(deps.iter());
                }
            }
        }

        result
    }

    /// Group stacks into provisioning waves.
    ///
    /// Wave `n` holds every stack whose dependencies all sit in waves
    /// `0..n`. Stacks within a wave have no edges between them and may run
    /// concurrently; each wave is sorted by id.
    ///
    /// Returns `Err(stack)` if a cycle prevents some stacks from being placed.
    ///
    /// # Example
    ///
    /// ```
    /// use sitestack::core::graph::{StackGraph, StackId};
    ///
    /// let mut graph = StackGraph::new();
    /// let dns = StackId::new("dns");
    /// graph.add_edge(StackId::new("dnssec-stack"), dns.clone());
    /// graph.add_edge(StackId::new("cert-stack"), dns.clone());
    ///
    /// let waves = graph.waves().unwrap();
    /// assert_eq!(waves.len(), 2);
    /// assert_eq!(waves[0], vec![dns]);
    /// assert_eq!(waves[1].len(), 2);
    /// ```
    pub fn waves(&self) -> Result<Vec<Vec<StackId>>, StackId> {
        let mut placed: BTreeSet<&StackId> = BTreeSet::new();
        let mut waves = Vec::new();

        while placed.len() < self.dependencies.len() {
            let wave: Vec<StackId> = self
                .dependencies
                .iter()
                .filter(|(stack, deps)| {
                    !placed.contains(stack) && deps.iter().all(|dep| placed.contains(dep))
                })
                .map(|(stack, _)| stack.clone())
                .collect();

            if wave.is_empty() {
                // Everything left waits on something unplaced: a cycle.
                let stuck = self
                    .dependencies
                    .keys()
                    .find(|stack| !placed.contains(stack))
                    .cloned();
                return Err(stuck.unwrap_or_else(|| StackId::new("<unknown>")));
            }

            for stack in &wave {
                if let Some((key, _)) = self.dependencies.get_key_value(stack) {
                    placed.insert(key);
                }
            }
            waves.push(wave);
        }

        Ok(waves)
    }

    /// Compute a deterministic topological ordering.
    ///
    /// Dependencies always come before their dependents. Returns `Err` on
    /// a cycle (see [`StackGraph::waves`]).
    pub fn topological_order(&self) -> Result<Vec<StackId>, StackId> {
        Ok(self.waves()?.into_iter().flatten().collect())
    }
}
