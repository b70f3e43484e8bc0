//! sitestack - branch-driven static site deployments
//!
//! sitestack turns a branch name into a complete deployment of the component
//! library site: a DNS zone with DNSSEC, a CloudFront certificate, the
//! website bucket behind a CDN distribution, and optionally an IAM user with
//! access to the bucket. It also carries the two small runtime functions
//! that ship with the site: cache invalidation after an upload and the
//! edge rewrite of directory URIs.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Resolve -> Build -> Execute, with retry of transient failures
//! - [`topology`] - Stacks, their targets, dependencies and resources
//! - [`core`] - Domain types, the configuration registry and the stack graph
//! - [`invalidation`] - Cache-invalidation policy and handler
//! - [`edge`] - Viewer-request URI rewriting
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. A branch resolves to at most one configuration, by exact match
//! 2. Every stack starts only after the stacks it depends on have completed
//! 3. Every cross-stack parameter is published before it is read
//! 4. All provisioning flows through a single executor

pub mod cli;
pub mod core;
pub mod edge;
pub mod engine;
pub mod invalidation;
pub mod topology;
pub mod ui;
