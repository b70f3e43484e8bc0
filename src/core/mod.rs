//! core
//!
//! Core domain types, configuration and graph primitives.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, AccountId, Region, DomainName, etc.
//! - [`config`] - Per-branch deployment configuration and the registry
//! - [`graph`] - Stack dependency graph and ordering
//! - [`statics`] - Fixed project names and parameter roots
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Configuration is immutable once the registry is constructed
//! - All ordering is deterministic

pub mod config;
pub mod graph;
pub mod statics;
pub mod types;
