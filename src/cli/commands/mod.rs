//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine (or a runtime handler) to do the work
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Commands that go through the executor or a runtime handler are async.
//! Their sync entry points build a tokio runtime and block on the async body.

mod branches;
mod completion;
mod invalidate;
mod plan;
mod rewrite;
mod synth;

pub use branches::branches;
pub use completion::completion;
pub use invalidate::invalidate;
pub use plan::plan;
pub use rewrite::rewrite;
pub use synth::synth;

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::args::Command;
use crate::core::config::ConfigurationRegistry;
use crate::engine::{branch_to_build, Context};

/// Global flags shared by the commands that resolve a configuration.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    /// Branch signal from `--branch` or `BRANCH_NAME`.
    pub branch: Option<String>,
    /// Registry file from `--registry` or `SITESTACK_REGISTRY`.
    pub registry: Option<PathBuf>,
}

impl Globals {
    pub fn branch(&self) -> &str {
        branch_to_build(self.branch.as_deref())
    }

    pub fn load_registry(&self) -> Result<ConfigurationRegistry> {
        Ok(ConfigurationRegistry::load_or_builtin(self.registry.as_deref())?)
    }
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, globals: &Globals, ctx: &Context) -> Result<()> {
    match command {
        Command::Synth { out } => synth::synth(ctx, globals, &out),
        Command::Plan { json } => plan::plan(ctx, globals, json),
        Command::Branches => branches::branches(ctx, globals),
        Command::Invalidate {
            event,
            distribution_id,
            environment,
        } => invalidate::invalidate(ctx, &event, distribution_id, environment),
        Command::Rewrite { uri } => rewrite::rewrite(&uri),
        Command::Completion { shell } => completion::completion(shell),
    }
}
