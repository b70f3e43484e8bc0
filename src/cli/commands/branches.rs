//! branches command - List known configurations

use anyhow::Result;

use super::Globals;
use crate::engine::Context;
use crate::ui::output::{self, Verbosity};

/// Print `<configuration>\t<branch>\t<target>` per configuration.
pub fn branches(ctx: &Context, globals: &Globals) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let registry = globals.load_registry()?;

    for config in registry.configurations() {
        println!(
            "{}\t{}\t{}",
            config.name, config.branch_name, config.deploy_to_environment
        );
    }
    output::debug(
        format!("current branch signal resolves to '{}'", globals.branch()),
        verbosity,
    );
    Ok(())
}
