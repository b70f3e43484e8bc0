//! synth command - Write a deployable assembly
//!
//! Resolves the configuration for the branch, builds its topology and runs
//! it through the executor with an [`AssemblyProvisioner`]. Parameter reads
//! are answered with dynamic references, so the templates resolve
//! cross-stack values at deploy time.

use std::path::Path;

use anyhow::{Context as _, Result};

use super::Globals;
use crate::core::statics::BRANCH_ENV_VAR;
use crate::engine::{run_deployment, AssemblyProvisioner, Context, DeferredParameterStore};
use crate::ui::output::{self, Verbosity};

/// Synthesize the assembly for the selected branch into `out`.
pub fn synth(ctx: &Context, globals: &Globals, out: &Path) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(synth_async(ctx, globals, out))
}

async fn synth_async(ctx: &Context, globals: &Globals, out: &Path) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let registry = globals.load_registry()?;
    let branch = globals.branch();
    if globals.branch.is_none() {
        output::warn(
            format!("{BRANCH_ENV_VAR} is not set; building '{branch}'"),
            verbosity,
        );
    }

    let provisioner = AssemblyProvisioner::new(out);
    let deployment = run_deployment(&registry, branch, &DeferredParameterStore, &provisioner, ctx)
        .await
        .with_context(|| format!("synth failed for branch '{branch}'"))?;

    let manifest = provisioner.write_manifest(&deployment.topology)?;
    output::debug(
        format!("manifest written to {}", manifest.display()),
        verbosity,
    );

    output::success(
        format!(
            "Synthesized {} stack(s) for branch '{}' ({}) into {}",
            deployment.report.stacks(),
            deployment.topology.branch,
            deployment.configuration,
            out.display()
        ),
        verbosity,
    );
    Ok(())
}
