//! plan command - Show the deployment topology
//!
//! Prints the stacks of the selected branch in deployment order, with the
//! target of each stack and the stacks it waits for. Nothing is provisioned.

use anyhow::Result;
use serde::Serialize;

use super::Globals;
use crate::engine::Context;
use crate::topology::{self, PipelineDefinition, StackNode};
use crate::ui::output::{self, format_list, format_stack, Verbosity};

#[derive(Serialize)]
struct PlanView<'a> {
    configuration: &'a str,
    branch: &'a str,
    digest: String,
    pipeline: &'a PipelineDefinition,
    stacks: Vec<&'a StackNode>,
}

/// Print the topology for the selected branch.
pub fn plan(ctx: &Context, globals: &Globals, json: bool) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let registry = globals.load_registry()?;
    let config = registry.resolve(globals.branch())?;
    let topology = topology::build(config)?;

    if json {
        let view = PlanView {
            configuration: &config.name,
            branch: topology.branch.as_str(),
            digest: topology.digest()?,
            pipeline: &topology.pipeline,
            stacks: topology.nodes_in_order(),
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    output::print(
        format!(
            "Configuration '{}' (branch '{}') via pipeline {}",
            config.name, topology.branch, topology.pipeline.name
        ),
        verbosity,
    );
    for (index, wave) in topology.waves().iter().enumerate() {
        output::print(format!("wave {}:", index + 1), verbosity);
        for id in wave {
            let Some(node) = topology.node(id) else {
                continue;
            };
            output::print(
                format!("  {}", format_stack(&node.id, &node.environment)),
                verbosity,
            );
            let deps: Vec<String> = node
                .depends_on
                .iter()
                .map(|d| format!("{} ({})", d.stack, d.reason))
                .collect();
            if !deps.is_empty() {
                output::print(format!("    after:\n{}", format_list(&deps, "      - ")), verbosity);
            }
            output::debug(
                format!("{}: {} resource(s)", node.stack_name, node.resources.len()),
                verbosity,
            );
        }
    }
    Ok(())
}
