//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--branch <name>`: Branch to build (env `BRANCH_NAME`)
//! - `--registry <path>`: Configuration registry file (env `SITESTACK_REGISTRY`)
//! - `--parameter-timeout-secs <n>`: Bound on each parameter read
//! - `--retries <n>`: Retries for transient failures

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// sitestack - branch-driven static site deployments
#[derive(Parser, Debug)]
#[command(name = "sitestack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Branch to build; defaults to acceptance when unset
    #[arg(long, global = true, env = "BRANCH_NAME")]
    pub branch: Option<String>,

    /// Configuration registry file; the built-in registry is used when unset
    #[arg(long, global = true, env = "SITESTACK_REGISTRY", value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Seconds to wait for a single cross-stack parameter read
    #[arg(long, global = true, default_value_t = 10, value_name = "SECS")]
    pub parameter_timeout_secs: u64,

    /// Retries after a transient deployment failure
    #[arg(long, global = true, default_value_t = 2)]
    pub retries: u32,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    pub fn parameter_timeout(&self) -> Duration {
        Duration::from_secs(self.parameter_timeout_secs)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the topology and write a deployable assembly (default)
    #[command(
        name = "synth",
        long_about = "Resolve the configuration for the branch, build its deployment \
            topology and write one template per stack plus manifest.json.\n\n\
            Cross-stack parameters are written as dynamic references that are \
            resolved at deploy time.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Synthesize the acceptance deployment into ./cdk.out
    sitestack synth

    # Synthesize production into a custom directory
    BRANCH_NAME=main sitestack synth --out build/assembly"
    )]
    Synth {
        /// Output directory
        #[arg(long, default_value = "cdk.out", value_name = "DIR")]
        out: PathBuf,
    },

    /// Show the stacks that would be deployed, in order
    #[command(
        name = "plan",
        after_help = "\
WORKFLOW EXAMPLES:
    # Human-readable plan for the development branch
    sitestack plan --branch development

    # Machine-readable plan
    sitestack plan --branch main --json"
    )]
    Plan {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known configurations and their branches
    Branches,

    /// Run the cache-invalidation handler against a storage event
    #[command(
        name = "invalidate",
        after_help = "\
WORKFLOW EXAMPLES:
    # Print the request issued for an upload event
    sitestack invalidate --event event.json --distribution-id E2EXAMPLE

    # Read the event from stdin
    cat event.json | sitestack invalidate --event -"
    )]
    Invalidate {
        /// Event JSON file, or - for stdin
        #[arg(long, value_name = "FILE")]
        event: PathBuf,

        /// Distribution to invalidate
        #[arg(long, env = "CLOUDFRONT_DISTRIBUTION_ID")]
        distribution_id: Option<String>,

        /// Environment name selecting the paths to invalidate
        #[arg(long, env = "ENVIRONMENT")]
        environment: Option<String>,
    },

    /// Print the edge rewrite of a request URI
    Rewrite {
        /// Request URI, e.g. /docs/button
        uri: String,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash
    sitestack completion bash > ~/.local/share/bash-completion/completions/sitestack

    # Zsh
    sitestack completion zsh > ~/.zfunc/_sitestack"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["sitestack", "plan"]).unwrap();
        assert_eq!(cli.parameter_timeout(), Duration::from_secs(10));
        assert_eq!(cli.retries, 2);
        assert!(matches!(cli.command, Some(Command::Plan { json: false })));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sitestack",
            "synth",
            "--out",
            "dist",
            "--branch",
            "main",
            "--retries",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.branch.as_deref(), Some("main"));
        assert_eq!(cli.retries, 0);
        match cli.command {
            Some(Command::Synth { out }) => assert_eq!(out, PathBuf::from("dist")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["sitestack"]).unwrap();
        assert!(cli.command.is_none());
    }
}
