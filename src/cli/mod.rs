//! cli
//!
//! Command-line interface layer for sitestack.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load the configuration registry once per process
//! - Delegate to command handlers
//! - Does NOT provision anything directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for execution. All provisioning flows through the
//! engine's executor.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, Shell};

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::engine::{self, RetryPolicy};
use crate::ui::output::Verbosity;

/// Environment variable overriding the log filter.
pub const LOG_ENV_VAR: &str = "SITESTACK_LOG";

/// Install the global tracing subscriber.
///
/// `SITESTACK_LOG` takes precedence; otherwise the filter follows the
/// verbosity flags. Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = engine::Context {
        debug: cli.debug,
        quiet: cli.quiet,
        parameter_timeout: cli.parameter_timeout(),
        retry: RetryPolicy::default().with_retries(cli.retries),
    };

    let command = cli.command.unwrap_or(Command::Synth {
        out: PathBuf::from("cdk.out"),
    });
    let globals = commands::Globals {
        branch: cli.branch,
        registry: cli.registry,
    };

    commands::dispatch(command, &globals, &ctx)
}
