//! invalidate command - Dry-run the cache-invalidation handler
//!
//! Feeds a storage event to the handler with a recording CDN client and
//! prints the request the deployed function would issue.

use std::io::Read;
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::engine::Context;
use crate::invalidation::{
    CacheInvalidationHandler, HandlerConfig, InvalidationError, RecordingCdnClient, StorageEvent,
    DISTRIBUTION_ENV_VAR,
};
use crate::ui::output::{self, Verbosity};

pub fn invalidate(
    ctx: &Context,
    event: &Path,
    distribution_id: Option<String>,
    environment: Option<String>,
) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let distribution_id = distribution_id
        .filter(|id| !id.is_empty())
        .ok_or(InvalidationError::MissingEnvironmentVariable(
            DISTRIBUTION_ENV_VAR,
        ))?;
    let event = StorageEvent::from_json(&read_event(event)?)?;
    let handler = CacheInvalidationHandler::new(
        HandlerConfig::new(distribution_id, environment),
        RecordingCdnClient::new(),
    );

    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(handler.handle(&event))? {
        Some(invalidation) => {
            println!("{}", serde_json::to_string_pretty(&invalidation.request)?);
        }
        None => output::print("No trigger key in event; nothing to invalidate", verbosity),
    }
    Ok(())
}

fn read_event(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read event from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event file {}", path.display()))
}
