//! invalidation
//!
//! Cache invalidation after a site upload.
//!
//! # Architecture
//!
//! The site stack binds a function to object-created events on the website
//! bucket, filtered on the trigger keys. When it fires, the handler issues
//! one invalidation for the distribution. Which paths are invalidated
//! depends on the environment name the function was deployed with:
//! production only drops the entry document and the version file, every
//! other environment drops everything.
//!
//! # Invariants
//!
//! - [`select_paths`] is total and case-sensitive
//! - One invocation issues at most one request
//! - Each request carries a fresh caller reference, so repeated uploads are
//!   never collapsed into one invalidation
//!
//! # Example
//!
//! ```
//! use sitestack::invalidation::select_paths;
//!
//! assert_eq!(select_paths(Some("production")), &["/index.html", "/version.json"]);
//! assert_eq!(select_paths(Some("acceptance")), &["/*"]);
//! assert_eq!(select_paths(None), &["/*"]);
//! ```

pub mod cdn;

pub use cdn::{CdnClient, CdnError, InvalidationRequest, RecordingCdnClient};

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::statics::CACHE_TRIGGER_KEYS;

/// Environment variable holding the distribution to invalidate.
pub const DISTRIBUTION_ENV_VAR: &str = "CLOUDFRONT_DISTRIBUTION_ID";

/// Environment variable holding the environment name.
pub const ENVIRONMENT_ENV_VAR: &str = "ENVIRONMENT";

const PRODUCTION_PATHS: &[&str] = &["/index.html", "/version.json"];
const ALL_PATHS: &[&str] = &["/*"];

/// Errors from the invalidation handler.
#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("required environment variable {0} is not set")]
    MissingEnvironmentVariable(&'static str),

    #[error("invalid storage event: {0}")]
    InvalidEvent(String),

    #[error("invalidation request failed: {0}")]
    Cdn(#[from] CdnError),
}

/// Paths to invalidate for an environment name.
pub fn select_paths(environment: Option<&str>) -> &'static [&'static str] {
    match environment {
        Some("production") => PRODUCTION_PATHS,
        _ => ALL_PATHS,
    }
}

/// Object storage notification, as delivered to the function.
///
/// Only the fields the handler reads are modelled; the rest is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageRecord {
    #[serde(rename = "eventName")]
    pub event_name: String,
    pub s3: StorageEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageEntity {
    pub object: StorageObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageObject {
    pub key: String,
}

impl StorageEvent {
    pub fn from_json(json: &str) -> Result<Self, InvalidationError> {
        serde_json::from_str(json).map_err(|e| InvalidationError::InvalidEvent(e.to_string()))
    }

    /// Keys of created objects.
    pub fn created_keys(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|r| r.event_name.starts_with("ObjectCreated:"))
            .map(|r| r.s3.object.key.as_str())
    }
}

/// Handler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub distribution_id: String,
    pub environment: Option<String>,
    pub trigger_prefixes: Vec<String>,
}

impl HandlerConfig {
    pub fn new(distribution_id: impl Into<String>, environment: Option<String>) -> Self {
        Self {
            distribution_id: distribution_id.into(),
            environment,
            trigger_prefixes: CACHE_TRIGGER_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, InvalidationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InvalidationError> {
        let distribution_id = lookup(DISTRIBUTION_ENV_VAR)
            .filter(|v| !v.is_empty())
            .ok_or(InvalidationError::MissingEnvironmentVariable(
                DISTRIBUTION_ENV_VAR,
            ))?;
        Ok(Self::new(distribution_id, lookup(ENVIRONMENT_ENV_VAR)))
    }

    fn is_trigger(&self, key: &str) -> bool {
        self.trigger_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// Result of one invocation that issued a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub id: String,
    pub request: InvalidationRequest,
}

/// The cache-invalidation function.
pub struct CacheInvalidationHandler<C> {
    config: HandlerConfig,
    client: C,
}

impl<C: CdnClient> CacheInvalidationHandler<C> {
    pub fn new(config: HandlerConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Configure from `CLOUDFRONT_DISTRIBUTION_ID` and `ENVIRONMENT`.
    pub fn from_env(client: C) -> Result<Self, InvalidationError> {
        Ok(Self::new(HandlerConfig::from_env()?, client))
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Build the request for this invocation.
    pub fn request(&self) -> InvalidationRequest {
        InvalidationRequest {
            distribution_id: self.config.distribution_id.clone(),
            paths: select_paths(self.config.environment.as_deref())
                .iter()
                .map(|p| p.to_string())
                .collect(),
            caller_reference: caller_reference(),
        }
    }

    /// Handle one storage event.
    ///
    /// Returns `Ok(None)` when no created object matches a trigger prefix.
    pub async fn handle(
        &self,
        event: &StorageEvent,
    ) -> Result<Option<Invalidation>, InvalidationError> {
        let Some(key) = event.created_keys().find(|key| self.config.is_trigger(key)) else {
            debug!(records = event.records.len(), "no trigger key in event");
            return Ok(None);
        };

        let request = self.request();
        let id = self.client.create_invalidation(&request).await?;
        info!(
            distribution = %request.distribution_id,
            trigger = key,
            paths = ?request.paths,
            invalidation = %id,
            "created invalidation"
        );
        Ok(Some(Invalidation { id, request }))
    }
}

/// `<unix millis>-<uuid v4>`
fn caller_reference() -> String {
    format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4())
}
