//! invalidation::cdn
//!
//! CDN client seam.
//!
//! # Example
//!
//! ```
//! use sitestack::invalidation::cdn::{CdnClient, InvalidationRequest, RecordingCdnClient};
//!
//! # tokio_test::block_on(async {
//! let client = RecordingCdnClient::new();
//! let request = InvalidationRequest {
//!     distribution_id: "E2EXAMPLE".to_string(),
//!     paths: vec!["/*".to_string()],
//!     caller_reference: "1700000000000-ref".to_string(),
//! };
//! let id = client.create_invalidation(&request).await.unwrap();
//! assert_eq!(id, "I1");
//! assert_eq!(client.requests(), vec![request]);
//! # });
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the CDN API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CdnError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("too many invalidations in progress")]
    TooManyInvalidations,

    #[error("CDN API error: {0}")]
    Api(String),
}

/// One cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRequest {
    pub distribution_id: String,
    pub paths: Vec<String>,
    /// Unique per invocation; the CDN treats equal references as one request.
    pub caller_reference: String,
}

/// Issues cache invalidations.
#[async_trait]
pub trait CdnClient: Send + Sync {
    /// Submit `request`. Returns the invalidation id.
    async fn create_invalidation(&self, request: &InvalidationRequest) -> Result<String, CdnError>;
}

/// Test double that records every request.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingCdnClient {
    inner: Arc<Mutex<RecordingInner>>,
}

#[derive(Debug, Default)]
struct RecordingInner {
    requests: Vec<InvalidationRequest>,
    fail_with: Option<CdnError>,
}

impl RecordingCdnClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every request with `error`.
    pub fn failing(self, error: CdnError) -> Self {
        self.lock().fail_with = Some(error);
        self
    }

    pub fn requests(&self) -> Vec<InvalidationRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CdnClient for RecordingCdnClient {
    async fn create_invalidation(&self, request: &InvalidationRequest) -> Result<String, CdnError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_with.clone() {
            return Err(error);
        }
        inner.requests.push(request.clone());
        Ok(format!("I{}", inner.requests.len()))
    }
}
