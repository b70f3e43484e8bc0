//! engine::params
//!
//! Cross-region parameter store.
//!
//! # Design
//!
//! The `ParameterStore` trait is async because every real store is a network
//! service. Values are write-once per `(region, key)`: a publisher writes its
//! outputs after it completes and dependents only ever read them. Writing the
//! same value again succeeds, so a resubmitted topology can republish.
//!
//! # Example
//!
//! ```
//! use sitestack::core::types::Region;
//! use sitestack::engine::params::{InMemoryParameterStore, ParameterStore};
//! use sitestack::topology::ParameterKey;
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryParameterStore::new();
//! let region = Region::new("eu-central-1").unwrap();
//!
//! store.put(&region, ParameterKey::ZoneId, "Z123".into()).await.unwrap();
//! assert_eq!(
//!     store.get(&region, ParameterKey::ZoneId).await.unwrap().as_deref(),
//!     Some("Z123")
//! );
//!
//! // Regions are separate namespaces.
//! let us_east = Region::us_east_1();
//! assert_eq!(store.get(&us_east, ParameterKey::ZoneId).await.unwrap(), None);
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::Region;
use crate::topology::ParameterKey;

/// Errors from parameter store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A second write to a write-once key.
    #[error("parameter {key} in {region} was already written")]
    AlreadyWritten { region: Region, key: ParameterKey },

    /// The store could not be reached.
    #[error("parameter store unavailable: {0}")]
    Unavailable(String),
}

/// A regional key/value store for cross-stack parameters.
///
/// Implementations must be `Send + Sync` so waves can share one store.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Read a parameter. `Ok(None)` means it has not been written.
    async fn get(&self, region: &Region, key: ParameterKey) -> Result<Option<String>, StoreError>;

    /// Write a parameter once. Rewriting the stored value is a no-op;
    /// a different value is `AlreadyWritten`.
    async fn put(&self, region: &Region, key: ParameterKey, value: String)
        -> Result<(), StoreError>;
}

/// In-memory store for tests and for seeding account-baseline values.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryParameterStore {
    inner: Arc<Mutex<InMemoryInner>>,
}

#[derive(Debug, Default)]
struct InMemoryInner {
    values: BTreeMap<(Region, ParameterKey), String>,
    /// Delay applied to every read.
    read_latency: Option<Duration>,
    /// Writes in order, for verification.
    writes: Vec<(Region, ParameterKey)>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value (builder style). Seeding bypasses the write-once check
    /// and is not recorded as a write.
    pub fn with(self, region: &Region, key: ParameterKey, value: impl Into<String>) -> Self {
        self.lock()
            .values
            .insert((region.clone(), key), value.into());
        self
    }

    /// Seed the account-baseline parameters a deployment to `home` expects:
    /// root zone id and name in `home`, DNSSEC key in `us-east-1`.
    pub fn with_account_baseline(self, home: &Region) -> Self {
        self.with(home, ParameterKey::AccountRootZoneId, "Z0ACCOUNTROOT")
            .with(home, ParameterKey::AccountRootZoneName, "example.nijmegen.nl")
            .with(
                &Region::us_east_1(),
                ParameterKey::AccountDnssecKmsKeyArn,
                "arn:aws:kms:us-east-1:000000000000:key/dnssec",
            )
    }

    /// Make every read wait `latency` before answering.
    pub fn with_read_latency(self, latency: Duration) -> Self {
        self.lock().read_latency = Some(latency);
        self
    }

    /// Keys written through [`ParameterStore::put`], in write order.
    pub fn writes(&self) -> Vec<(Region, ParameterKey)> {
        self.lock().writes.clone()
    }

    pub fn value(&self, region: &Region, key: ParameterKey) -> Option<String> {
        self.lock().values.get(&(region.clone(), key)).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get(&self, region: &Region, key: ParameterKey) -> Result<Option<String>, StoreError> {
        let latency = self.lock().read_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.value(region, key))
    }

    async fn put(
        &self,
        region: &Region,
        key: ParameterKey,
        value: String,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let slot = (region.clone(), key);
        match inner.values.get(&slot) {
            // A resubmitted stack republishes what it wrote before.
            Some(existing) if *existing == value => return Ok(()),
            Some(_) => {
                return Err(StoreError::AlreadyWritten {
                    region: region.clone(),
                    key,
                })
            }
            None => {}
        }
        inner.values.insert(slot, value);
        inner.writes.push((region.clone(), key));
        Ok(())
    }
}

/// Store used when synthesizing templates: every read answers with a
/// dynamic reference resolved by CloudFormation at deploy time, and writes
/// are accepted without being kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredParameterStore;

impl DeferredParameterStore {
    /// `{{resolve:ssm:<path>}}`
    pub fn reference(key: ParameterKey) -> String {
        format!("{{{{resolve:ssm:{}}}}}", key.path())
    }
}

#[async_trait]
impl ParameterStore for DeferredParameterStore {
    async fn get(&self, _region: &Region, key: ParameterKey) -> Result<Option<String>, StoreError> {
        Ok(Some(Self::reference(key)))
    }

    async fn put(
        &self,
        _region: &Region,
        _key: ParameterKey,
        _value: String,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}
