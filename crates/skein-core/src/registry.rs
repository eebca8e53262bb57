//! Registry - rebuild jobs from bytes without knowing their concrete type.
//!
//! `(name, version)` → factory. Import reads the type envelope first and only
//! then hands the bytes to the matching factory.
//!
//! The registry is an ordinary value: construct one at startup, share it via
//! `Arc`, and give tests their own.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{Result, SkeinError};
use crate::job::{Job, codec};

/// Rebuilds a job from its exported bytes.
pub type JobFactory = Arc<dyn Fn(&[u8]) -> Result<Box<dyn Job>> + Send + Sync>;

type Key = (String, u32);

/// Registry of job factories.
///
/// Reads and writes go through an `RwLock`; registration normally happens
/// once at startup and resolution is read-only afterwards.
#[derive(Default)]
pub struct Registry {
    factories: RwLock<HashMap<Key, JobFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `(name, version)`.
    ///
    /// A second registration for the same pair is rejected, never overwritten.
    pub fn register(&self, name: impl Into<String>, version: u32, factory: JobFactory) -> Result<()> {
        let key = (name.into(), version);
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(&key) {
            return Err(SkeinError::DuplicateRegistration {
                name: key.0,
                version: key.1,
            });
        }
        debug!(name = %key.0, version = key.1, "registered job type");
        factories.insert(key, factory);
        Ok(())
    }

    /// Register a job type whose default value can `import` its own bytes.
    pub fn register_job<T>(&self, name: impl Into<String>, version: u32) -> Result<()>
    where
        T: Job + Default,
    {
        let factory: JobFactory = Arc::new(|bytes: &[u8]| -> Result<Box<dyn Job>> {
            let mut job = T::default();
            job.import(bytes)?;
            Ok(Box::new(job) as Box<dyn Job>)
        });
        self.register(name, version, factory)
    }

    pub fn resolve(&self, name: &str, version: u32) -> Result<JobFactory> {
        let factories = self.factories.read().unwrap_or_else(PoisonError::into_inner);
        factories
            .get(&(name.to_string(), version))
            .cloned()
            .ok_or_else(|| SkeinError::UnknownJobType {
                name: name.to_string(),
                version,
            })
    }

    /// Rebuild a job of any registered type from exported bytes.
    pub fn import(&self, bytes: &[u8]) -> Result<Box<dyn Job>> {
        let job_type = codec::peek_type(bytes)?;
        let factory = self.resolve(&job_type.name, job_type.version)?;
        factory(bytes)
    }

    /// Registered `(name, version)` pairs, sorted.
    pub fn registered_types(&self) -> Vec<(String, u32)> {
        let factories = self.factories.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<Key> = factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.factories.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
