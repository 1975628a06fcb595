//! Batch identity: which page images belong to which upload.
//!
//! Each upload gets a [`BatchId`] and its own image directory, so two uploads
//! in flight never mix their pages. [`BatchRegistry`] remembers the most
//! recent batch (for clients that call `/generate-pdf` without a body) and
//! which batches are being assembled right now.

use crate::error::Pdf2GridError;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Identifier of one upload's page images.
///
/// A UUIDv7, so identifiers sort by creation time and double as the
/// time-based upload filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Allocate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse a client-supplied identifier.
    ///
    /// Only canonical UUIDs are accepted, which also keeps `..` and path
    /// separators out of the storage paths built from it.
    pub fn parse(raw: &str) -> Result<Self, Pdf2GridError> {
        Uuid::try_parse(raw.trim())
            .map(Self)
            .map_err(|_| Pdf2GridError::InvalidBatchId(raw.to_string()))
    }

    /// Short random suffix for filenames derived from this batch.
    pub fn short(&self) -> String {
        let simple = self.0.simple().to_string();
        simple[simple.len() - 8..].to_string()
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    latest: Option<BatchId>,
    assembling: HashSet<BatchId>,
}

/// Shared in-memory batch bookkeeping.
#[derive(Debug, Default)]
pub struct BatchRegistry {
    state: Mutex<RegistryState>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // The state is two plain collections; a panic mid-update cannot leave
        // them inconsistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a successfully rasterised batch as the most recent one.
    pub fn record_upload(&self, batch: &BatchId) {
        self.lock().latest = Some(batch.clone());
    }

    /// Most recently uploaded batch, if any.
    pub fn latest(&self) -> Option<BatchId> {
        self.lock().latest.clone()
    }

    /// Claim `batch` for assembly.
    ///
    /// Fails with [`Pdf2GridError::BatchBusy`] while another claim on the same
    /// batch is alive. The claim is released when the guard drops.
    pub fn begin_assembly(&self, batch: &BatchId) -> Result<AssemblyGuard<'_>, Pdf2GridError> {
        let mut state = self.lock();
        if !state.assembling.insert(batch.clone()) {
            return Err(Pdf2GridError::BatchBusy(batch.to_string()));
        }
        Ok(AssemblyGuard {
            registry: self,
            batch: batch.clone(),
        })
    }

    /// Forget `batch` once its images are gone.
    pub fn consume(&self, batch: &BatchId) {
        let mut state = self.lock();
        if state.latest.as_ref() == Some(batch) {
            state.latest = None;
        }
    }
}

/// Exclusive assembly claim on one batch.
#[derive(Debug)]
pub struct AssemblyGuard<'a> {
    registry: &'a BatchRegistry,
    batch: BatchId,
}

impl Drop for AssemblyGuard<'_> {
    fn drop(&mut self) {
        self.registry.lock().assembling.remove(&self.batch);
    }
}
