//! Doubles for the core ports, shared with downstream crates' tests through
//! the `testing` feature.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::audit::{AuditEntry, AuditStore, AuditStoreError};

/// Keeps appended entries in memory; clones share the same log.
#[derive(Clone, Default)]
pub struct InMemoryAuditStore {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditStore {
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditStoreError> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry.clone()),
            Err(poisoned) => poisoned.into_inner().push(entry.clone()),
        }
        Ok(())
    }
}
