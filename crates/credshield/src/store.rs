//! The record store the coordinator reads from.
//!
//! Decryption and search live behind this trait. The coordinator only asks
//! for single records and watches the lock state so it can retract
//! everything the moment the store locks.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{Record, RecordId};

/// Source of credential records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The record the user opened most recently, if any.
    async fn last_opened_record(&self) -> Option<Record>;

    /// Fetch a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if the record is absent (for example
    /// because the store was closed concurrently) and [`Error::StoreLocked`]
    /// if the store is locked.
    async fn record_by_id(&self, id: &RecordId) -> Result<Record>;

    /// Whether the store is locked right now.
    fn is_locked(&self) -> bool;

    /// Follow the lock state; `true` means locked.
    fn lock_state(&self) -> watch::Receiver<bool>;
}

#[derive(Debug, Default)]
struct Records {
    records: Vec<Record>,
    last_opened: Option<RecordId>,
}

/// An in-memory record store, for embedding and tests.
#[derive(Debug)]
pub struct MemoryRecordStore {
    records: Mutex<Records>,
    locked: watch::Sender<bool>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    /// Create an empty, unlocked store.
    #[must_use]
    pub fn new() -> Self {
        let (locked, _) = watch::channel(false);
        Self {
            records: Mutex::new(Records::default()),
            locked,
        }
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a record.
    pub fn insert(&self, record: Record) {
        let mut records = self.records();
        records.records.retain(|r| r.id != record.id);
        records.records.push(record);
    }

    /// Remove a record. Returns whether it existed.
    pub fn remove(&self, id: &RecordId) -> bool {
        let mut records = self.records();
        let before = records.records.len();
        records.records.retain(|r| r.id != *id);
        if records.last_opened == Some(*id) {
            records.last_opened = None;
        }
        records.records.len() != before
    }

    /// Mark a record as opened by the user.
    pub fn open(&self, id: RecordId) {
        self.records().last_opened = Some(id);
    }

    /// Lock the store.
    pub fn lock(&self) {
        if !self.locked.send_replace(true) {
            info!("Record store locked");
        }
    }

    /// Unlock the store.
    pub fn unlock(&self) {
        if self.locked.send_replace(false) {
            debug!("Record store unlocked");
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn last_opened_record(&self) -> Option<Record> {
        if self.is_locked() {
            return None;
        }
        let records = self.records();
        let id = records.last_opened?;
        records.records.iter().find(|r| r.id == id).cloned()
    }

    async fn record_by_id(&self, id: &RecordId) -> Result<Record> {
        if self.is_locked() {
            return Err(Error::StoreLocked);
        }
        self.records()
            .records
            .iter()
            .find(|r| r.id == *id)
            .cloned()
            .ok_or(Error::RecordNotFound { id: *id })
    }

    fn is_locked(&self) -> bool {
        *self.locked.borrow()
    }

    fn lock_state(&self) -> watch::Receiver<bool> {
        self.locked.subscribe()
    }
}
