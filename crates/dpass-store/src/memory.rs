//! In-process stores.
//!
//! Both stores keep their state behind a `std::sync::Mutex` (no lock is held
//! across an `.await` or a callback) and stamp every change with the next
//! revision. [`MemoryEntryStore::fail_next`] and
//! [`MemoryTotalsRegistry::fail_next`] queue errors returned by upcoming
//! operations in FIFO order, without touching state.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dpass_schemas::{EntryId, GateLayout, PassEntry, PassRecord, TotalsRecord};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::subscription::{lock, Listener, Listeners};
use crate::{
    EntryCallback, EntrySnapshot, EntryStore, StoreError, Subscription, TotalsCallback,
    TotalsRegistry, TotalsSnapshot,
};

// ---------------------------------------------------------------------------
// Entry store
// ---------------------------------------------------------------------------

struct EntryState {
    revision: u64,
    /// Insertion order, so snapshots list entries in creation order.
    order: Vec<EntryId>,
    docs: BTreeMap<EntryId, PassRecord>,
    faults: VecDeque<StoreError>,
}

impl EntryState {
    fn snapshot(&self) -> EntrySnapshot {
        let entries = self
            .order
            .iter()
            .filter_map(|id| {
                self.docs.get(id).map(|r| PassEntry {
                    id: id.clone(),
                    record: r.clone(),
                })
            })
            .collect();
        EntrySnapshot {
            revision: self.revision,
            entries,
        }
    }

    fn take_fault(&mut self, op: &'static str) -> Result<(), StoreError> {
        match self.faults.pop_front() {
            Some(err) => {
                warn!(op, error = %err, "entry store: injected failure");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

pub struct MemoryEntryStore {
    state: Mutex<EntryState>,
    listeners: Listeners<EntrySnapshot>,
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EntryState {
                revision: 0,
                order: Vec::new(),
                docs: BTreeMap::new(),
                faults: VecDeque::new(),
            }),
            listeners: Listeners::new(),
        }
    }

    /// Store pre-populated with `entries` at revision 1.
    pub fn with_entries(entries: Vec<PassEntry>) -> Self {
        let store = Self::new();
        {
            let mut st = lock(&store.state);
            for e in entries {
                if st.docs.insert(e.id.clone(), e.record).is_none() {
                    st.order.push(e.id);
                }
            }
            st.revision = 1;
        }
        store
    }

    /// Make the next operation fail with `err` without changing state.
    pub fn fail_next(&self, err: StoreError) {
        lock(&self.state).faults.push_back(err);
    }

    pub fn revision(&self) -> u64 {
        lock(&self.state).revision
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Fault check, mutation and revision bump under one lock. Listeners
    /// run after it is released. Nothing changes when `mutate` fails.
    fn commit<R>(
        &self,
        op: &'static str,
        mutate: impl FnOnce(&mut EntryState) -> Result<R, StoreError>,
    ) -> Result<(R, EntrySnapshot), StoreError> {
        let (out, snap) = {
            let mut st = lock(&self.state);
            st.take_fault(op)?;
            let out = mutate(&mut st)?;
            st.revision += 1;
            (out, st.snapshot())
        };
        self.listeners.emit(&snap);
        Ok((out, snap))
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn list(&self) -> Result<EntrySnapshot, StoreError> {
        let mut st = lock(&self.state);
        st.take_fault("list")?;
        Ok(st.snapshot())
    }

    async fn create(&self, record: PassRecord) -> Result<(EntryId, u64), StoreError> {
        let id = EntryId::new(Uuid::new_v4().to_string());
        let ((), snap) = self.commit("create", |st| {
            st.order.push(id.clone());
            st.docs.insert(id.clone(), record);
            Ok(())
        })?;
        debug!(entry_id = %id, revision = snap.revision, "entry created");
        Ok((id, snap.revision))
    }

    async fn update(&self, id: &EntryId, record: PassRecord) -> Result<u64, StoreError> {
        let ((), snap) = self.commit("update", |st| match st.docs.get_mut(id) {
            Some(doc) => {
                *doc = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("entry {id}"))),
        })?;
        debug!(entry_id = %id, revision = snap.revision, "entry replaced");
        Ok(snap.revision)
    }

    async fn delete(&self, id: &EntryId) -> Result<u64, StoreError> {
        let ((), snap) = self.commit("delete", |st| {
            if st.docs.remove(id).is_none() {
                return Err(StoreError::NotFound(format!("entry {id}")));
            }
            st.order.retain(|x| x != id);
            Ok(())
        })?;
        debug!(entry_id = %id, revision = snap.revision, "entry deleted");
        Ok(snap.revision)
    }

    fn subscribe(&self, callback: EntryCallback) -> Subscription {
        let callback: Listener<EntrySnapshot> = Arc::from(callback);
        // Registered under the state lock so no commit falls between the
        // initial snapshot and the first delivery.
        let (sub, current) = {
            let st = lock(&self.state);
            (self.listeners.add(Arc::clone(&callback)), st.snapshot())
        };
        callback(current);
        sub
    }
}

// ---------------------------------------------------------------------------
// Totals registry
// ---------------------------------------------------------------------------

struct TotalsState {
    revision: u64,
    record: Option<TotalsRecord>,
    faults: VecDeque<StoreError>,
}

impl TotalsState {
    fn snapshot(&self) -> TotalsSnapshot {
        TotalsSnapshot {
            revision: self.revision,
            record: self.record.clone(),
        }
    }

    fn take_fault(&mut self, op: &'static str) -> Result<(), StoreError> {
        match self.faults.pop_front() {
            Some(err) => {
                warn!(op, error = %err, "totals registry: injected failure");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

pub struct MemoryTotalsRegistry {
    state: Mutex<TotalsState>,
    listeners: Listeners<TotalsSnapshot>,
}

impl Default for MemoryTotalsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTotalsRegistry {
    /// Uninitialised registry: no document until the first write.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TotalsState {
                revision: 0,
                record: None,
                faults: VecDeque::new(),
            }),
            listeners: Listeners::new(),
        }
    }

    /// Registry holding `record` at revision 1.
    pub fn with_record(record: TotalsRecord) -> Self {
        let reg = Self::new();
        {
            let mut st = lock(&reg.state);
            st.record = Some(record);
            st.revision = 1;
        }
        reg
    }

    pub fn fail_next(&self, err: StoreError) {
        lock(&self.state).faults.push_back(err);
    }

    pub fn revision(&self) -> u64 {
        lock(&self.state).revision
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl TotalsRegistry for MemoryTotalsRegistry {
    async fn get(&self) -> Result<TotalsSnapshot, StoreError> {
        let mut st = lock(&self.state);
        st.take_fault("get")?;
        Ok(st.snapshot())
    }

    async fn get_or_init(&self, layout: &GateLayout) -> Result<TotalsRecord, StoreError> {
        let (record, written) = {
            let mut st = lock(&self.state);
            st.take_fault("get_or_init")?;
            match &st.record {
                Some(r) => (r.clone(), None),
                None => {
                    let r = TotalsRecord::zeroed(layout);
                    st.record = Some(r.clone());
                    st.revision += 1;
                    (r, Some(st.snapshot()))
                }
            }
        };
        if let Some(snap) = written {
            debug!(revision = snap.revision, "totals registry initialised to zero");
            self.listeners.emit(&snap);
        }
        Ok(record)
    }

    async fn set(&self, record: TotalsRecord) -> Result<u64, StoreError> {
        let snap = {
            let mut st = lock(&self.state);
            st.take_fault("set")?;
            st.record = Some(record);
            st.revision += 1;
            st.snapshot()
        };
        debug!(revision = snap.revision, "totals replaced");
        self.listeners.emit(&snap);
        Ok(snap.revision)
    }

    fn subscribe(&self, callback: TotalsCallback) -> Subscription {
        let callback: Listener<TotalsSnapshot> = Arc::from(callback);
        let (sub, current) = {
            let st = lock(&self.state);
            (self.listeners.add(Arc::clone(&callback)), st.snapshot())
        };
        callback(current);
        sub
    }
}
