use async_trait::async_trait;
use dpass_schemas::{EntryId, GateLayout, PassEntry, PassRecord, TotalsRecord};

use crate::{StoreError, Subscription};

/// Full entry collection as of `revision`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub revision: u64,
    pub entries: Vec<PassEntry>,
}

/// Totals document as of `revision`. `record` is `None` until the registry
/// has been initialised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TotalsSnapshot {
    pub revision: u64,
    pub record: Option<TotalsRecord>,
}

pub type EntryCallback = Box<dyn Fn(EntrySnapshot) + Send + Sync>;
pub type TotalsCallback = Box<dyn Fn(TotalsSnapshot) + Send + Sync>;

/// Collection of pass entries.
///
/// Implementations must be object-safe and `Send + Sync` so the desk can
/// hold an `Arc<dyn EntryStore>` across tasks.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Current snapshot.
    async fn list(&self) -> Result<EntrySnapshot, StoreError>;

    /// Insert a new entry; the store assigns the id. Returns the id and the
    /// revision the insert was committed at.
    async fn create(&self, record: PassRecord) -> Result<(EntryId, u64), StoreError>;

    /// Replace the entry at `id` wholesale and return the committed revision.
    /// `NotFound` when `id` is unknown.
    async fn update(&self, id: &EntryId, record: PassRecord) -> Result<u64, StoreError>;

    /// Remove the entry at `id` and return the committed revision.
    /// `NotFound` when `id` is unknown.
    async fn delete(&self, id: &EntryId) -> Result<u64, StoreError>;

    /// Register `callback`. It receives the current snapshot immediately and
    /// a fresh snapshot after every change until the returned guard drops.
    ///
    /// Deliveries from concurrent writers can repeat or arrive out of order;
    /// `revision` orders them.
    fn subscribe(&self, callback: EntryCallback) -> Subscription;
}

/// Single document of per-gate capacity.
#[async_trait]
pub trait TotalsRegistry: Send + Sync {
    async fn get(&self) -> Result<TotalsSnapshot, StoreError>;

    /// Return the stored record, writing an all-zero record for `layout`
    /// first when none exists.
    async fn get_or_init(&self, layout: &GateLayout) -> Result<TotalsRecord, StoreError>;

    /// Replace the whole document and return the committed revision. Last
    /// writer wins.
    async fn set(&self, record: TotalsRecord) -> Result<u64, StoreError>;

    fn subscribe(&self, callback: TotalsCallback) -> Subscription;
}
