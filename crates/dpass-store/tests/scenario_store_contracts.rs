//! Scenario: store contracts through trait objects.
//!
//! # Invariants under test
//!
//! 1. Stores are usable as `Arc<dyn EntryStore>` / `Arc<dyn TotalsRegistry>`.
//! 2. Revisions strictly increase across writes and never move on failure.
//! 3. Every delivered snapshot reflects the state at its revision.
//! 4. `get_or_init` on an empty registry notifies subscribers once.

use std::sync::{Arc, Mutex};

use dpass_schemas::{Category, GateLayout, PassRecord, TotalsRecord};
use dpass_store::{
    EntrySnapshot, EntryStore, MemoryEntryStore, MemoryTotalsRegistry, StoreError,
    TotalsRegistry, TotalsSnapshot,
};

#[tokio::test]
async fn entry_store_revisions_are_strictly_increasing() {
    let store: Arc<dyn EntryStore> = Arc::new(MemoryEntryStore::new());
    let seen: Arc<Mutex<Vec<EntrySnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _sub = store.subscribe(Box::new(move |snap| s.lock().unwrap().push(snap)));

    let (a, created_at) = store
        .create(PassRecord::new("A", Category::Palace, 1, 2))
        .await
        .unwrap();
    let updated_at = store
        .update(&a, PassRecord::new("A", Category::Torchlight, 4, 2))
        .await
        .unwrap();
    let deleted_at = store.delete(&a).await.unwrap();
    assert_eq!((created_at, updated_at, deleted_at), (1, 2, 3));

    let seen = seen.lock().unwrap();
    let revs: Vec<u64> = seen.iter().map(|s| s.revision).collect();
    assert_eq!(revs, vec![0, 1, 2, 3]);
    assert!(seen[0].entries.is_empty());
    assert_eq!(seen[1].entries[0].record.category, Some(Category::Palace));
    assert_eq!(seen[2].entries[0].record.category, Some(Category::Torchlight));
    assert!(seen[3].entries.is_empty());
}

#[tokio::test]
async fn failed_write_delivers_nothing() {
    let mem = Arc::new(MemoryEntryStore::new());
    let hits = Arc::new(Mutex::new(0u32));
    let h = hits.clone();
    let _sub = mem.subscribe(Box::new(move |_| *h.lock().unwrap() += 1));

    mem.fail_next(StoreError::PermissionDenied("read-only".to_string()));
    let store: Arc<dyn EntryStore> = mem.clone();
    let err = store
        .create(PassRecord::new("A", Category::Palace, 1, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::PermissionDenied(_)));
    assert_eq!(*hits.lock().unwrap(), 1, "only the initial delivery");
    assert_eq!(mem.revision(), 0);
}

#[tokio::test]
async fn lazy_init_notifies_subscribers() {
    let reg: Arc<dyn TotalsRegistry> = Arc::new(MemoryTotalsRegistry::new());
    let seen: Arc<Mutex<Vec<TotalsSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _sub = reg.subscribe(Box::new(move |snap| s.lock().unwrap().push(snap)));

    let layout = GateLayout::default();
    reg.get_or_init(&layout).await.unwrap();
    reg.get_or_init(&layout).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].record, None);
    assert_eq!(seen[1].record, Some(TotalsRecord::zeroed(&layout)));
    assert_eq!(seen[1].revision, 1);
}
