//! Scenario: the maintainer coalesces bursts and never rolls back.
//!
//! # Invariants under test
//!
//! 1. A burst of notifications before the worker runs yields one recompute
//!    over the newest snapshot pair.
//! 2. A burst after a publish yields exactly one trailing recompute.
//! 3. An entries snapshot older than the last accepted one is dropped.
//! 4. Every published view equals a fresh recompute of its own snapshots.
//!
//! Runs on a current-thread runtime so the worker only makes progress when
//! the test yields.

use dpass_allocation::build_view;
use dpass_reconcile::Maintainer;
use dpass_schemas::{Category, GateId, GateLayout, PassEntry, PassRecord, TotalsRecord};
use dpass_store::{EntrySnapshot, TotalsSnapshot};

fn layout() -> GateLayout {
    GateLayout::new(4, 4)
}

fn entries(revision: u64, palace_gate1: i64) -> EntrySnapshot {
    EntrySnapshot {
        revision,
        entries: vec![PassEntry::new(
            "only",
            PassRecord::new("R", Category::Palace, 1, palace_gate1),
        )],
    }
}

fn totals(revision: u64) -> TotalsSnapshot {
    TotalsSnapshot {
        revision,
        record: Some(TotalsRecord {
            palace_totals: vec![1_000, 0, 0, 0],
            torchlight_totals: vec![0, 0, 0, 0],
        }),
    }
}

async fn let_worker_idle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(flavor = "current_thread")]
async fn burst_before_first_run_recomputes_once() {
    let h = Maintainer::spawn(layout());
    for rev in 1..=100 {
        h.notify_entries(entries(rev, rev as i64));
    }
    h.notify_totals(totals(1));

    let s = h.wait_for(|_| true).await.unwrap();
    assert_eq!(s.generation, 1);
    assert_eq!(s.entries_revision, 100);
    assert_eq!(s.view.distributed(GateId::new(Category::Palace, 1)), 100);

    let_worker_idle().await;
    assert_eq!(h.current().unwrap().generation, 1, "no extra recomputes");
    h.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn burst_after_publish_yields_one_trailing_recompute() {
    let h = Maintainer::spawn(layout());
    h.notify_entries(entries(1, 1));
    h.notify_totals(totals(1));
    h.wait_for(|s| s.generation == 1).await.unwrap();

    for rev in 2..=50 {
        h.notify_entries(entries(rev, rev as i64));
        h.notify_totals(totals(rev));
    }
    let s = h.wait_for(|s| s.generation >= 2).await.unwrap();
    let_worker_idle().await;

    let latest = h.current().unwrap();
    assert_eq!(latest.generation, 2);
    assert_eq!(s.entries_revision, 50);
    assert_eq!(latest.totals_revision, 50);
    h.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn stale_entries_snapshot_never_rolls_view_back() {
    let h = Maintainer::spawn(layout());
    h.notify_entries(entries(5, 9));
    h.notify_totals(totals(1));
    h.wait_for(|s| s.entries_revision == 5).await.unwrap();

    h.notify_entries(entries(3, 2));
    let_worker_idle().await;
    let s = h.current().unwrap();
    assert_eq!(s.generation, 1);
    assert_eq!(s.entries_revision, 5);
    assert_eq!(s.view.distributed(GateId::new(Category::Palace, 1)), 9);

    h.notify_entries(entries(6, 4));
    let s = h.wait_for(|s| s.entries_revision == 6).await.unwrap();
    assert_eq!(s.generation, 2);
    assert_eq!(s.view.distributed(GateId::new(Category::Palace, 1)), 4);
    h.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn published_view_matches_fresh_recompute() {
    let h = Maintainer::spawn(layout());
    h.notify_entries(entries(1, 17));
    h.notify_totals(totals(1));
    let s = h.wait_for(|_| true).await.unwrap();
    assert_eq!(s.view, build_view(&s.entries, &s.capacity));
    h.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn dropping_last_handle_stops_worker() {
    let h = Maintainer::spawn(layout());
    let mut rx = h.subscribe();
    drop(h);
    // Sender side goes away once the worker exits.
    assert!(rx.changed().await.is_err());
}
