use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dpass_allocation::{build_view, compute_distribution, DerivedAllocationView, Distribution};
use dpass_schemas::{CapacityTable, GateLayout, PassEntry};
use dpass_store::{EntrySnapshot, EntryStore, Subscription, TotalsRegistry, TotalsSnapshot};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::RevisionWatermark;

// ---------------------------------------------------------------------------
// Published state
// ---------------------------------------------------------------------------

/// One consistent (entries, totals) pair and everything derived from it.
///
/// Replaced as a whole on every recompute; readers never see a mix of
/// two generations.
#[derive(Clone, Debug, Serialize)]
pub struct PublishedState {
    /// Increments by one per recompute, starting at 1.
    pub generation: u64,
    pub entries_revision: u64,
    pub totals_revision: u64,
    pub entries: Vec<PassEntry>,
    pub capacity: CapacityTable,
    pub distribution: Distribution,
    pub view: DerivedAllocationView,
}

// ---------------------------------------------------------------------------
// Shared notification state
// ---------------------------------------------------------------------------

/// Latest-wins slot per feed, ordered by revision. Store callbacks may
/// arrive out of order, so an older snapshot never displaces a newer one.
#[derive(Default)]
struct Pending {
    entries: Option<EntrySnapshot>,
    totals: Option<TotalsSnapshot>,
}

struct Shared {
    pending: Mutex<Pending>,
    wake: Notify,
    closed: AtomicBool,
}

impl Shared {
    fn pending(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn offer_entries(&self, snap: EntrySnapshot) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut pending = self.pending();
            if pending.entries.as_ref().is_some_and(|p| p.revision > snap.revision) {
                return;
            }
            pending.entries = Some(snap);
        }
        self.wake.notify_one();
    }

    fn offer_totals(&self, snap: TotalsSnapshot) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut pending = self.pending();
            if pending.totals.as_ref().is_some_and(|p| p.revision > snap.revision) {
                return;
            }
            pending.totals = Some(snap);
        }
        self.wake.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

// ---------------------------------------------------------------------------
// Maintainer
// ---------------------------------------------------------------------------

/// Entry point for the background recompute task.
pub struct Maintainer;

impl Maintainer {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(layout: GateLayout) -> MaintainerHandle {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
        });
        let (tx, rx) = watch::channel::<Option<Arc<PublishedState>>>(None);
        let task = tokio::spawn(run(Arc::clone(&shared), layout, tx));
        info!(
            palace_gates = layout.palace_gates,
            torchlight_gates = layout.torchlight_gates,
            "allocation maintainer started"
        );
        MaintainerHandle {
            inner: Arc::new(HandleInner {
                shared,
                rx,
                layout,
                task: Mutex::new(Some(task)),
            }),
        }
    }
}

struct HandleInner {
    shared: Arc<Shared>,
    rx: watch::Receiver<Option<Arc<PublishedState>>>,
    layout: GateLayout,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Cloneable handle to a running maintainer. The worker stops on
/// [`MaintainerHandle::shutdown`] or when the last handle drops.
#[derive(Clone)]
pub struct MaintainerHandle {
    inner: Arc<HandleInner>,
}

/// Store subscriptions feeding a maintainer. Dropping detaches.
#[derive(Debug)]
pub struct Attachment {
    pub entries: Subscription,
    pub totals: Subscription,
}

impl MaintainerHandle {
    pub fn layout(&self) -> GateLayout {
        self.inner.layout
    }

    /// Offer a new entries snapshot. Never blocks; safe from store callbacks.
    pub fn notify_entries(&self, snap: EntrySnapshot) {
        self.inner.shared.offer_entries(snap);
    }

    /// Offer a new totals snapshot. Never blocks; safe from store callbacks.
    pub fn notify_totals(&self, snap: TotalsSnapshot) {
        self.inner.shared.offer_totals(snap);
    }

    /// Subscribe both stores to this maintainer.
    ///
    /// The callbacks hold only the notification slot, not the handle, so an
    /// attached store does not keep the worker alive.
    pub fn attach(&self, entries: &dyn EntryStore, totals: &dyn TotalsRegistry) -> Attachment {
        let e = Arc::clone(&self.inner.shared);
        let t = Arc::clone(&self.inner.shared);
        Attachment {
            entries: entries.subscribe(Box::new(move |snap| e.offer_entries(snap))),
            totals: totals.subscribe(Box::new(move |snap| t.offer_totals(snap))),
        }
    }

    /// Latest published state, `None` until both feeds have delivered.
    pub fn current(&self) -> Option<Arc<PublishedState>> {
        self.inner.rx.borrow().clone()
    }

    /// Receiver that changes on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedState>>> {
        self.inner.rx.clone()
    }

    /// Wait until a published state satisfies `pred`. Returns `None` if the
    /// worker has stopped first.
    pub async fn wait_for(
        &self,
        mut pred: impl FnMut(&PublishedState) -> bool,
    ) -> Option<Arc<PublishedState>> {
        let mut rx = self.subscribe();
        let guard = rx
            .wait_for(|s| s.as_deref().map(&mut pred).unwrap_or(false))
            .await
            .ok()?;
        guard.clone()
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.shared.close();
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "allocation maintainer task failed");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shared.closed.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn run(
    shared: Arc<Shared>,
    layout: GateLayout,
    tx: watch::Sender<Option<Arc<PublishedState>>>,
) {
    let mut entries_wm = RevisionWatermark::new();
    let mut totals_wm = RevisionWatermark::new();
    let mut entries: Option<EntrySnapshot> = None;
    let mut totals: Option<TotalsSnapshot> = None;
    let mut generation: u64 = 0;

    loop {
        // Notifications that land while we recompute leave one stored
        // permit, so this wakes exactly once more for all of them.
        shared.wake.notified().await;
        if shared.closed.load(Ordering::Acquire) {
            break;
        }

        let taken = std::mem::take(&mut *shared.pending());
        let mut changed = false;

        if let Some(snap) = taken.entries {
            let freshness = entries_wm.accept(snap.revision);
            if freshness.is_fresh() {
                entries = Some(snap);
                changed = true;
            } else {
                debug!(?freshness, "dropping stale entries snapshot");
            }
        }
        if let Some(snap) = taken.totals {
            let freshness = totals_wm.accept(snap.revision);
            if freshness.is_fresh() {
                totals = Some(snap);
                changed = true;
            } else {
                debug!(?freshness, "dropping stale totals snapshot");
            }
        }

        if !changed {
            continue;
        }
        let (Some(e), Some(t)) = (&entries, &totals) else {
            continue;
        };

        generation += 1;
        let state = recompute(generation, &layout, e, t);
        let overdrawn = state.view.overdrawn_gates();
        if !overdrawn.is_empty() {
            let gates: Vec<String> = overdrawn.iter().map(|g| g.to_string()).collect();
            warn!(
                generation,
                gates = %gates.join(", "),
                "committed state is overdrawn (concurrent writers)"
            );
        }
        debug!(
            generation,
            entries_revision = state.entries_revision,
            totals_revision = state.totals_revision,
            "allocation view published"
        );
        tx.send_replace(Some(Arc::new(state)));
    }

    info!(generation, "allocation maintainer stopped");
}

fn recompute(
    generation: u64,
    layout: &GateLayout,
    entries: &EntrySnapshot,
    totals: &TotalsSnapshot,
) -> PublishedState {
    // Uninitialised registry reads as all-zero capacity.
    let capacity = totals
        .record
        .clone()
        .unwrap_or_default()
        .normalized(layout);
    let distribution = compute_distribution(&entries.entries, layout);
    let view = build_view(&entries.entries, &capacity);
    PublishedState {
        generation,
        entries_revision: entries.revision,
        totals_revision: totals.revision,
        entries: entries.entries.clone(),
        capacity,
        distribution,
        view,
    }
}
