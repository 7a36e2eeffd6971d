use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dpass_allocation::{plan_capacity_edit, validate_mutation, Decision, Rejection};
use dpass_schemas::{EntryId, GateId, GateLayout, PassRecord, TotalsRecord};
use dpass_store::{EntryStore, StoreError, TotalsRegistry};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{MaintainerHandle, PublishedState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeskError {
    /// No view has been published yet; nothing to validate against.
    NotReady,
    /// The engine refused the mutation. Nothing was written.
    Rejected(Rejection),
    /// The store refused or failed the write.
    Store(StoreError),
}

impl fmt::Display for DeskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeskError::NotReady => write!(f, "allocation view not ready"),
            DeskError::Rejected(r) => write!(f, "{r}"),
            DeskError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DeskError {}

impl From<Rejection> for DeskError {
    fn from(r: Rejection) -> Self {
        DeskError::Rejected(r)
    }
}

impl From<StoreError> for DeskError {
    fn from(e: StoreError) -> Self {
        DeskError::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Desk
// ---------------------------------------------------------------------------

/// How long a write waits for its revision to be published by default.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Operator mutation API: validate against the latest published state,
/// then write.
///
/// A successful write does not touch the view directly; it moves once the
/// store delivers the change to the maintainer. Mutations through one desk
/// and its clones run one at a time, and each returns only after the
/// maintainer has published its revision, so the next mutation validates
/// against it. A rejected or failed write leaves both stores and the view
/// as they were.
///
/// Not atomic across sessions: two desks with their own maintainers may
/// each accept a claim on the last free passes of a gate.
#[derive(Clone)]
pub struct AllocationDesk {
    entries: Arc<dyn EntryStore>,
    totals: Arc<dyn TotalsRegistry>,
    maintainer: MaintainerHandle,
    layout: GateLayout,
    writes: Arc<Mutex<()>>,
    confirm_timeout: Duration,
}

impl AllocationDesk {
    pub fn new(
        entries: Arc<dyn EntryStore>,
        totals: Arc<dyn TotalsRegistry>,
        maintainer: MaintainerHandle,
        layout: GateLayout,
    ) -> Self {
        Self {
            entries,
            totals,
            maintainer,
            layout,
            writes: Arc::new(Mutex::new(())),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    /// Bound on how long a committed write waits to be published. On expiry
    /// the write still succeeds and a warning is logged.
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn layout(&self) -> &GateLayout {
        &self.layout
    }

    pub fn maintainer(&self) -> &MaintainerHandle {
        &self.maintainer
    }

    /// Latest published state.
    pub fn current(&self) -> Result<Arc<PublishedState>, DeskError> {
        self.maintainer.current().ok_or(DeskError::NotReady)
    }

    /// Make sure the totals registry holds a document, writing zeros for
    /// the desk's layout when it does not.
    pub async fn ensure_totals(&self) -> Result<TotalsRecord, DeskError> {
        self.totals.get_or_init(&self.layout).await.map_err(|e| {
            error!(error = %e, "totals registry initialisation failed");
            DeskError::Store(e)
        })
    }

    /// Create (`replacing == None`) or replace an entry.
    pub async fn save_entry(
        &self,
        mut record: PassRecord,
        replacing: Option<&EntryId>,
    ) -> Result<EntryId, DeskError> {
        let _writing = self.writes.lock().await;
        let state = self.current()?;

        if let Decision::Rejected(r) =
            validate_mutation(&record, &state.entries, &state.capacity, replacing)
        {
            warn!(
                generation = state.generation,
                replacing = ?replacing.map(EntryId::as_str),
                reason = %r,
                "entry rejected"
            );
            return Err(DeskError::Rejected(r));
        }

        record.updated_at = Some(Utc::now());
        let gate = record.gate_id();
        let pass_count = record.pass_count;

        let (id, revision) = match replacing {
            Some(id) => {
                let revision = self
                    .entries
                    .update(id, record)
                    .await
                    .map_err(|e| store_failure("update", e))?;
                (id.clone(), revision)
            }
            None => self
                .entries
                .create(record)
                .await
                .map_err(|e| store_failure("create", e))?,
        };

        info!(
            entry_id = %id,
            gate = ?gate.map(|g| g.to_string()),
            pass_count,
            edit = replacing.is_some(),
            revision,
            "entry saved"
        );
        self.await_published("save_entry", revision, |s| s.entries_revision >= revision)
            .await;
        Ok(id)
    }

    /// Remove an entry. Deletion only frees capacity, so it is not gated.
    pub async fn delete_entry(&self, id: &EntryId) -> Result<(), DeskError> {
        let _writing = self.writes.lock().await;
        let revision = self
            .entries
            .delete(id)
            .await
            .map_err(|e| store_failure("delete", e))?;
        info!(entry_id = %id, revision, "entry deleted");
        self.await_published("delete_entry", revision, |s| s.entries_revision >= revision)
            .await;
        Ok(())
    }

    /// Set the capacity of one gate. Writes the full totals document.
    pub async fn set_total(&self, gate: GateId, value: i64) -> Result<(), DeskError> {
        let _writing = self.writes.lock().await;
        let state = self.current()?;

        let record =
            plan_capacity_edit(&state.capacity, &state.distribution, gate, value).map_err(|r| {
                warn!(
                    generation = state.generation,
                    %gate,
                    value,
                    reason = %r,
                    "capacity edit rejected"
                );
                DeskError::Rejected(r)
            })?;

        let revision = self
            .totals
            .set(record)
            .await
            .map_err(|e| store_failure("set_total", e))?;
        info!(%gate, value, revision, "gate capacity updated");
        self.await_published("set_total", revision, |s| s.totals_revision >= revision)
            .await;
        Ok(())
    }

    /// Hold the caller until the maintainer has published a state that
    /// includes the write at `revision`.
    async fn await_published(
        &self,
        op: &'static str,
        revision: u64,
        pred: impl FnMut(&PublishedState) -> bool,
    ) {
        match tokio::time::timeout(self.confirm_timeout, self.maintainer.wait_for(pred)).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!(op, revision, "maintainer stopped before write was published"),
            Err(_) => warn!(
                op,
                revision,
                timeout_ms = self.confirm_timeout.as_millis() as u64,
                "write not published in time; next check may use an older view"
            ),
        }
    }
}

fn store_failure(op: &'static str, e: StoreError) -> DeskError {
    error!(op, error = %e, "store write failed");
    DeskError::Store(e)
}
