//! Shared runtime state for dpass-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The background tasks
//! here only forward: the maintainer owns the view, the bus fans it out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dpass_config::DeskConfig;
use dpass_reconcile::{AllocationDesk, Attachment, Maintainer, PublishedState};
use dpass_store::{MemoryEntryStore, MemoryTotalsRegistry};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api_types::AllocationResponse;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Allocation(AllocationResponse),
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Allocation(_) => "allocation",
        }
    }
}

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub desk: AllocationDesk,
    pub config_hash: Option<String>,
    /// Keeps the store subscriptions feeding the maintainer alive.
    _attachment: Option<Attachment>,
}

impl AppState {
    /// Wire in-memory stores, the maintainer and the desk, and initialise
    /// the totals registry. Must run inside a tokio runtime.
    pub async fn boot(cfg: &DeskConfig, config_hash: Option<String>) -> Result<Arc<Self>> {
        let entries = Arc::new(MemoryEntryStore::new());
        let totals = Arc::new(MemoryTotalsRegistry::new());
        Self::boot_with_stores(cfg, config_hash, entries, totals).await
    }

    /// Same as [`AppState::boot`] over caller-supplied stores.
    pub async fn boot_with_stores(
        cfg: &DeskConfig,
        config_hash: Option<String>,
        entries: Arc<MemoryEntryStore>,
        totals: Arc<MemoryTotalsRegistry>,
    ) -> Result<Arc<Self>> {
        let maintainer = Maintainer::spawn(cfg.layout);
        let attachment = maintainer.attach(entries.as_ref(), totals.as_ref());
        let desk = AllocationDesk::new(entries, totals, maintainer, cfg.layout);
        desk.ensure_totals()
            .await
            .context("totals registry initialisation failed")?;

        Ok(Self::new(desk, Some(attachment), cfg.bus_capacity, config_hash))
    }

    /// Assemble state around an existing desk. Without an attachment the
    /// desk's maintainer only sees what is pushed to it by hand.
    pub fn new(
        desk: AllocationDesk,
        attachment: Option<Attachment>,
        bus_capacity: usize,
        config_hash: Option<String>,
    ) -> Arc<Self> {
        let (bus, _rx) = broadcast::channel::<BusMsg>(bus_capacity);
        Arc::new(Self {
            bus,
            build: BuildInfo {
                service: "dpass-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            desk,
            config_hash,
            _attachment: attachment,
        })
    }
}

impl From<&PublishedState> for AllocationResponse {
    fn from(s: &PublishedState) -> Self {
        Self {
            generation: s.generation,
            entries_revision: s.entries_revision,
            totals_revision: s.totals_revision,
            layout: *s.capacity.layout(),
            view: s.view.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Emit a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    })
}

/// Forward every published view onto the bus as an `allocation` event.
/// Ends when the maintainer stops.
pub fn spawn_view_forwarder(state: Arc<AppState>) -> JoinHandle<()> {
    let mut rx = state.desk.maintainer().subscribe();
    tokio::spawn(async move {
        loop {
            let msg = rx
                .borrow_and_update()
                .as_deref()
                .map(|s| BusMsg::Allocation(AllocationResponse::from(s)));
            if let Some(msg) = msg {
                // No subscribers is fine; SSE clients come and go.
                let _ = state.bus.send(msg);
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        debug!("view forwarder stopped");
    })
}

/// Stop the maintainer. Called on graceful shutdown.
pub async fn shutdown(state: &AppState) {
    state.desk.maintainer().shutdown().await;
    info!("dpass-daemon state shut down");
}
