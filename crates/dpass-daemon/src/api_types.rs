//! Request and response bodies for the daemon's HTTP endpoints.
//!
//! No business logic lives here.

use dpass_allocation::{DerivedAllocationView, Rejection};
use dpass_schemas::{EntryId, GateId, GateLayout, PassEntry};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    /// `true` once the first allocation view has been published.
    pub ready: bool,
    pub config_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// /v1/allocation, /v1/entries
// ---------------------------------------------------------------------------

/// Derived view as shown to the presentation layer. Also the payload of
/// SSE `allocation` events.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationResponse {
    pub generation: u64,
    pub entries_revision: u64,
    pub totals_revision: u64,
    pub layout: GateLayout,
    pub view: DerivedAllocationView,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub generation: u64,
    pub entries: Vec<PassEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveEntryResponse {
    pub id: EntryId,
}

// ---------------------------------------------------------------------------
// /v1/totals/:category/:gate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTotalRequest {
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetTotalResponse {
    pub gate: GateId,
    pub value: i64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code: "rejected" | "not_ready" | "not_found"
    /// | "store_failure" | "bad_request".
    pub code: &'static str,
    pub error: String,
    /// Structured reason when `code == "rejected"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}
