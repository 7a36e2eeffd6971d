//! Axum router and all HTTP handlers for dpass-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers so tests can drive the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, put},
    Json, Router,
};
use dpass_reconcile::DeskError;
use dpass_schemas::{Category, EntryId, GateId, PassRecord};
use dpass_store::StoreError;
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    api_types::{
        AllocationResponse, EntriesResponse, ErrorResponse, HealthResponse, SaveEntryResponse,
        SetTotalRequest, SetTotalResponse,
    },
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/allocation", get(allocation))
        .route("/v1/entries", get(list_entries).post(create_entry))
        .route("/v1/entries/:id", put(replace_entry).delete(delete_entry))
        .route("/v1/totals/:category/:gate", put(set_total))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Handler error; renders as [`ErrorResponse`].
pub(crate) struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(msg: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                code: "bad_request",
                error: msg,
                rejection: None,
            },
        }
    }
}

impl From<DeskError> for ApiError {
    fn from(e: DeskError) -> Self {
        let error = e.to_string();
        let (status, code, rejection) = match e {
            DeskError::Rejected(r) => (StatusCode::UNPROCESSABLE_ENTITY, "rejected", Some(r)),
            DeskError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "not_ready", None),
            DeskError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found", None),
            DeskError::Store(_) => (StatusCode::BAD_GATEWAY, "store_failure", None),
        };
        Self {
            status,
            body: ErrorResponse {
                code,
                error,
                rejection,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            ready: st.desk.current().is_ok(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/allocation, GET /v1/entries
// ---------------------------------------------------------------------------

pub(crate) async fn allocation(
    State(st): State<Arc<AppState>>,
) -> Result<Json<AllocationResponse>, ApiError> {
    let s = st.desk.current()?;
    Ok(Json(AllocationResponse::from(s.as_ref())))
}

pub(crate) async fn list_entries(
    State(st): State<Arc<AppState>>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let s = st.desk.current()?;
    Ok(Json(EntriesResponse {
        generation: s.generation,
        entries: s.entries.clone(),
    }))
}

// ---------------------------------------------------------------------------
// Entry mutations
// ---------------------------------------------------------------------------

pub(crate) async fn create_entry(
    State(st): State<Arc<AppState>>,
    Json(record): Json<PassRecord>,
) -> Result<(StatusCode, Json<SaveEntryResponse>), ApiError> {
    let id = st.desk.save_entry(record, None).await?;
    Ok((StatusCode::CREATED, Json(SaveEntryResponse { id })))
}

pub(crate) async fn replace_entry(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(record): Json<PassRecord>,
) -> Result<Json<SaveEntryResponse>, ApiError> {
    let id = EntryId::new(id);
    let id = st.desk.save_entry(record, Some(&id)).await?;
    Ok(Json(SaveEntryResponse { id }))
}

pub(crate) async fn delete_entry(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    st.desk.delete_entry(&EntryId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// PUT /v1/totals/:category/:gate
// ---------------------------------------------------------------------------

pub(crate) async fn set_total(
    State(st): State<Arc<AppState>>,
    Path((category, gate)): Path<(String, u16)>,
    Json(req): Json<SetTotalRequest>,
) -> Result<Json<SetTotalResponse>, ApiError> {
    let category = Category::parse(&category)
        .ok_or_else(|| ApiError::bad_request(format!("unknown pass category: {category}")))?;
    let gate = GateId::new(category, gate);
    st.desk.set_total(gate, req.value).await?;
    Ok(Json(SetTotalResponse {
        gate,
        value: req.value,
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/stream (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        // Lagged receivers skip ahead; the next allocation event is a full view.
        let m = msg.ok()?;
        let data = serde_json::to_string(&m).ok()?;
        Some(Ok(Event::default().event(m.event_name()).data(data)))
    })
}
