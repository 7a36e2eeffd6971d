//! dpass-allocation
//!
//! Allocation engine: derives distributed/balance figures from an entry
//! snapshot and a capacity snapshot, and gates every mutation against the
//! capacity invariant `balance[c][g] >= 0`.
//!
//! - Recompute from scratch on every call; no running counters.
//! - An edit is validated with its own prior contribution excluded.
//! - Capacity may never be set below what is already distributed.
//! - Deletion needs no gate: it only ever lowers distributed counts.
//!
//! Deterministic, pure logic. No IO, no clock, no store calls.

mod engine;
mod types;

pub use engine::{
    build_view, compute_distribution, plan_capacity_edit, validate_capacity_edit,
    validate_mutation, validate_record,
};
pub use types::*;
