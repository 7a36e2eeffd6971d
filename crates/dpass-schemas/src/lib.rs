//! dpass-schemas
//!
//! Shared data model for pass distribution: categories, per-category gate
//! identifiers, the stored entry record, and the totals registry document.
//!
//! Types only. No IO, no clock, no allocation logic.

mod entry;
mod gate;
mod totals;

pub use entry::{EntryId, PassEntry, PassRecord};
pub use gate::{
    Category, GateId, GateLayout, GateNo, PerCategory, DEFAULT_GATES_PER_CATEGORY,
    MAX_GATES_PER_CATEGORY,
};
pub use totals::{CapacityTable, TotalsRecord};
