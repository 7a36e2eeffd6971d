//! dpass-store
//!
//! Contracts for the two external stores the allocation desk depends on:
//!
//! - [`EntryStore`]: collection of pass entries, one document per recipient.
//! - [`TotalsRegistry`]: single document holding capacity per gate.
//!
//! Both push full snapshots to subscribers on every change. Snapshots carry
//! a monotonically increasing `revision` so consumers can discard
//! out-of-order deliveries.
//!
//! In-memory implementations live in [`memory`] and back the daemon and
//! the test suites.

mod error;
pub mod memory;
mod subscription;
mod traits;

pub use error::StoreError;
pub use memory::{MemoryEntryStore, MemoryTotalsRegistry};
pub use subscription::Subscription;
pub use traits::{EntryCallback, EntrySnapshot, EntryStore, TotalsCallback, TotalsRegistry, TotalsSnapshot};
