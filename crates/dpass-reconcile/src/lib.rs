//! dpass-reconcile
//!
//! Keeps the derived allocation view consistent with the two stores, and
//! gates every operator mutation against it.
//!
//! - [`Maintainer`]: one background task that recomputes the view from the
//!   newest (entries, totals) snapshot pair and publishes it atomically.
//!   Bursts of store notifications coalesce into a single trailing
//!   recompute; out-of-order snapshots are dropped by per-feed
//!   [`RevisionWatermark`]s.
//! - [`AllocationDesk`]: validate-then-write mutation API. Validation reads
//!   the latest published state; the view itself only moves when the
//!   stores report the write back.
//!
//! Writers in different sessions each validate against their own snapshot.
//! Nothing here serialises them, so concurrent accepted writes can overdraw
//! a gate. The maintainer logs such gates at `warn` when it sees them.

mod desk;
mod maintainer;
mod watermark;

pub use desk::{AllocationDesk, DeskError, DEFAULT_CONFIRM_TIMEOUT};
pub use maintainer::{Attachment, Maintainer, MaintainerHandle, PublishedState};
pub use watermark::{RevisionFreshness, RevisionWatermark};
