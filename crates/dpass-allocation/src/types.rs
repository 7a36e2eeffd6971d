use std::fmt;

use dpass_schemas::{Category, GateId, GateLayout, PerCategory};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// Passes promised per gate, aligned to a [`GateLayout`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Distribution {
    layout: GateLayout,
    rows: PerCategory<Vec<i64>>,
}

impl Distribution {
    pub fn zeroed(layout: &GateLayout) -> Self {
        Self {
            layout: *layout,
            rows: PerCategory::from_fn(|c| vec![0; layout.slots(c)]),
        }
    }

    pub fn layout(&self) -> &GateLayout {
        &self.layout
    }

    pub fn row(&self, category: Category) -> &[i64] {
        self.rows.get(category)
    }

    /// Distributed count at `gate`; 0 for gates outside the layout.
    pub fn get(&self, gate: GateId) -> i64 {
        self.layout
            .slot_of(gate)
            .and_then(|i| self.rows.get(gate.category).get(i).copied())
            .unwrap_or(0)
    }

    pub fn total(&self, category: Category) -> i64 {
        self.rows.get(category).iter().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    /// Adds `count` at `gate`. Returns `false` (and changes nothing) when
    /// the gate is outside the layout.
    pub(crate) fn add(&mut self, gate: GateId, count: i64) -> bool {
        match self.layout.slot_of(gate) {
            Some(i) => {
                let slot = &mut self.rows.get_mut(gate.category)[i];
                *slot = slot.saturating_add(count);
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived view
// ---------------------------------------------------------------------------

/// Capacity, distributed and balance rows for one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryLedger {
    pub capacity: Vec<i64>,
    pub distributed: Vec<i64>,
    pub balance: Vec<i64>,
}

/// Distributed and balance figures for every gate of every category.
///
/// Always rebuilt from a full (entries, capacity) snapshot pair; never
/// patched in place. `balance` is signed: a negative value means the
/// committed state is overdrawn (possible only through concurrent writers
/// that each validated against their own snapshot).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DerivedAllocationView {
    pub layout: GateLayout,
    pub ledgers: PerCategory<CategoryLedger>,
}

impl DerivedAllocationView {
    pub fn ledger(&self, category: Category) -> &CategoryLedger {
        self.ledgers.get(category)
    }

    fn cell(&self, gate: GateId, pick: impl Fn(&CategoryLedger) -> &Vec<i64>) -> i64 {
        self.layout
            .slot_of(gate)
            .and_then(|i| pick(self.ledgers.get(gate.category)).get(i).copied())
            .unwrap_or(0)
    }

    pub fn capacity(&self, gate: GateId) -> i64 {
        self.cell(gate, |l| &l.capacity)
    }

    pub fn distributed(&self, gate: GateId) -> i64 {
        self.cell(gate, |l| &l.distributed)
    }

    pub fn balance(&self, gate: GateId) -> i64 {
        self.cell(gate, |l| &l.balance)
    }

    pub fn distributed_total(&self, category: Category) -> i64 {
        self.ledger(category).distributed.iter().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    pub fn balance_total(&self, category: Category) -> i64 {
        self.ledger(category).balance.iter().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    /// Gates whose balance is negative, in category then slot order.
    pub fn overdrawn_gates(&self) -> Vec<GateId> {
        let mut out = Vec::new();
        for category in Category::ALL {
            for gate in self.layout.gates(category) {
                if self.balance(gate) < 0 {
                    out.push(gate);
                }
            }
        }
        out
    }

    /// `true` when `balance >= 0` holds for every gate.
    pub fn is_within_capacity(&self) -> bool {
        self.ledgers
            .iter()
            .all(|(_, l)| l.balance.iter().all(|b| *b >= 0))
    }
}

// ---------------------------------------------------------------------------
// Rejection reasons
// ---------------------------------------------------------------------------

/// Which mobile number failed the digit rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MobileField {
    Recipient,
    Messenger,
}

impl MobileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MobileField::Recipient => "recipient mobile",
            MobileField::Messenger => "messenger mobile",
        }
    }
}

/// A malformed candidate. Never reaches the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationError {
    EmptyRecipientName,
    MissingCategory,
    MissingGate,
    GateOutOfRange { gate: GateId, slots: usize },
    NonPositivePassCount { pass_count: i64 },
    InvalidMobile { field: MobileField, value: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyRecipientName => write!(f, "recipient name is required"),
            ValidationError::MissingCategory => write!(f, "pass category is required"),
            ValidationError::MissingGate => write!(f, "gate is required"),
            ValidationError::GateOutOfRange { gate, slots } => write!(
                f,
                "{gate} is outside the configured range 1-{slots} for {}",
                gate.category
            ),
            ValidationError::NonPositivePassCount { pass_count } => {
                write!(f, "pass count must be positive (got {pass_count})")
            }
            ValidationError::InvalidMobile { field, value } => write!(
                f,
                "{} must be exactly 10 digits (got '{value}')",
                field.as_str()
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A well-formed mutation that would break the capacity invariant.
/// Never reaches the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CapacityError {
    /// `requested` passes do not fit in the `available` headroom.
    InsufficientHeadroom {
        gate: GateId,
        requested: i64,
        available: i64,
    },
    /// Capacity may not drop below what is already distributed.
    CannotShrinkBelowDistributed {
        gate: GateId,
        requested: i64,
        distributed: i64,
    },
    NegativeCapacity { gate: GateId, requested: i64 },
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::InsufficientHeadroom {
                gate,
                requested,
                available,
            } => write!(
                f,
                "not enough passes at {gate}: requested {requested}, available {available}"
            ),
            CapacityError::CannotShrinkBelowDistributed {
                gate,
                requested,
                distributed,
            } => write!(
                f,
                "cannot set {gate} total to {requested}: {distributed} already distributed"
            ),
            CapacityError::NegativeCapacity { gate, requested } => {
                write!(f, "{gate} total must be non-negative (got {requested})")
            }
        }
    }
}

impl std::error::Error for CapacityError {}

/// Why a mutation was refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    Validation(ValidationError),
    Capacity(CapacityError),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Validation(e) => write!(f, "invalid entry: {e}"),
            Rejection::Capacity(e) => write!(f, "capacity exceeded: {e}"),
        }
    }
}

impl std::error::Error for Rejection {}

impl From<ValidationError> for Rejection {
    fn from(e: ValidationError) -> Self {
        Rejection::Validation(e)
    }
}

impl From<CapacityError> for Rejection {
    fn from(e: CapacityError) -> Self {
        Rejection::Capacity(e)
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Engine verdict on a proposed mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected(Rejection),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_accepted()
    }

    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Decision::Accepted => Ok(()),
            Decision::Rejected(r) => Err(r),
        }
    }
}

impl From<Result<(), Rejection>> for Decision {
    fn from(r: Result<(), Rejection>) -> Self {
        match r {
            Ok(()) => Decision::Accepted,
            Err(e) => Decision::Rejected(e),
        }
    }
}
