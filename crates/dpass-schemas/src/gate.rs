use std::fmt;

use serde::{Deserialize, Serialize};

/// Gate slots per category when no layout is configured.
pub const DEFAULT_GATES_PER_CATEGORY: u16 = 16;

/// Upper bound on configurable gate slots per category.
pub const MAX_GATES_PER_CATEGORY: u16 = 64;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// One of the two independent capacity pools. Pools never share headroom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Palace,
    Torchlight,
}

impl Category {
    /// Stable iteration order used by every per-category table.
    pub const ALL: [Category; 2] = [Category::Palace, Category::Torchlight];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Palace => "palace",
            Category::Torchlight => "torchlight",
        }
    }

    /// Case-insensitive parse of the wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "palace" => Some(Category::Palace),
            "torchlight" => Some(Category::Torchlight),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PerCategory
// ---------------------------------------------------------------------------

/// A value held once per [`Category`].
///
/// Fixed fields rather than a map so a missing category is unrepresentable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerCategory<T> {
    pub palace: T,
    pub torchlight: T,
}

impl<T> PerCategory<T> {
    pub fn from_fn(mut f: impl FnMut(Category) -> T) -> Self {
        Self {
            palace: f(Category::Palace),
            torchlight: f(Category::Torchlight),
        }
    }

    pub fn get(&self, category: Category) -> &T {
        match category {
            Category::Palace => &self.palace,
            Category::Torchlight => &self.torchlight,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut T {
        match category {
            Category::Palace => &mut self.palace,
            Category::Torchlight => &mut self.torchlight,
        }
    }

    /// `(category, value)` pairs in [`Category::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

// ---------------------------------------------------------------------------
// Gate identifiers
// ---------------------------------------------------------------------------

/// Gate number inside one category, 1-based.
///
/// Numbering restarts at 1 for every category. A bare `GateNo` means
/// nothing without its category; use [`GateId`] wherever both are known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateNo(pub u16);

impl GateNo {
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for GateNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A gate scoped to its category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GateId {
    pub category: Category,
    pub gate: GateNo,
}

impl GateId {
    pub fn new(category: Category, gate: u16) -> Self {
        Self {
            category,
            gate: GateNo(gate),
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} gate {}", self.category, self.gate)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Number of gate slots per category.
///
/// Every per-gate array in the system (capacity, distributed, balance) has
/// exactly `slots(category)` elements, and slot `i` holds gate `i + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateLayout {
    pub palace_gates: u16,
    pub torchlight_gates: u16,
}

impl Default for GateLayout {
    fn default() -> Self {
        Self::new(DEFAULT_GATES_PER_CATEGORY, DEFAULT_GATES_PER_CATEGORY)
    }
}

impl GateLayout {
    pub fn new(palace_gates: u16, torchlight_gates: u16) -> Self {
        Self {
            palace_gates,
            torchlight_gates,
        }
    }

    pub fn slots(&self, category: Category) -> usize {
        match category {
            Category::Palace => self.palace_gates as usize,
            Category::Torchlight => self.torchlight_gates as usize,
        }
    }

    /// Zero-based slot index of `gate`, or `None` when the gate is outside
    /// the category's range.
    pub fn slot_of(&self, gate: GateId) -> Option<usize> {
        let n = gate.gate.0 as usize;
        if n >= 1 && n <= self.slots(gate.category) {
            Some(n - 1)
        } else {
            None
        }
    }

    pub fn contains(&self, gate: GateId) -> bool {
        self.slot_of(gate).is_some()
    }

    /// All gates of `category` in slot order.
    pub fn gates(&self, category: Category) -> impl Iterator<Item = GateId> {
        let n = self.slots(category) as u16;
        (1..=n).map(move |g| GateId::new(category, g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::parse("Palace"), Some(Category::Palace));
        assert_eq!(Category::parse(" TORCHLIGHT "), Some(Category::Torchlight));
        assert_eq!(Category::parse("parade"), None);
    }

    #[test]
    fn slot_of_rejects_zero_and_overflow() {
        let layout = GateLayout::new(16, 15);
        assert_eq!(layout.slot_of(GateId::new(Category::Palace, 1)), Some(0));
        assert_eq!(layout.slot_of(GateId::new(Category::Palace, 16)), Some(15));
        assert_eq!(layout.slot_of(GateId::new(Category::Palace, 0)), None);
        assert_eq!(layout.slot_of(GateId::new(Category::Torchlight, 16)), None);
    }

    #[test]
    fn gates_iterate_in_slot_order() {
        let layout = GateLayout::new(3, 2);
        let palace: Vec<u16> = layout.gates(Category::Palace).map(|g| g.gate.0).collect();
        assert_eq!(palace, vec![1, 2, 3]);
        assert_eq!(layout.gates(Category::Torchlight).count(), 2);
    }

    #[test]
    fn gate_id_serializes_with_lowercase_category() {
        let g = GateId::new(Category::Torchlight, 4);
        let v = serde_json::to_value(g).unwrap();
        assert_eq!(v["category"], "torchlight");
        assert_eq!(v["gate"], 4);
    }
}
