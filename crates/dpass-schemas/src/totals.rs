use serde::{Deserialize, Serialize};

use crate::{Category, GateId, GateLayout, PerCategory};

/// The totals registry document: one capacity array per category.
///
/// Stored shape is `{ "palaceTotals": [..], "torchlightTotals": [..] }`.
/// Writers always replace both arrays together; readers normalise through
/// [`TotalsRecord::normalized`] before use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsRecord {
    #[serde(default)]
    pub palace_totals: Vec<i64>,
    #[serde(default)]
    pub torchlight_totals: Vec<i64>,
}

impl TotalsRecord {
    /// All-zero record sized to `layout`. Used for lazy initialisation.
    pub fn zeroed(layout: &GateLayout) -> Self {
        Self {
            palace_totals: vec![0; layout.slots(Category::Palace)],
            torchlight_totals: vec![0; layout.slots(Category::Torchlight)],
        }
    }

    pub fn totals(&self, category: Category) -> &[i64] {
        match category {
            Category::Palace => &self.palace_totals,
            Category::Torchlight => &self.torchlight_totals,
        }
    }

    pub fn totals_mut(&mut self, category: Category) -> &mut Vec<i64> {
        match category {
            Category::Palace => &mut self.palace_totals,
            Category::Torchlight => &mut self.torchlight_totals,
        }
    }

    /// Align both arrays to `layout`.
    ///
    /// Missing tail slots read as 0, extra slots are dropped, negative
    /// values read as 0.
    pub fn normalized(&self, layout: &GateLayout) -> CapacityTable {
        let rows = PerCategory::from_fn(|c| {
            let raw = self.totals(c);
            (0..layout.slots(c))
                .map(|i| raw.get(i).copied().unwrap_or(0).max(0))
                .collect()
        });
        CapacityTable {
            layout: *layout,
            rows,
        }
    }
}

/// Capacity per gate, aligned to a [`GateLayout`].
///
/// Construct via [`TotalsRecord::normalized`] or [`CapacityTable::zeroed`];
/// every row has exactly `layout.slots(category)` non-negative values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapacityTable {
    layout: GateLayout,
    rows: PerCategory<Vec<i64>>,
}

impl CapacityTable {
    pub fn zeroed(layout: &GateLayout) -> Self {
        TotalsRecord::zeroed(layout).normalized(layout)
    }

    pub fn layout(&self) -> &GateLayout {
        &self.layout
    }

    pub fn row(&self, category: Category) -> &[i64] {
        self.rows.get(category)
    }

    /// Capacity of `gate`; 0 for gates outside the layout.
    pub fn get(&self, gate: GateId) -> i64 {
        self.layout
            .slot_of(gate)
            .and_then(|i| self.rows.get(gate.category).get(i).copied())
            .unwrap_or(0)
    }

    pub fn total(&self, category: Category) -> i64 {
        self.rows.get(category).iter().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    /// Full registry document for this table.
    pub fn to_record(&self) -> TotalsRecord {
        TotalsRecord {
            palace_totals: self.rows.palace.clone(),
            torchlight_totals: self.rows.torchlight.clone(),
        }
    }
}
