use dpass_schemas::{
    CapacityTable, EntryId, GateId, GateLayout, PassEntry, PassRecord, PerCategory, TotalsRecord,
};

use crate::{
    CapacityError, CategoryLedger, Decision, DerivedAllocationView, Distribution, MobileField,
    Rejection, ValidationError,
};

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Sum `pass_count` per (category, gate) over `entries`.
///
/// Entries with a missing category or gate, a gate outside `layout`, or a
/// non-positive count contribute nothing. They should never have been
/// committed, but a bad record must not break aggregation.
pub fn compute_distribution(entries: &[PassEntry], layout: &GateLayout) -> Distribution {
    distribution_excluding(entries, layout, None)
}

fn distribution_excluding(
    entries: &[PassEntry],
    layout: &GateLayout,
    exclude: Option<&EntryId>,
) -> Distribution {
    let mut dist = Distribution::zeroed(layout);
    for entry in entries {
        if exclude == Some(&entry.id) {
            continue;
        }
        let Some(gate) = entry.gate_id() else {
            continue;
        };
        if entry.pass_count() <= 0 {
            continue;
        }
        dist.add(gate, entry.pass_count());
    }
    dist
}

/// Recompute the full derived view from one (entries, capacity) snapshot.
///
/// The layout is taken from `capacity` so every row lines up.
pub fn build_view(entries: &[PassEntry], capacity: &CapacityTable) -> DerivedAllocationView {
    let layout = *capacity.layout();
    let dist = compute_distribution(entries, &layout);

    let ledgers = PerCategory::from_fn(|c| {
        let cap = capacity.row(c).to_vec();
        let distributed = dist.row(c).to_vec();
        let balance = cap
            .iter()
            .zip(distributed.iter())
            .map(|(t, d)| t.saturating_sub(*d))
            .collect();
        CategoryLedger {
            capacity: cap,
            distributed,
            balance,
        }
    });

    DerivedAllocationView { layout, ledgers }
}

// ---------------------------------------------------------------------------
// Shape checks
// ---------------------------------------------------------------------------

const MOBILE_DIGITS: usize = 10;

fn check_mobile(field: MobileField, value: &Option<String>) -> Result<(), ValidationError> {
    let Some(raw) = value else {
        return Ok(());
    };
    let t = raw.trim();
    if t.is_empty() {
        return Ok(());
    }
    if t.len() == MOBILE_DIGITS && t.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidMobile {
            field,
            value: raw.clone(),
        })
    }
}

/// Shape-check a candidate record and return its gate.
///
/// Checks run in a fixed order so the first failure reported is stable:
/// name, category, gate, gate range, count, mobiles.
pub fn validate_record(record: &PassRecord, layout: &GateLayout) -> Result<GateId, ValidationError> {
    if record.recipient_name.trim().is_empty() {
        return Err(ValidationError::EmptyRecipientName);
    }
    let Some(category) = record.category else {
        return Err(ValidationError::MissingCategory);
    };
    let Some(gate_no) = record.gate else {
        return Err(ValidationError::MissingGate);
    };
    let gate = GateId {
        category,
        gate: gate_no,
    };
    if !layout.contains(gate) {
        return Err(ValidationError::GateOutOfRange {
            gate,
            slots: layout.slots(category),
        });
    }
    if record.pass_count <= 0 {
        return Err(ValidationError::NonPositivePassCount {
            pass_count: record.pass_count,
        });
    }
    check_mobile(MobileField::Recipient, &record.recipient_mobile)?;
    check_mobile(MobileField::Messenger, &record.messenger_mobile)?;
    Ok(gate)
}

// ---------------------------------------------------------------------------
// Mutation gates
// ---------------------------------------------------------------------------

/// Gate a new or edited entry against the capacity invariant.
///
/// When `replacing` names an existing entry, that entry's current
/// contribution is left out of the distribution before the headroom check,
/// so an edit is only measured against everyone else's claims.
pub fn validate_mutation(
    candidate: &PassRecord,
    entries: &[PassEntry],
    capacity: &CapacityTable,
    replacing: Option<&EntryId>,
) -> Decision {
    let layout = *capacity.layout();
    let gate = match validate_record(candidate, &layout) {
        Ok(g) => g,
        Err(e) => return Decision::Rejected(e.into()),
    };

    let dist = distribution_excluding(entries, &layout, replacing);
    let distributed = dist.get(gate);
    let total = capacity.get(gate);

    let fits = candidate
        .pass_count
        .checked_add(distributed)
        .map(|claimed| claimed <= total)
        .unwrap_or(false);

    if fits {
        Decision::Accepted
    } else {
        Decision::Rejected(Rejection::Capacity(CapacityError::InsufficientHeadroom {
            gate,
            requested: candidate.pass_count,
            available: total.saturating_sub(distributed).max(0),
        }))
    }
}

/// Gate a capacity change for one gate.
pub fn validate_capacity_edit(gate: GateId, new_value: i64, distribution: &Distribution) -> Decision {
    let layout = distribution.layout();
    if !layout.contains(gate) {
        return Decision::Rejected(Rejection::Validation(ValidationError::GateOutOfRange {
            gate,
            slots: layout.slots(gate.category),
        }));
    }
    if new_value < 0 {
        return Decision::Rejected(Rejection::Capacity(CapacityError::NegativeCapacity {
            gate,
            requested: new_value,
        }));
    }
    let distributed = distribution.get(gate);
    if new_value < distributed {
        return Decision::Rejected(Rejection::Capacity(
            CapacityError::CannotShrinkBelowDistributed {
                gate,
                requested: new_value,
                distributed,
            },
        ));
    }
    Decision::Accepted
}

/// Validate a capacity change and build the full replacement document.
///
/// The registry is last-writer-wins with no field merge, so the result
/// always carries both categories' arrays.
pub fn plan_capacity_edit(
    capacity: &CapacityTable,
    distribution: &Distribution,
    gate: GateId,
    new_value: i64,
) -> Result<TotalsRecord, Rejection> {
    validate_capacity_edit(gate, new_value, distribution).into_result()?;

    // The gate must exist in the layout being written, not only in the
    // one it was validated against.
    let layout = capacity.layout();
    let slot = layout.slot_of(gate).ok_or_else(|| {
        Rejection::Validation(ValidationError::GateOutOfRange {
            gate,
            slots: layout.slots(gate.category),
        })
    })?;
    let mut record = capacity.to_record();
    record.totals_mut(gate.category)[slot] = new_value;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpass_schemas::{Category, GateNo};

    fn layout() -> GateLayout {
        GateLayout::new(4, 4)
    }

    fn entry(id: &str, category: Category, gate: u16, count: i64) -> PassEntry {
        PassEntry::new(id, PassRecord::new("R", category, gate, count))
    }

    fn capacity(palace: Vec<i64>, torchlight: Vec<i64>) -> CapacityTable {
        TotalsRecord {
            palace_totals: palace,
            torchlight_totals: torchlight,
        }
        .normalized(&layout())
    }

    #[test]
    fn distribution_groups_by_category_and_gate() {
        let entries = vec![
            entry("a", Category::Palace, 1, 3),
            entry("b", Category::Palace, 1, 2),
            entry("c", Category::Torchlight, 1, 7),
            entry("d", Category::Palace, 4, 1),
        ];
        let d = compute_distribution(&entries, &layout());
        assert_eq!(d.row(Category::Palace), &[5, 0, 0, 1]);
        assert_eq!(d.row(Category::Torchlight), &[7, 0, 0, 0]);
    }

    #[test]
    fn distribution_skips_malformed_entries() {
        let mut missing_cat = entry("x", Category::Palace, 1, 5);
        missing_cat.record.category = None;
        let mut missing_gate = entry("y", Category::Palace, 1, 5);
        missing_gate.record.gate = None;
        let out_of_range = entry("z", Category::Palace, 9, 5);
        let zero_gate = entry("w", Category::Palace, 0, 5);
        let negative = entry("n", Category::Palace, 2, -4);

        let entries = vec![
            missing_cat,
            missing_gate,
            out_of_range,
            zero_gate,
            negative,
            entry("ok", Category::Palace, 2, 1),
        ];
        let d = compute_distribution(&entries, &layout());
        assert_eq!(d.row(Category::Palace), &[0, 1, 0, 0]);
        assert_eq!(d.total(Category::Torchlight), 0);
    }

    #[test]
    fn view_balance_is_capacity_minus_distributed() {
        let entries = vec![entry("a", Category::Palace, 2, 4)];
        let v = build_view(&entries, &capacity(vec![1, 10, 0, 0], vec![3, 0, 0, 0]));
        let g = GateId::new(Category::Palace, 2);
        assert_eq!(v.capacity(g), 10);
        assert_eq!(v.distributed(g), 4);
        assert_eq!(v.balance(g), 6);
        assert_eq!(v.ledger(Category::Torchlight).balance, vec![3, 0, 0, 0]);
        assert!(v.is_within_capacity());
    }

    #[test]
    fn overdrawn_gates_are_reported() {
        let entries = vec![
            entry("a", Category::Torchlight, 3, 4),
            entry("b", Category::Torchlight, 3, 4),
        ];
        let v = build_view(&entries, &capacity(vec![], vec![0, 0, 5, 0]));
        assert!(!v.is_within_capacity());
        assert_eq!(v.overdrawn_gates(), vec![GateId::new(Category::Torchlight, 3)]);
        assert_eq!(v.balance(GateId::new(Category::Torchlight, 3)), -3);
    }

    #[test]
    fn validate_record_checks_in_order() {
        let l = layout();
        let mut r = PassRecord::new("  ", Category::Palace, 1, 0);
        assert_eq!(validate_record(&r, &l), Err(ValidationError::EmptyRecipientName));

        r.recipient_name = "N".to_string();
        r.category = None;
        assert_eq!(validate_record(&r, &l), Err(ValidationError::MissingCategory));

        r.category = Some(Category::Palace);
        r.gate = None;
        assert_eq!(validate_record(&r, &l), Err(ValidationError::MissingGate));

        r.gate = Some(GateNo(5));
        assert!(matches!(
            validate_record(&r, &l),
            Err(ValidationError::GateOutOfRange { slots: 4, .. })
        ));

        r.gate = Some(GateNo(1));
        assert_eq!(
            validate_record(&r, &l),
            Err(ValidationError::NonPositivePassCount { pass_count: 0 })
        );

        r.pass_count = 1;
        assert_eq!(validate_record(&r, &l), Ok(GateId::new(Category::Palace, 1)));
    }

    #[test]
    fn mobile_rule_requires_exactly_ten_digits_when_present() {
        let l = layout();
        let ok = PassRecord::new("N", Category::Palace, 1, 1)
            .with_recipient_mobile("9876543210")
            .with_messenger("M", "Clerk", " ");
        assert!(validate_record(&ok, &l).is_ok());

        let short = PassRecord::new("N", Category::Palace, 1, 1).with_recipient_mobile("98765");
        assert!(matches!(
            validate_record(&short, &l),
            Err(ValidationError::InvalidMobile {
                field: MobileField::Recipient,
                ..
            })
        ));

        let letters =
            PassRecord::new("N", Category::Palace, 1, 1).with_messenger("M", "Clerk", "98765432ab");
        assert!(matches!(
            validate_record(&letters, &l),
            Err(ValidationError::InvalidMobile {
                field: MobileField::Messenger,
                ..
            })
        ));
    }

    #[test]
    fn mutation_rejects_when_headroom_exhausted() {
        let entries = vec![entry("a", Category::Palace, 1, 7)];
        let cap = capacity(vec![10, 0, 0, 0], vec![]);
        let cand = PassRecord::new("N", Category::Palace, 1, 4);
        let d = validate_mutation(&cand, &entries, &cap, None);
        assert_eq!(
            d,
            Decision::Rejected(Rejection::Capacity(CapacityError::InsufficientHeadroom {
                gate: GateId::new(Category::Palace, 1),
                requested: 4,
                available: 3,
            }))
        );
    }

    #[test]
    fn edit_excludes_its_own_prior_contribution() {
        let entries = vec![
            entry("a", Category::Palace, 1, 7),
            entry("b", Category::Palace, 1, 3),
        ];
        let cap = capacity(vec![10, 0, 0, 0], vec![]);
        // Re-saving "a" unchanged would fail without the exclusion (7 + 10 > 10).
        let cand = PassRecord::new("N", Category::Palace, 1, 7);
        let id = EntryId::new("a");
        assert!(validate_mutation(&cand, &entries, &cap, Some(&id)).is_accepted());

        let grow = PassRecord::new("N", Category::Palace, 1, 8);
        assert!(validate_mutation(&grow, &entries, &cap, Some(&id)).is_rejected());
    }

    #[test]
    fn headroom_overflow_is_rejected_not_wrapped() {
        let entries = vec![entry("a", Category::Palace, 1, i64::MAX)];
        let cap = capacity(vec![i64::MAX, 0, 0, 0], vec![]);
        let cand = PassRecord::new("N", Category::Palace, 1, 1);
        assert!(validate_mutation(&cand, &entries, &cap, None).is_rejected());
    }

    #[test]
    fn capacity_edit_rules() {
        let entries = vec![entry("a", Category::Torchlight, 2, 6)];
        let dist = compute_distribution(&entries, &layout());
        let g = GateId::new(Category::Torchlight, 2);

        assert!(validate_capacity_edit(g, 6, &dist).is_accepted());
        assert!(validate_capacity_edit(g, 100, &dist).is_accepted());
        assert_eq!(
            validate_capacity_edit(g, -1, &dist),
            Decision::Rejected(Rejection::Capacity(CapacityError::NegativeCapacity {
                gate: g,
                requested: -1
            }))
        );
        assert_eq!(
            validate_capacity_edit(g, 5, &dist),
            Decision::Rejected(Rejection::Capacity(
                CapacityError::CannotShrinkBelowDistributed {
                    gate: g,
                    requested: 5,
                    distributed: 6
                }
            ))
        );
        assert!(validate_capacity_edit(GateId::new(Category::Torchlight, 9), 1, &dist).is_rejected());
    }

    #[test]
    fn plan_capacity_edit_writes_full_pair() {
        let cap = capacity(vec![1, 2, 3, 4], vec![5, 6, 7, 8]);
        let dist = Distribution::zeroed(&layout());
        let rec = plan_capacity_edit(&cap, &dist, GateId::new(Category::Palace, 3), 30).unwrap();
        assert_eq!(rec.palace_totals, vec![1, 2, 30, 4]);
        assert_eq!(rec.torchlight_totals, vec![5, 6, 7, 8]);
    }

    #[test]
    fn plan_capacity_edit_rejects_gate_missing_from_written_layout() {
        // Distribution knows 4 Palace gates, the capacity table only 2.
        let cap = CapacityTable::zeroed(&GateLayout::new(2, 4));
        let dist = Distribution::zeroed(&layout());
        let err = plan_capacity_edit(&cap, &dist, GateId::new(Category::Palace, 3), 5).unwrap_err();
        assert_eq!(
            err,
            Rejection::Validation(ValidationError::GateOutOfRange {
                gate: GateId::new(Category::Palace, 3),
                slots: 2,
            })
        );
    }

    #[test]
    fn row_totals_saturate_on_huge_counts() {
        let entries = vec![
            entry("a", Category::Palace, 1, i64::MAX),
            entry("b", Category::Palace, 2, i64::MAX),
        ];
        let d = compute_distribution(&entries, &layout());
        assert_eq!(d.total(Category::Palace), i64::MAX);

        let v = build_view(&entries, &capacity(vec![1, 1], vec![]));
        assert_eq!(v.distributed_total(Category::Palace), i64::MAX);
        assert_eq!(v.balance_total(Category::Palace), i64::MIN);
    }
}
