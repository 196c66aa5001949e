// src/aggregate/mod.rs

use crate::transform::TransformedRecord;
use serde::Serialize;
use std::collections::BTreeMap;

static MONTH_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// English abbreviation for a 1-based month number. Panics outside 1..=12;
/// date decomposition only ever yields values in range.
pub fn month_abbrev(month: u32) -> &'static str {
    debug_assert!((1..=12).contains(&month), "month out of range: {month}");
    MONTH_ABBREV[(month - 1) as usize]
}

/// Summed passenger count for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyAggregate {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub value: i64,
}

/// Sum values per `(year, month)`. Keying a `BTreeMap` on the pair gives the
/// ascending chronological order plotting needs. Months with no rows are
/// absent, not zero.
pub fn aggregate(records: &[TransformedRecord]) -> Vec<MonthlyAggregate> {
    let mut totals: BTreeMap<(i32, u32), i64> = BTreeMap::new();
    for rec in records {
        *totals.entry((rec.year, rec.month)).or_insert(0) += rec.value;
    }
    totals
        .into_iter()
        .map(|((year, month), value)| MonthlyAggregate {
            year,
            month,
            month_name: month_abbrev(month),
            value,
        })
        .collect()
}
