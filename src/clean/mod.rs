// src/clean/mod.rs

use crate::fetch::RawRecord;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Known point defects at the source, keyed by port code. The only entry so
/// far is Chief Mountain Mt Poe (port 3315), whose `state` the service has
/// never populated. "MT" rather than "Montana" keeps the dataset's
/// two-letter state convention.
static STATE_CORRECTIONS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("3315", "MT")]));

/// A crossing row with the geographic fields pruned away.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanedRecord {
    pub date: Option<String>,
    pub port_code: Option<String>,
    pub port_name: Option<String>,
    pub state: Option<String>,
    pub border: Option<String>,
    pub measure: Option<String>,
    pub value: Option<String>,
}

impl From<RawRecord> for CleanedRecord {
    fn from(raw: RawRecord) -> Self {
        // latitude, longitude and point do not survive; whether the raw row
        // carried them or not is irrelevant
        Self {
            date: raw.date,
            port_code: raw.port_code,
            port_name: raw.port_name,
            state: raw.state,
            border: raw.border,
            measure: raw.measure,
            value: raw.value,
        }
    }
}

fn is_missing(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

impl CleanedRecord {
    pub fn has_missing_field(&self) -> bool {
        is_missing(&self.date)
            || is_missing(&self.port_code)
            || is_missing(&self.port_name)
            || is_missing(&self.state)
            || is_missing(&self.border)
            || is_missing(&self.measure)
            || is_missing(&self.value)
    }
}

/// Prune, split out the null diagnostic subset, then apply the correction
/// table. The subset reflects rows as received (before correction) and its
/// members stay in the primary output.
pub fn clean(records: Vec<RawRecord>) -> (Vec<CleanedRecord>, Vec<CleanedRecord>) {
    let mut cleaned: Vec<CleanedRecord> = records.into_iter().map(CleanedRecord::from).collect();

    let nulls: Vec<CleanedRecord> = cleaned
        .iter()
        .filter(|r| r.has_missing_field())
        .cloned()
        .collect();

    let mut corrected = 0usize;
    for rec in &mut cleaned {
        if let Some(state) = rec.port_code.as_deref().and_then(|c| STATE_CORRECTIONS.get(c)) {
            // unconditional: stale populated values are overwritten too
            rec.state = Some((*state).to_string());
            corrected += 1;
        }
    }

    debug!(
        total = cleaned.len(),
        nulls = nulls.len(),
        corrected,
        "cleaned batch"
    );
    (cleaned, nulls)
}
