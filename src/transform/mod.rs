// src/transform/mod.rs

use crate::aggregate::{self, MonthlyAggregate};
use crate::clean::CleanedRecord;
use crate::error::{PipelineError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

/// Measure substrings (lowercase) that count as pedestrian or passenger
/// traffic. Substring matching keeps variants like "Bus Passengers" and
/// "Personal Vehicle Passengers" in; freight, rail and vehicle counts have
/// no match and stay out.
pub static PASSENGER_MEASURES: &[&str] = &["pedestrian", "passenger"];

/// A cleaned row with its date decomposed and its count typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformedRecord {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub port_code: String,
    pub port_name: Option<String>,
    pub state: Option<String>,
    pub border: Option<String>,
    pub measure: String,
    pub value: i64,
}

pub fn measure_matches(measure: &str) -> bool {
    let lower = measure.to_lowercase();
    PASSENGER_MEASURES.iter().any(|m| lower.contains(m))
}

/// Socrata reports floating timestamps like `2019-03-05T00:00:00.000`;
/// a bare date is tolerated too.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

fn require<'a>(row: usize, field: &'static str, value: &'a Option<String>) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(PipelineError::SchemaMismatch { row, field }),
    }
}

fn decompose(row: usize, rec: &CleanedRecord) -> Result<TransformedRecord> {
    let date_str = require(row, "date", &rec.date)?;
    let port_code = require(row, "port_code", &rec.port_code)?;
    let measure = require(row, "measure", &rec.measure)?;
    let value_str = require(row, "value", &rec.value)?;

    let date = parse_date(date_str).ok_or_else(|| PipelineError::DataType {
        row,
        field: "date",
        value: date_str.to_string(),
        expected: "a calendar date",
    })?;
    let value: i64 = value_str.parse().map_err(|_| PipelineError::DataType {
        row,
        field: "value",
        value: value_str.to_string(),
        expected: "an integer count",
    })?;
    if value < 0 {
        return Err(PipelineError::DataType {
            row,
            field: "value",
            value: value_str.to_string(),
            expected: "a non-negative count",
        });
    }

    let month = date.month();
    Ok(TransformedRecord {
        date,
        year: date.year(),
        month,
        month_name: aggregate::month_abbrev(month),
        port_code: port_code.to_string(),
        port_name: rec.port_name.clone(),
        state: rec.state.clone(),
        border: rec.border.clone(),
        measure: measure.to_string(),
        value,
    })
}

/// Decompose and coerce every row, keep the passenger subset, and hand it
/// to the aggregator. Coercion is validated for the whole batch before any
/// aggregation happens; one bad row fails the batch rather than leaking a
/// silently wrong total.
pub fn transform(
    records: &[CleanedRecord],
) -> Result<(Vec<TransformedRecord>, Vec<MonthlyAggregate>)> {
    let mut typed = Vec::with_capacity(records.len());
    for (row, rec) in records.iter().enumerate() {
        typed.push(decompose(row, rec)?);
    }

    let retained: Vec<TransformedRecord> = typed
        .into_iter()
        .filter(|r| measure_matches(&r.measure))
        .collect();
    let monthly = aggregate::aggregate(&retained);

    debug!(
        input = records.len(),
        retained = retained.len(),
        months = monthly.len(),
        "transformed batch"
    );
    Ok((retained, monthly))
}
