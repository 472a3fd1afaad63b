use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("invalid date range: start {start} is after end {end}")]
pub struct InvalidRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A billing query window, sent on the wire as `YYYY-MM-DD` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl UsageQuery {
    /// Build a query, rejecting ranges where the start falls after the end.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, InvalidRange> {
        if start_date > end_date {
            return Err(InvalidRange {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    pub fn start_param(&self) -> String {
        self.start_date.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end_date.format("%Y-%m-%d").to_string()
    }
}

/// One model's cost contribution within a single day's usage entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemRecord {
    /// Unix seconds of the day this item belongs to
    pub timestamp: i64,
    /// Same instant as `timestamp`, kept alongside for display
    pub datetime: DateTime<Utc>,
    /// Model identifier (e.g., "gpt-4")
    pub name: String,
    /// Cost in dollars, converted from cents at ingestion
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    /// Sorted by timestamp, newest first
    pub records: Vec<LineItemRecord>,
    /// Endpoint-reported total for the range, in dollars.
    /// Sourced from the top-level aggregate field, never summed from
    /// `records`; the endpoint may bill categories it never itemizes.
    pub total_cost: f64,
}

impl UsageReport {
    /// Distinct model names in first-appearance order (records are newest first).
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for record in &self.records {
            if !names.contains(&record.name.as_str()) {
                names.push(&record.name);
            }
        }
        names
    }

    /// Sum of the itemized record costs. Used only to surface divergence
    /// from `total_cost`, never to replace it.
    pub fn itemized_total(&self) -> f64 {
        self.records.iter().map(|r| r.cost).sum()
    }

    /// Records that actually incurred cost.
    pub fn billed_records(&self) -> impl Iterator<Item = &LineItemRecord> {
        self.records.iter().filter(|r| r.cost > 0.0)
    }
}
