//! CSV export of the departure and timeline tables.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::SimError;
use crate::sim::types::{DepartureRecord, TickSnapshot};

/// Column layout of the departure table.
pub const DEPARTURE_COLUMNS: [&str; 7] = [
    "id",
    "profile",
    "value_of_time",
    "bid",
    "outcome",
    "wait_time",
    "strategy",
];

/// Column layout of the timeline table.
pub const TIMELINE_COLUMNS: [&str; 7] = [
    "tick",
    "active_chargers",
    "queue_length",
    "cumulative_revenue",
    "clearing_price",
    "balked_count",
    "strategy",
];

/// Writes departure records as CSV to any writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_departures_csv(rows: &[DepartureRecord], writer: impl Write) -> Result<(), SimError> {
    write_rows(rows, &DEPARTURE_COLUMNS, writer)
}

/// Writes tick snapshots as CSV to any writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_timeline_csv(rows: &[TickSnapshot], writer: impl Write) -> Result<(), SimError> {
    write_rows(rows, &TIMELINE_COLUMNS, writer)
}

/// Exports departure records to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_departures_csv(rows: &[DepartureRecord], path: &Path) -> Result<(), SimError> {
    let file = File::create(path)?;
    write_departures_csv(rows, io::BufWriter::new(file))
}

/// Exports tick snapshots to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_timeline_csv(rows: &[TickSnapshot], path: &Path) -> Result<(), SimError> {
    let file = File::create(path)?;
    write_timeline_csv(rows, io::BufWriter::new(file))
}

/// Header first, so an empty table still carries its columns.
fn write_rows<T: Serialize>(rows: &[T], columns: &[&str], writer: impl Write) -> Result<(), SimError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(columns)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
