//! Experiment bundles: scenario config plus both output tables in one zip.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::ScenarioConfig;
use crate::error::{ImportError, SimError};
use crate::sim::kpi::RunKpis;
use crate::sim::types::{DepartureRecord, TickSnapshot};

use super::export::{DEPARTURE_COLUMNS, TIMELINE_COLUMNS, write_departures_csv, write_timeline_csv};

pub const CONFIG_ENTRY: &str = "config.toml";
pub const DEPARTURES_ENTRY: &str = "agents.csv";
pub const TIMELINE_ENTRY: &str = "timeline.csv";

/// A completed run: the scenario that produced it and its two tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub scenario: ScenarioConfig,
    pub departures: Vec<DepartureRecord>,
    pub timeline: Vec<TickSnapshot>,
}

impl Bundle {
    pub fn kpis(&self) -> RunKpis {
        RunKpis::from_tables(&self.departures, &self.timeline)
    }

    /// Writes the bundle as a zip archive and returns the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or writing fails.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, SimError> {
        let mut departures = Vec::new();
        write_departures_csv(&self.departures, &mut departures)?;
        let mut timeline = Vec::new();
        write_timeline_csv(&self.timeline, &mut timeline)?;
        let config = self.scenario.to_toml_string()?;

        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in [
            (CONFIG_ENTRY, config.as_bytes()),
            (DEPARTURES_ENTRY, departures.as_slice()),
            (TIMELINE_ENTRY, timeline.as_slice()),
        ] {
            zip.start_file(name, options).map_err(io::Error::other)?;
            zip.write_all(bytes)?;
        }
        Ok(zip.finish().map_err(io::Error::other)?)
    }

    /// Writes the bundle to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if file creation or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), SimError> {
        let file = File::create(path)?;
        self.write_to(file)?;
        Ok(())
    }

    /// Reads and validates a bundle. Nothing is returned unless every table,
    /// column, row, and the config are valid.
    ///
    /// # Errors
    ///
    /// Returns an `ImportError` naming the missing or malformed table or column.
    pub fn read_from<R: Read + Seek>(reader: R) -> Result<Self, ImportError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| ImportError::Archive(e.to_string()))?;

        let config = read_entry(&mut archive, CONFIG_ENTRY)?;
        let departures_csv = read_entry(&mut archive, DEPARTURES_ENTRY)?;
        let timeline_csv = read_entry(&mut archive, TIMELINE_ENTRY)?;

        let departures = parse_table(&departures_csv, DEPARTURES_ENTRY, &DEPARTURE_COLUMNS)?;
        let timeline = parse_table(&timeline_csv, TIMELINE_ENTRY, &TIMELINE_COLUMNS)?;

        let scenario = ScenarioConfig::from_toml_str(&config)?;
        if let Some(err) = scenario.validate().into_iter().next() {
            return Err(err.into());
        }

        Ok(Self {
            scenario,
            departures,
            timeline,
        })
    }

    /// Opens a bundle file.
    ///
    /// # Errors
    ///
    /// Returns an `ImportError` if the file is unreadable or invalid.
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        let file = File::open(path)
            .map_err(|e| ImportError::Archive(format!("cannot open \"{}\": {e}", path.display())))?;
        Self::read_from(BufReader::new(file))
    }
}

/// Holds the currently loaded bundle. A failed import leaves it untouched.
#[derive(Debug, Default)]
pub struct BundleSlot {
    current: Option<Bundle>,
}

impl BundleSlot {
    pub fn current(&self) -> Option<&Bundle> {
        self.current.as_ref()
    }

    /// Replaces the held bundle only if `reader` yields a valid one.
    ///
    /// # Errors
    ///
    /// Returns the `ImportError` and keeps the previous bundle.
    pub fn import<R: Read + Seek>(&mut self, reader: R) -> Result<&Bundle, ImportError> {
        let bundle = Bundle::read_from(reader)?;
        Ok(self.current.insert(bundle))
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, ImportError> {
    let mut entry = archive.by_name(name).map_err(|e| match e {
        ZipError::FileNotFound => ImportError::MissingTable(name.to_string()),
        other => ImportError::Archive(other.to_string()),
    })?;
    let mut text = String::new();
    entry.read_to_string(&mut text).map_err(|e| ImportError::Malformed {
        table: name.to_string(),
        message: e.to_string(),
    })?;
    Ok(text)
}

fn parse_table<T: DeserializeOwned>(
    text: &str,
    table: &str,
    columns: &[&str],
) -> Result<Vec<T>, ImportError> {
    let malformed = |e: csv::Error| ImportError::Malformed {
        table: table.to_string(),
        message: e.to_string(),
    };

    let mut rdr = csv::ReaderBuilder::new().from_reader(text.as_bytes());
    let headers = rdr.headers().map_err(malformed)?.clone();
    if let Some(missing) = columns.iter().find(|c| !headers.iter().any(|h| h == **c)) {
        return Err(ImportError::MissingColumn {
            table: table.to_string(),
            column: (*missing).to_string(),
        });
    }
    rdr.deserialize().collect::<Result<Vec<T>, _>>().map_err(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn zip_with(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    const AGENTS: &str = "id,profile,value_of_time,bid,outcome,wait_time,strategy\n\
                          1,ECONOMY,20.0,12.5,Completed,3,FIFO\n";
    const TIMELINE: &str = "tick,active_chargers,queue_length,cumulative_revenue,clearing_price,balked_count,strategy\n\
                            0,1,0,1.25,0.5,0,FIFO\n";

    #[test]
    fn reads_minimal_bundle() {
        let cursor = zip_with(&[
            (CONFIG_ENTRY, ""),
            (DEPARTURES_ENTRY, AGENTS),
            (TIMELINE_ENTRY, TIMELINE),
        ]);
        let bundle = Bundle::read_from(cursor).unwrap();
        assert_eq!(bundle.departures.len(), 1);
        assert_eq!(bundle.timeline[0].cumulative_revenue, 1.25);
        assert_eq!(bundle.scenario, ScenarioConfig::baseline());
    }

    #[test]
    fn missing_timeline_is_rejected() {
        let cursor = zip_with(&[(CONFIG_ENTRY, ""), (DEPARTURES_ENTRY, AGENTS)]);
        let err = Bundle::read_from(cursor).unwrap_err();
        assert!(matches!(err, ImportError::MissingTable(ref t) if t == TIMELINE_ENTRY));
    }

    #[test]
    fn missing_column_is_named() {
        let agents = "id,profile,value_of_time,bid,outcome,strategy\n1,ECONOMY,20.0,12.5,Completed,FIFO\n";
        let cursor = zip_with(&[
            (CONFIG_ENTRY, ""),
            (DEPARTURES_ENTRY, agents),
            (TIMELINE_ENTRY, TIMELINE),
        ]);
        match Bundle::read_from(cursor) {
            Err(ImportError::MissingColumn { table, column }) => {
                assert_eq!(table, DEPARTURES_ENTRY);
                assert_eq!(column, "wait_time");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn bad_row_is_malformed() {
        let agents = "id,profile,value_of_time,bid,outcome,wait_time,strategy\n1,PLATINUM,20.0,12.5,Completed,3,FIFO\n";
        let cursor = zip_with(&[
            (CONFIG_ENTRY, ""),
            (DEPARTURES_ENTRY, agents),
            (TIMELINE_ENTRY, TIMELINE),
        ]);
        assert!(matches!(
            Bundle::read_from(cursor),
            Err(ImportError::Malformed { .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cursor = zip_with(&[
            (CONFIG_ENTRY, "[run]\ncapacity = 0\n"),
            (DEPARTURES_ENTRY, AGENTS),
            (TIMELINE_ENTRY, TIMELINE),
        ]);
        assert!(matches!(Bundle::read_from(cursor), Err(ImportError::Config(_))));
    }

    #[test]
    fn not_a_zip_is_archive_error() {
        let err = Bundle::read_from(Cursor::new(b"plain text".to_vec())).unwrap_err();
        assert!(matches!(err, ImportError::Archive(_)));
    }

    #[test]
    fn failed_import_keeps_previous_bundle() {
        let mut slot = BundleSlot::default();
        let good = zip_with(&[
            (CONFIG_ENTRY, ""),
            (DEPARTURES_ENTRY, AGENTS),
            (TIMELINE_ENTRY, TIMELINE),
        ]);
        slot.import(good).unwrap();
        let before = slot.current().cloned();

        let bad = zip_with(&[(CONFIG_ENTRY, ""), (TIMELINE_ENTRY, TIMELINE)]);
        assert!(slot.import(bad).is_err());
        assert_eq!(slot.current().cloned(), before);
    }
}
