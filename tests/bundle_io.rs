//! Bundle and CSV export through the filesystem.

use std::fs::{self, File};
use std::io::{Cursor, Write};

use sirq_sim::config::{MAX_SEED, ScenarioConfig};
use sirq_sim::io::bundle::{CONFIG_ENTRY, DEPARTURES_ENTRY, TIMELINE_ENTRY};
use sirq_sim::io::{Bundle, BundleSlot, export_departures_csv, export_timeline_csv};
use sirq_sim::sim::kpi::RunKpis;
use sirq_sim::{ImportError, Station};
use zip::ZipWriter;
use zip::write::FileOptions;

fn finished_bundle(seed: u64) -> Bundle {
    let mut scenario = ScenarioConfig::rush_hour();
    scenario.run.seed = seed;
    let mut station = Station::from_scenario(&scenario).unwrap();
    station.run().unwrap();
    let (departures, timeline) = station.into_tables();
    Bundle {
        scenario,
        departures,
        timeline,
    }
}

#[test]
fn saved_bundle_reopens_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.zip");
    let bundle = finished_bundle(11);
    bundle.save(&path).unwrap();

    let reopened = Bundle::open(&path).unwrap();
    assert_eq!(reopened, bundle);
    assert_eq!(reopened.kpis(), RunKpis::from_tables(&bundle.departures, &bundle.timeline));
}

#[test]
fn largest_seed_round_trips() {
    let mut scenario = ScenarioConfig::baseline();
    scenario.run.seed = MAX_SEED;
    scenario.run.ticks = 10;
    assert!(scenario.validate().is_empty());

    let mut station = Station::from_scenario(&scenario).unwrap();
    station.run().unwrap();
    let (departures, timeline) = station.into_tables();
    let bundle = Bundle {
        scenario,
        departures,
        timeline,
    };

    let mut cursor = bundle.write_to(Cursor::new(Vec::new())).unwrap();
    cursor.set_position(0);
    let reopened = Bundle::read_from(cursor).unwrap();
    assert_eq!(reopened.scenario.run.seed, MAX_SEED);
    assert_eq!(reopened, bundle);
}

#[test]
fn seed_past_toml_range_is_rejected_up_front() {
    let mut scenario = ScenarioConfig::baseline();
    scenario.run.seed = MAX_SEED + 1;
    let errors = scenario.validate();
    assert!(errors.iter().any(|e| e.field == "run.seed"));
}

#[test]
fn bundle_kpis_match_live_run() {
    let scenario = ScenarioConfig::vip_heavy();
    let mut station = Station::from_scenario(&scenario).unwrap();
    station.run().unwrap();
    let live = RunKpis::from_station(&station);

    let (departures, timeline) = station.into_tables();
    let bundle = Bundle {
        scenario,
        departures,
        timeline,
    };
    let kpis = bundle.kpis();
    assert_eq!(kpis.revenue, live.revenue);
    assert_eq!(kpis.critical_failures, live.critical_failures);
    assert_eq!(kpis.energy_sold_kwh, None);
}

#[test]
fn slot_survives_truncated_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let good_path = dir.path().join("good.zip");
    finished_bundle(3).save(&good_path).unwrap();

    let bad_path = dir.path().join("bad.zip");
    let mut zip = ZipWriter::new(File::create(&bad_path).unwrap());
    zip.start_file(CONFIG_ENTRY, FileOptions::default()).unwrap();
    zip.start_file(TIMELINE_ENTRY, FileOptions::default()).unwrap();
    zip.write_all(b"tick,active_chargers,queue_length,cumulative_revenue,clearing_price,balked_count\n")
        .unwrap();
    zip.start_file(DEPARTURES_ENTRY, FileOptions::default()).unwrap();
    zip.write_all(b"id,profile,value_of_time,bid,outcome,wait_time,strategy\n").unwrap();
    zip.finish().unwrap();

    let mut slot = BundleSlot::default();
    slot.import(File::open(&good_path).unwrap()).unwrap();
    let held = slot.current().cloned();

    match slot.import(File::open(&bad_path).unwrap()) {
        Err(ImportError::MissingColumn { table, column }) => {
            assert_eq!(table, TIMELINE_ENTRY);
            assert_eq!(column, "strategy");
        }
        other => panic!("expected MissingColumn, got {other:?}"),
    }
    assert_eq!(slot.current().cloned(), held);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = Bundle::open(&dir.path().join("absent.zip")).unwrap_err();
    assert!(matches!(err, ImportError::Archive(_)));
}

#[test]
fn csv_exports_have_one_row_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = finished_bundle(5);
    let agents = dir.path().join("agents.csv");
    let timeline = dir.path().join("timeline.csv");
    export_departures_csv(&bundle.departures, &agents).unwrap();
    export_timeline_csv(&bundle.timeline, &timeline).unwrap();

    let agents_text = fs::read_to_string(&agents).unwrap();
    assert_eq!(agents_text.lines().count(), bundle.departures.len() + 1);
    assert!(agents_text.starts_with("id,profile,value_of_time,bid,outcome,wait_time,strategy"));

    let timeline_text = fs::read_to_string(&timeline).unwrap();
    assert_eq!(timeline_text.lines().count(), 1441);
    assert!(timeline_text.lines().nth(1).unwrap().ends_with(",SIRQ"));
}
