pub mod bundle;
pub mod export;

pub use bundle::{Bundle, BundleSlot};
pub use export::{export_departures_csv, export_timeline_csv};
