pub mod cf_time;
pub mod file_range;
pub mod grid;
#[cfg(feature = "netcdf")]
pub mod nc;
pub mod station;

pub use cf_time::TimeUnits;
pub use file_range::Inventory;
pub use grid::{extract, GridAxes, GridReader, LogicalSeries, MemoryGrid, MemoryReader};
#[cfg(feature = "netcdf")]
pub use nc::NetcdfReader;
pub use station::{read_station_csv, StationColumns};
