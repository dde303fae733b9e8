//! Harmonized daily precipitation and freezing-level height (H0) series at a
//! single site, built from a climate-model ensemble or from a station record
//! paired with reanalysis upper-air fields.
//!
//! Every source is read, cut to the run period, reduced to daily values,
//! aligned onto a 365-day calendar and converted to canonical units before
//! H0 is derived and the series are assembled into one dataset.

pub mod calendar;
pub mod catalog;
pub mod config;
pub mod derived;
pub mod ensemble;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod reading;
pub mod reduce;
pub mod series;
pub mod units;

pub use calendar::CanonicalCalendar;
pub use catalog::{FieldKind, GridPoint, SourceCatalog, SourceDescriptor, SourceKind};
pub use config::RunConfig;
pub use ensemble::{AxisMode, EnsembleAssembler, EnsembleDataset};
pub use error::{Error, Result};
pub use output::{DatasetEmitter, ParquetEmitter};
pub use pipeline::Pipeline;
pub use series::{NativeSeries, ScalarSeries};
