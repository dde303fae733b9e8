//! Persisting a finished dataset.

pub mod parquet_file;

pub use parquet_file::ParquetEmitter;

use crate::{ensemble::EnsembleDataset, error::Result};

/// Receives the finalized dataset; the pipeline never depends on the format.
pub trait DatasetEmitter {
    fn emit(&self, dataset: &EnsembleDataset) -> Result<()>;
}
