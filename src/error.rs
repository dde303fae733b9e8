//! Error taxonomy for the harmonization pipeline.

use std::{fmt, path::PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use crate::catalog::FieldKind;

/// Result type for pipeline operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Pipeline stage a per-source failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Read,
    Extract,
    Window,
    Reduce,
    Calendar,
    Units,
    Derive,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "file resolution",
            Stage::Read => "read",
            Stage::Extract => "grid extraction",
            Stage::Window => "time window",
            Stage::Reduce => "sub-daily reduction",
            Stage::Calendar => "calendar normalization",
            Stage::Units => "unit normalization",
            Stage::Derive => "freezing-level derivation",
            Stage::Assemble => "assembly",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Bad or incomplete catalog; aborts the run.
    #[error("catalog error in {path}: {reason}")]
    Catalog { path: PathBuf, reason: String },

    /// Bad or incomplete run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown source `{0}`")]
    UnknownSource(String),

    #[error("field `{field}` is not declared for source `{source_id}`")]
    UnknownField { source_id: String, field: FieldKind },

    /// A file marker is absent from the inventory, or the markers are inverted.
    #[error("file marker `{marker}` not usable in {}: {reason}", dir.display())]
    MarkerNotFound {
        marker: String,
        dir: PathBuf,
        reason: String,
    },

    #[error("calendar mismatch: {0}")]
    CalendarMismatch(String),

    #[error("incomplete day {date}: expected {expected} samples, found {found}")]
    IncompleteDay {
        date: NaiveDate,
        expected: usize,
        found: usize,
    },

    #[error("unsupported unit `{unit}` for {field}")]
    UnsupportedUnit { unit: String, field: FieldKind },

    #[error("inconsistent ensemble: {0}")]
    InconsistentEnsemble(String),

    #[error("duplicate contribution of field `{field}` from source `{source_id}`")]
    DuplicateContribution { field: String, source_id: String },

    #[error("pressure level {0} not present in the source grid")]
    LevelNotFound(f64),

    #[error("grid extraction failed: {0}")]
    Extraction(String),

    /// Time coordinate that cannot be decoded onto real dates.
    #[error("time axis error: {0}")]
    TimeAxis(String),

    /// The raw file reader could not produce a logical series.
    #[error("reader error for {}: {reason}", path.display())]
    Reader { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Any of the above, tagged with the source, field and stage it came from.
    /// `field` is a catalog field key or the derived `H0`.
    #[error("source `{source_id}`, field {field}, {stage}: {inner}")]
    Stage {
        source_id: String,
        field: String,
        stage: Stage,
        #[source]
        inner: Box<Error>,
    },
}

impl Error {
    /// The innermost error, with any stage context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { inner, .. } => inner.root(),
            other => other,
        }
    }
}

/// Attaches source/field/stage context to a fallible pipeline step.
pub trait StageContext<T> {
    fn in_stage(self, source_id: &str, field: impl fmt::Display, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn in_stage(self, source_id: &str, field: impl fmt::Display, stage: Stage) -> Result<T> {
        self.map_err(|e| Error::Stage {
            source_id: source_id.to_string(),
            field: field.to_string(),
            stage,
            inner: Box::new(e),
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_stage_context() {
        let result: Result<()> = Err(Error::LevelNotFound(70000.0));
        let err = result
            .in_stage("CanESM2", FieldKind::Temperature, Stage::Extract)
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("CanESM2"));
        assert!(message.contains("ta"));
        assert!(message.contains("grid extraction"));
        assert!(matches!(err.root(), Error::LevelNotFound(_)));
    }

    #[test]
    fn should_name_derived_field_in_stage_context() {
        let result: Result<()> = Err(Error::CalendarMismatch("short".to_string()));
        let err = result.in_stage("ERA5", "H0", Stage::Derive).unwrap_err();

        assert_eq!(
            err.to_string(),
            "source `ERA5`, field H0, freezing-level derivation: calendar mismatch: short"
        );
    }
}
