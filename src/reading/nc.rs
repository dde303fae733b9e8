//! NetCDF-backed gridded reader (`netcdf` feature).
//!
//! Each file is opened once to read its coordinates and again, briefly, for
//! every cell column requested; no handle outlives a call.

use std::path::{Path, PathBuf};

use netcdf::AttributeValue;
use tracing::debug;

use super::{
    cf_time::TimeUnits,
    grid::{Chunked, GridAxes, GridCell, GridReader, LogicalSeries},
};
use crate::error::{Error, Result};

fn reader_error(path: &Path, reason: impl ToString) -> Error {
    Error::Reader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !var.attributes().any(|attr| attr.name() == name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !var.attributes().any(|attr| attr.name() == name) {
        return None;
    }
    f64::try_from(var.attribute_value(name)?.ok()?).ok()
}

/// Packing and fill attributes of a data variable.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Packing {
    fill: Option<f64>,
    missing: Option<f64>,
    scale: f64,
    offset: f64,
}

impl Packing {
    fn of(var: &netcdf::Variable) -> Self {
        Packing {
            fill: f64_attr(var, "_FillValue"),
            missing: f64_attr(var, "missing_value"),
            scale: f64_attr(var, "scale_factor").unwrap_or(1.0),
            offset: f64_attr(var, "add_offset").unwrap_or(0.0),
        }
    }

    fn unpack(&self, raw: f64) -> f64 {
        if Some(raw) == self.fill || Some(raw) == self.missing {
            f64::NAN
        } else {
            raw * self.scale + self.offset
        }
    }
}

/// One file's worth of a variable.
#[derive(Debug)]
pub struct NcChunk {
    path: PathBuf,
    variable: String,
    axes: GridAxes,
    packing: Packing,
}

impl NcChunk {
    pub fn open(path: &Path, variable: &str) -> Result<Self> {
        let file = netcdf::open(path).map_err(|e| reader_error(path, e))?;
        let var = file
            .variable(variable)
            .ok_or_else(|| reader_error(path, format!("no variable `{}`", variable)))?;

        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let (time_dim, level_dim, lat_dim, lon_dim) = match dims.as_slice() {
            [t, y, x] => (t.as_str(), None, y.as_str(), x.as_str()),
            [t, z, y, x] => (t.as_str(), Some(z.as_str()), y.as_str(), x.as_str()),
            _ => {
                return Err(reader_error(
                    path,
                    format!("`{}` has dimensions {:?}, expected (time, [level,] lat, lon)", variable, dims),
                ))
            }
        };

        let coord = |name: &str| -> Result<Vec<f64>> {
            file.variable(name)
                .ok_or_else(|| reader_error(path, format!("no coordinate variable `{}`", name)))?
                .get_values::<f64, _>(..)
                .map_err(|e| reader_error(path, e))
        };

        let time_var = file
            .variable(time_dim)
            .ok_or_else(|| reader_error(path, format!("no coordinate variable `{}`", time_dim)))?;
        let units = string_attr(&time_var, "units")
            .ok_or_else(|| reader_error(path, "time coordinate has no `units`"))?;
        let calendar = string_attr(&time_var, "calendar");
        let time_units = TimeUnits::parse(&units, calendar.as_deref())?;
        let times = time_units.decode_all(&coord(time_dim)?)?;

        let axes = GridAxes {
            times,
            levels: level_dim.map(|z| coord(z)).transpose()?,
            lats: coord(lat_dim)?,
            lons: coord(lon_dim)?,
        };

        debug!(
            file = %path.display(),
            variable,
            steps = axes.times.len(),
            calendar = calendar.as_deref().unwrap_or("standard"),
            "opened netcdf chunk"
        );

        Ok(NcChunk {
            path: path.to_path_buf(),
            variable: variable.to_string(),
            axes,
            packing: Packing::of(&var),
        })
    }
}

impl LogicalSeries for NcChunk {
    fn axes(&self) -> &GridAxes {
        &self.axes
    }

    fn read_cell(&self, cell: GridCell) -> Result<Vec<f64>> {
        let file = netcdf::open(&self.path).map_err(|e| reader_error(&self.path, e))?;
        let var = file
            .variable(&self.variable)
            .ok_or_else(|| reader_error(&self.path, format!("no variable `{}`", self.variable)))?;

        let raw: Vec<f64> = match cell.level {
            Some(k) => var.get_values::<f64, _>((.., k, cell.lat, cell.lon)),
            None => var.get_values::<f64, _>((.., cell.lat, cell.lon)),
        }
        .map_err(|e| reader_error(&self.path, e))?;

        Ok(raw.into_iter().map(|v| self.packing.unpack(v)).collect())
    }
}

/// Opens CF-convention NetCDF files.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfReader;

impl GridReader for NetcdfReader {
    type Series = Chunked<NcChunk>;

    fn open_many(&self, paths: &[PathBuf], variable: &str) -> Result<Self::Series> {
        let chunks = paths
            .iter()
            .map(|p| NcChunk::open(p, variable))
            .collect::<Result<Vec<_>>>()?;
        Chunked::concat(chunks)
    }
}

// -- Tests -------------------------------------------------------------------
