//! Gridded logical series and nearest-grid-point extraction.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;

use crate::{
    catalog::GridPoint,
    error::{Error, Result},
    series::NativeSeries,
};

/// Coordinate axes of a gridded series. Data is laid out
/// `[time][level][lat][lon]`, with the level axis optional.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxes {
    pub times: Vec<NaiveDateTime>,
    pub levels: Option<Vec<f64>>,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
}

impl GridAxes {
    fn same_space(&self, other: &GridAxes) -> bool {
        self.levels == other.levels && self.lats == other.lats && self.lons == other.lons
    }

    fn cells_per_step(&self) -> usize {
        self.levels.as_ref().map_or(1, Vec::len) * self.lats.len() * self.lons.len()
    }
}

/// One spatial cell of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub level: Option<usize>,
    pub lat: usize,
    pub lon: usize,
}

/// A time-ordered gridded variable that can hand out single-cell columns.
pub trait LogicalSeries {
    fn axes(&self) -> &GridAxes;

    /// Values of one cell over the full time axis; NaN marks missing.
    fn read_cell(&self, cell: GridCell) -> Result<Vec<f64>>;
}

/// Opens an ordered list of files as one logical series.
pub trait GridReader {
    type Series: LogicalSeries;

    fn open_many(&self, paths: &[PathBuf], variable: &str) -> Result<Self::Series>;
}

/// Index of the coordinate closest to `target`; ties go to the first one.
pub fn nearest_index(coords: &[f64], target: f64, distance: impl Fn(f64, f64) -> f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, c) in coords.iter().enumerate() {
        let d = distance(*c, target);
        if !d.is_finite() {
            continue;
        }
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }

    best.map(|(i, _)| i)
}

pub fn linear_distance(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

/// Angular distance in degrees, so 289.35 and -70.65 are the same meridian.
pub fn longitude_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Picks the cell nearest to `point`, selecting `level` exactly when given.
pub fn select_cell(axes: &GridAxes, point: GridPoint, level: Option<f64>) -> Result<GridCell> {
    let lat = nearest_index(&axes.lats, point.lat, linear_distance)
        .ok_or_else(|| Error::Extraction("latitude axis is empty".to_string()))?;
    let lon = nearest_index(&axes.lons, point.lon, longitude_distance)
        .ok_or_else(|| Error::Extraction("longitude axis is empty".to_string()))?;

    let level = match (&axes.levels, level) {
        (Some(levels), Some(wanted)) => Some(
            levels
                .iter()
                .position(|l| (l - wanted).abs() <= 1e-6 * wanted.abs().max(1.0))
                .ok_or(Error::LevelNotFound(wanted))?,
        ),
        (Some(levels), None) if levels.len() == 1 => Some(0),
        (Some(levels), None) => {
            return Err(Error::Extraction(format!(
                "grid has {} levels and no level was selected",
                levels.len()
            )))
        }
        (None, Some(wanted)) => return Err(Error::LevelNotFound(wanted)),
        (None, None) => None,
    };

    Ok(GridCell { level, lat, lon })
}

/// The nearest cell's series with every spatial dimension squeezed out.
pub fn extract<S: LogicalSeries>(
    series: &S,
    name: &str,
    point: GridPoint,
    level: Option<f64>,
) -> Result<NativeSeries> {
    let axes = series.axes();
    let cell = select_cell(axes, point, level)?;

    tracing::debug!(
        field = name,
        lat = axes.lats[cell.lat],
        lon = axes.lons[cell.lon],
        plev = ?cell.level.and_then(|i| axes.levels.as_ref().map(|l| l[i])),
        "nearest grid cell"
    );

    let values = series.read_cell(cell)?;
    if values.len() != axes.times.len() {
        return Err(Error::Extraction(format!(
            "cell column has {} values for {} timestamps",
            values.len(),
            axes.times.len()
        )));
    }

    NativeSeries::from_raw(name, axes.times.clone(), values)
}

/// Chunks concatenated along time into one series.
#[derive(Debug)]
pub struct Chunked<C> {
    axes: GridAxes,
    chunks: Vec<C>,
}

impl<C: LogicalSeries> Chunked<C> {
    /// Orders chunks by their first timestamp and checks they tile the time
    /// axis without overlap on one shared spatial grid.
    pub fn concat(chunks: Vec<C>) -> Result<Self> {
        let mut chunks: Vec<C> = chunks
            .into_iter()
            .filter(|c| !c.axes().times.is_empty())
            .collect();
        if chunks.is_empty() {
            return Err(Error::Extraction("no time steps in any file".to_string()));
        }
        chunks.sort_by_key(|c| c.axes().times[0]);

        let first = chunks[0].axes().clone();
        let mut times = Vec::new();
        for chunk in &chunks {
            let axes = chunk.axes();
            if !axes.same_space(&first) {
                return Err(Error::Extraction(
                    "files do not share the same spatial grid".to_string(),
                ));
            }
            if let (Some(last), Some(next)) = (times.last(), axes.times.first()) {
                if next <= last {
                    return Err(Error::CalendarMismatch(format!(
                        "file chunks overlap in time at {}",
                        next
                    )));
                }
            }
            times.extend_from_slice(&axes.times);
        }

        Ok(Chunked {
            axes: GridAxes { times, ..first },
            chunks,
        })
    }
}

impl<C: LogicalSeries> LogicalSeries for Chunked<C> {
    fn axes(&self) -> &GridAxes {
        &self.axes
    }

    fn read_cell(&self, cell: GridCell) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(self.axes.times.len());
        for chunk in &self.chunks {
            values.extend(chunk.read_cell(cell)?);
        }
        Ok(values)
    }
}

/// A gridded variable held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryGrid {
    axes: GridAxes,
    data: Vec<f64>,
}

impl MemoryGrid {
    pub fn new(axes: GridAxes, data: Vec<f64>) -> Result<Self> {
        let expected = axes.times.len() * axes.cells_per_step();
        if data.len() != expected {
            return Err(Error::Extraction(format!(
                "grid data has {} values, axes need {}",
                data.len(),
                expected
            )));
        }
        Ok(MemoryGrid { axes, data })
    }
}

impl LogicalSeries for MemoryGrid {
    fn axes(&self) -> &GridAxes {
        &self.axes
    }

    fn read_cell(&self, cell: GridCell) -> Result<Vec<f64>> {
        let n_lat = self.axes.lats.len();
        let n_lon = self.axes.lons.len();
        let step = self.axes.cells_per_step();
        let offset = (cell.level.unwrap_or(0) * n_lat + cell.lat) * n_lon + cell.lon;

        Ok((0..self.axes.times.len())
            .map(|t| self.data[t * step + offset])
            .collect())
    }
}

/// Reader over in-memory grids keyed by path and variable name; lets the
/// pipeline run against synthetic sources.
#[derive(Debug, Default, Clone)]
pub struct MemoryReader {
    files: HashMap<PathBuf, HashMap<String, MemoryGrid>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, variable: &str, grid: MemoryGrid) {
        self.files
            .entry(path.as_ref().to_path_buf())
            .or_default()
            .insert(variable.to_string(), grid);
    }
}

impl GridReader for MemoryReader {
    type Series = Chunked<MemoryGrid>;

    fn open_many(&self, paths: &[PathBuf], variable: &str) -> Result<Self::Series> {
        let chunks = paths
            .iter()
            .map(|path| {
                self.files
                    .get(path)
                    .and_then(|vars| vars.get(variable))
                    .cloned()
                    .ok_or_else(|| Error::Reader {
                        path: path.clone(),
                        reason: format!("no variable `{}`", variable),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Chunked::concat(chunks)
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1980, 1, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    /// 2 levels x 3 lats x 2 lons; value encodes (t, level, lat, lon).
    fn grid(days: &[u32]) -> MemoryGrid {
        let axes = GridAxes {
            times: days.iter().map(|d| day(*d)).collect(),
            levels: Some(vec![85000.0, 70000.0]),
            lats: vec![-34.0, -33.5, -33.0],
            lons: vec![288.75, 290.625],
        };
        let mut data = Vec::new();
        for d in days {
            for k in 0..2 {
                for j in 0..3 {
                    for i in 0..2 {
                        data.push((*d * 1000 + k * 100 + j * 10 + i) as f64);
                    }
                }
            }
        }
        MemoryGrid::new(axes, data).unwrap()
    }

    #[test]
    fn should_pick_nearest_latitude() {
        let idx = nearest_index(&[-34.0, -33.5, -33.0], -33.44, linear_distance);

        assert_eq!(idx, Some(1));
    }

    #[test]
    fn should_break_ties_on_first_coordinate() {
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 0.5, linear_distance), Some(0));
        assert_eq!(nearest_index(&[], 0.5, linear_distance), None);
    }

    #[test]
    fn should_match_longitudes_across_conventions() {
        let lons = [288.75, 290.625];

        assert_eq!(nearest_index(&lons, 289.35, longitude_distance), Some(0));
        assert_eq!(nearest_index(&lons, -70.65, longitude_distance), Some(0));
        assert_eq!(nearest_index(&lons, -69.5, longitude_distance), Some(1));
        assert!((longitude_distance(359.5, 0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn should_extract_squeezed_series_at_level() {
        let g = grid(&[1, 2]);
        let point = GridPoint { lat: -33.44, lon: 289.35 };

        let s = extract(&g, "ta", point, Some(70000.0)).unwrap();

        assert_eq!(s.times(), &[day(1), day(2)]);
        assert_eq!(s.values(), &[Some(1110.0), Some(2110.0)]);
    }

    #[test]
    fn should_require_level_choice_on_multi_level_grid() {
        let g = grid(&[1]);
        let point = GridPoint { lat: -33.0, lon: 290.0 };

        assert!(matches!(
            extract(&g, "ta", point, Some(50000.0)),
            Err(Error::LevelNotFound(_))
        ));
        assert!(matches!(
            extract(&g, "ta", point, None),
            Err(Error::Extraction(_))
        ));
    }

    #[test]
    fn should_concatenate_files_in_time_order() {
        let mut reader = MemoryReader::new();
        reader.insert("b.nc", "ta", grid(&[3, 4]));
        reader.insert("a.nc", "ta", grid(&[1, 2]));
        let paths = vec![PathBuf::from("b.nc"), PathBuf::from("a.nc")];

        let series = reader.open_many(&paths, "ta").unwrap();
        let s = extract(&series, "ta", GridPoint { lat: -34.0, lon: 288.75 }, Some(85000.0)).unwrap();

        assert_eq!(s.len(), 4);
        assert_eq!(
            s.values(),
            &[Some(1000.0), Some(2000.0), Some(3000.0), Some(4000.0)]
        );
    }

    #[test]
    fn should_reject_overlapping_or_unknown_chunks() {
        let mut reader = MemoryReader::new();
        reader.insert("a.nc", "ta", grid(&[1, 2]));
        reader.insert("b.nc", "ta", grid(&[2, 3]));

        let overlapping = reader.open_many(&[PathBuf::from("a.nc"), PathBuf::from("b.nc")], "ta");
        let unknown = reader.open_many(&[PathBuf::from("a.nc")], "zg");

        assert!(matches!(overlapping, Err(Error::CalendarMismatch(_))));
        assert!(matches!(unknown, Err(Error::Reader { .. })));
    }
}
