//! Static description of every data source: file markers, variable names,
//! declared units and target coordinates.
//!
//! The catalog is a YAML document with one section per source kind:
//!
//! ```yaml
//! models:
//!   CanESM2:
//!     pr: {ini: pr_day_CanESM2_historical_r1i1p1_18500101-20051231.nc,
//!          end: pr_day_CanESM2_historical_r1i1p1_18500101-20051231.nc,
//!          name: pr, units: kgm-2s-1}
//!     zg: {ini: ..., end: ..., name: zg, units: m, plev: 70000}
//! reanalysis:
//!   ERA5:
//!     lat: -33.5
//!     lon: -70.5
//!     zg: {ini: ..., end: ..., name: z, units: m2s-2, samples_per_day: 4, offset: 2}
//! stations:
//!   QN:
//!     pr: {ini: QN_daily_precip.csv, end: QN_daily_precip.csv, name: valor, units: mm/day}
//! ```

use std::{fmt, fs, path::Path};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Model,
    Station,
    Reanalysis,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Model => f.write_str("model"),
            SourceKind::Station => f.write_str("station"),
            SourceKind::Reanalysis => f.write_str("reanalysis"),
        }
    }
}

/// Physical fields a source can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    Precipitation,
    GeopotentialHeight,
    Temperature,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [
        FieldKind::Precipitation,
        FieldKind::GeopotentialHeight,
        FieldKind::Temperature,
    ];

    /// Catalog key for the field.
    pub fn key(&self) -> &'static str {
        match self {
            FieldKind::Precipitation => "pr",
            FieldKind::GeopotentialHeight => "zg",
            FieldKind::Temperature => "ta",
        }
    }

    pub fn canonical_unit(&self) -> &'static str {
        match self {
            FieldKind::Precipitation => "mm/day",
            FieldKind::GeopotentialHeight => "m",
            FieldKind::Temperature => "K",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Target coordinates in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lon: f64,
}

/// One day's worth of samples and which of them to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubDaily {
    pub samples_per_day: usize,
    pub offset: usize,
}

/// Everything the pipeline needs to know about one (source, field).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub source_id: String,
    pub kind: SourceKind,
    pub field: FieldKind,
    /// First relevant file in the sorted inventory.
    pub ini: String,
    /// Last relevant file in the sorted inventory.
    pub end: String,
    pub variable: String,
    pub units: String,
    /// Source-specific target, overriding the run's target point.
    pub point: Option<GridPoint>,
    /// Pressure level to select, in the grid's level units.
    pub level: Option<f64>,
    pub sampling: Option<SubDaily>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldEntry {
    ini: String,
    end: String,
    name: String,
    units: String,
    #[serde(default)]
    plev: Option<f64>,
    #[serde(default)]
    samples_per_day: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceEntry {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    pr: Option<FieldEntry>,
    #[serde(default)]
    zg: Option<FieldEntry>,
    #[serde(default)]
    ta: Option<FieldEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    models: IndexMap<String, SourceEntry>,
    #[serde(default)]
    reanalysis: IndexMap<String, SourceEntry>,
    #[serde(default)]
    stations: IndexMap<String, SourceEntry>,
}

#[derive(Debug, Clone)]
struct CatalogSource {
    kind: SourceKind,
    point: Option<GridPoint>,
    fields: IndexMap<FieldKind, FieldSpec>,
}

#[derive(Debug, Clone)]
struct FieldSpec {
    ini: String,
    end: String,
    variable: String,
    units: String,
    level: Option<f64>,
    sampling: Option<SubDaily>,
}

/// Read-only lookup over all configured sources, in declaration order.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: IndexMap<String, CatalogSource>,
}

impl SourceCatalog {
    /// Loads and validates the whole catalog; any bad entry fails the load.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::Catalog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&contents, path)
    }

    pub fn from_yaml(contents: &str, path: &Path) -> Result<Self> {
        let catalog_error = |reason: String| Error::Catalog {
            path: path.to_path_buf(),
            reason,
        };

        let file: CatalogFile =
            serde_yaml::from_str(contents).map_err(|e| catalog_error(e.to_string()))?;

        let mut sources = IndexMap::new();
        let sections = [
            (SourceKind::Model, file.models),
            (SourceKind::Reanalysis, file.reanalysis),
            (SourceKind::Station, file.stations),
        ];

        for (kind, entries) in sections {
            for (source_id, entry) in entries {
                if sources.contains_key(&source_id) {
                    return Err(catalog_error(format!(
                        "source `{}` is declared more than once",
                        source_id
                    )));
                }
                let source = build_source(kind, &source_id, entry).map_err(catalog_error)?;
                debug!(source = %source_id, %kind, fields = source.fields.len(), "catalog source");
                sources.insert(source_id, source);
            }
        }

        Ok(SourceCatalog { sources })
    }

    pub fn resolve(&self, source_id: &str, field: FieldKind) -> Result<SourceDescriptor> {
        let source = self
            .sources
            .get(source_id)
            .ok_or_else(|| Error::UnknownSource(source_id.to_string()))?;
        let declared = source.fields.get(&field).ok_or_else(|| Error::UnknownField {
            source_id: source_id.to_string(),
            field,
        })?;

        Ok(SourceDescriptor {
            source_id: source_id.to_string(),
            kind: source.kind,
            field,
            ini: declared.ini.clone(),
            end: declared.end.clone(),
            variable: declared.variable.clone(),
            units: declared.units.clone(),
            point: source.point,
            level: declared.level,
            sampling: declared.sampling,
        })
    }

    /// Source ids of one kind, in declaration order.
    pub fn sources_of_kind(&self, kind: SourceKind) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|(_, s)| s.kind == kind)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn fields_of(&self, source_id: &str) -> Result<Vec<FieldKind>> {
        self.sources
            .get(source_id)
            .map(|s| s.fields.keys().copied().collect())
            .ok_or_else(|| Error::UnknownSource(source_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn build_source(
    kind: SourceKind,
    source_id: &str,
    entry: SourceEntry,
) -> std::result::Result<CatalogSource, String> {
    let point = match (entry.lat, entry.lon) {
        (Some(lat), Some(lon)) => Some(GridPoint { lat, lon }),
        (None, None) => None,
        _ => {
            return Err(format!(
                "source `{}` must give both `lat` and `lon` or neither",
                source_id
            ))
        }
    };

    let mut fields = IndexMap::new();
    let declared = [
        (FieldKind::Precipitation, entry.pr),
        (FieldKind::GeopotentialHeight, entry.zg),
        (FieldKind::Temperature, entry.ta),
    ];
    for (field, field_entry) in declared {
        if let Some(field_entry) = field_entry {
            fields.insert(field, build_field(source_id, field, field_entry)?);
        }
    }

    if fields.is_empty() {
        return Err(format!("source `{}` declares no fields", source_id));
    }

    Ok(CatalogSource {
        kind,
        point,
        fields,
    })
}

fn build_field(
    source_id: &str,
    field: FieldKind,
    entry: FieldEntry,
) -> std::result::Result<FieldSpec, String> {
    let sampling = match (entry.samples_per_day, entry.offset) {
        (Some(samples_per_day), Some(offset)) if offset < samples_per_day => Some(SubDaily {
            samples_per_day,
            offset,
        }),
        (Some(samples_per_day), Some(offset)) => {
            return Err(format!(
                "`{}.{}`: offset {} is not below samples_per_day {}",
                source_id, field, offset, samples_per_day
            ))
        }
        (None, None) => None,
        _ => {
            return Err(format!(
                "`{}.{}`: `samples_per_day` and `offset` go together",
                source_id, field
            ))
        }
    };

    for (key, value) in [("ini", &entry.ini), ("end", &entry.end), ("name", &entry.name), ("units", &entry.units)] {
        if value.trim().is_empty() {
            return Err(format!("`{}.{}`: `{}` is empty", source_id, field, key));
        }
    }

    Ok(FieldSpec {
        ini: entry.ini,
        end: entry.end,
        variable: entry.name,
        units: entry.units,
        level: entry.plev,
        sampling,
    })
}

// -- Tests -------------------------------------------------------------------
