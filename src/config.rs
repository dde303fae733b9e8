//! Run configuration: period, target point, catalog and on-disk layout.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    calendar::CanonicalCalendar,
    catalog::{FieldKind, GridPoint, SourceKind},
    error::{Error, Result},
    reading::StationColumns,
};

/// Where one kind of source keeps its files.
///
/// `dir` may contain `{source}` and `{field}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirLayout {
    pub dir: String,
    #[serde(default)]
    pub extension: Option<String>,
}

impl DirLayout {
    pub fn dir_for(&self, source_id: &str, field: FieldKind) -> PathBuf {
        PathBuf::from(
            self.dir
                .replace("{source}", source_id)
                .replace("{field}", field.key()),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    #[serde(default)]
    pub model: Option<DirLayout>,
    #[serde(default)]
    pub reanalysis: Option<DirLayout>,
    #[serde(default)]
    pub station: Option<DirLayout>,
}

/// Field names used in the output dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputNames {
    pub pr: String,
    pub zg: String,
    pub ta: String,
    pub h0: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        OutputNames {
            pr: "pr".to_string(),
            zg: "zg".to_string(),
            ta: "ta".to_string(),
            h0: "H0".to_string(),
        }
    }
}

impl OutputNames {
    pub fn of(&self, field: FieldKind) -> &str {
        match field {
            FieldKind::Precipitation => &self.pr,
            FieldKind::GeopotentialHeight => &self.zg,
            FieldKind::Temperature => &self.ta,
        }
    }

    /// Names must be distinct, non-empty and clear of the `time`/`source`
    /// columns of the output.
    fn validate(&self) -> Result<()> {
        let all = [&self.pr, &self.zg, &self.ta, &self.h0];
        for (i, name) in all.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(Error::Config("output names must not be empty".to_string()));
            }
            if ["time", "source"].contains(&name.as_str()) {
                return Err(Error::Config(format!("output name `{}` is reserved", name)));
            }
            if all[..i].contains(name) {
                return Err(Error::Config(format!("output name `{}` is used twice", name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunFile {
    start: NaiveDate,
    end: NaiveDate,
    target: GridPoint,
    catalog: PathBuf,
    #[serde(default)]
    output: Option<PathBuf>,
    #[serde(default)]
    layout: Layout,
    #[serde(default)]
    names: OutputNames,
    #[serde(default)]
    station_columns: StationColumns,
}

/// Everything a run needs besides the catalog contents.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub target: GridPoint,
    /// Catalog path, resolved against the run file's directory.
    pub catalog: PathBuf,
    pub output: Option<PathBuf>,
    pub layout: Layout,
    pub names: OutputNames,
    pub station_columns: StationColumns,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_yaml(&contents, base)
    }

    /// Parses a run file; relative paths are taken from `base`.
    pub fn from_yaml(contents: &str, base: &Path) -> Result<Self> {
        let file: RunFile =
            serde_yaml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;

        let config = RunConfig {
            start: file.start,
            end: file.end,
            target: file.target,
            catalog: base.join(file.catalog),
            output: file.output.map(|p| base.join(p)),
            layout: file.layout,
            names: file.names,
            station_columns: file.station_columns,
        };
        // Bad bounds and names fail here rather than halfway through a run.
        config.calendar()?;
        config.names.validate()?;

        Ok(config)
    }

    pub fn calendar(&self) -> Result<Arc<CanonicalCalendar>> {
        CanonicalCalendar::new(self.start, self.end).map(Arc::new)
    }

    pub fn layout_for(&self, kind: SourceKind) -> Result<&DirLayout> {
        match kind {
            SourceKind::Model => self.layout.model.as_ref(),
            SourceKind::Reanalysis => self.layout.reanalysis.as_ref(),
            SourceKind::Station => self.layout.station.as_ref(),
        }
        .ok_or_else(|| Error::Config(format!("no `layout.{}` entry", kind)))
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &str = r#"
start: 1976-01-01
end: 2004-12-31
target: {lat: -33.44, lon: 289.35}
catalog: info_models_historical.yml
layout:
  model: {dir: "/data/cmip5/historical/day/{field}/{source}/r1i1p1", extension: nc}
  station: {dir: "/data/stations/{source}"}
names: {zg: z700, ta: t700}
"#;

    #[test]
    fn should_parse_run_file() {
        let config = RunConfig::from_yaml(RUN, Path::new("/runs")).unwrap();

        assert_eq!(config.start, NaiveDate::from_ymd_opt(1976, 1, 1).unwrap());
        assert_eq!(config.catalog, PathBuf::from("/runs/info_models_historical.yml"));
        assert_eq!(config.output, None);
        assert_eq!(config.names.of(FieldKind::GeopotentialHeight), "z700");
        assert_eq!(config.names.pr, "pr");
        assert_eq!(config.names.h0, "H0");
        assert_eq!(config.station_columns, StationColumns::default());
        assert_eq!(config.calendar().unwrap().len(), 29 * 365);
    }

    #[test]
    fn should_expand_directory_template() {
        let config = RunConfig::from_yaml(RUN, Path::new("/runs")).unwrap();
        let layout = config.layout_for(SourceKind::Model).unwrap();

        assert_eq!(
            layout.dir_for("MIROC5", FieldKind::Temperature),
            PathBuf::from("/data/cmip5/historical/day/ta/MIROC5/r1i1p1")
        );
        assert_eq!(layout.extension.as_deref(), Some("nc"));
        assert!(config.layout_for(SourceKind::Station).unwrap().extension.is_none());
        assert!(matches!(
            config.layout_for(SourceKind::Reanalysis),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn should_reject_bad_period_and_unknown_keys() {
        let inverted = RUN.replace("end: 2004-12-31", "end: 1970-12-31");
        let leap = RUN.replace("end: 2004-12-31", "end: 2004-02-29");
        let typo = format!("{}outptu: x.parquet\n", RUN);

        for contents in [inverted, leap, typo] {
            assert!(matches!(
                RunConfig::from_yaml(&contents, Path::new("/runs")),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn should_reject_clashing_output_names() {
        let clash = RUN.replace("names: {zg: z700, ta: t700}", "names: {zg: pr}");
        let empty = RUN.replace("names: {zg: z700, ta: t700}", "names: {h0: \"\"}");
        let reserved = RUN.replace("names: {zg: z700, ta: t700}", "names: {ta: time}");

        for contents in [clash, empty, reserved] {
            assert!(matches!(
                RunConfig::from_yaml(&contents, Path::new("/runs")),
                Err(Error::Config(_))
            ));
        }
    }
}
