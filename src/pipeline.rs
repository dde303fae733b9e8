//! The per-(source, field) harmonization chain and the two runs built on it.
//!
//! Every source goes through the same steps, driven by its descriptor:
//! resolve the file range, read and extract the target point, keep the run
//! period, reduce sub-daily data, align onto the canonical calendar and
//! convert to canonical units. Any failure is reported with the source, field
//! and step it happened in, and aborts the run.

use std::{path::PathBuf, sync::Arc};

use tracing::{debug, info};

use crate::{
    calendar::{normalize, CanonicalCalendar},
    catalog::{FieldKind, SourceCatalog, SourceDescriptor, SourceKind},
    config::RunConfig,
    derived::{freezing_level_height, H0, LAPSE_RATE},
    ensemble::{AxisMode, EnsembleAssembler, EnsembleDataset},
    error::{Error, Result, Stage, StageContext},
    reading::{extract, read_station_csv, GridReader, Inventory},
    reduce::reduce_to_daily,
    series::{NativeSeries, ScalarSeries},
    units::to_canonical,
};

/// The ordered files between the descriptor's markers, in the directory the
/// run layout gives for its kind.
pub fn resolve_files(config: &RunConfig, desc: &SourceDescriptor) -> Result<Vec<PathBuf>> {
    let run = || -> Result<Vec<PathBuf>> {
        let layout = config.layout_for(desc.kind)?;
        let dir = layout.dir_for(&desc.source_id, desc.field);
        let inventory = Inventory::list(&dir, layout.extension.as_deref())?;
        Ok(inventory.range(&desc.ini, &desc.end)?.to_vec())
    };
    run().in_stage(&desc.source_id, desc.field, Stage::Resolve)
}

/// Binds a run configuration, a catalog and a gridded reader.
pub struct Pipeline<'a, R> {
    config: &'a RunConfig,
    catalog: &'a SourceCatalog,
    reader: &'a R,
    calendar: Arc<CanonicalCalendar>,
}

impl<'a, R: GridReader> Pipeline<'a, R> {
    pub fn new(config: &'a RunConfig, catalog: &'a SourceCatalog, reader: &'a R) -> Result<Self> {
        Ok(Pipeline {
            config,
            catalog,
            reader,
            calendar: config.calendar()?,
        })
    }

    pub fn calendar(&self) -> &Arc<CanonicalCalendar> {
        &self.calendar
    }

    /// Runs one descriptor through the whole chain.
    pub fn harmonize(&self, desc: &SourceDescriptor) -> Result<ScalarSeries> {
        let (id, field) = (desc.source_id.as_str(), desc.field);
        let files = resolve_files(self.config, desc)?;
        debug!(source = id, %field, files = files.len(), "resolved file range");

        let native = match desc.kind {
            SourceKind::Station => self.read_station(desc, &files).in_stage(id, field, Stage::Read)?,
            SourceKind::Model | SourceKind::Reanalysis => {
                let series = self
                    .reader
                    .open_many(&files, &desc.variable)
                    .in_stage(id, field, Stage::Read)?;
                let point = desc.point.unwrap_or(self.config.target);
                extract(&series, &desc.variable, point, desc.level).in_stage(id, field, Stage::Extract)?
            }
        };

        let mut native = native.within(self.calendar.start(), self.calendar.end());
        if native.is_empty() {
            let empty: Result<()> = Err(Error::CalendarMismatch(format!(
                "no samples between {} and {}",
                self.calendar.start(),
                self.calendar.end()
            )));
            empty.in_stage(id, field, Stage::Window)?;
        }

        if let Some(sampling) = desc.sampling {
            native = reduce_to_daily(&native, sampling.samples_per_day, sampling.offset)
                .in_stage(id, field, Stage::Reduce)?;
        }

        let aligned = normalize(&native, &self.calendar).in_stage(id, field, Stage::Calendar)?;
        let canonical = to_canonical(&aligned, &desc.units, field).in_stage(id, field, Stage::Units)?;

        debug!(
            source = id,
            %field,
            missing = canonical.missing_count(),
            days = canonical.len(),
            "harmonized"
        );

        Ok(canonical.renamed(self.config.names.of(field)))
    }

    fn read_station(&self, desc: &SourceDescriptor, files: &[PathBuf]) -> Result<NativeSeries> {
        let mut times = Vec::new();
        let mut values = Vec::new();
        for path in files {
            let part = read_station_csv(path, &self.config.station_columns, &desc.variable)?;
            times.extend_from_slice(part.times());
            values.extend_from_slice(part.values());
        }
        NativeSeries::new(&desc.variable, times, values)
    }

    fn harmonize_field(&self, source_id: &str, field: FieldKind) -> Result<ScalarSeries> {
        let desc = self
            .catalog
            .resolve(source_id, field)
            .in_stage(source_id, field, Stage::Resolve)?;
        self.harmonize(&desc)
    }

    fn annotate_units(&self, assembler: &mut EnsembleAssembler) {
        let names = &self.config.names;
        for field in FieldKind::ALL {
            assembler.annotate(names.of(field), "units", field.canonical_unit());
        }
        assembler.annotate(&names.h0, "units", "m");
        assembler.annotate(&names.h0, "lapse_rate", LAPSE_RATE.to_string());
    }

    /// Every model source stacked along a source axis, with H0 per model.
    ///
    /// `progress` is called with each source id once it is done.
    pub fn run_models(&self, mut progress: impl FnMut(&str)) -> Result<EnsembleDataset> {
        let models = self.catalog.sources_of_kind(SourceKind::Model);
        if models.is_empty() {
            return Err(Error::InconsistentEnsemble(
                "the catalog declares no models".to_string(),
            ));
        }
        info!(models = models.len(), start = %self.calendar.start(), end = %self.calendar.end(), "model run");

        let names = &self.config.names;
        let mut assembler = EnsembleAssembler::new(Arc::clone(&self.calendar), AxisMode::Ensemble);

        for model in models {
            let pr = self.harmonize_field(model, FieldKind::Precipitation)?;
            let zg = self.harmonize_field(model, FieldKind::GeopotentialHeight)?;
            let ta = self.harmonize_field(model, FieldKind::Temperature)?;
            let h0 = self.derive_h0(model, &ta, &zg)?;

            for (kind, series) in [
                (FieldKind::Precipitation, pr),
                (FieldKind::GeopotentialHeight, zg),
                (FieldKind::Temperature, ta),
            ] {
                assembler
                    .add(names.of(kind), model, series)
                    .in_stage(model, kind, Stage::Assemble)?;
            }
            assembler
                .add(&names.h0, model, h0)
                .in_stage(model, H0, Stage::Assemble)?;

            info!(source = model, "model harmonized");
            progress(model);
        }

        self.annotate_units(&mut assembler);
        assembler.finalize()
    }

    /// Station precipitation with reanalysis height, temperature and H0, all
    /// on one time axis.
    ///
    /// With `None`, the catalog must hold exactly one source of that kind.
    pub fn run_observed(
        &self,
        station: Option<&str>,
        reanalysis: Option<&str>,
        mut progress: impl FnMut(&str),
    ) -> Result<EnsembleDataset> {
        let station = self.pick_source(SourceKind::Station, station)?;
        let reanalysis = self.pick_source(SourceKind::Reanalysis, reanalysis)?;
        info!(station, reanalysis, start = %self.calendar.start(), end = %self.calendar.end(), "observed run");

        let names = &self.config.names;
        let mut assembler = EnsembleAssembler::new(Arc::clone(&self.calendar), AxisMode::Single);

        let pr = self.harmonize_field(station, FieldKind::Precipitation)?;
        assembler
            .add(&names.pr, station, pr)
            .in_stage(station, FieldKind::Precipitation, Stage::Assemble)?;
        assembler.annotate(&names.pr, "source", station);
        progress(station);

        let zg = self.harmonize_field(reanalysis, FieldKind::GeopotentialHeight)?;
        let ta = self.harmonize_field(reanalysis, FieldKind::Temperature)?;
        let h0 = self.derive_h0(reanalysis, &ta, &zg)?;

        for (name, label, series) in [
            (&names.zg, FieldKind::GeopotentialHeight.key(), zg),
            (&names.ta, FieldKind::Temperature.key(), ta),
            (&names.h0, H0, h0),
        ] {
            assembler
                .add(name, reanalysis, series)
                .in_stage(reanalysis, label, Stage::Assemble)?;
            assembler.annotate(name, "source", reanalysis);
        }
        progress(reanalysis);

        self.annotate_units(&mut assembler);
        assembler.finalize()
    }

    /// H0 from one source's temperature and height, under its output name.
    fn derive_h0(&self, source_id: &str, ta: &ScalarSeries, zg: &ScalarSeries) -> Result<ScalarSeries> {
        Ok(freezing_level_height(ta, zg)
            .in_stage(source_id, H0, Stage::Derive)?
            .renamed(self.config.names.h0.as_str()))
    }

    fn pick_source<'s>(&'s self, kind: SourceKind, wanted: Option<&'s str>) -> Result<&'s str> {
        let candidates = self.catalog.sources_of_kind(kind);
        match wanted {
            Some(id) if candidates.contains(&id) => Ok(id),
            Some(id) => Err(Error::UnknownSource(id.to_string())),
            None => match candidates.as_slice() {
                [only] => Ok(*only),
                [] => Err(Error::Config(format!("the catalog declares no {} source", kind))),
                many => Err(Error::Config(format!(
                    "the catalog declares {} {} sources; pick one of {:?}",
                    many.len(),
                    kind,
                    many
                ))),
            },
        }
    }
}

// -- Tests -------------------------------------------------------------------
