//! Harmonize a station record with reanalysis upper-air fields.

use std::path::Path;

use anyhow::Result;
use hzero::Pipeline;

use super::{grid_reader, load, save};
use crate::cli::create_spinner;

pub fn observed(config_path: &Path, station: Option<&str>, reanalysis: Option<&str>) -> Result<String> {
    let (config, catalog) = load(config_path)?;
    let reader = grid_reader()?;
    let pipeline = Pipeline::new(&config, &catalog, &reader)?;

    let bar = create_spinner("Harmonizing observations...".to_string());
    let dataset = pipeline.run_observed(station, reanalysis, |source| {
        bar.set_message(format!("{} harmonized", source));
    })?;
    bar.finish_with_message("Observations harmonized");

    let path = save(&dataset, "observed", &config)?;

    Ok(path.to_string_lossy().to_string())
}
