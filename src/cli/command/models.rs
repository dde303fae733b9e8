//! Harmonize every catalog model into one ensemble dataset.

use std::path::Path;

use anyhow::Result;
use hzero::{Pipeline, SourceKind};
use tracing::info;

use super::{grid_reader, load, save};
use crate::cli::create_progress_bar;

pub fn models(config_path: &Path) -> Result<String> {
    let (config, catalog) = load(config_path)?;
    let reader = grid_reader()?;
    let pipeline = Pipeline::new(&config, &catalog, &reader)?;

    let count = catalog.sources_of_kind(SourceKind::Model).len();
    let bar = create_progress_bar(count as u64, "Harmonizing models".to_string());
    let dataset = pipeline.run_models(|source| {
        bar.set_message(format!("{} harmonized", source));
        bar.inc(1);
    })?;
    bar.finish_with_message("Models harmonized");
    info!(sources = count, fields = ?dataset.field_names(), "ensemble assembled");

    let path = save(&dataset, "models", &config)?;

    Ok(path.to_string_lossy().to_string())
}
