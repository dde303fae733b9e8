pub mod models;
pub mod observed;
pub mod resolve;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Local};
use hzero::{DatasetEmitter, EnsembleDataset, ParquetEmitter, RunConfig, SourceCatalog};
pub use models::models;
pub use observed::observed;
pub use resolve::resolve;

use crate::cli::create_progress_bar;

/// Default output name, dated like `hzero-models-1976-2004-2024-07-15.parquet`,
/// in the home directory.
pub fn make_parquet_file_name(run: &str, config: &RunConfig) -> Result<PathBuf> {
    let today = Local::now();
    let file_name = format!(
        "hzero-{}-{}-{}-{}-{:02}-{:02}.parquet",
        run,
        config.start.year(),
        config.end.year(),
        today.year(),
        today.month(),
        today.day()
    );

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot locate the home directory"))?;
    Ok(home.join(file_name))
}

/// Loads the run file and the catalog it points at.
pub fn load(config_path: &Path) -> Result<(RunConfig, SourceCatalog)> {
    let config = RunConfig::load(config_path)
        .with_context(|| format!("loading run file {}", config_path.display()))?;
    let catalog = SourceCatalog::load(&config.catalog)?;

    Ok((config, catalog))
}

/// Writes `dataset` to the configured output, or the dated default.
pub fn save(dataset: &EnsembleDataset, run: &str, config: &RunConfig) -> Result<PathBuf> {
    let path = match &config.output {
        Some(path) => path.clone(),
        None => make_parquet_file_name(run, config)?,
    };

    let bar = create_progress_bar(0, "Writing parquet file".to_string());
    ParquetEmitter::new(&path).with_progress(bar).emit(dataset)?;

    Ok(path)
}

#[cfg(feature = "netcdf")]
pub fn grid_reader() -> Result<hzero::reading::NetcdfReader> {
    Ok(hzero::reading::NetcdfReader)
}

#[cfg(not(feature = "netcdf"))]
pub fn grid_reader() -> Result<hzero::reading::MemoryReader> {
    Err(anyhow!(
        "this build cannot read gridded files; rebuild with `--features netcdf`"
    ))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_name_output_after_run_and_period() {
        let config = RunConfig::from_yaml(
            "start: 1976-01-01\nend: 2004-12-31\ntarget: {lat: -33.44, lon: 289.35}\ncatalog: c.yml\n",
            Path::new("."),
        )
        .unwrap();

        let path = make_parquet_file_name("models", &config).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with("hzero-models-1976-2004-"));
        assert!(name.ends_with(".parquet"));
    }
}
