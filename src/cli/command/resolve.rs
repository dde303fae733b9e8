//! Print the file range of every catalog (source, field) without reading data.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use hzero::{pipeline::resolve_files, FieldKind, RunConfig, SourceCatalog};

use super::load;

#[derive(Debug)]
pub struct ResolvedRange {
    pub source_id: String,
    pub field: FieldKind,
    pub files: Result<Vec<PathBuf>, String>,
}

pub fn resolve(config_path: &Path) -> Result<String> {
    let (config, catalog) = load(config_path)?;
    let ranges = resolve_all(&config, &catalog)?;

    for range in &ranges {
        match &range.files {
            Ok(files) => {
                println!("{} {}: {} file(s)", range.source_id, range.field, files.len());
                for file in files {
                    println!("    {}", file.display());
                }
            }
            Err(reason) => println!("{} {}: {}", range.source_id, range.field, reason),
        }
    }

    let failed = ranges.iter().filter(|r| r.files.is_err()).count();
    if failed > 0 {
        return Err(anyhow!("{} of {} file ranges could not be resolved", failed, ranges.len()));
    }

    Ok(format!("{} file ranges resolved", ranges.len()))
}

pub fn resolve_all(config: &RunConfig, catalog: &SourceCatalog) -> Result<Vec<ResolvedRange>> {
    let mut ranges = Vec::new();

    for source_id in catalog.source_ids() {
        for field in catalog.fields_of(source_id)? {
            let desc = catalog.resolve(source_id, field)?;
            let files = resolve_files(config, &desc).map_err(|e| e.root().to_string());
            ranges.push(ResolvedRange {
                source_id: source_id.to_string(),
                field,
                files,
            });
        }
    }

    Ok(ranges)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn should_resolve_each_source_field() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("pr/CanESM2");
        fs::create_dir_all(&dir).unwrap();
        for name in ["pr_1.nc", "pr_2.nc", "pr_3.nc"] {
            fs::write(dir.join(name), b"").unwrap();
        }
        let run = format!(
            "start: 1976-01-01\nend: 2004-12-31\ntarget: {{lat: -33.44, lon: 289.35}}\ncatalog: c.yml\n\
             layout:\n  model: {{dir: \"{}/{{field}}/{{source}}\", extension: nc}}\n",
            tmp.path().display()
        );
        let config = RunConfig::from_yaml(&run, tmp.path()).unwrap();
        let catalog = SourceCatalog::from_yaml(
            "models:\n  CanESM2:\n    pr: {ini: pr_2.nc, end: pr_3.nc, name: pr, units: kgm-2s-1}\n    \
             ta: {ini: ta_1.nc, end: ta_1.nc, name: ta, units: K, plev: 70000}\n",
            Path::new("c.yml"),
        )
        .unwrap();

        let ranges = resolve_all(&config, &catalog).unwrap();

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].field, FieldKind::Precipitation);
        assert_eq!(ranges[0].files.as_ref().unwrap().len(), 2);
        assert!(ranges[1].files.is_err());
    }
}
