//! Sorted file inventories and the contiguous run of files between two markers.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// The candidate files of one (source, field), sorted by file name.
#[derive(Debug, Clone)]
pub struct Inventory {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl Inventory {
    /// Lists the regular files in `dir`, optionally keeping one extension only.
    pub fn list(dir: &Path, extension: Option<&str>) -> Result<Self> {
        let mut files = Vec::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(ext) = extension {
                if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                    continue;
                }
            }
            files.push(path);
        }

        Ok(Inventory::from_files(dir, files))
    }

    pub fn from_files(dir: &Path, mut files: Vec<PathBuf>) -> Self {
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Inventory {
            dir: dir.to_path_buf(),
            files,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The files from `ini` to `end`, both included.
    ///
    /// A marker absent from the inventory is an error, never a fallback to
    /// the whole inventory.
    pub fn range(&self, ini: &str, end: &str) -> Result<&[PathBuf]> {
        let ini_idx = self.position(ini)?;
        let end_idx = self.position(end)?;

        if end_idx < ini_idx {
            return Err(Error::MarkerNotFound {
                marker: end.to_string(),
                dir: self.dir.clone(),
                reason: format!("sorts before the first marker `{}`", ini),
            });
        }

        Ok(&self.files[ini_idx..=end_idx])
    }

    fn position(&self, marker: &str) -> Result<usize> {
        self.files
            .iter()
            .position(|p| p.file_name().and_then(|n| n.to_str()) == Some(marker))
            .ok_or_else(|| Error::MarkerNotFound {
                marker: marker.to_string(),
                dir: self.dir.clone(),
                reason: format!("not among {} inventory files", self.files.len()),
            })
    }
}

// -- Tests -------------------------------------------------------------------
