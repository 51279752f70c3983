//! Discovery of per-analyte input folders.
//!
//! Raw data is organized as one folder per analyte holding one file per
//! charge state, e.g. `myoglobin/8.txt`. Tool outputs follow the same layout
//! with `output_<charge>.dat` names.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::InputError;

/// One charge-state file inside an analyte folder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AnalyteFile {
    /// Analyte name (folder name)
    pub analyte: String,
    /// Charge state encoded in the file name
    pub charge: u32,
    /// Full path
    pub path: PathBuf,
}

/// Charge state of a raw `<charge>.txt` file name
pub fn raw_file_charge(file_name: &str) -> Option<u32> {
    file_name.strip_suffix(".txt")?.parse().ok()
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, InputError> {
    if !dir.is_dir() {
        return Err(InputError::NotADirectory(dir.to_path_buf()));
    }
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();
    Ok(paths)
}

/// Every file under `root/<analyte>/` whose name yields a charge state.
///
/// Files whose names do not parse are ignored. Results are ordered by
/// analyte, then charge.
pub fn analyte_files<F>(root: impl AsRef<Path>, charge_of: F) -> Result<Vec<AnalyteFile>, InputError>
where
    F: Fn(&str) -> Option<u32>,
{
    let mut files = Vec::new();
    for folder in sorted_entries(root.as_ref())? {
        if !folder.is_dir() {
            continue;
        }
        let Some(analyte) = folder.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        for path in sorted_entries(&folder)? {
            let charge = path
                .file_name()
                .and_then(|n| n.to_str())
                .filter(|_| path.is_file())
                .and_then(&charge_of);
            match charge {
                Some(charge) => files.push(AnalyteFile {
                    analyte: analyte.to_string(),
                    charge,
                    path,
                }),
                None => debug!("Ignoring {}", path.display()),
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Raw `<analyte>/<charge>.txt` distributions
pub fn raw_series_files(root: impl AsRef<Path>) -> Result<Vec<AnalyteFile>, InputError> {
    analyte_files(root, raw_file_charge)
}
