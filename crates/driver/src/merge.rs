//! Moving Conefor's results out of its own directory.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use conefor_common::paths;
use tracing::debug;

use crate::DriverError;

/// Result files Conefor appends to across runs; merged by appending
pub const AGGREGATE_FILES: [&str; 3] = [
    "overall_indices.txt",
    "node_importances.txt",
    "results_all_overall_indices.txt",
];

/// Regular files directly inside `dir`
pub fn snapshot(dir: &Path) -> Result<HashSet<PathBuf>, DriverError> {
    let mut files = HashSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.insert(entry.path());
        }
    }
    Ok(files)
}

/// Files present in `after` but not in `before`, sorted by path
pub fn created_files(before: &HashSet<PathBuf>, after: &HashSet<PathBuf>) -> Vec<PathBuf> {
    let mut created: Vec<PathBuf> = after.difference(before).cloned().collect();
    created.sort();
    created
}

fn is_blank(path: &Path) -> Result<bool, DriverError> {
    let bytes = fs::read(path)?;
    Ok(bytes.iter().all(u8::is_ascii_whitespace))
}

fn move_file(from: &Path, to: &Path) -> Result<(), DriverError> {
    if fs::rename(from, to).is_err() {
        // Different file systems
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Move `files` into `output_dir` and return where they ended up.
///
/// Blank files are deleted. Aggregate result files are appended to an
/// existing file of the same name; anything else gets a collision-safe name.
pub fn merge_outputs(files: &[PathBuf], output_dir: &Path) -> Result<Vec<PathBuf>, DriverError> {
    paths::ensure_dir(output_dir)?;
    let mut merged: Vec<PathBuf> = Vec::new();

    for file in files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if is_blank(file)? {
            debug!("Removing empty result {}", file.display());
            fs::remove_file(file)?;
            continue;
        }

        let target = if AGGREGATE_FILES.contains(&name) && output_dir.join(name).exists() {
            let target = output_dir.join(name);
            let contents = fs::read(file)?;
            let mut out = OpenOptions::new().append(true).open(&target)?;
            out.write_all(&contents)?;
            fs::remove_file(file)?;
            debug!("Appended {} to {}", file.display(), target.display());
            target
        } else {
            let target = paths::unique_path(output_dir, name);
            move_file(file, &target)?;
            debug!("Moved {} to {}", file.display(), target.display());
            target
        };

        if !merged.contains(&target) {
            merged.push(target);
        }
    }

    Ok(merged)
}
